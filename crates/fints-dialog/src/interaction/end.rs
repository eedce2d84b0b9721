//! Dialog termination.

use fints_core::error::Result;
use fints_core::protocol::element::Fields;
use fints_core::protocol::message::Message;
use fints_core::protocol::segment::Segment;

use crate::catalog::HKEND;
use crate::interaction::{Interaction, InteractionResponse, Stage};
use crate::session::Session;

#[derive(Debug, Clone, Copy, Default)]
pub struct EndDialog;

impl Interaction for EndDialog {
    fn segment_id(&self) -> &str {
        HKEND
    }

    fn stage(&self) -> Stage {
        Stage::End
    }

    fn segments(&self, _session: &Session, dialog_id: &str) -> Result<Vec<Segment>> {
        Ok(vec![Segment::new(
            HKEND,
            1,
            Fields::new().with("dialogId", dialog_id),
        )])
    }

    fn handle_response(
        &mut self,
        _message: &Message,
        _session: &mut Session,
        _response: &mut InteractionResponse,
    ) -> Result<()> {
        Ok(())
    }
}
