//! Generic customer order built from ready-made request segments.

use fints_core::error::Result;
use fints_core::protocol::message::Message;
use fints_core::protocol::segment::Segment;

use crate::interaction::{Interaction, InteractionResponse, Stage};
use crate::session::Session;

/// Sends the given segments as one order and collects every response
/// segment with `response_id`.
///
/// The first request segment must carry the transaction id the BPD
/// list (HKSAL, HKKAZ, ...).
#[derive(Debug, Clone)]
pub struct SegmentOrder {
    transaction: String,
    response_id: String,
    segments: Vec<Segment>,
    paged: bool,
}

impl SegmentOrder {
    pub fn new(
        transaction: impl Into<String>,
        response_id: impl Into<String>,
        segments: Vec<Segment>,
    ) -> Self {
        Self {
            transaction: transaction.into(),
            response_id: response_id.into(),
            segments,
            paged: false,
        }
    }

    /// Accept responses split across several pages (return code 3040).
    ///
    /// The request segment must declare a `continuationMark` element.
    pub fn paged(mut self) -> Self {
        self.paged = true;
        self
    }
}

impl Interaction for SegmentOrder {
    fn segment_id(&self) -> &str {
        &self.transaction
    }

    fn stage(&self) -> Stage {
        Stage::Order
    }

    fn parted_segment_id(&self) -> Option<&str> {
        self.paged.then_some(self.response_id.as_str())
    }

    fn segments(&self, _session: &Session, _dialog_id: &str) -> Result<Vec<Segment>> {
        Ok(self.segments.clone())
    }

    fn handle_response(
        &mut self,
        message: &Message,
        _session: &mut Session,
        response: &mut InteractionResponse,
    ) -> Result<()> {
        response.segments = message.find_all(&self.response_id).cloned().collect();
        Ok(())
    }
}
