//! Customer interactions: the units of work a dialog queues and runs.
//!
//! Every dialog starts with [`InitDialog`] and finishes with [`EndDialog`];
//! business orders are queued in between. An interaction only builds its
//! request segments and digests the matching response. Signing, TAN
//! handling and paging belong to the dialog.

pub mod end;
pub mod init;
pub mod order;

pub use end::EndDialog;
pub use init::InitDialog;
pub use order::SegmentOrder;

use fints_core::error::{FintsError, Result};
use fints_core::protocol::catalog::HNHBK;
use fints_core::protocol::message::{BankAnswer, Message, FAILURE_THRESHOLD};
use fints_core::protocol::segment::Segment;

use crate::catalog::HITAN;
use crate::session::Session;

/// Return codes that suspend the dialog until a TAN is supplied.
pub const TAN_REQUIRED_CODES: [u16; 4] = [30, 3955, 3956, 3957];

/// Where an interaction sits in the dialog lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Order,
    End,
}

pub trait Interaction: Send + Sync {
    /// Id of the segment that identifies this interaction (HKIDN, HKSAL, ...).
    fn segment_id(&self) -> &str;

    fn stage(&self) -> Stage;

    /// Response segment the bank may split across pages, if the order
    /// supports paging.
    fn parted_segment_id(&self) -> Option<&str> {
        None
    }

    /// Request segments for the next message of this interaction.
    fn segments(&self, session: &Session, dialog_id: &str) -> Result<Vec<Segment>>;

    /// Digest a successful response. Not called while a TAN is pending.
    fn handle_response(
        &mut self,
        message: &Message,
        session: &mut Session,
        response: &mut InteractionResponse,
    ) -> Result<()>;
}

/// Outcome of one interaction round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionResponse {
    pub dialog_id: String,
    pub success: bool,
    /// Whether the session's banking information changed while handling.
    pub banking_information_updated: bool,
    pub answers: Vec<BankAnswer>,
    pub requires_tan: bool,
    pub tan_reference: Option<String>,
    pub tan_challenge: Option<String>,
    pub tan_media_name: Option<String>,
    /// Result segments collected by order interactions.
    pub segments: Vec<Segment>,
}

impl InteractionResponse {
    pub fn highest_code(&self) -> u16 {
        self.answers.iter().map(|a| a.code).max().unwrap_or(0)
    }
}

/// Turn a bank message into an [`InteractionResponse`] for `interaction`.
///
/// The interaction's handler only runs when the message succeeded and no
/// TAN is pending.
pub fn evaluate(
    interaction: &mut dyn Interaction,
    message: &Message,
    session: &mut Session,
) -> Result<InteractionResponse> {
    let mut response = base_response(message)?;
    if response.success && !response.requires_tan {
        let before = snapshot(session)?;
        interaction.handle_response(message, session, &mut response)?;
        response.banking_information_updated = snapshot(session)? != before;
    }
    Ok(response)
}

fn base_response(message: &Message) -> Result<InteractionResponse> {
    let dialog_id = message
        .find(HNHBK)
        .and_then(Segment::fields)
        .and_then(|f| f.text("dialogId"))
        .unwrap_or_default()
        .to_string();
    let answers = message.answers();
    let highest = answers.iter().map(|a| a.code).max().unwrap_or(0);

    let tan_codes: Vec<&BankAnswer> = answers
        .iter()
        .filter(|a| TAN_REQUIRED_CODES.contains(&a.code))
        .collect();
    if tan_codes.is_empty() {
        return Ok(InteractionResponse {
            dialog_id,
            success: highest < FAILURE_THRESHOLD,
            answers,
            ..InteractionResponse::default()
        });
    }

    let hitan = message.find(HITAN).and_then(Segment::fields).ok_or_else(|| {
        FintsError::Malformed(
            "HITAN segment not found in response, although the bank asked for a TAN".into(),
        )
    })?;
    let challenge = hitan
        .text("challenge")
        .map(str::to_string)
        .or_else(|| {
            [3955, 3956, 3957].iter().find_map(|code| {
                tan_codes
                    .iter()
                    .find(|a| a.code == *code)
                    .map(|a| a.text.clone())
            })
        });

    Ok(InteractionResponse {
        dialog_id,
        success: highest < FAILURE_THRESHOLD,
        requires_tan: true,
        tan_reference: hitan.text("orderReference").map(str::to_string),
        tan_challenge: challenge,
        tan_media_name: hitan.text("tanMedia").map(str::to_string),
        answers,
        ..InteractionResponse::default()
    })
}

fn snapshot(session: &Session) -> Result<String> {
    serde_json::to_string(&session.banking)
        .map_err(|e| FintsError::Session(format!("cannot snapshot banking information: {e}")))
}
