//! The dialog state machine.
//!
//! A dialog runs a queue of interactions: init, any number of orders, end.
//! Each interaction is one request/response round trip (plus follow-up
//! pages). A TAN request suspends the queue until
//! [`Dialog::continue_with_tan`] is called with the matching reference.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use tracing::Instrument;

use fints_core::error::{FintsError, Result};
use fints_core::protocol::continuation::{continuation_token, PageAssembler};
use fints_core::protocol::customer::CustomerMessage;
use fints_core::protocol::element::Fields;
use fints_core::protocol::message::{Message, CODE_CONTINUATION};
use fints_core::protocol::schema::Registry;
use fints_core::protocol::segment::Segment;

use crate::catalog::{CONTINUATION_MARK, HKIDN, HKTAN};
use crate::interaction::{evaluate, EndDialog, InitDialog, Interaction, InteractionResponse, Stage};
use crate::session::{Session, TanMediaRequirement};
use crate::transport::Transport;

/// Dialog id before the bank assigned one.
pub const INITIAL_DIALOG_ID: &str = "0";
/// Answers announcing that the bank closed the dialog.
const CODES_DIALOG_ENDED: [u16; 2] = [100, 9800];
/// Two-step process: order and TAN request in one message.
const TAN_PROCESS_ORDER: &str = "4";
/// Two-step process: submit the TAN for a pending order.
const TAN_PROCESS_SUBMIT: &str = "2";
/// HKTAN version used when no TAN method is selected.
const HKTAN_DEFAULT_VERSION: u16 = 7;
/// Methods announced by HITANS from this version on support SCA.
const SCA_MIN_VERSION: u16 = 6;

/// Responses of one `start`/`continue_with_tan` call, keyed by segment id.
pub type Responses = HashMap<String, InteractionResponse>;

pub struct Dialog {
    session: Session,
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    dialog_id: String,
    last_message_number: u32,
    interactions: Vec<Box<dyn Interaction>>,
    current: usize,
    is_initialized: bool,
    has_ended: bool,
    open_tan_reference: Option<String>,
}

impl Dialog {
    /// New dialog queueing init and end.
    pub fn new(session: Session, registry: Arc<Registry>, transport: Arc<dyn Transport>) -> Self {
        let sync_system_id = session.config.sync_system_id;
        Self {
            session,
            registry,
            transport,
            dialog_id: INITIAL_DIALOG_ID.to_string(),
            last_message_number: 0,
            interactions: vec![Box::new(InitDialog::new(sync_system_id)), Box::new(EndDialog)],
            current: 0,
            is_initialized: false,
            has_ended: false,
            open_tan_reference: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn dialog_id(&self) -> &str {
        &self.dialog_id
    }

    pub fn last_message_number(&self) -> u32 {
        self.last_message_number
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn has_ended(&self) -> bool {
        self.has_ended
    }

    /// Index of the interaction that runs (or waits for a TAN) next.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_interaction(&self) -> Option<&dyn Interaction> {
        self.interactions.get(self.current).map(|i| &**i)
    }

    /// Segment ids of the queued interactions, in order.
    pub fn queue(&self) -> Vec<&str> {
        self.interactions.iter().map(|i| i.segment_id()).collect()
    }

    /// Reference of the TAN challenge the dialog is suspended on.
    pub fn open_tan_reference(&self) -> Option<&str> {
        self.open_tan_reference.as_deref()
    }

    /// Queue a customer order.
    ///
    /// With `after_current` the order runs next; otherwise it runs right
    /// before the end interaction.
    pub fn add_customer_interaction(
        &mut self,
        interaction: Box<dyn Interaction>,
        after_current: bool,
    ) -> Result<()> {
        if self.has_ended {
            return Err(FintsError::Session(
                "cannot queue another customer interaction when dialog has already ended".into(),
            ));
        }
        if interaction.stage() == Stage::Order
            && !self.session.is_transaction_supported(interaction.segment_id())
        {
            return Err(FintsError::Session(format!(
                "customer order transaction {} is not supported according to the BPD",
                interaction.segment_id()
            )));
        }

        let at = if after_current {
            (self.current + 1).min(self.interactions.len())
        } else {
            self.interactions.len().saturating_sub(1)
        };
        self.interactions.insert(at, interaction);
        Ok(())
    }

    /// Run the queue from the beginning until it is done, fails or needs a TAN.
    pub async fn start(&mut self) -> Result<Responses> {
        if self.is_initialized {
            return Err(FintsError::Session("dialog has already been initialized".into()));
        }
        if self.has_ended {
            return Err(FintsError::Session(
                "cannot start a dialog that has already ended".into(),
            ));
        }
        if self.last_message_number > 0 {
            return Err(FintsError::Session(
                "dialog start can only be called on a new dialog".into(),
            ));
        }

        let mut responses = Responses::new();
        self.run_queue(&mut responses).await?;
        Ok(responses)
    }

    /// Submit the TAN for the suspended interaction and resume the queue.
    ///
    /// Decoupled methods are confirmed out of band and may pass `None`.
    pub async fn continue_with_tan(&mut self, reference: &str, tan: Option<&str>) -> Result<Responses> {
        if reference.is_empty() {
            return Err(FintsError::Session(
                "tanOrderReference must be provided to continue a customer order with a TAN".into(),
            ));
        }
        if self.has_ended {
            return Err(FintsError::Session(
                "cannot continue a customer order when dialog has already ended".into(),
            ));
        }
        let segment_id = self
            .current_interaction()
            .map(|i| i.segment_id().to_string())
            .ok_or_else(|| {
                FintsError::Session(
                    "there is no running customer interaction in this dialog to continue".into(),
                )
            })?;
        if self.open_tan_reference.as_deref() != Some(reference) {
            return Err(FintsError::Session(format!(
                "no open TAN challenge matches reference {reference}"
            )));
        }
        let decoupled = self.session.selected_tan_method().is_some_and(|m| m.is_decoupled);
        if tan.is_none() && !decoupled {
            return Err(FintsError::Session(
                "TAN must be provided for non-decoupled TAN methods".into(),
            ));
        }

        let mut message = self.next_message();
        if let Some(credentials) = self.session.credentials() {
            message.sign(credentials, self.session.tan_method_id(), tan.map(str::to_string));
            if self.session.tan_method_id().is_some() {
                message.push(self.tan_segment(TAN_PROCESS_SUBMIT, &segment_id, Some(reference)));
            }
        }

        let parted_id = self
            .current_interaction()
            .and_then(|i| i.parted_segment_id())
            .map(str::to_string);
        let mut reply = self.exchange(&message, parted_id.as_deref()).await?;
        if let Some(parted_id) = parted_id {
            if reply.has_return_code(CODE_CONTINUATION) {
                // The confirmation carried no order segment; follow-up pages
                // re-send the order itself with the continuation mark.
                let mut follow_up = self.build_current(self.last_message_number)?;
                reply = self
                    .collect_pages(&mut follow_up, &segment_id, &parted_id, reply)
                    .await?;
            }
        }
        let response = self.evaluate_current(&reply)?;

        let mut responses = Responses::new();
        if self.record(response, &mut responses) {
            self.run_queue(&mut responses).await?;
        }
        Ok(responses)
    }

    async fn run_queue(&mut self, responses: &mut Responses) -> Result<()> {
        while self.current < self.interactions.len() && !self.has_ended {
            let response = self.send_current().await?;
            if !self.record(response, responses) {
                break;
            }
        }
        Ok(())
    }

    /// Store the response of the current interaction and advance past it
    /// on success. Returns whether the queue may go on.
    fn record(&mut self, response: InteractionResponse, responses: &mut Responses) -> bool {
        let Some(interaction) = self.interactions.get(self.current) else {
            return false;
        };
        let key = interaction.segment_id().to_string();
        let stage = interaction.stage();

        if !response.dialog_id.is_empty() {
            self.dialog_id = response.dialog_id.clone();
        }

        if response.requires_tan {
            self.open_tan_reference = response.tan_reference.clone();
            tracing::info!(
                segment = %key,
                tan_reference = response.tan_reference.as_deref().unwrap_or_default(),
                "dialog suspended until a TAN is supplied"
            );
            responses.insert(key, response);
            return false;
        }

        self.open_tan_reference = None;
        let success = response.success;
        responses.insert(key, response);
        if !success {
            return false;
        }
        if stage == Stage::Init {
            self.is_initialized = true;
        }
        self.current += 1;
        !self.has_ended
    }

    fn next_message(&mut self) -> CustomerMessage {
        self.last_message_number += 1;
        CustomerMessage::new(self.dialog_id.clone(), self.last_message_number)
    }

    fn tan_segment(&self, process: &str, segment_id: &str, reference: Option<&str>) -> Segment {
        let method = self.session.selected_tan_method();
        let mut fields = Fields::new()
            .with("tanProcess", process)
            .with("segId", segment_id);
        if let Some(reference) = reference {
            fields.set("orderRef", reference);
            fields.set("nextTan", false);
        }
        if method.is_some_and(|m| m.tan_media_requirement >= TanMediaRequirement::Optional) {
            if let Some(media) = self.session.tan_media_name() {
                fields.set("tanMedia", media);
            }
        }
        Segment::new(
            HKTAN,
            method.map_or(HKTAN_DEFAULT_VERSION, |m| m.version),
            fields,
        )
    }

    /// Build, sign and send the current interaction's message.
    async fn send_current(&mut self) -> Result<InteractionResponse> {
        self.last_message_number += 1;
        let mut message = self.build_current(self.last_message_number)?;
        let (segment_id, parted_id) = match self.current_interaction() {
            Some(i) => (
                i.segment_id().to_string(),
                i.parted_segment_id().map(str::to_string),
            ),
            None => return Err(FintsError::Session("no interaction left to send".into())),
        };

        let mut reply = self.exchange(&message, parted_id.as_deref()).await?;
        if let Some(parted_id) = parted_id {
            reply = self
                .collect_pages(&mut message, &segment_id, &parted_id, reply)
                .await?;
        }
        self.evaluate_current(&reply)
    }

    /// The current interaction's segments, signed and with HKTAN where the
    /// stage and the BPD call for it.
    fn build_current(&self, number: u32) -> Result<CustomerMessage> {
        let interaction = self
            .interactions
            .get(self.current)
            .ok_or_else(|| FintsError::Session("no interaction left to send".into()))?;
        let stage = interaction.stage();
        let segment_id = interaction.segment_id();
        let segments = interaction.segments(&self.session, &self.dialog_id)?;

        let method_id = self.session.tan_method_id();
        let sca = self.session.sca_supported();
        let credentials = self.session.credentials();

        let mut message = CustomerMessage::new(self.dialog_id.clone(), number);
        let mut tan_segment = None;
        match stage {
            Stage::Init | Stage::End => {
                if let Some(credentials) = credentials {
                    message.sign(credentials, method_id.filter(|_| sca), None);
                    if stage == Stage::Init && sca {
                        tan_segment = Some(self.tan_segment(TAN_PROCESS_ORDER, HKIDN, None));
                    }
                }
            }
            Stage::Order => {
                let transaction = self.session.transaction(segment_id).ok_or_else(|| {
                    FintsError::Session(format!(
                        "customer order transaction {segment_id} is not supported according to the BPD"
                    ))
                })?;
                let tan_required = transaction.tan_required;
                let version = self.session.selected_tan_method().map_or(0, |m| m.version);
                if let Some(credentials) = credentials {
                    let signing_method = method_id.filter(|_| tan_required || version >= SCA_MIN_VERSION);
                    message.sign(credentials, signing_method, None);
                    if tan_required && method_id.is_some() {
                        tan_segment = Some(self.tan_segment(TAN_PROCESS_ORDER, segment_id, None));
                    }
                }
            }
        }
        for segment in segments {
            message.push(segment);
        }
        if let Some(segment) = tan_segment {
            message.push(segment);
        }
        Ok(message)
    }

    fn evaluate_current(&mut self, reply: &Message) -> Result<InteractionResponse> {
        let interaction = self
            .interactions
            .get_mut(self.current)
            .ok_or_else(|| FintsError::Session("no interaction left to evaluate".into()))?;
        evaluate(interaction.as_mut(), reply, &mut self.session)
    }

    /// Fetch follow-up pages while the bank answers 3040, then splice the
    /// reassembled segment into the last reply.
    async fn collect_pages(
        &mut self,
        message: &mut CustomerMessage,
        request_id: &str,
        parted_id: &str,
        first: Message,
    ) -> Result<Message> {
        let Some(at) = first.position_parted(parted_id) else {
            return Ok(first);
        };
        let mut pages = PageAssembler::new(&first.segments[at])?;
        let mut reply = first;

        while reply.has_return_code(CODE_CONTINUATION) {
            let token = continuation_token(&reply).ok_or_else(|| {
                FintsError::Continuation("bank announced more data without a continuation token".into())
            })?;
            if !self.registry.has_element(request_id, CONTINUATION_MARK) {
                return Err(FintsError::Continuation(format!(
                    "request segment {request_id} cannot carry a {CONTINUATION_MARK}"
                )));
            }
            let request = message
                .body_mut()
                .iter_mut()
                .find(|s| s.id() == request_id)
                .and_then(Segment::fields_mut)
                .ok_or_else(|| {
                    FintsError::Continuation(format!(
                        "request segment {request_id} is missing from the message"
                    ))
                })?;
            request.set(CONTINUATION_MARK, token);

            self.last_message_number += 1;
            message.number = self.last_message_number;
            tracing::debug!(segment = %parted_id, page = pages.pages() + 1, "requesting next page");

            reply = self.exchange(message, Some(parted_id)).await?;
            if let Some(at) = reply.position_parted(parted_id) {
                pages.push(&reply.segments[at])?;
            }
        }

        let complete = pages.finish(&self.registry)?;
        match reply.position_parted(parted_id) {
            Some(at) => reply.segments[at] = complete,
            None => reply.segments.push(complete),
        }
        Ok(reply)
    }

    /// One request/response round trip.
    async fn exchange(&mut self, message: &CustomerMessage, parted_id: Option<&str>) -> Result<Message> {
        let span = tracing::debug_span!("fints.message", dialog_id = %self.dialog_id, msg_nr = message.number);
        async {
            let now = Local::now().naive_local();
            let request = message.encode(&self.registry, now, self.session.config.wrap_envelope)?;
            tracing::debug!(bytes = request.len(), "message sent");

            let raw = self.transport.send(request).await?;
            let reply = Message::decode(&raw, &self.registry, parted_id)?;
            for answer in reply.answers() {
                if answer.is_failure() {
                    tracing::warn!(code = answer.code, text = %answer.text, "bank reported an error");
                } else {
                    tracing::debug!(code = answer.code, text = %answer.text, "bank answer");
                }
            }

            if CODES_DIALOG_ENDED.iter().any(|c| reply.has_return_code(*c)) {
                self.has_ended = true;
                tracing::info!(dialog_id = %self.dialog_id, "dialog ended by bank");
            }
            Ok::<_, FintsError>(reply)
        }
        .instrument(span)
        .await
    }
}
