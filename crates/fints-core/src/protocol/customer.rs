//! Outgoing customer messages: signing, envelope wrapping, final numbering.

use bytes::Bytes;
use chrono::NaiveDateTime;

use crate::error::{FintsError, Result, Violation};
use crate::protocol::catalog::{HNHBK, HNHBS, HNSHA, HNSHK, HNVSD, HNVSD_NUMBER, HNVSK, HNVSK_NUMBER};
use crate::protocol::element::{Fields, Value};
use crate::protocol::schema::Registry;
use crate::protocol::segment::Segment;

/// Protocol version written into every message header.
pub const HBCI_VERSION: u16 = 300;
const HASH_SHA256: u64 = 3;
const FUNCTION_SINGLE_STEP: u16 = 999;
const FUNCTION_ENCRYPT: u64 = 998;

/// Identity and secret used to sign a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub country: u16,
    pub bank_id: String,
    pub user_id: String,
    pub pin: String,
    pub system_id: String,
}

#[derive(Debug, Clone)]
struct Signature {
    control_ref: u32,
    credentials: Credentials,
    tan_method: Option<u16>,
    tan: Option<String>,
}

/// A message under construction: header, signatures, body, trailer.
///
/// Segment numbers and the header's length field are only assigned by
/// [`CustomerMessage::encode`].
#[derive(Debug, Clone)]
pub struct CustomerMessage {
    pub dialog_id: String,
    pub number: u32,
    body: Vec<Segment>,
    signatures: Vec<Signature>,
}

impl CustomerMessage {
    pub fn new(dialog_id: impl Into<String>, number: u32) -> Self {
        Self {
            dialog_id: dialog_id.into(),
            number,
            body: Vec::new(),
            signatures: Vec::new(),
        }
    }

    pub fn push(&mut self, segment: Segment) {
        self.body.push(segment);
    }

    pub fn body(&self) -> &[Segment] {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut [Segment] {
        &mut self.body
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Add a signature (HNSHK/HNSHA pair) with the next control reference.
    ///
    /// `tan_method` switches the profile to two-step; `tan` goes into the
    /// signature trailer next to the PIN.
    pub fn sign(&mut self, credentials: Credentials, tan_method: Option<u16>, tan: Option<String>) {
        let control_ref = self.signatures.len() as u32 + 1;
        self.signatures.push(Signature {
            control_ref,
            credentials,
            tan_method,
            tan,
        });
    }

    /// Final segment list at `now`, unnumbered, without envelope.
    pub fn segments(&self, now: NaiveDateTime) -> Vec<Segment> {
        let mut out = Vec::with_capacity(self.body.len() + 2 + 2 * self.signatures.len());
        out.push(self.header(0));
        out.extend(self.signatures.iter().rev().map(|s| signature_head(s, now)));
        out.extend(self.body.iter().cloned());
        out.extend(self.signatures.iter().map(signature_tail));
        out.push(Segment::new(
            HNHBS,
            1,
            Fields::new().with("msgNr", self.number),
        ));
        out
    }

    /// Render the message for transmission.
    ///
    /// Numbers every segment 1..n, wraps the signed inner segments into the
    /// HNVSK/HNVSD envelope when `wrap_envelope` is set, then patches the
    /// total byte length into the header.
    pub fn encode(&self, registry: &Registry, now: NaiveDateTime, wrap_envelope: bool) -> Result<Bytes> {
        let mut segments = self.segments(now);
        if segments.len() < 3 {
            return Err(FintsError::encode(
                "message",
                Violation::Malformed("a message must contain at least three segments".into()),
            ));
        }
        for (i, segment) in segments.iter_mut().enumerate() {
            segment.header.number = i as u32 + 1;
        }

        if wrap_envelope {
            if let Some(first) = self.signatures.first() {
                let last = segments.len() - 1;
                let mut inner = Vec::new();
                for segment in &segments[1..last] {
                    inner.extend(segment.encode(registry)?);
                }
                let trailer = segments.remove(last);
                let header = segments.remove(0);
                segments = vec![
                    header,
                    envelope_head(&first.credentials, now),
                    envelope_data(inner),
                    trailer,
                ];
            }
        }

        let mut rest = Vec::new();
        for segment in &segments[1..] {
            rest.extend(segment.encode(registry)?);
        }
        let header_len = segments[0].encode(registry)?.len();
        let total = header_len + rest.len();

        let mut header = self.header(total as u64);
        header.header.number = 1;
        let mut out = header.encode(registry)?;
        if out.len() != header_len {
            return Err(FintsError::encode(
                "messageLength",
                Violation::Malformed("header length changed while patching".into()),
            ));
        }
        out.extend(rest);
        Ok(Bytes::from(out))
    }

    fn header(&self, length: u64) -> Segment {
        Segment::new(
            HNHBK,
            3,
            Fields::new()
                .with("messageLength", length)
                .with("hbciVersion", HBCI_VERSION)
                .with("dialogId", self.dialog_id.as_str())
                .with("msgNr", self.number),
        )
    }
}

fn bank(credentials: &Credentials) -> Fields {
    Fields::new()
        .with("country", credentials.country)
        .with("bankId", credentials.bank_id.as_str())
}

fn key(credentials: &Credentials) -> Fields {
    Fields::new()
        .with("bank", bank(credentials))
        .with("userId", credentials.user_id.as_str())
        .with("keyType", "S")
        .with("keyNr", 0u64)
        .with("keyVersion", 0u64)
}

fn date_time(now: NaiveDateTime) -> Fields {
    Fields::new()
        .with("type", 1u64)
        .with("date", now.date())
        .with("time", now.time())
}

fn security_id(credentials: &Credentials) -> Fields {
    Fields::new()
        .with("partyType", 1u64)
        .with("partyId", credentials.system_id.as_str())
}

fn signature_head(sig: &Signature, now: NaiveDateTime) -> Segment {
    let sec_version: u64 = if sig.tan_method.is_some() { 2 } else { 1 };
    Segment::new(
        HNSHK,
        4,
        Fields::new()
            .with("secProfile", Fields::new().with("secMethod", "PIN").with("secVersion", sec_version))
            .with("secFunc", sig.tan_method.unwrap_or(FUNCTION_SINGLE_STEP))
            .with("secControlRef", sig.control_ref.to_string())
            .with("secArea", 1u64)
            .with("secRole", 1u64)
            .with("secId", security_id(&sig.credentials))
            .with("secRefNum", 1u64)
            .with("dateTime", date_time(now))
            .with(
                "hash",
                Fields::new()
                    .with("use", 1u64)
                    .with("algorithm", HASH_SHA256)
                    .with("paramName", 1u64),
            )
            .with(
                "signature",
                Fields::new()
                    .with("use", 6u64)
                    .with("algorithm", 10u64)
                    .with("mode", 16u64),
            )
            .with("key", key(&sig.credentials)),
    )
}

fn signature_tail(sig: &Signature) -> Segment {
    let mut custom = Fields::new().with("pin", sig.credentials.pin.as_str());
    if let Some(tan) = &sig.tan {
        custom.set("tan", tan.as_str());
    }
    Segment::new(
        HNSHA,
        2,
        Fields::new()
            .with("secControlRef", sig.control_ref.to_string())
            .with("customSignature", custom),
    )
}

fn envelope_head(credentials: &Credentials, now: NaiveDateTime) -> Segment {
    let mut segment = Segment::new(
        HNVSK,
        3,
        Fields::new()
            .with("secProfile", Fields::new().with("secMethod", "PIN").with("secVersion", 1u64))
            .with("secFunc", FUNCTION_ENCRYPT)
            .with("secRole", 1u64)
            .with("secId", security_id(credentials))
            .with("dateTime", date_time(now))
            .with(
                "encryption",
                Fields::new()
                    .with("use", 2u64)
                    .with("mode", 2u64)
                    .with("algorithm", 13u64)
                    .with("keyParamValue", Bytes::from_static(b"00000000"))
                    .with("keyParamName", 5u64)
                    .with("initParamName", 1u64),
            )
            .with("key", key(credentials))
            .with("compressMethod", 0u64),
    );
    segment.header.number = HNVSK_NUMBER;
    segment
}

fn envelope_data(inner: Vec<u8>) -> Segment {
    let mut segment = Segment::new(
        HNVSD,
        1,
        Fields::new().with("encryptedData", Value::Binary(Bytes::from(inner))),
    );
    segment.header.number = HNVSD_NUMBER;
    segment
}
