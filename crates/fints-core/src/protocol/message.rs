//! Message framing: segment splitting, envelope splicing, answer lookups.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FintsError, Result};
use crate::protocol::catalog::{HIRMG, HIRMS, HNVSD, HNVSK};
use crate::protocol::schema::Registry;
use crate::protocol::segment::{Body, Segment};
use crate::protocol::syntax::{self, SEGMENT_TERMINATOR};

/// Return code signalling more pages (token in parameter 0).
pub const CODE_CONTINUATION: u16 = 3040;
/// Codes at or above this value denote failure.
pub const FAILURE_THRESHOLD: u16 = 9000;

/// One return code reported by the bank (HIRMG/HIRMS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAnswer {
    pub code: u16,
    pub reference: Option<String>,
    pub text: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl BankAnswer {
    pub fn is_failure(&self) -> bool {
        self.code >= FAILURE_THRESHOLD
    }
}

/// An ordered list of segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub segments: Vec<Segment>,
}

impl Message {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Decode a full message.
    ///
    /// Segments whose id equals `parted_id` are kept whole as
    /// [`Body::Parted`] for continuation reassembly. An HNVSK immediately
    /// followed by HNVSD is replaced by the segments carried inside HNVSD.
    pub fn decode(raw: &[u8], registry: &Registry, parted_id: Option<&str>) -> Result<Self> {
        let mut segments = decode_segments(raw, registry, parted_id)?;

        let vsk = segments.iter().position(|s| s.id() == HNVSK && !s.is_unknown());
        let vsd = segments.iter().position(|s| s.id() == HNVSD && !s.is_unknown());
        if let (Some(vsk), Some(vsd)) = (vsk, vsd) {
            if vsd == vsk + 1 {
                let inner = segments[vsd]
                    .fields()
                    .and_then(|f| f.bytes("encryptedData"))
                    .cloned()
                    .ok_or_else(|| FintsError::Malformed("HNVSD carries no data".into()))?;
                let inner = decode_segments(&inner, registry, parted_id)?;
                segments.splice(vsk..=vsd, inner);
            }
        }

        Ok(Self { segments })
    }

    /// First decoded segment with `id`.
    pub fn find(&self, id: &str) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.id() == id && matches!(s.body, Body::Decoded(_)))
    }

    /// Decoded segments with `id` (unknown and parted ones are excluded).
    pub fn find_all<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments
            .iter()
            .filter(move |s| s.id() == id && matches!(s.body, Body::Decoded(_)))
    }

    /// Segments with `id` that were kept as unknown.
    pub fn find_unknown<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments
            .iter()
            .filter(move |s| s.id() == id && s.is_unknown())
    }

    /// Index of the parted segment with `id`.
    pub fn position_parted(&self, id: &str) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| s.id() == id && matches!(s.body, Body::Parted(_)))
    }

    /// All answers of HIRMG and HIRMS segments, in message order.
    pub fn answers(&self) -> Vec<BankAnswer> {
        self.segments
            .iter()
            .filter(|s| s.id() == HIRMG || s.id() == HIRMS)
            .filter_map(Segment::fields)
            .flat_map(|f| f.list("answers").iter())
            .filter_map(|a| a.as_group())
            .map(|a| BankAnswer {
                code: a.number("code").and_then(|c| u16::try_from(c).ok()).unwrap_or_default(),
                reference: a.text("refElement").map(str::to_string),
                text: a.text("text").unwrap_or_default().to_string(),
                params: a
                    .list("params")
                    .iter()
                    .filter_map(|p| p.as_str().map(str::to_string))
                    .collect(),
            })
            .collect()
    }

    pub fn has_return_code(&self, code: u16) -> bool {
        self.answers().iter().any(|a| a.code == code)
    }

    /// Highest return code, 0 when the message carries none.
    pub fn highest_return_code(&self) -> u16 {
        self.answers().iter().map(|a| a.code).max().unwrap_or(0)
    }

    pub fn answer(&self, code: u16) -> Option<BankAnswer> {
        self.answers().into_iter().find(|a| a.code == code)
    }

    /// Diagnostic rendering, optionally including unknown segments.
    pub fn render(&self, registry: &Registry, include_unknown: bool) -> String {
        let mut text = format!("Message with {} segments:", self.segments.len());
        for segment in self
            .segments
            .iter()
            .filter(|s| include_unknown || !s.is_unknown())
        {
            text.push('\n');
            text.push_str(&segment.render(registry));
        }
        text
    }

    /// Borrow the message with a registry for `Display`.
    pub fn display<'a>(&'a self, registry: &'a Registry) -> MessageDisplay<'a> {
        MessageDisplay {
            message: self,
            registry,
        }
    }
}

/// `Display` adapter returned by [`Message::display`].
pub struct MessageDisplay<'a> {
    message: &'a Message,
    registry: &'a Registry,
}

impl fmt::Display for MessageDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message.render(self.registry, false))
    }
}

fn decode_segments(raw: &[u8], registry: &Registry, parted_id: Option<&str>) -> Result<Vec<Segment>> {
    syntax::split(raw, SEGMENT_TERMINATOR)?
        .into_iter()
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| match parted_id {
            Some(id) if has_id(chunk, id) => Segment::parted(chunk),
            _ => Segment::decode(chunk, registry),
        })
        .collect()
}

fn has_id(chunk: &[u8], id: &str) -> bool {
    chunk.starts_with(id.as_bytes()) && chunk.get(id.len()) == Some(&syntax::GROUP_SEPARATOR)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const ANSWERS: &[u8] = b"HNHBK:1:3+000000000120+300+4711+2'HIRMG:2:2+0010::Nachricht entgegengenommen.'HIRMS:3:2:3+3040::Weitere Daten folgen.:TOKEN1+9010::Fehler.'HNHBS:4:1+2'";

    #[test]
    fn aggregates_answers_across_segments() {
        let reg = Registry::protocol().unwrap();
        let msg = Message::decode(ANSWERS, &reg, None).unwrap();
        let answers = msg.answers();
        assert_eq!(answers.iter().map(|a| a.code).collect::<Vec<_>>(), vec![10, 3040, 9010]);
        assert_eq!(answers[1].params, vec!["TOKEN1".to_string()]);
        assert!(msg.has_return_code(3040));
        assert_eq!(msg.highest_return_code(), 9010);
        assert!(answers[2].is_failure());
    }

    #[test]
    fn message_without_answers_has_code_zero() {
        let reg = Registry::protocol().unwrap();
        let msg = Message::decode(b"HNHBS:1:1+1'", &reg, None).unwrap();
        assert_eq!(msg.highest_return_code(), 0);
        assert!(msg.answers().is_empty());
    }

    #[test]
    fn parted_segments_are_kept_whole() {
        let reg = Registry::protocol().unwrap();
        let msg = Message::decode(b"HIRMG:2:2+3040::more:T'HIKAZ:3:7:3+@3@abc+x'", &reg, Some("HIKAZ")).unwrap();
        let idx = msg.position_parted("HIKAZ").unwrap();
        assert_eq!(msg.segments[idx].body, Body::Parted(bytes::Bytes::from_static(b"HIKAZ:3:7:3+@3@abc+x")));
        assert!(msg.find("HIKAZ").is_none());
    }

    #[test]
    fn render_omits_unknown_segments_by_default() {
        let reg = Registry::protocol().unwrap();
        let msg = Message::decode(b"HIRMG:3:2+0010::OK.'HIXXX:4:1+13'", &reg, None).unwrap();
        assert_eq!(msg.display(&reg).to_string(), "Message with 2 segments:\n   3. HIRMG v2; [code: 10, text: OK.]");
        assert!(msg.render(&reg, true).ends_with("   4. HIXXX v1 (unknown segment)"));
        assert_eq!(msg.find_unknown("HIXXX").count(), 1);
    }

    #[test]
    fn oversized_frame_length_is_a_decoding_error() {
        let reg = Registry::protocol().unwrap();
        let err = Message::decode(b"HNHBS:1:1+@18446744073709551615@x'", &reg, None).unwrap_err();
        assert_eq!(err.class().as_str(), "DECODING");
    }

    fn first_segment<'m>(msg: &'m Message, prefix: &str) -> Option<&'m Segment> {
        let id = format!("{prefix}RMS");
        msg.find(&id)
    }

    #[test]
    fn find_outlives_a_temporary_id() {
        let reg = Registry::protocol().unwrap();
        let msg = Message::decode(ANSWERS, &reg, None).unwrap();
        let hirms = first_segment(&msg, "HI").unwrap();
        assert_eq!(hirms.header.number, 3);
        assert!(first_segment(&msg, "HK").is_none());
    }
}
