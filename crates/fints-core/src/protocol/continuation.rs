//! Reassembly of segments the bank delivers across several response pages.

use crate::error::{FintsError, Result};
use crate::protocol::message::{Message, CODE_CONTINUATION};
use crate::protocol::schema::Registry;
use crate::protocol::segment::{Body, Segment};
use crate::protocol::syntax::{self, ELEMENT_SEPARATOR};

/// Token the bank attached to answer 3040, if the message has one.
pub fn continuation_token(message: &Message) -> Option<String> {
    message
        .answer(CODE_CONTINUATION)
        .and_then(|a| a.params.into_iter().next())
        .filter(|t| !t.is_empty())
}

/// Append a follow-up page to the text accumulated so far.
///
/// The page repeats the segment header; only the text after its first
/// unescaped `+` is appended.
pub fn concat_pages(acc: &mut Vec<u8>, page: &[u8]) -> Result<()> {
    let at = syntax::find_unescaped(page, ELEMENT_SEPARATOR)?.ok_or_else(|| {
        FintsError::Continuation(format!(
            "continuation page '{}' carries no payload",
            syntax::from_latin1(page)
        ))
    })?;
    acc.extend_from_slice(&page[at + 1..]);
    Ok(())
}

/// Collects the raw pages of one parted segment.
#[derive(Debug, Clone)]
pub struct PageAssembler {
    id: String,
    raw: Vec<u8>,
    pages: usize,
}

impl PageAssembler {
    /// Start with the parted segment of the first response.
    pub fn new(first: &Segment) -> Result<Self> {
        let Body::Parted(raw) = &first.body else {
            return Err(FintsError::Continuation(format!(
                "segment '{}' was not kept for reassembly",
                first.id()
            )));
        };
        Ok(Self {
            id: first.id().to_string(),
            raw: raw.to_vec(),
            pages: 1,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Add the parted segment of a follow-up response.
    pub fn push(&mut self, page: &Segment) -> Result<()> {
        let Body::Parted(raw) = &page.body else {
            return Err(FintsError::Continuation(format!(
                "segment '{}' was not kept for reassembly",
                page.id()
            )));
        };
        if page.id() != self.id {
            return Err(FintsError::Continuation(format!(
                "expected a page of '{}', got '{}'",
                self.id,
                page.id()
            )));
        }
        concat_pages(&mut self.raw, raw)?;
        self.pages += 1;
        Ok(())
    }

    /// Decode the accumulated text as one ordinary segment.
    pub fn finish(self, registry: &Registry) -> Result<Segment> {
        tracing::debug!(segment = %self.id, pages = self.pages, "reassembled parted segment");
        Segment::decode(&self.raw, registry)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::protocol::schema::{Element, SegmentSchema};

    fn registry() -> Registry {
        Registry::protocol()
            .unwrap()
            .extend([SegmentSchema::new(
                "HIXYZ",
                1,
                vec![Element::alpha("entries", 20).occurs(1, 99)],
            )])
            .unwrap()
    }

    fn page(text: &str) -> Segment {
        let reg = registry();
        let msg = Message::decode(text.as_bytes(), &reg, Some("HIXYZ")).unwrap();
        let idx = msg.position_parted("HIXYZ").unwrap();
        msg.segments[idx].clone()
    }

    #[test]
    fn three_pages_decode_like_one_segment() {
        let reg = registry();
        let mut asm = PageAssembler::new(&page("HIRMS:3:2:3+3040::Weitere Daten.:T1'HIXYZ:4:1:3+alpha+be'")).unwrap();
        asm.push(&page("HIXYZ:4:1:3+ta+gam'")).unwrap();
        asm.push(&page("HIXYZ:4:1:3+ma+delta'")).unwrap();
        assert_eq!(asm.pages(), 3);

        let joined = asm.finish(&reg).unwrap();
        let whole = Segment::decode(b"HIXYZ:4:1:3+alpha+beta+gamma+delta'", &reg).unwrap();
        assert_eq!(joined, whole);
        assert_eq!(joined.fields().unwrap().list("entries").len(), 4);
    }

    #[test]
    fn rejects_pages_of_another_segment() {
        let mut asm = PageAssembler::new(&page("HIXYZ:4:1:3+a")).unwrap();
        let other = Segment::parted(b"HIABC:4:1:3+b").unwrap();
        let err = asm.push(&other).unwrap_err();
        assert_eq!(err.class().as_str(), "CONTINUATION");
    }

    #[test]
    fn page_without_payload_is_an_error() {
        let mut acc = b"HIXYZ:4:1+a".to_vec();
        assert!(concat_pages(&mut acc, b"HIXYZ:4:1").is_err());
        concat_pages(&mut acc, b"HIXYZ:4:1+?+b").unwrap();
        assert_eq!(acc, b"HIXYZ:4:1+a?+b".to_vec());
    }

    #[test]
    fn token_comes_from_answer_3040() {
        let reg = registry();
        let msg = Message::decode(b"HIRMS:3:2+0020::OK.+3040::Weitere Daten.:ABC'", &reg, None).unwrap();
        assert_eq!(continuation_token(&msg).as_deref(), Some("ABC"));
        let msg = Message::decode(b"HIRMS:3:2+3040::Weitere Daten.'", &reg, None).unwrap();
        assert_eq!(continuation_token(&msg), None);
    }
}
