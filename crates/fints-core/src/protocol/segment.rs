//! Segment header and segment codec.

use std::fmt;

use bytes::Bytes;

use crate::error::{FintsError, Result};
use crate::protocol::element::Fields;
use crate::protocol::group::{self, SEGMENT_DEPTH};
use crate::protocol::schema::Registry;
use crate::protocol::syntax::{self, ELEMENT_SEPARATOR, GROUP_SEPARATOR, SEGMENT_TERMINATOR};

/// `ID:number:version[:reference]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    pub id: String,
    /// Position in the message; assigned when the message is encoded.
    pub number: u32,
    pub version: u16,
    /// Number of the request segment this one answers.
    pub reference: Option<u32>,
}

impl SegmentHeader {
    pub fn new(id: impl Into<String>, version: u16) -> Self {
        Self {
            id: id.into(),
            number: 0,
            version,
            reference: None,
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        let text = syntax::from_latin1(raw);
        let mut parts = text.split(char::from(GROUP_SEPARATOR));
        let malformed = || FintsError::Malformed(format!("invalid segment header '{text}'"));

        let id = parts.next().filter(|id| !id.is_empty()).ok_or_else(malformed)?;
        let number = parse_part(parts.next()).ok_or_else(malformed)?;
        let version = parse_part(parts.next()).ok_or_else(malformed)?;
        let reference = match parts.next() {
            None | Some("") => None,
            Some(r) => Some(r.parse().map_err(|_| malformed())?),
        };

        Ok(Self {
            id: id.to_string(),
            number,
            version,
            reference,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut text = format!("{}:{}:{}", self.id, self.number, self.version);
        if let Some(r) = self.reference {
            text.push_str(&format!(":{r}"));
        }
        text.into_bytes()
    }
}

fn parse_part<T: std::str::FromStr>(part: Option<&str>) -> Option<T> {
    part.and_then(|p| p.parse().ok())
}

/// Payload of a segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Decoded against the registered schema.
    Decoded(Fields),
    /// No usable schema; the raw payload after the header.
    Unknown(Bytes),
    /// Kept whole (header included) until all continuation pages are in.
    Parted(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub header: SegmentHeader,
    pub body: Body,
}

impl Segment {
    /// A request segment with a decoded body.
    pub fn new(id: impl Into<String>, version: u16, fields: Fields) -> Self {
        Self {
            header: SegmentHeader::new(id, version),
            body: Body::Decoded(fields),
        }
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn fields(&self) -> Option<&Fields> {
        match &self.body {
            Body::Decoded(f) => Some(f),
            _ => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut Fields> {
        match &mut self.body {
            Body::Decoded(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.body, Body::Unknown(_))
    }

    /// Decode one segment (terminator optional).
    ///
    /// An unregistered id, or a version newer than the schema, yields
    /// [`Body::Unknown`] instead of an error.
    pub fn decode(raw: &[u8], registry: &Registry) -> Result<Self> {
        let raw = strip_terminator(raw)?;
        let (head, payload) = split_header(raw)?;
        let header = SegmentHeader::decode(head)?;

        let schema = match registry.lookup(&header.id) {
            Some(s) if header.version <= s.version => s,
            _ => {
                tracing::trace!(segment = %header.id, version = header.version, "unknown segment");
                return Ok(Self {
                    header,
                    body: Body::Unknown(Bytes::copy_from_slice(payload)),
                });
            }
        };

        let fields = group::decode_elements(
            payload,
            &schema.elements,
            SEGMENT_DEPTH,
            header.version,
            &header.id,
        )?;
        Ok(Self {
            header,
            body: Body::Decoded(fields),
        })
    }

    /// Keep a segment as raw text for later reassembly.
    pub fn parted(raw: &[u8]) -> Result<Self> {
        let raw = strip_terminator(raw)?;
        let (head, _) = split_header(raw)?;
        Ok(Self {
            header: SegmentHeader::decode(head)?,
            body: Body::Parted(Bytes::copy_from_slice(raw)),
        })
    }

    /// Render header, payload and terminator. Outgoing segments must be registered.
    pub fn encode(&self, registry: &Registry) -> Result<Vec<u8>> {
        let id = &self.header.id;
        let schema = registry
            .lookup(id)
            .filter(|s| self.header.version <= s.version)
            .ok_or_else(|| FintsError::UnregisteredSegment(format!("{id} v{}", self.header.version)))?;
        let fields = self.fields().ok_or_else(|| {
            FintsError::Schema(format!("segment '{id}' has no decoded body to encode"))
        })?;

        let mut out = self.header.encode();
        out.push(ELEMENT_SEPARATOR);
        out.extend(group::encode_elements(
            Some(fields),
            &schema.elements,
            SEGMENT_DEPTH,
            self.header.version,
        )?);
        out.push(SEGMENT_TERMINATOR);
        Ok(out)
    }

    /// One diagnostic line: number, id, version, non-empty values.
    pub fn render(&self, registry: &Registry) -> String {
        let mut text = format!("{:>4}. {} v{}", self.header.number, self.header.id, self.header.version);
        if let Some(r) = self.header.reference {
            text.push_str(&format!(" RefSeg: {r}"));
        }

        let (Some(fields), Some(schema)) = (self.fields(), registry.lookup(self.id())) else {
            text.push_str(" (unknown segment)");
            return text;
        };

        let texts: Vec<String> = schema
            .elements_for(self.header.version)
            .map(|e| group::render_all(e, fields.get(e.name), self.header.version))
            .filter(|t| !t.is_empty())
            .collect();
        text.push_str("; ");
        text.push_str(&texts.join("; "));
        text
    }
}

impl fmt::Display for SegmentHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.id, self.number, self.version)
    }
}

/// Drop a trailing terminator, but only one that sits outside escapes and
/// binary frames. A chunk from [`syntax::split`] may end in a `'` that
/// belongs to a frame payload.
fn strip_terminator(raw: &[u8]) -> Result<&[u8]> {
    match syntax::find_unescaped(raw, SEGMENT_TERMINATOR)? {
        Some(at) if at + 1 == raw.len() => Ok(&raw[..at]),
        _ => Ok(raw),
    }
}

fn split_header(raw: &[u8]) -> Result<(&[u8], &[u8])> {
    match syntax::find_unescaped(raw, ELEMENT_SEPARATOR)? {
        Some(at) => Ok((&raw[..at], &raw[at + 1..])),
        None => Ok((raw, &[])),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::protocol::element::Value;
    use crate::protocol::schema::{Element, SegmentSchema};

    fn registry() -> Registry {
        Registry::new([SegmentSchema::new(
            "HKXYZ",
            2,
            vec![
                Element::numeric("count", 3).mandatory(),
                Element::alpha("note", 20),
                Element::alpha("extra", 5).since(2),
            ],
        )])
        .unwrap()
    }

    #[test]
    fn header_with_reference() {
        let h = SegmentHeader::decode(b"HIBPA:4:3:3").unwrap();
        assert_eq!(h.id, "HIBPA");
        assert_eq!((h.number, h.version, h.reference), (4, 3, Some(3)));
        assert_eq!(h.encode(), b"HIBPA:4:3:3".to_vec());
        assert!(SegmentHeader::decode(b"HIBPA:x:3").is_err());
        assert!(SegmentHeader::decode(b":1:3").is_err());
    }

    #[test]
    fn unregistered_and_newer_versions_fall_back_to_unknown() {
        let reg = registry();
        let s = Segment::decode(b"HIXXX:4:1+13'", &reg).unwrap();
        assert_eq!(s.body, Body::Unknown(Bytes::from_static(b"13")));
        assert_eq!(s.id(), "HIXXX");

        let s = Segment::decode(b"HKXYZ:2:3+1+a+b'", &reg).unwrap();
        assert!(s.is_unknown());
    }

    #[test]
    fn older_versions_decode_with_their_own_elements() {
        let reg = registry();
        let s = Segment::decode(b"HKXYZ:2:1+5+hi", &reg).unwrap();
        let f = s.fields().unwrap();
        assert_eq!(f.number("count"), Some(5));
        assert_eq!(f.text("note"), Some("hi"));
        assert!(f.get("extra").is_none());
    }

    #[test]
    fn encode_requires_registration() {
        let reg = registry();
        let s = Segment::new("HKNOP", 1, Fields::new());
        assert!(matches!(s.encode(&reg), Err(FintsError::UnregisteredSegment(_))));

        let mut s = Segment::new("HKXYZ", 2, Fields::new().with("count", 7u64).with("extra", "x+y"));
        s.header.number = 3;
        assert_eq!(s.encode(&reg).unwrap(), b"HKXYZ:3:2+7++x?+y'".to_vec());
    }

    #[test]
    fn segment_without_payload() {
        let reg = registry();
        let err = Segment::decode(b"HKXYZ:1:2'", &reg).unwrap_err();
        assert_eq!(err.class().as_str(), "DECODING");
        let s = Segment::decode(b"HIXXX:1:1", &reg).unwrap();
        assert_eq!(s.body, Body::Unknown(Bytes::new()));
    }

    #[test]
    fn frame_ending_in_a_terminator_keeps_its_last_byte() {
        let reg = Registry::new([SegmentSchema::new(
            "HNVSD",
            1,
            vec![Element::binary("data", None).mandatory()],
        )])
        .unwrap();
        let s = Segment::decode(b"HNVSD:999:1+@6@HKX+1'", &reg).unwrap();
        assert_eq!(s.fields().unwrap().bytes("data").unwrap().as_ref(), b"HKX+1'");

        let s = Segment::decode(b"HNVSD:999:1+@6@HKX+1''", &reg).unwrap();
        assert_eq!(s.fields().unwrap().bytes("data").unwrap().as_ref(), b"HKX+1'");

        let p = Segment::parted(b"HNVSD:999:1+@6@HKX+1'").unwrap();
        assert_eq!(p.body, Body::Parted(Bytes::from_static(b"HNVSD:999:1+@6@HKX+1'")));
    }

    #[test]
    fn render_lists_non_empty_values() {
        let reg = registry();
        let mut s = Segment::new("HKXYZ", 2, Fields::new().with("count", 7u64));
        s.header.number = 3;
        assert_eq!(s.render(&reg), "   3. HKXYZ v2; count: 7");
        s.fields_mut().unwrap().set("note", Value::from("n"));
        assert_eq!(s.render(&reg), "   3. HKXYZ v2; count: 7; note: n");
    }
}
