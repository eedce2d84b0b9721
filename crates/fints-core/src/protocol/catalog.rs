//! Framing, security and return-code segments every dialog needs.

use crate::error::Result;
use crate::protocol::element::Primitive;
use crate::protocol::schema::{Element, Registry, SegmentSchema};

pub const HNHBK: &str = "HNHBK";
pub const HNHBS: &str = "HNHBS";
pub const HNSHK: &str = "HNSHK";
pub const HNSHA: &str = "HNSHA";
pub const HNVSK: &str = "HNVSK";
pub const HNVSD: &str = "HNVSD";
pub const HIRMG: &str = "HIRMG";
pub const HIRMS: &str = "HIRMS";

/// Fixed segment numbers of the encryption envelope.
pub const HNVSK_NUMBER: u32 = 998;
pub const HNVSD_NUMBER: u32 = 999;

/// `country:bankId`.
pub fn bank_identification(name: &'static str) -> Element {
    Element::group(
        name,
        vec![
            Element::digits("country", 3).mandatory(),
            Element::alpha("bankId", 30).mandatory(),
        ],
    )
}

fn security_profile() -> Element {
    Element::group(
        "secProfile",
        vec![
            Element::alpha("secMethod", 3).mandatory(),
            Element::numeric("secVersion", 3).mandatory(),
        ],
    )
    .mandatory()
}

fn security_date_time() -> Element {
    Element::group(
        "dateTime",
        vec![
            Element::numeric("type", 3).mandatory(),
            Element::date("date"),
            Element::time("time"),
        ],
    )
    .mandatory()
}

fn key_name() -> Element {
    Element::group(
        "key",
        vec![
            bank_identification("bank").mandatory(),
            Element::ident("userId").mandatory(),
            Element::alpha("keyType", 1).mandatory(),
            Element::numeric("keyNr", 3).mandatory(),
            Element::numeric("keyVersion", 3).mandatory(),
        ],
    )
    .mandatory()
}

fn security_identification() -> Element {
    Element::group(
        "secId",
        vec![
            Element::numeric("partyType", 3).mandatory(),
            Element::binary("cid", Some(256)),
            Element::ident("partyId"),
        ],
    )
    .mandatory()
}

fn answers() -> Element {
    Element::group(
        "answers",
        vec![
            Element::digits("code", 4).mandatory(),
            Element::alpha("refElement", 7),
            Element::alpha("text", 80).mandatory(),
            Element::alpha("params", 35).occurs(0, 10),
        ],
    )
    .occurs(1, 99)
}

pub fn hnhbk() -> SegmentSchema {
    SegmentSchema::new(
        HNHBK,
        3,
        vec![
            Element::digits("messageLength", 12).mandatory(),
            Element::numeric("hbciVersion", 3).mandatory(),
            Element::ident("dialogId").mandatory(),
            Element::numeric("msgNr", 4).mandatory(),
            Element::group(
                "refMsg",
                vec![
                    Element::ident("dialogId").mandatory(),
                    Element::numeric("msgNr", 4).mandatory(),
                ],
            ),
        ],
    )
}

pub fn hnhbs() -> SegmentSchema {
    SegmentSchema::new(HNHBS, 1, vec![Element::numeric("msgNr", 4).mandatory()])
}

pub fn hnshk() -> SegmentSchema {
    SegmentSchema::new(
        HNSHK,
        4,
        vec![
            security_profile(),
            Element::numeric("secFunc", 3).mandatory(),
            Element::alpha("secControlRef", 14).mandatory(),
            Element::numeric("secArea", 3).mandatory(),
            Element::numeric("secRole", 3).mandatory(),
            security_identification(),
            Element::numeric("secRefNum", 16).mandatory(),
            security_date_time(),
            Element::group(
                "hash",
                vec![
                    Element::numeric("use", 3).mandatory(),
                    Element::numeric("algorithm", 3).mandatory(),
                    Element::numeric("paramName", 3).mandatory(),
                    Element::binary("paramValue", Some(512)),
                ],
            )
            .mandatory(),
            Element::group(
                "signature",
                vec![
                    Element::numeric("use", 3).mandatory(),
                    Element::numeric("algorithm", 3).mandatory(),
                    Element::numeric("mode", 3).mandatory(),
                ],
            )
            .mandatory(),
            key_name(),
            Element::group(
                "cert",
                vec![
                    Element::numeric("type", 3).mandatory(),
                    Element::text("content", 4096).mandatory(),
                ],
            ),
        ],
    )
}

pub fn hnsha() -> SegmentSchema {
    SegmentSchema::new(
        HNSHA,
        2,
        vec![
            Element::alpha("secControlRef", 14).mandatory(),
            Element::binary("valResult", Some(512)),
            Element::group(
                "customSignature",
                vec![
                    Element::primitive("pin", Primitive::AlphaNumeric { max_len: None }).mandatory(),
                    Element::primitive("tan", Primitive::AlphaNumeric { max_len: None }),
                ],
            ),
        ],
    )
}

pub fn hnvsk() -> SegmentSchema {
    SegmentSchema::new(
        HNVSK,
        3,
        vec![
            security_profile(),
            Element::numeric("secFunc", 3).mandatory(),
            Element::numeric("secRole", 3).mandatory(),
            security_identification(),
            security_date_time(),
            Element::group(
                "encryption",
                vec![
                    Element::numeric("use", 3).mandatory(),
                    Element::numeric("mode", 3).mandatory(),
                    Element::numeric("algorithm", 3).mandatory(),
                    Element::binary("keyParamValue", Some(512)).mandatory(),
                    Element::numeric("keyParamName", 3).mandatory(),
                    Element::numeric("initParamName", 3).mandatory(),
                    Element::binary("initParamValue", Some(512)),
                ],
            )
            .mandatory(),
            key_name(),
            Element::numeric("compressMethod", 3).mandatory(),
            Element::group(
                "certificate",
                vec![
                    Element::numeric("type", 3).mandatory(),
                    Element::binary("content", Some(4096)).mandatory(),
                ],
            ),
        ],
    )
}

pub fn hnvsd() -> SegmentSchema {
    SegmentSchema::new(HNVSD, 1, vec![Element::binary("encryptedData", None).mandatory()])
}

pub fn hirmg() -> SegmentSchema {
    SegmentSchema::new(HIRMG, 2, vec![answers()])
}

pub fn hirms() -> SegmentSchema {
    SegmentSchema::new(HIRMS, 2, vec![answers()])
}

pub fn protocol_segments() -> Vec<SegmentSchema> {
    vec![hnhbk(), hnhbs(), hnshk(), hnsha(), hnvsk(), hnvsd(), hirmg(), hirms()]
}

impl Registry {
    /// Registry holding only the framing and return-code segments.
    pub fn protocol() -> Result<Self> {
        Registry::new(protocol_segments())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::protocol::element::Value;
    use crate::protocol::segment::Segment;
    use crate::protocol::syntax::from_latin1;

    fn round_trip(wire: &str) -> Segment {
        let reg = Registry::protocol().unwrap();
        let seg = Segment::decode(wire.as_bytes(), &reg).unwrap();
        assert!(!seg.is_unknown(), "{wire} decoded as unknown");
        assert_eq!(from_latin1(&seg.encode(&reg).unwrap()), wire);
        seg
    }

    #[test]
    fn hnshk_round_trip() {
        let seg = round_trip("HNSHK:2:4+PIN:1+999+6506545+1+1+1::0+1+1:20240121:120140+1:999:1+6:10:16+280:12030000:1234567890_p:S:0:0'");
        let f = seg.fields().unwrap();
        assert_eq!(f.group("secProfile").unwrap().text("secMethod"), Some("PIN"));
        assert_eq!(f.text("secControlRef"), Some("6506545"));
        let key = f.group("key").unwrap();
        assert_eq!(key.group("bank").unwrap().text("bankId"), Some("12030000"));
        assert_eq!(key.text("userId"), Some("1234567890_p"));
    }

    #[test]
    fn hnvsk_round_trip() {
        let seg = round_trip("HNVSK:998:3+PIN:1+998+1+1::0+1:20240121:120140+2:2:13:@8@00000000:5:1+280:12030000:1234567890_p:S:0:0+0'");
        let enc = seg.fields().unwrap().group("encryption").unwrap();
        assert_eq!(enc.bytes("keyParamValue").unwrap().as_ref(), b"00000000");
        assert_eq!(enc.number("keyParamName"), Some(5));
    }

    #[test]
    fn hirmg_answers_with_params() {
        let reg = Registry::protocol().unwrap();
        let seg = Segment::decode(
            "HIRMG:3:2+0010::Nachricht entgegengenommen.+3920::Zugelassene Zwei-Schritt-Verfahren für den Benutzer.:921:922'"
                .chars()
                .map(|c| c as u8)
                .collect::<Vec<_>>()
                .as_slice(),
            &reg,
        )
        .unwrap();
        let answers = seg.fields().unwrap().list("answers");
        assert_eq!(answers.len(), 2);
        let second = answers[1].as_group().unwrap();
        assert_eq!(second.number("code"), Some(3920));
        assert_eq!(second.list("params"), &[Value::from("921"), Value::from("922")]);
    }

    #[test]
    fn hirmg_round_trip_and_render() {
        let seg = round_trip("HIRMG:3:2+0010::Nachricht entgegengenommen.+0100::Dialog beendet.'");
        let reg = Registry::protocol().unwrap();
        assert_eq!(
            seg.render(&reg),
            "   3. HIRMG v2; [code: 10, text: Nachricht entgegengenommen.]; [code: 100, text: Dialog beendet.]"
        );
    }
}
