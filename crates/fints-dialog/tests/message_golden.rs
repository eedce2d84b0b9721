#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chrono::NaiveDate;

use fints_core::protocol::customer::CustomerMessage;
use fints_core::protocol::message::Message;
use fints_core::protocol::syntax::from_latin1;
use fints_dialog::catalog;
use fints_dialog::config;
use fints_dialog::interaction::{InitDialog, Interaction};
use fints_dialog::Session;

const UNSIGNED_INIT: &str = "HNHBK:1:3+000000000108+300+0+1'HKIDN:2:2+280:12030000+9999999999+0+0'HKVVB:3:3+0+0+0+ABCDEF+1.0'HNHBS:4:1+1'";

const SIGNED_INIT: &str = "HNHBK:1:3+000000000412+300+0+1'HNVSK:998:3+PIN:1+998+1+1+1:20240601:102151+2:2:13:@8@00000000:5:1+280:123456:user1:S:0:0+0'HNVSD:999:1+@259@HNSHK:2:4+PIN:2+944+1+1+1+1::rWkyTQV5yI8BAABFH0nthrBCCgQA+1+1:20240601:102151+1:3:1+6:10:16+280:30520037:user1:S:0:0'HKIDN:3:2+280:123456+user1+rWkyTQV5yI8BAABFH0nthrBCCgQA+1'HKVVB:4:3+43+9+0+9FA6681DEC0CF3046BFC2F8A6+0.1'HKTAN:5:6+4+HKIDN'HNSHA:6:2+1++12345''HNHBS:7:1+1'";

#[test]
fn anonymous_init_message_is_byte_exact() {
    let cfg = config::load_from_str("product_id: ABCDEF\nbank:\n  bank_id: \"12030000\"\n").unwrap();
    let session = Session::new(cfg);
    let registry = catalog::registry().unwrap();

    let mut message = CustomerMessage::new("0", 1);
    for segment in InitDialog::new(false).segments(&session, "0").unwrap() {
        message.push(segment);
    }
    let now = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(10, 21, 51)
        .unwrap();
    let wire = message.encode(&registry, now, true).unwrap();

    assert_eq!(from_latin1(&wire), UNSIGNED_INIT);
}

#[test]
fn known_segments_decode() {
    let registry = catalog::registry().unwrap();
    let message = Message::decode(UNSIGNED_INIT.as_bytes(), &registry, None).unwrap();
    assert_eq!(message.segments.len(), 4);
    assert!(message.segments.iter().all(|s| !s.is_unknown()));
}

#[test]
fn unknown_segment_is_kept_in_place() {
    let registry = catalog::registry().unwrap();
    let text = UNSIGNED_INIT.replace("HNHBS:4:1+1'", "HIXXX:4:1+13'HNHBS:5:1+1'");
    let message = Message::decode(text.as_bytes(), &registry, None).unwrap();
    assert_eq!(message.segments.len(), 5);
    assert!(message.segments[3].is_unknown());
    assert_eq!(message.segments[3].id(), "HIXXX");
}

#[test]
fn signed_and_encrypted_init_decodes() {
    let registry = catalog::registry().unwrap();
    let message = Message::decode(SIGNED_INIT.as_bytes(), &registry, None).unwrap();

    let ids: Vec<&str> = message.segments.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["HNHBK", "HNSHK", "HKIDN", "HKVVB", "HKTAN", "HNSHA", "HNHBS"]);

    let hkidn = message.find("HKIDN").and_then(|s| s.fields()).unwrap();
    assert_eq!(hkidn.text("customerId"), Some("user1"));
    assert_eq!(hkidn.group("bank").unwrap().text("bankId"), Some("123456"));

    let hnsha = message.find("HNSHA").and_then(|s| s.fields()).unwrap();
    assert_eq!(hnsha.group("customSignature").unwrap().text("pin"), Some("12345"));
}
