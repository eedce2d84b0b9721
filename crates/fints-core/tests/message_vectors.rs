//! Message framing vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use fints_core::protocol::message::Message;
use fints_core::Registry;

mod vector_loader;
use vector_loader::TestVector;

fn load(name: &str) -> TestVector {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

#[test]
fn message_vectors() {
    let files = [
        "answers_latin1.json",
        "envelope.json",
        "unknown_segment.json",
        "binary_overrun.json",
        "bad_header.json",
        "missing_mandatory.json",
    ];
    let registry = Registry::protocol().unwrap();

    for f in files {
        let v = load(f);
        let raw = v.frame.decode();
        let res = Message::decode(&raw, &registry, None);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.class().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let msg = res.expect("expected decoded message");
        let ex = v.expect.expect("missing expect block");

        let ids: Vec<&str> = msg.segments.iter().map(|s| s.id()).collect();
        let expected_ids: Vec<&str> = ex["ids"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i.as_str().unwrap())
            .collect();
        assert_eq!(ids, expected_ids, "vector={}", v.description);

        assert_eq!(
            msg.highest_return_code() as u64,
            ex["highest_code"].as_u64().unwrap(),
            "vector={}",
            v.description
        );

        let length = msg
            .find("HNHBK")
            .and_then(|s| s.fields())
            .and_then(|f| f.number("messageLength"))
            .unwrap();
        assert_eq!(length, ex["length"].as_u64().unwrap(), "vector={}", v.description);
        assert_eq!(raw.len() as u64, length, "vector={}", v.description);

        let texts: Vec<String> = msg.answers().into_iter().map(|a| a.text).collect();
        let expected_texts: Vec<String> = ex["texts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t.as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, expected_texts, "vector={}", v.description);
    }
}

#[test]
fn envelope_answer_keeps_escaped_parameter() {
    let registry = Registry::protocol().unwrap();
    let raw = load("envelope.json").frame.decode();
    let msg = Message::decode(&raw, &registry, None).unwrap();
    let answer = msg.answer(3040).unwrap();
    assert_eq!(answer.params, vec!["ab:c".to_string()]);
    assert_eq!(answer.reference, None);
}

#[test]
fn unknown_segment_renders_only_on_request() {
    let registry = Registry::protocol().unwrap();
    let raw = load("unknown_segment.json").frame.decode();
    let msg = Message::decode(&raw, &registry, None).unwrap();
    assert_eq!(msg.find_unknown("HIXYZ").count(), 1);
    assert!(!msg.display(&registry).to_string().contains("HIXYZ"));
    assert!(msg
        .render(&registry, true)
        .contains("   3. HIXYZ v9 (unknown segment)"));
}
