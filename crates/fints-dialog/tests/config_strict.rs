#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use fints_dialog::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
product_id: "TestProduct"
bank:
  bank_id: "12030000"
user:
  user_id: "user1"
  pn: "12345" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.class().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
product_id: "TestProduct"
bank:
  bank_id: "12030000"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.bank.country_code, 280);
    assert_eq!(cfg.product_version, "1.0");
    assert_eq!(cfg.hbci_version, 300);
    assert!(cfg.wrap_envelope);
    assert!(!cfg.sync_system_id);
    assert!(cfg.user.is_none());
    assert!(cfg.credentials("0").is_none());
}

#[test]
fn customer_id_defaults_to_user_id() {
    let ok = r#"
product_id: "TestProduct"
bank:
  bank_id: "12030000"
user:
  user_id: "user1"
  pin: "12345"
tan:
  method_id: 921
  media_name: "Handy"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    let user = cfg.user.as_ref().unwrap();
    assert_eq!(user.customer_id(), "user1");
    let credentials = cfg.credentials("SYS1").unwrap();
    assert_eq!(credentials.pin, "12345");
    assert_eq!(credentials.system_id, "SYS1");
    assert_eq!(cfg.tan.method_id, Some(921));
}

#[test]
fn validation_rejects_bad_values() {
    let cases = [
        "product_id: \"\"\nbank:\n  bank_id: \"12030000\"\n",
        "product_id: \"ThisProductIdIsFarTooLongToBeRegistered\"\nbank:\n  bank_id: \"12030000\"\n",
        "product_id: P\nbank:\n  bank_id: \"\"\n",
        "product_id: P\nhbci_version: 220\nbank:\n  bank_id: \"12030000\"\n",
        "product_id: P\nbank:\n  bank_id: \"12030000\"\nuser:\n  user_id: \"\"\n",
        "product_id: P\nbank:\n  bank_id: \"12030000\"\ntan:\n  method_id: 1000\n",
    ];
    for yaml in cases {
        let err = config::load_from_str(yaml).expect_err(yaml);
        assert_eq!(err.class().as_str(), "CONFIG", "{yaml}");
    }
}
