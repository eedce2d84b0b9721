//! Segments the dialog itself sends and evaluates.
//!
//! Business segments (statements, transfers, ...) are not part of this
//! catalog; callers extend the registry with their own schemas.

use fints_core::error::Result;
use fints_core::protocol::catalog::bank_identification;
use fints_core::protocol::element::Primitive;
use fints_core::protocol::schema::{Element, Registry, SegmentSchema};

pub const HKIDN: &str = "HKIDN";
pub const HKVVB: &str = "HKVVB";
pub const HKSYN: &str = "HKSYN";
pub const HISYN: &str = "HISYN";
pub const HKEND: &str = "HKEND";
pub const HKTAN: &str = "HKTAN";
pub const HITAN: &str = "HITAN";
pub const HIBPA: &str = "HIBPA";
pub const HITANS: &str = "HITANS";
pub const HIPINS: &str = "HIPINS";
pub const HIUPA: &str = "HIUPA";
pub const HIUPD: &str = "HIUPD";
pub const HIKIM: &str = "HIKIM";

/// Name of the request field that carries a continuation token.
pub const CONTINUATION_MARK: &str = "continuationMark";

fn international_account(name: &'static str) -> Element {
    Element::group(
        name,
        vec![
            Element::alpha("iban", 34),
            Element::alpha("bic", 11),
            Element::ident("accountNumber"),
            Element::ident("subAccountId"),
            bank_identification("bank"),
        ],
    )
}

fn account(name: &'static str) -> Element {
    Element::group(
        name,
        vec![
            Element::ident("accountNumber").mandatory(),
            Element::ident("subAccountId"),
            bank_identification("bank").mandatory(),
        ],
    )
}

fn money(name: &'static str) -> Element {
    Element::group(
        name,
        vec![
            Element::primitive("value", Primitive::AMOUNT).mandatory(),
            Element::primitive("currency", Primitive::CURRENCY).mandatory(),
        ],
    )
}

/// Common frame of `HI..S` parameter segments.
fn parameter_segment(id: &'static str, version: u16, params: Vec<Element>) -> SegmentSchema {
    SegmentSchema::new(
        id,
        version,
        vec![
            Element::numeric("maxTrans", 3).mandatory(),
            Element::numeric("minSigs", 1).mandatory(),
            Element::numeric("secClass", 1).mandatory(),
            Element::group("params", params).mandatory(),
        ],
    )
}

pub fn hkidn() -> SegmentSchema {
    SegmentSchema::new(
        HKIDN,
        2,
        vec![
            bank_identification("bank").mandatory(),
            Element::ident("customerId").mandatory(),
            Element::ident("systemId").mandatory(),
            Element::numeric("systemIdRequired", 1).mandatory(),
        ],
    )
}

pub fn hkvvb() -> SegmentSchema {
    SegmentSchema::new(
        HKVVB,
        3,
        vec![
            Element::numeric("bpdVersion", 3).mandatory(),
            Element::numeric("updVersion", 3).mandatory(),
            Element::numeric("dialogLanguage", 3).mandatory(),
            Element::alpha("productId", 25).mandatory(),
            Element::alpha("productVersion", 5).mandatory(),
        ],
    )
}

pub fn hksyn() -> SegmentSchema {
    SegmentSchema::new(HKSYN, 3, vec![Element::numeric("mode", 1).mandatory()])
}

pub fn hisyn() -> SegmentSchema {
    SegmentSchema::new(
        HISYN,
        4,
        vec![
            Element::ident("systemId"),
            Element::numeric("msgNr", 4),
            Element::numeric("secRefNrKey", 16),
            Element::numeric("secRefNrSignature", 16),
        ],
    )
}

pub fn hkend() -> SegmentSchema {
    SegmentSchema::new(HKEND, 1, vec![Element::ident("dialogId").mandatory()])
}

pub fn hktan() -> SegmentSchema {
    SegmentSchema::new(
        HKTAN,
        7,
        vec![
            Element::alpha("tanProcess", 1).mandatory(),
            Element::alpha("segId", 6),
            international_account("customerAccount"),
            Element::binary("orderHash", Some(256)),
            Element::alpha("orderRef", 35),
            Element::yes_no("nextTan"),
            Element::yes_no("cancelOrder"),
            international_account("smsAccount"),
            Element::numeric("challengeClass", 2),
            Element::group("challengeClassParam", vec![Element::alpha("param", 999)]),
            Element::alpha("tanMedia", 32),
            Element::group(
                "hhducResponse",
                vec![
                    Element::alpha("atc", 5).mandatory(),
                    Element::binary("appCryptoAc", Some(256)).mandatory(),
                    Element::binary("efIdData", Some(256)).mandatory(),
                    Element::binary("cvr", Some(256)).mandatory(),
                    Element::binary("chipTanVersion", Some(256)).mandatory(),
                ],
            ),
        ],
    )
}

pub fn hitan() -> SegmentSchema {
    SegmentSchema::new(
        HITAN,
        7,
        vec![
            Element::alpha("tanProcess", 1).mandatory(),
            Element::binary("orderHash", Some(256)),
            Element::alpha("orderReference", 35),
            Element::alpha("challenge", 2048),
            Element::binary("challengeHhdUc", Some(128)),
            Element::group(
                "challengeValidUntil",
                vec![Element::date("date").mandatory(), Element::time("time").mandatory()],
            ),
            Element::alpha("tanMedia", 32),
        ],
    )
}

pub fn hibpa() -> SegmentSchema {
    SegmentSchema::new(
        HIBPA,
        3,
        vec![
            Element::numeric("bpdVersion", 3).mandatory(),
            bank_identification("bank").mandatory(),
            Element::alpha("bankName", 60).mandatory(),
            Element::numeric("maxNumTransactions", 3).mandatory(),
            Element::repeated("supportedLanguages", Element::numeric("lang", 3).occurs(1, 9)).mandatory(),
            Element::repeated(
                "supportedHbciVersions",
                Element::numeric("version", 3).occurs(1, 9),
            )
            .mandatory(),
            Element::numeric("maxMessageSizeInKb", 4),
            Element::numeric("minTimeoutSecs", 4),
            Element::numeric("maxTimeoutSecs", 4),
        ],
    )
}

fn tan_method() -> Element {
    Element::group(
        "tanMethods",
        vec![
            Element::numeric("secFunc", 3).mandatory(),
            Element::numeric("tanProcess", 1).mandatory(),
            Element::ident("methodId").mandatory(),
            Element::alpha("zkaMethod", 32).since(4),
            Element::alpha("zkaVersion", 10).since(4),
            Element::alpha("methodName", 30).mandatory(),
            Element::numeric("tanMaxLen", 2).mandatory(),
            Element::numeric("format", 1).mandatory(),
            Element::alpha("challengeText", 30).mandatory(),
            Element::numeric("maxChallengeLen", 4).mandatory(),
            Element::numeric("supportedActiveTanLists", 1).until(5),
            Element::yes_no("multipleTans").mandatory(),
            Element::yes_no("tanDelayedAllowed").mandatory().until(1),
            Element::numeric("tanDialogOptions", 1).mandatory().since(2),
            Element::numeric("tanListNrRequired", 1).mandatory().since(2).until(5),
            Element::yes_no("cancellation").mandatory().since(2),
            Element::numeric("smsAccountRequired", 1).mandatory().since(4),
            Element::numeric("customerAccountRequired", 1).mandatory().since(5),
            Element::yes_no("challengeClass").mandatory().since(2),
            Element::yes_no("challengeAmountRequired").mandatory().since(2).until(4),
            Element::yes_no("challengeStructured").mandatory().since(4),
            Element::alpha("initMode", 2).mandatory().since(3),
            Element::numeric("tanMediaRequired", 1).mandatory().since(3),
            Element::yes_no("hhdUcRequired").mandatory().since(6),
            Element::numeric("activeTanMedia", 1).since(3),
            Element::numeric("decoupledMaxStatusRequests", 3).since(7),
            Element::numeric("decoupledWaitBeforeFirstStatusRequest", 3).since(7),
            Element::numeric("decoupledWaitBetweenStatusRequests", 3).since(7),
            Element::yes_no("decoupledManualConfirmationAllowed").since(7),
            Element::yes_no("decoupledAutoConfirmationAllowed").since(7),
        ],
    )
    .occurs(1, 98)
}

pub fn hitans() -> SegmentSchema {
    parameter_segment(
        HITANS,
        7,
        vec![
            Element::yes_no("oneStepAllowed").mandatory(),
            Element::yes_no("multipleTransactions").mandatory(),
            Element::numeric("hashMethod", 1).mandatory(),
            Element::numeric("secProfile", 1).mandatory().until(1),
            tan_method(),
        ],
    )
}

pub fn hipins() -> SegmentSchema {
    parameter_segment(
        HIPINS,
        1,
        vec![
            Element::numeric("minPinLen", 2),
            Element::numeric("maxPinLen", 2),
            Element::numeric("maxTanLen", 2),
            Element::alpha("textUserId", 30),
            Element::alpha("textCustomerId", 30),
            Element::group(
                "transactions",
                vec![
                    Element::alpha("transId", 6).mandatory(),
                    Element::yes_no("tanRequired").mandatory(),
                ],
            )
            .occurs(0, 999),
        ],
    )
}

pub fn hiupa() -> SegmentSchema {
    SegmentSchema::new(
        HIUPA,
        4,
        vec![
            Element::ident("internalUserId").mandatory(),
            Element::numeric("updVersion", 3).mandatory(),
            Element::numeric("updUsage", 1).mandatory(),
            Element::alpha("userName", 35),
            Element::alpha("extension", 2048),
        ],
    )
}

pub fn hiupd() -> SegmentSchema {
    SegmentSchema::new(
        HIUPD,
        6,
        vec![
            account("account"),
            Element::alpha("iban", 34),
            Element::ident("customerId").mandatory(),
            Element::numeric("accountType", 2),
            Element::primitive("currency", Primitive::CURRENCY),
            Element::alpha("accountHolder1", 27).mandatory(),
            Element::alpha("accountHolder2", 27),
            Element::alpha("accountProduct", 30),
            Element::group(
                "accountLimit",
                vec![
                    Element::alpha("limitType", 1).mandatory(),
                    money("limitAmount"),
                    Element::numeric("limitDays", 3),
                ],
            ),
            Element::group(
                "allowedTransactions",
                vec![
                    Element::alpha("transId", 6).mandatory(),
                    Element::numeric("numSignatures", 2).mandatory(),
                    Element::alpha("limitType", 1),
                    money("limitAmount"),
                    Element::numeric("limitDays", 3),
                ],
            )
            .occurs(0, 999),
            Element::alpha("accountExtension", 2048),
        ],
    )
}

pub fn hikim() -> SegmentSchema {
    SegmentSchema::new(
        HIKIM,
        2,
        vec![
            Element::alpha("subject", 35).mandatory(),
            Element::text("text", 2048).mandatory(),
        ],
    )
}

pub fn dialog_segments() -> Vec<SegmentSchema> {
    vec![
        hkidn(),
        hkvvb(),
        hksyn(),
        hisyn(),
        hkend(),
        hktan(),
        hitan(),
        hibpa(),
        hitans(),
        hipins(),
        hiupa(),
        hiupd(),
        hikim(),
    ]
}

/// Protocol segments plus the dialog catalog.
pub fn registry() -> Result<Registry> {
    Registry::protocol()?.extend(dialog_segments())
}
