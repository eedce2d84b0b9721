//! Dialog initialisation: identification, BPD/UPD exchange, system id sync.

use std::collections::HashSet;

use fints_core::error::{FintsError, Result};
use fints_core::protocol::element::{Fields, Value};
use fints_core::protocol::message::Message;
use fints_core::protocol::segment::Segment;

use crate::catalog::{HIBPA, HIKIM, HIPINS, HISYN, HITANS, HIUPA, HIUPD, HKIDN, HKSYN, HKVVB};
use crate::interaction::{Interaction, InteractionResponse, Stage};
use crate::session::{
    AccountType, BankAccount, BankMessage, BankTransaction, Bpd, DecoupledParams, Session,
    TanMediaRequirement, TanMethod, Upd, UNSYNCED_SYSTEM_ID,
};

/// Customer id sent by anonymous dialogs.
pub const ANONYMOUS_CUSTOMER_ID: &str = "9999999999";
/// Answer listing the TAN methods the user may use.
const CODE_AVAILABLE_TAN_METHODS: u16 = 3920;
const DIALOG_LANGUAGE_DEFAULT: u64 = 0;
const SYNC_MODE_NEW_SYSTEM_ID: u64 = 0;

#[derive(Debug, Clone, Default)]
pub struct InitDialog {
    sync_system_id: bool,
}

impl InitDialog {
    pub fn new(sync_system_id: bool) -> Self {
        Self { sync_system_id }
    }
}

impl Interaction for InitDialog {
    fn segment_id(&self) -> &str {
        HKIDN
    }

    fn stage(&self) -> Stage {
        Stage::Init
    }

    fn segments(&self, session: &Session, _dialog_id: &str) -> Result<Vec<Segment>> {
        let config = &session.config;
        let user = config.user.as_ref();
        let customer_id = user.map_or(ANONYMOUS_CUSTOMER_ID, |u| u.customer_id());

        let mut segments = vec![
            Segment::new(
                HKIDN,
                2,
                Fields::new()
                    .with(
                        "bank",
                        Fields::new()
                            .with("country", config.bank.country_code)
                            .with("bankId", config.bank.bank_id.as_str()),
                    )
                    .with("customerId", customer_id)
                    .with("systemId", session.banking.system_id.as_str())
                    .with("systemIdRequired", u64::from(user.is_some())),
            ),
            Segment::new(
                HKVVB,
                3,
                Fields::new()
                    .with("bpdVersion", session.banking.bpd.as_ref().map_or(0, |b| b.version))
                    .with("updVersion", session.banking.upd.as_ref().map_or(0, |u| u.version))
                    .with("dialogLanguage", DIALOG_LANGUAGE_DEFAULT)
                    .with("productId", config.product_id.as_str())
                    .with("productVersion", config.product_version.as_str()),
            ),
        ];

        if self.sync_system_id && user.is_some() && session.banking.system_id == UNSYNCED_SYSTEM_ID {
            segments.push(Segment::new(
                HKSYN,
                3,
                Fields::new().with("mode", SYNC_MODE_NEW_SYSTEM_ID),
            ));
        }
        Ok(segments)
    }

    fn handle_response(
        &mut self,
        message: &Message,
        session: &mut Session,
        _response: &mut InteractionResponse,
    ) -> Result<()> {
        if let Some(system_id) = message
            .find(HISYN)
            .and_then(Segment::fields)
            .and_then(|f| f.text("systemId"))
        {
            session.banking.system_id = system_id.to_string();
        }

        if let Some(hibpa) = message.find(HIBPA).and_then(Segment::fields) {
            session.banking.bpd = Some(read_bpd(message, hibpa)?);
        }

        if let Some(answer) = message.answer(CODE_AVAILABLE_TAN_METHODS) {
            if let Some(bpd) = session.banking.bpd.as_mut() {
                bpd.available_tan_method_ids =
                    answer.params.iter().filter_map(|p| p.parse().ok()).collect();
            }
        }

        if let Some(hiupa) = message.find(HIUPA).and_then(Segment::fields) {
            session.banking.upd = Some(Upd {
                version: number(hiupa, "updVersion"),
                usage: number(hiupa, "updUsage"),
                accounts: message
                    .find_all(HIUPD)
                    .filter_map(Segment::fields)
                    .map(read_account)
                    .collect(),
            });
        }

        session.banking.bank_messages = message
            .find_all(HIKIM)
            .filter_map(Segment::fields)
            .map(|f| BankMessage {
                subject: f.text("subject").unwrap_or_default().to_string(),
                text: f.text("text").unwrap_or_default().to_string(),
            })
            .collect();

        Ok(())
    }
}

fn number<T: TryFrom<u64> + Default>(fields: &Fields, name: &str) -> T {
    fields
        .number(name)
        .and_then(|n| T::try_from(n).ok())
        .unwrap_or_default()
}

fn numbers(values: &[Value]) -> Vec<u16> {
    values
        .iter()
        .filter_map(Value::as_u64)
        .filter_map(|n| u16::try_from(n).ok())
        .collect()
}

fn read_bpd(message: &Message, hibpa: &Fields) -> Result<Bpd> {
    let bank = hibpa.group("bank");
    Ok(Bpd {
        version: number(hibpa, "bpdVersion"),
        country_code: bank.map(|b| number(b, "country")).unwrap_or_default(),
        bank_id: bank
            .and_then(|b| b.text("bankId"))
            .unwrap_or_default()
            .to_string(),
        bank_name: hibpa.text("bankName").unwrap_or_default().to_string(),
        max_transactions_per_message: number(hibpa, "maxNumTransactions"),
        supported_languages: numbers(hibpa.list("supportedLanguages")),
        supported_hbci_versions: numbers(hibpa.list("supportedHbciVersions")),
        supported_tan_methods: read_tan_methods(message),
        available_tan_method_ids: Vec::new(),
        allowed_transactions: read_transactions(message)?,
    })
}

/// Methods from all HITANS versions, newest first; an id announced by
/// several versions keeps its newest definition.
fn read_tan_methods(message: &Message) -> Vec<TanMethod> {
    let mut hitans: Vec<&Segment> = message.find_all(HITANS).collect();
    hitans.sort_by(|a, b| b.header.version.cmp(&a.header.version));

    let mut seen = HashSet::new();
    let mut methods = Vec::new();
    for segment in hitans {
        let Some(params) = segment.fields().and_then(|f| f.group("params")) else {
            continue;
        };
        for method in params.list("tanMethods").iter().filter_map(Value::as_group) {
            let id: u16 = number(method, "secFunc");
            if seen.insert(id) {
                methods.push(read_tan_method(segment.header.version, method));
            }
        }
    }
    methods
}

fn read_tan_method(version: u16, method: &Fields) -> TanMethod {
    let decoupled = [
        "decoupledMaxStatusRequests",
        "decoupledWaitBeforeFirstStatusRequest",
        "decoupledWaitBetweenStatusRequests",
        "decoupledManualConfirmationAllowed",
        "decoupledAutoConfirmationAllowed",
    ]
    .iter()
    .any(|name| method.get(name).is_some())
    .then(|| DecoupledParams {
        max_status_requests: method.number("decoupledMaxStatusRequests").and_then(|n| u16::try_from(n).ok()),
        wait_before_first_status_request: method
            .number("decoupledWaitBeforeFirstStatusRequest")
            .and_then(|n| u16::try_from(n).ok()),
        wait_between_status_requests: method
            .number("decoupledWaitBetweenStatusRequests")
            .and_then(|n| u16::try_from(n).ok()),
        manual_confirmation_allowed: method.flag("decoupledManualConfirmationAllowed").unwrap_or(false),
        auto_confirmation_allowed: method.flag("decoupledAutoConfirmationAllowed").unwrap_or(false),
    });
    let zka_decoupled = matches!(method.text("zkaMethod"), Some("Decoupled" | "DecoupledPush"));

    TanMethod {
        id: number(method, "secFunc"),
        name: method.text("methodName").unwrap_or_default().to_string(),
        version,
        is_decoupled: zka_decoupled || decoupled.is_some(),
        tan_media_requirement: TanMediaRequirement::from_code(method.number("tanMediaRequired").unwrap_or(0)),
        active_tan_media_count: number(method, "activeTanMedia"),
        decoupled,
    }
}

/// Transactions of HIPINS, with the versions announced by their `HI..S`
/// parameter segments (registered or not).
fn read_transactions(message: &Message) -> Result<Vec<BankTransaction>> {
    let params = message
        .find(HIPINS)
        .and_then(Segment::fields)
        .and_then(|f| f.group("params"))
        .ok_or_else(|| {
            FintsError::Session(
                "bank does not support PIN/TAN transactions (no HIPINS in the BPD)".into(),
            )
        })?;

    Ok(params
        .list("transactions")
        .iter()
        .filter_map(Value::as_group)
        .map(|t| {
            let trans_id = t.text("transId").unwrap_or_default().to_string();
            let mut versions = Vec::new();
            if trans_id.len() > 2 && (trans_id.starts_with("HK") || trans_id.starts_with("DK")) {
                let param_id = format!("HI{}S", &trans_id[2..]);
                versions.extend(
                    message
                        .find_all(&param_id)
                        .chain(message.find_unknown(&param_id))
                        .map(|s| s.header.version),
                );
            }
            BankTransaction {
                trans_id,
                tan_required: t.flag("tanRequired").unwrap_or(false),
                versions,
            }
        })
        .collect())
}

fn read_account(f: &Fields) -> BankAccount {
    let account = f.group("account");
    let holder = [f.text("accountHolder1"), f.text("accountHolder2")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    BankAccount {
        account_number: account.and_then(|a| a.text("accountNumber")).map(str::to_string),
        sub_account_id: account.and_then(|a| a.text("subAccountId")).map(str::to_string),
        bank_id: account
            .and_then(|a| a.group("bank"))
            .and_then(|b| b.text("bankId"))
            .map(str::to_string),
        iban: f.text("iban").map(str::to_string),
        customer_id: f.text("customerId").unwrap_or_default().to_string(),
        account_type: AccountType::from_code(f.number("accountType").unwrap_or(0)),
        currency: f.text("currency").map(str::to_string),
        holder,
        product: f.text("accountProduct").map(str::to_string),
        allowed_transactions: f
            .list("allowedTransactions")
            .iter()
            .filter_map(Value::as_group)
            .filter_map(|t| t.text("transId").map(str::to_string))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use fints_core::protocol::syntax::from_latin1;

    use super::*;
    use crate::catalog;
    use crate::config;

    const BPD_RESPONSE: &str = "HNHBK:1:3+000000000000+300+DLG1+1+DLG1:1'\
HIRMG:2:2+0010::Nachricht entgegengenommen.'\
HIRMS:3:2:3+0020::Auftrag ausgefuehrt.+3920::Zugelassene Verfahren.:920:941'\
HIBPA:4:3:3+12+280:12030000+Testbank+3+1+300'\
HITANS:5:6:4+1+1+1+J:N:0:920:2:smsTAN:::smsTAN:6:1:TAN-Nummer:3:J:2:N:0:0:N:N:00:2:N:5'\
HITANS:6:7:4+1+1+1+J:N:0:941:2:DecoupledPush:DecoupledPush:001:pushTAN 2.0:6:1:Freigabe:2048:N:1:N:0:0:N:N:00:2:N:1:180:1:1:J:J'\
HIPINS:7:1:4+1+1+0+5:38:6:USERID:CUSTID:HKSAL:J:HKTAN:N'\
HISALS:8:7:4+1+1+0+J'\
HISALS:9:9:4+1+1+0+J'\
HISYN:10:4:5+SYS4711'\
HIUPA:11:4:4+1197651234+3+0'\
HIUPD:12:6:4+1234567::280:12030000+DE02120300000001234567+1234567890+1+EUR+Mustermann+Max+Girokonto++HKSAL:1'\
HIKIM:13:2+Wartung+Am Sonntag kein Online-Banking.'\
HNHBS:14:1+1'";

    fn session(extra: &str) -> Session {
        let yaml = format!(
            "product_id: TestProduct\nbank:\n  bank_id: \"12030000\"\n{extra}"
        );
        Session::new(config::load_from_str(&yaml).unwrap())
    }

    fn encode(segments: &[Segment]) -> Vec<String> {
        let reg = catalog::registry().unwrap();
        segments
            .iter()
            .map(|s| from_latin1(&s.encode(&reg).unwrap()))
            .collect()
    }

    #[test]
    fn anonymous_init_segments() {
        let s = session("");
        let segs = InitDialog::new(true).segments(&s, "0").unwrap();
        assert_eq!(
            encode(&segs),
            vec![
                "HKIDN:0:2+280:12030000+9999999999+0+0'",
                "HKVVB:0:3+0+0+0+TestProduct+1.0'",
            ]
        );
    }

    #[test]
    fn user_init_requests_sync() {
        let s = session("user:\n  user_id: user1\n  pin: \"12345\"\n");
        let segs = InitDialog::new(true).segments(&s, "0").unwrap();
        let wire = encode(&segs);
        assert_eq!(wire[0], "HKIDN:0:2+280:12030000+user1+0+1'");
        assert_eq!(wire[2], "HKSYN:0:3+0'");

        let segs = InitDialog::new(false).segments(&s, "0").unwrap();
        assert_eq!(segs.len(), 2);
    }

    #[test]
    fn response_fills_banking_information() {
        let reg = catalog::registry().unwrap();
        let msg = Message::decode(BPD_RESPONSE.as_bytes(), &reg, None).unwrap();
        let mut s = session("");
        let mut resp = InteractionResponse::default();
        InitDialog::new(true).handle_response(&msg, &mut s, &mut resp).unwrap();

        assert_eq!(s.banking.system_id, "SYS4711");
        let bpd = s.banking.bpd.as_ref().unwrap();
        assert_eq!(bpd.version, 12);
        assert_eq!(bpd.bank_name, "Testbank");
        assert_eq!(bpd.supported_hbci_versions, vec![300]);
        assert_eq!(bpd.available_tan_method_ids, vec![920, 941]);

        let ids: Vec<u16> = bpd.supported_tan_methods.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![941, 920]);
        let push = &bpd.supported_tan_methods[0];
        assert!(push.is_decoupled);
        assert_eq!(push.version, 7);
        assert_eq!(push.decoupled.as_ref().unwrap().max_status_requests, Some(180));
        let sms = &bpd.supported_tan_methods[1];
        assert!(!sms.is_decoupled);
        assert_eq!(sms.tan_media_requirement, TanMediaRequirement::Required);

        let sal = s.transaction("HKSAL").unwrap();
        assert!(sal.tan_required);
        assert_eq!(sal.versions, vec![7, 9]);
        assert_eq!(s.transaction("HKTAN").unwrap().versions, vec![6, 7]);

        let upd = s.banking.upd.as_ref().unwrap();
        assert_eq!(upd.version, 3);
        assert_eq!(upd.accounts[0].holder, "Mustermann Max");
        assert_eq!(upd.accounts[0].account_type, AccountType::Checking);
        assert_eq!(upd.accounts[0].allowed_transactions, vec!["HKSAL".to_string()]);
        assert_eq!(s.banking.bank_messages[0].subject, "Wartung");
    }

    #[test]
    fn bpd_without_hipins_is_rejected() {
        let reg = catalog::registry().unwrap();
        let msg = Message::decode(b"HIBPA:4:3:3+12+280:12030000+Testbank+3+1+300'", &reg, None).unwrap();
        let mut s = session("");
        let err = InitDialog::new(false)
            .handle_response(&msg, &mut s, &mut InteractionResponse::default())
            .unwrap_err();
        assert!(err.to_string().contains("PIN/TAN"));
    }
}
