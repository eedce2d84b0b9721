//! Per-dialog session state: configuration plus what the bank told us.
//!
//! Owned exclusively by one `Dialog`; interactions read and update it in
//! turn, so no locking is involved.

use serde::{Deserialize, Serialize};

use fints_core::error::{FintsError, Result};
use fints_core::protocol::customer::Credentials;

use crate::config::DialogConfig;

/// System id of a client the bank has not synchronised yet.
pub const UNSYNCED_SYSTEM_ID: &str = "0";

/// Everything learned from the bank that is worth persisting between dialogs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankingInformation {
    pub system_id: String,
    #[serde(default)]
    pub bpd: Option<Bpd>,
    #[serde(default)]
    pub upd: Option<Upd>,
    #[serde(default)]
    pub bank_messages: Vec<BankMessage>,
}

impl Default for BankingInformation {
    fn default() -> Self {
        Self {
            system_id: UNSYNCED_SYSTEM_ID.into(),
            bpd: None,
            upd: None,
            bank_messages: Vec::new(),
        }
    }
}

/// Bank parameter data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bpd {
    pub version: u16,
    pub country_code: u16,
    pub bank_id: String,
    pub bank_name: String,
    pub max_transactions_per_message: u16,
    pub supported_languages: Vec<u16>,
    pub supported_hbci_versions: Vec<u16>,
    pub supported_tan_methods: Vec<TanMethod>,
    /// Methods the bank allows for this user (return code 3920).
    pub available_tan_method_ids: Vec<u16>,
    pub allowed_transactions: Vec<BankTransaction>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TanMediaRequirement {
    #[default]
    NotAllowed,
    Optional,
    Required,
}

impl TanMediaRequirement {
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => Self::Optional,
            2 => Self::Required,
            _ => Self::NotAllowed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TanMethod {
    pub id: u16,
    pub name: String,
    /// Version of the HITANS segment that announced the method.
    pub version: u16,
    pub is_decoupled: bool,
    pub tan_media_requirement: TanMediaRequirement,
    pub active_tan_media_count: u16,
    #[serde(default)]
    pub decoupled: Option<DecoupledParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoupledParams {
    pub max_status_requests: Option<u16>,
    pub wait_before_first_status_request: Option<u16>,
    pub wait_between_status_requests: Option<u16>,
    pub manual_confirmation_allowed: bool,
    pub auto_confirmation_allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub trans_id: String,
    pub tan_required: bool,
    /// Versions announced by the matching `HI..S` parameter segments.
    pub versions: Vec<u16>,
}

/// User parameter data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Upd {
    pub version: u16,
    pub usage: u8,
    pub accounts: Vec<BankAccount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Checking,
    Savings,
    FixedDeposit,
    Securities,
    LoanMortgage,
    CreditCard,
    InvestmentFund,
    HomeSavings,
    Insurance,
    Miscellaneous,
}

impl AccountType {
    /// Map the numeric account class of HIUPD.
    pub fn from_code(code: u64) -> Self {
        match code {
            1..=9 => Self::Checking,
            10..=19 => Self::Savings,
            20..=29 => Self::FixedDeposit,
            30..=39 => Self::Securities,
            40..=49 => Self::LoanMortgage,
            50..=59 => Self::CreditCard,
            60..=69 => Self::InvestmentFund,
            70..=79 => Self::HomeSavings,
            80..=89 => Self::Insurance,
            _ => Self::Miscellaneous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_number: Option<String>,
    pub sub_account_id: Option<String>,
    pub bank_id: Option<String>,
    pub iban: Option<String>,
    pub customer_id: String,
    pub account_type: AccountType,
    pub currency: Option<String>,
    pub holder: String,
    pub product: Option<String>,
    pub allowed_transactions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankMessage {
    pub subject: String,
    pub text: String,
}

/// Configuration, banking information and the selected TAN method of one dialog.
#[derive(Debug, Clone)]
pub struct Session {
    pub config: DialogConfig,
    pub banking: BankingInformation,
    tan_method_id: Option<u16>,
}

impl Session {
    pub fn new(config: DialogConfig) -> Self {
        Self::with_banking_information(config, BankingInformation::default())
    }

    /// Resume with banking information persisted from an earlier dialog.
    pub fn with_banking_information(config: DialogConfig, banking: BankingInformation) -> Self {
        let tan_method_id = config.tan.method_id;
        Self {
            config,
            banking,
            tan_method_id,
        }
    }

    pub fn tan_method_id(&self) -> Option<u16> {
        self.tan_method_id
    }

    /// The configured TAN method, if the BPD announce it.
    pub fn selected_tan_method(&self) -> Option<&TanMethod> {
        let id = self.tan_method_id?;
        self.banking
            .bpd
            .as_ref()?
            .supported_tan_methods
            .iter()
            .find(|m| m.id == id)
    }

    pub fn select_tan_method(&mut self, id: u16) -> Result<()> {
        if let Some(bpd) = &self.banking.bpd {
            if !bpd.supported_tan_methods.iter().any(|m| m.id == id) {
                return Err(FintsError::Session(format!(
                    "TAN method {id} is not available according to the BPD"
                )));
            }
        }
        self.tan_method_id = Some(id);
        Ok(())
    }

    /// Selected method version ≥ 6 means strong customer authentication.
    pub fn sca_supported(&self) -> bool {
        self.selected_tan_method().is_some_and(|m| m.version >= 6)
    }

    pub fn transaction(&self, id: &str) -> Option<&BankTransaction> {
        self.banking
            .bpd
            .as_ref()?
            .allowed_transactions
            .iter()
            .find(|t| t.trans_id == id)
    }

    pub fn is_transaction_supported(&self, id: &str) -> bool {
        self.transaction(id).is_some()
    }

    /// Signing identity, present when a user and PIN are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        self.config.credentials(&self.banking.system_id)
    }

    pub fn tan_media_name(&self) -> Option<&str> {
        self.config.tan.media_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::config;

    fn session() -> Session {
        let cfg = config::load_from_str(
            r#"
product_id: "TestProduct"
bank:
  bank_id: "12030000"
user:
  user_id: "testuser"
  pin: "12345"
tan:
  method_id: 940
"#,
        )
        .unwrap();
        let mut s = Session::new(cfg);
        s.banking.bpd = Some(Bpd {
            supported_tan_methods: vec![
                TanMethod {
                    id: 940,
                    name: "chipTAN".into(),
                    version: 6,
                    is_decoupled: false,
                    tan_media_requirement: TanMediaRequirement::NotAllowed,
                    active_tan_media_count: 1,
                    decoupled: None,
                },
                TanMethod {
                    id: 941,
                    name: "pushTAN".into(),
                    version: 7,
                    is_decoupled: true,
                    tan_media_requirement: TanMediaRequirement::Optional,
                    active_tan_media_count: 1,
                    decoupled: Some(DecoupledParams::default()),
                },
            ],
            allowed_transactions: vec![BankTransaction {
                trans_id: "HKSAL".into(),
                tan_required: false,
                versions: vec![7],
            }],
            ..Bpd::default()
        });
        s
    }

    #[test]
    fn selects_only_announced_methods() {
        let mut s = session();
        assert_eq!(s.selected_tan_method().unwrap().name, "chipTAN");
        assert!(s.sca_supported());
        s.select_tan_method(941).unwrap();
        assert!(s.selected_tan_method().unwrap().is_decoupled);
        let err = s.select_tan_method(999).unwrap_err();
        assert_eq!(err.class().as_str(), "SESSION");
    }

    #[test]
    fn transactions_come_from_the_bpd() {
        let s = session();
        assert!(s.is_transaction_supported("HKSAL"));
        assert!(!s.is_transaction_supported("HKCCS"));
        assert_eq!(s.transaction("HKSAL").unwrap().versions, vec![7]);
    }

    #[test]
    fn credentials_use_the_current_system_id() {
        let mut s = session();
        assert_eq!(s.credentials().unwrap().system_id, "0");
        s.banking.system_id = "SYS1".into();
        let c = s.credentials().unwrap();
        assert_eq!((c.user_id.as_str(), c.system_id.as_str()), ("testuser", "SYS1"));
    }

    #[test]
    fn banking_information_survives_json() {
        let s = session();
        let json = serde_json::to_string(&s.banking).unwrap();
        let back: BankingInformation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s.banking);
    }
}
