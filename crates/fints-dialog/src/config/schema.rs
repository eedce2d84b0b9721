use serde::{Deserialize, Serialize};

use fints_core::error::{FintsError, Result};
use fints_core::protocol::customer::{Credentials, HBCI_VERSION};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DialogConfig {
    /// Registered product id of the client software.
    pub product_id: String,

    #[serde(default = "default_product_version")]
    pub product_version: String,

    pub bank: BankSection,

    /// Absent for anonymous dialogs.
    #[serde(default)]
    pub user: Option<UserSection>,

    #[serde(default)]
    pub tan: TanSection,

    #[serde(default = "default_hbci_version")]
    pub hbci_version: u16,

    #[serde(default = "default_true")]
    pub wrap_envelope: bool,

    #[serde(default)]
    pub sync_system_id: bool,
}

impl DialogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.product_id.is_empty() || self.product_id.chars().count() > 25 {
            return Err(FintsError::Config(
                "product_id must be between 1 and 25 characters".into(),
            ));
        }
        if self.product_version.chars().count() > 5 {
            return Err(FintsError::Config(
                "product_version must be at most 5 characters".into(),
            ));
        }
        if self.hbci_version != HBCI_VERSION {
            return Err(FintsError::Config(format!(
                "hbci_version {} is not supported",
                self.hbci_version
            )));
        }

        self.bank.validate()?;
        if let Some(user) = &self.user {
            user.validate()?;
        }
        self.tan.validate()?;

        Ok(())
    }

    /// Signing identity; only dialogs with a user and a PIN sign.
    pub fn credentials(&self, system_id: &str) -> Option<Credentials> {
        let user = self.user.as_ref()?;
        let pin = user.pin.as_ref()?;
        Some(Credentials {
            country: self.bank.country_code,
            bank_id: self.bank.bank_id.clone(),
            user_id: user.user_id.clone(),
            pin: pin.clone(),
            system_id: system_id.to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BankSection {
    #[serde(default = "default_country_code")]
    pub country_code: u16,

    /// Bank code (BLZ).
    pub bank_id: String,
}

impl BankSection {
    pub fn validate(&self) -> Result<()> {
        if self.bank_id.is_empty() || self.bank_id.chars().count() > 30 {
            return Err(FintsError::Config(
                "bank.bank_id must be between 1 and 30 characters".into(),
            ));
        }
        if self.country_code > 999 {
            return Err(FintsError::Config(
                "bank.country_code must have at most 3 digits".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UserSection {
    pub user_id: String,

    /// Defaults to `user_id`.
    #[serde(default)]
    pub customer_id: Option<String>,

    #[serde(default)]
    pub pin: Option<String>,
}

impl UserSection {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.is_empty() {
            return Err(FintsError::Config(
                "user.user_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn customer_id(&self) -> &str {
        self.customer_id.as_deref().unwrap_or(&self.user_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TanSection {
    #[serde(default)]
    pub method_id: Option<u16>,

    #[serde(default)]
    pub media_name: Option<String>,
}

impl TanSection {
    pub fn validate(&self) -> Result<()> {
        if self.method_id.is_some_and(|id| id > 999) {
            return Err(FintsError::Config(
                "tan.method_id must have at most 3 digits".into(),
            ));
        }
        Ok(())
    }
}

fn default_product_version() -> String {
    "1.0".into()
}
fn default_country_code() -> u16 {
    280
}
fn default_hbci_version() -> u16 {
    HBCI_VERSION
}
fn default_true() -> bool {
    true
}
