//! Dialog config loader (strict parsing).

pub mod schema;

use std::fs;

use fints_core::error::{FintsError, Result};

pub use schema::{BankSection, DialogConfig, TanSection, UserSection};

pub fn load_from_file(path: &str) -> Result<DialogConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| FintsError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<DialogConfig> {
    let cfg: DialogConfig = serde_yaml::from_str(s)
        .map_err(|e| FintsError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
