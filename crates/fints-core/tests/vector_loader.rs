//! JSON test vector loader shared by message tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use base64::Engine as _;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TestVector {
    pub description: String,
    pub frame: FrameData,
    #[serde(default)]
    pub expect: Option<serde_json::Value>,
    #[serde(default)]
    pub expect_error: Option<ExpectError>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectError {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct FrameData {
    pub encoding: String,
    pub data: String,
}

impl FrameData {
    /// Raw wire bytes. `text` vectors hold ISO-8859-1 characters only.
    pub fn decode(&self) -> Vec<u8> {
        match self.encoding.as_str() {
            "text" => self
                .data
                .chars()
                .map(|c| u8::try_from(u32::from(c)).expect("non latin-1 char in text vector"))
                .collect(),
            "base64" => base64::engine::general_purpose::STANDARD
                .decode(&self.data)
                .expect("invalid base64 in test vector"),
            "hex" => hex::decode(&self.data).expect("invalid hex in test vector"),
            other => panic!("unsupported encoding: {other}"),
        }
    }
}
