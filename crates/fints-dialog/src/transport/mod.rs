//! Transport seam.
//!
//! The dialog hands fully rendered requests to a [`Transport`] and decodes
//! whatever bytes come back. HTTP, TLS and retries live behind the trait.

pub mod codec;

use async_trait::async_trait;
use bytes::Bytes;

use fints_core::error::Result;

/// One request/response round trip with the bank.
///
/// Payloads are raw ISO-8859-1 messages. Implementations that talk to an
/// HTTP endpoint wrap them with [`codec::encode_body`]/[`codec::decode_body`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Bytes) -> Result<Bytes>;
}
