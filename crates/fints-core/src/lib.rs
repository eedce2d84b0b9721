//! fints core: the schema-driven codec for FinTS/HBCI messages.
//!
//! This crate holds the wire syntax, primitive and group codecs, segment and
//! message framing, customer message signing and continuation reassembly. It
//! carries no transport or runtime dependencies; the dialog runtime lives in
//! `fints-dialog`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Bank responses are untrusted input; every fallible path surfaces as
//! `FintsError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorClass, FintsError, Result, Violation};
pub use protocol::customer::{Credentials, CustomerMessage};
pub use protocol::element::{Fields, Primitive, Value};
pub use protocol::message::{BankAnswer, Message};
pub use protocol::schema::{Element, Registry, SegmentSchema};
pub use protocol::segment::{Body, Segment, SegmentHeader};
