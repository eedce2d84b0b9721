//! Wire codec for the segment protocol.
//!
//! Layers, bottom-up:
//! - `syntax`: delimiters, escaping, binary frames, splitting.
//! - `element`/`schema`/`group`: typed primitives and schema-driven groups.
//! - `segment`/`message`: headers, unknown-segment fallback, envelope splicing.
//! - `customer`/`continuation`: outgoing message assembly and paged responses.
//!
//! Every decoder works on raw ISO-8859-1 bytes and reports malformed input
//! as `FintsError`; nothing here indexes past a buffer or panics.

pub mod catalog;
pub mod continuation;
pub mod customer;
pub mod element;
pub mod group;
pub mod message;
pub mod schema;
pub mod segment;
pub mod syntax;
