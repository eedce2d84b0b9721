//! fints dialog: the client-side dialog runtime on top of `fints-core`.
//!
//! This crate wires configuration, session state, the dialog segment
//! catalog, customer interactions and the transport seam into a dialog
//! that can be started, suspended for a TAN and resumed.
//!
//! Bank responses are untrusted; `unwrap`, `expect` and `panic!` are
//! compile-denied outside tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod catalog;
pub mod config;
pub mod dialog;
pub mod interaction;
pub mod session;
pub mod transport;

pub use dialog::{Dialog, Responses};
pub use interaction::{Interaction, InteractionResponse, SegmentOrder, Stage};
pub use session::{BankingInformation, Session};
pub use transport::Transport;
