//! Top-level facade crate for fints.
//!
//! Re-exports the codec and the dialog runtime so users can depend on a single crate.

pub mod core {
    pub use fints_core::*;
}

pub mod dialog {
    pub use fints_dialog::*;
}
