//! Shared error type across the FinTS crates.

use thiserror::Error;

/// Stable error classes (used by tests and callers that branch on failures).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A value failed its own constraint while being rendered.
    Encoding,
    /// Malformed wire text, or a mandatory value was missing.
    Decoding,
    /// Operation called in the wrong dialog state.
    Session,
    /// Bank asked for more pages but the request cannot carry the token.
    Continuation,
    /// Schema table is inconsistent or lacks an outgoing segment.
    Schema,
    /// The transport collaborator failed.
    Transport,
    /// Invalid configuration.
    Config,
}

impl ErrorClass {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Encoding => "ENCODING",
            ErrorClass::Decoding => "DECODING",
            ErrorClass::Session => "SESSION",
            ErrorClass::Continuation => "CONTINUATION",
            ErrorClass::Schema => "SCHEMA",
            ErrorClass::Transport => "TRANSPORT",
            ErrorClass::Config => "CONFIG",
        }
    }
}

/// Constraint violated by a single primitive value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("length {len} exceeds maximum {max}")]
    TooLong { len: usize, max: usize },
    #[error("line breaks are not allowed")]
    LineBreak,
    #[error("negative values are not allowed")]
    Negative,
    #[error("character {0:?} cannot be represented in ISO-8859-1")]
    NotRepresentable(char),
    #[error("malformed value: {0}")]
    Malformed(String),
    #[error("expected a {expected} value")]
    WrongKind { expected: &'static str },
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, FintsError>;

/// Unified error type used by the codec and the dialog runtime.
#[derive(Debug, Error)]
pub enum FintsError {
    #[error("encoding '{element}' failed: {violation}")]
    Encode { element: String, violation: Violation },
    #[error("decoding '{element}' failed: {violation}")]
    Decode { element: String, violation: Violation },
    #[error("mandatory value is missing for element '{element}' in '{context}'")]
    MissingMandatory { element: String, context: String },
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("no segment definition registered for '{0}'")]
    UnregisteredSegment(String),
    #[error("invalid schema: {0}")]
    Schema(String),
    #[error("{0}")]
    Session(String),
    #[error("continuation failed: {0}")]
    Continuation(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("config: {0}")]
    Config(String),
}

impl FintsError {
    /// Map the error to its stable class.
    pub fn class(&self) -> ErrorClass {
        match self {
            FintsError::Encode { .. } => ErrorClass::Encoding,
            FintsError::Decode { .. }
            | FintsError::MissingMandatory { .. }
            | FintsError::Malformed(_) => ErrorClass::Decoding,
            FintsError::UnregisteredSegment(_) | FintsError::Schema(_) => ErrorClass::Schema,
            FintsError::Session(_) => ErrorClass::Session,
            FintsError::Continuation(_) => ErrorClass::Continuation,
            FintsError::Transport(_) => ErrorClass::Transport,
            FintsError::Config(_) => ErrorClass::Config,
        }
    }

    pub(crate) fn encode(element: &str, violation: Violation) -> Self {
        FintsError::Encode {
            element: element.to_string(),
            violation,
        }
    }

    pub(crate) fn decode(element: &str, violation: Violation) -> Self {
        FintsError::Decode {
            element: element.to_string(),
            violation,
        }
    }
}
