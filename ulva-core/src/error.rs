//! Structured error types for the Ulva workspace.

use thiserror::Error;

/// Unified error type for all Ulva operations.
#[derive(Debug, Error)]
pub enum UlvaError {
    /// Input contains a symbol outside the declared alphabet.
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),

    /// Parse error (malformed motif format input).
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No sequence in the set is long enough for the requested motif width.
    #[error("no valid motif: {0}")]
    NoValidMotif(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the Ulva workspace.
pub type Result<T> = std::result::Result<T, UlvaError>;
