//! Error types for HCQR construction, algebra and storage.

use thiserror::Error;

/// HCQR errors.
///
/// Not-found conditions (unknown query strings, pixels outside every cell)
/// are not represented here; they produce empty results instead.
#[derive(Error, Debug)]
pub enum HcqrError {
    /// A tree or operand broke a structural invariant. Signals a programming
    /// or data-corruption bug; the operation cannot continue.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// An in-place node update needs more bytes than were reserved when the
    /// node was first pushed.
    #[error("Node at offset {offset} needs {required} bytes but only {reserved} are reserved")]
    Overflow {
        offset: u32,
        required: usize,
        reserved: usize,
    },

    /// Encoded data is truncated or malformed.
    #[error("Format error: {0}")]
    Format(String),

    /// The query uses a construct this engine does not evaluate.
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A decorator received a result in a representation it cannot convert.
    #[error("Representation mismatch: expected {expected}, got {actual}")]
    RepresentationMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// No grid backend is registered under this name.
    #[error("Unknown grid: {0}")]
    UnknownGrid(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while reading or writing persisted trees or item tables.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for HCQR operations.
pub type Result<T> = std::result::Result<T, HcqrError>;
