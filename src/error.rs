//! Typed failure taxonomy for the onboarding core.
//!
//! Every fallible core operation returns one of these variants; nothing is
//! swallowed and nothing is retried inside the core. The boundary layer
//! (CLI today, any future RPC surface) translates them into user-facing
//! responses and owns retry policy for `Storage` failures.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A client with this contact email already exists (case-insensitive).
    #[error("client with email '{0}' already exists")]
    DuplicateContact(String),

    /// The requested step change is not on the registration state graph.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Caller-supplied input is malformed or references unusable entities.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation is blocked by existing references.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A vault blob could not be decrypted (corrupt, wrong key, or
    /// unknown format version).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Storage-layer failure (connection loss, I/O). Propagated verbatim so
    /// the boundary can decide whether to retry.
    #[error("storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable kind string, used by the CLI for exit codes
    /// and structured JSON error output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::DuplicateContact(_) => "duplicate_contact",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::Decryption(_) => "decryption",
            Self::Storage(_) => "storage_unavailable",
        }
    }
}
