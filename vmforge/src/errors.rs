//! Error taxonomy shared by every component.
//!
//! Failures fall into a small set of categories with distinct handling
//! policies: validation errors fail fast before any backend call, transient
//! backend errors are retried against a bounded budget, collaborator errors
//! surface immediately without rollback, and timeouts carry the spent
//! attempt count so operators can see how long we waited.

use std::path::PathBuf;

pub type ForgeResult<T> = Result<T, ForgeError>;

#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// Bad or missing required input. Never retried; reported to the user
    /// and the process exits non-zero.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The backend is not ready yet (address not assigned, connection
    /// refused mid-boot). Retried internally up to the calling phase's
    /// budget; only surfaced when the budget is exhausted.
    #[error("backend not ready: {0}")]
    TransientBackend(String),

    /// The virtualization backend rejected the VM definition.
    #[error("VM creation failed: {0}")]
    Creation(String),

    /// Disk image or ISO transfer failed.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Configuration bootstrap reported failure.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    /// A bounded retry budget was exhausted.
    #[error("timed out waiting for {operation} after {attempts} attempts")]
    Timeout { operation: String, attempts: u32 },

    /// A wall-clock bound on a whole operation was exceeded.
    #[error("{operation} did not finish within {limit:?}")]
    Deadline {
        operation: String,
        limit: std::time::Duration,
    },

    #[error("VM not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("batch file {path}: {reason}")]
    BatchSpec { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ForgeError {
    /// Whether the caller may retry against its own budget.
    pub fn is_transient(&self) -> bool {
        matches!(self, ForgeError::TransientBackend(_))
    }
}
