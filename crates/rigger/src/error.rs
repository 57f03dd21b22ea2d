//! Domain error types for provisioning operations.

use thiserror::Error;

use crate::exec::ExitDisposition;

/// Result type for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Errors surfaced to callers of the provisioning bridge.
///
/// Every user-facing failure carries the captured output it has, so the
/// audit log stays self-sufficient for debugging without shell access to
/// the remote account.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Upstream release index could not be fetched or parsed. Callers
    /// degrade to the previous catalog snapshot; this is never fatal.
    #[error("release catalog unavailable for '{ecosystem}': {reason}")]
    CatalogUnavailable { ecosystem: String, reason: String },

    /// The requested version or branch has no matching release. Raised
    /// before any remote action runs.
    #[error("no release matching '{request}' is available for '{ecosystem}'")]
    UnresolvedVersion { ecosystem: String, request: String },

    /// Another operation holds the resource lock beyond the retry budget.
    /// The whole request may be retried later.
    #[error("resource '{key}' is busy: lock not acquired within retry budget")]
    LockTimeout { key: String },

    /// A remote or privileged command finished unsuccessfully. The
    /// sequence halts at this action; earlier effects are not rolled back.
    #[error("command failed ({disposition}): {command}")]
    ExecutionFailure {
        command: String,
        disposition: ExitDisposition,
        stdout: String,
        stderr: String,
    },

    /// Audit log or lock directory IO failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
