//! Error types for duet-core.

use thiserror::Error;

/// Result type alias using duet-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during cognitive-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed Task: missing id or description.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Command matched the sandbox deny list.
    #[error("sandbox blocked command: {0}")]
    SandboxBlocked(String),

    /// Sandbox is past its expiry or was cleaned up.
    #[error("sandbox expired: {0}")]
    SandboxExpired(String),

    /// Non-zero exit or validation issues during execution.
    #[error("execution failed: {0}")]
    ExecutionFailure(String),

    /// Swarm endpoint unreachable.
    #[error("swarm network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Downloaded swarm packet's checksum did not match.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The advisory file lock could not be acquired within its deadline.
    #[error("lock contention on {path}: could not acquire within {waited_ms}ms")]
    LockContention { path: String, waited_ms: u64 },

    /// Privacy scrubber's self-validation found residual sensitive data.
    #[error("scrub residual: {0} item(s) survived validation")]
    ScrubResidual(usize),

    /// Filesystem I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Swarm HTTP transport error.
    #[error("swarm transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Configuration value rejected (out of documented range with no sane clamp).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn sandbox_blocked(label: impl Into<String>) -> Self {
        Self::SandboxBlocked(label.into())
    }

    pub fn sandbox_expired(sandbox_id: impl Into<String>) -> Self {
        Self::SandboxExpired(sandbox_id.into())
    }

    pub fn execution_failure(message: impl Into<String>) -> Self {
        Self::ExecutionFailure(message.into())
    }

    pub fn network_unavailable(message: impl Into<String>) -> Self {
        Self::NetworkUnavailable(message.into())
    }

    pub fn checksum_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ChecksumMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn lock_contention(path: impl Into<String>, waited_ms: u64) -> Self {
        Self::LockContention {
            path: path.into(),
            waited_ms,
        }
    }

    pub fn scrub_residual(residual_count: usize) -> Self {
        Self::ScrubResidual(residual_count)
    }
}
