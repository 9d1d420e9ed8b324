//! Error types for the oa-anchor crate.

/// Error reported by a host primitive (`search`, `sync`, range edits).
///
/// `code` is the host's error code or name and is what the bounded search
/// adapter classifies on; `message` is for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("host error {code}: {message}")]
pub struct HostError {
    pub code: String,
    pub message: String,
}

impl HostError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Failures of the mutation queue itself, as opposed to a job's own outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The lane was shut down before the job could run.
    #[error("mutation queue is closed")]
    Closed,

    /// The job panicked or was aborted before it produced an outcome.
    #[error("mutation job aborted before completion")]
    JobAborted,
}

/// Anchor-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    /// A host error outside the tolerated set; fatal to the awaiting task.
    #[error(transparent)]
    Host(#[from] HostError),

    /// Work was refused because teardown already fired.
    #[error("operation refused: teardown already fired")]
    TornDown,

    /// A tracked operation was cancelled through the pending registry.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Convenience result type for oa-anchor operations.
pub type AnchorResult<T> = Result<T, AnchorError>;
