//! Error types for the brain kernel.

use thiserror::Error;

/// Result type alias used throughout the kernel.
pub type Result<T> = std::result::Result<T, BrainError>;

/// Main error type for kernel operations.
///
/// `FrozenBlackboardWrite` and `ChainDepthExceeded` from the error-kind
/// table are deliberately not variants here: the former is a trapped
/// program-invariant violation (it panics at the mutation site instead of
/// returning a `Result`) and the latter is fully recovered internally by
/// `Blackboard::flatten` and never surfaces.
#[derive(Error, Debug)]
pub enum BrainError {
    /// A unit id referenced in a strategy was never registered.
    #[error("unknown unit id: {0}")]
    InvalidUnitId(String),

    /// A unit's `process` call returned an error.
    #[error("unit {unit} failed: {message}")]
    UnitProcessing { unit: String, message: String },

    /// A phase exceeded its configured timeout.
    #[error("phase '{phase}' timed out after {timeout_ms}ms")]
    PhaseTimeout { phase: String, timeout_ms: u64 },

    /// The outer request context was cancelled.
    #[error("request cancelled")]
    RequestCancelled,

    /// No branch survived pruning in the parallel branch executor.
    #[error("no branches completed successfully")]
    NoBranchesCompleted,

    /// Every tier of the classifier cascade failed to produce a result.
    #[error("classifier cascade failed: {0}")]
    ClassifierFailure(String),

    /// Configuration could not be loaded or was invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure (config file loading, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP/network failure talking to an optional collaborator (embedder
    /// or fallback LLM classifier).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with added context, chained via [`BrainError::context`].
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<BrainError>,
    },

    /// Catch-all for conditions that don't warrant a dedicated variant.
    #[error("{0}")]
    Other(String),
}

impl BrainError {
    /// Wrap this error with additional context, preserving the original cause.
    pub fn context(self, context: impl Into<String>) -> Self {
        BrainError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        BrainError::Config(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        BrainError::Other(msg.into())
    }

    pub fn unit_processing(unit: impl Into<String>, message: impl Into<String>) -> Self {
        BrainError::UnitProcessing {
            unit: unit.into(),
            message: message.into(),
        }
    }
}

/// Extension trait for adding context to `Result`s.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }
}
