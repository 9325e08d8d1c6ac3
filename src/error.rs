//! Crate-wide error type.
//!
//! Every fallible operation in `axon-core` returns [`AxonError`]. Variants
//! map 1:1 onto the error kinds the core is required to surface: recoverable
//! (`NotFound`, `Validation`, `QuotaExceeded`, `Backpressure`), fatal for the
//! write path (`Durability`), containment (`PanicRecovered`), and shutdown
//! coordination (`ShutdownInProgress`).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AxonError>;

#[derive(Debug, Error)]
pub enum AxonError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("durability error: {0}")]
    Durability(String),

    #[error("backpressure: {0}")]
    Backpressure(String),

    #[error("panic recovered: {message}{}", location.as_ref().map(|l| format!(" at {l}")).unwrap_or_default())]
    PanicRecovered {
        message: String,
        location: Option<String>,
        backtrace: String,
    },

    #[error("shutdown in progress")]
    ShutdownInProgress,
}

impl AxonError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AxonError::NotFound(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        AxonError::Validation(what.into())
    }

    /// Error kind as a low-cardinality label, for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AxonError::NotFound(_) => "not_found",
            AxonError::Validation(_) => "validation",
            AxonError::QuotaExceeded(_) => "quota_exceeded",
            AxonError::Durability(_) => "durability",
            AxonError::Backpressure(_) => "backpressure",
            AxonError::PanicRecovered { .. } => "panic_recovered",
            AxonError::ShutdownInProgress => "shutdown_in_progress",
        }
    }

    /// Whether the caller may retry/back off, versus a terminal condition.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AxonError::NotFound(_)
                | AxonError::Validation(_)
                | AxonError::QuotaExceeded(_)
                | AxonError::Backpressure(_)
        )
    }
}
