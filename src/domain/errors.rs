//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these. Provider failures carry a
//! transient/permanent split because only transient ones are worth retrying
//! or routing through the fallback chain.

use thiserror::Error;

/// A text-generation call failed at the provider boundary.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Network error, timeout, or an explicit overload/rate-limit signal.
    /// Eligible for retry with backoff and for the fallback chain.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Authentication, malformed request, or an unreadable response.
    /// Retrying will not help; fails the call immediately.
    #[error("provider request rejected: {0}")]
    Permanent(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("document loader error: {0}")]
    Loader(String),

    #[error("extract cache error: {0}")]
    Cache(String),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),
}
