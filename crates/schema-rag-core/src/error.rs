//! Error taxonomy for the pipeline.
//!
//! Only [`RagError`] ever escapes a pipeline call. [`FetchError`] is
//! absorbed by the aggregator, and malformed JSON is reported inline on the
//! extracted segment.

use std::time::Duration;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal errors for a single request.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("embedding failed: {0}")]
    Embedding(#[source] BoxError),

    #[error("similarity search failed: {0}")]
    Search(#[source] BoxError),

    #[error("generation failed: {0}")]
    Generation(#[source] BoxError),
}

impl RagError {
    /// Stable machine-readable code, used by the HTTP error contract.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Embedding(_) => "embedding_error",
            RagError::Search(_) => "search_error",
            RagError::Generation(_) => "generation_error",
        }
    }

    pub(crate) fn embedding(err: anyhow::Error) -> Self {
        RagError::Embedding(err.into())
    }

    pub(crate) fn search(err: anyhow::Error) -> Self {
        RagError::Search(err.into())
    }

    pub(crate) fn generation(err: anyhow::Error) -> Self {
        RagError::Generation(err.into())
    }
}

/// Why a single document could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("match {id} has no document locator")]
    MissingLocator { id: String },

    #[error("invalid locator {locator}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("fetching {locator} timed out after {after:?}")]
    Timeout { locator: String, after: Duration },

    #[error("HTTP {status} for {locator}")]
    Status { locator: String, status: u16 },

    #[error("empty body from {locator}")]
    EmptyBody { locator: String },

    #[error("transport error for {locator}: {message}")]
    Transport { locator: String, message: String },
}
