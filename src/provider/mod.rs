mod local;
mod opentdb;

use async_trait::async_trait;
use std::time::Duration;

pub use local::LocalBank;
pub use opentdb::{Category, OpenTdbProvider, OTDB_AMOUNT_MAX};

use crate::types::Question;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur while fetching questions
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("not enough questions for this filter")]
    NoResults,

    #[error("invalid request parameter")]
    InvalidParameter,

    #[error("session token not found")]
    TokenNotFound,

    #[error("all questions for this session token are exhausted")]
    TokenExhausted,

    #[error("rate limited by the question source")]
    RateLimited,

    #[error("unrecognized response code {0}")]
    UnknownCode(u8),
}

/// A source of multiple-choice question batches.
///
/// Fetches are best-effort: a provider may return fewer questions than
/// requested, and an empty batch is not an error. The engine treats any
/// `Err` the same as an empty batch and falls back to its local bank.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    /// Fetch up to `amount` questions, optionally restricted to a category.
    async fn fetch_batch(
        &self,
        amount: usize,
        category: Option<u32>,
    ) -> ProviderResult<Vec<Question>>;

    /// The largest batch a single fetch may request.
    fn max_batch(&self) -> usize {
        OTDB_AMOUNT_MAX
    }

    /// Short label describing where questions come from, for display.
    fn label(&self) -> &str;
}
