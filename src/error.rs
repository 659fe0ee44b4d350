use thiserror::Error;

use crate::feed::FetchError;

/// Errors surfaced by the `get_news` operation.
///
/// Both variants abort the call. The host turns them into whatever error
/// envelope its protocol uses; only the message text is guaranteed.
#[derive(Debug, Error)]
pub enum NewsError {
    /// The requested topic is not in the registry.
    #[error("Invalid topic: {topic}. Available topics: {available}")]
    InvalidArgument { topic: String, available: String },

    /// Retrieval or parsing of the feed failed.
    #[error("Error fetching news: {0}")]
    FetchFailed(#[from] FetchError),
}
