//! The `get_news` pipeline: resolve topic, fetch, normalize, sort, limit.
//!
//! Every call is independent. The only shared state is the read-only
//! [`TopicRegistry`] and the fetch settings, both held by [`NewsService`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::NewsError;
use crate::feed::{fetch_feed, FeedEntry, FetchSettings};
use crate::topics::TopicRegistry;

pub const DEFAULT_TOPIC: &str = "news";
pub const DEFAULT_LIMIT: i64 = 5;

const NO_TITLE: &str = "No title";
const NO_DATE: &str = "No date";
const NO_LINK: &str = "No link";
const NO_SUMMARY: &str = "No summary";

/// One normalized feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub published: String,
    pub link: String,
    pub summary: String,
    /// Sort key only; never serialized.
    #[serde(skip)]
    pub published_parsed: Option<DateTime<Utc>>,
}

impl NewsItem {
    /// Substitute placeholders for any field the entry lacks.
    pub fn from_entry(entry: FeedEntry) -> Self {
        Self {
            title: entry.title.unwrap_or_else(|| NO_TITLE.to_string()),
            published: entry.published.unwrap_or_else(|| NO_DATE.to_string()),
            link: entry.link.unwrap_or_else(|| NO_LINK.to_string()),
            summary: entry.summary.unwrap_or_else(|| NO_SUMMARY.to_string()),
            published_parsed: entry.published_parsed,
        }
    }
}

/// Result of a `get_news` call. `count` always equals `items.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsResponse {
    pub items: Vec<NewsItem>,
    pub topic: String,
    pub count: usize,
}

impl NewsResponse {
    pub fn new(topic: impl Into<String>, items: Vec<NewsItem>) -> Self {
        Self {
            count: items.len(),
            items,
            topic: topic.into(),
        }
    }

    pub fn empty(topic: impl Into<String>) -> Self {
        Self::new(topic, Vec::new())
    }
}

/// Normalize, sort newest-first and truncate parsed entries.
///
/// Entries without a parsed date sort after all dated ones. The sort is
/// stable. A `limit` of zero or below returns every item.
pub fn build_response(topic: &str, entries: Vec<FeedEntry>, limit: i64) -> NewsResponse {
    let mut items: Vec<NewsItem> = entries.into_iter().map(NewsItem::from_entry).collect();

    // `None < Some(_)`, so reversing the comparison sinks undated items.
    items.sort_by(|a, b| b.published_parsed.cmp(&a.published_parsed));

    if limit > 0 {
        items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }

    NewsResponse::new(topic, items)
}

/// Serves `get_news` against a fixed topic registry.
#[derive(Debug, Clone)]
pub struct NewsService {
    registry: Arc<TopicRegistry>,
    settings: FetchSettings,
}

impl NewsService {
    pub fn new(registry: Arc<TopicRegistry>, settings: FetchSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Fetch `topic`'s feed and return up to `limit` items, newest first.
    ///
    /// # Errors
    ///
    /// - [`NewsError::InvalidArgument`] - `topic` is not in the registry
    /// - [`NewsError::FetchFailed`] - network, HTTP status or parse failure
    pub async fn get_news(&self, topic: &str, limit: i64) -> Result<NewsResponse, NewsError> {
        let url = self.registry.resolve(topic)?;
        tracing::debug!(topic = %topic, url = %url, limit = limit, "Fetching news");

        let entries = fetch_feed(url, &self.settings).await.map_err(|e| {
            tracing::warn!(topic = %topic, url = %url, error = %e, "Feed fetch failed");
            NewsError::FetchFailed(e)
        })?;

        if entries.is_empty() {
            tracing::info!(topic = %topic, "Feed has no entries");
            return Ok(NewsResponse::empty(topic));
        }

        let total = entries.len();
        let response = build_response(topic, entries, limit);
        tracing::info!(
            topic = %topic,
            entries = total,
            returned = response.count,
            "Served news"
        );
        Ok(response)
    }
}
