//! Topic registry: the fixed mapping from topic key to feed URL.
//!
//! The registry is built once at startup (built-in Yle feeds plus any
//! `[[topics]]` entries from the config file) and then shared read-only
//! behind an `Arc`. Lookup order is insertion order, which is also the
//! order used when listing valid topics in error messages.

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::error::NewsError;

/// Built-in Yle feeds, in listing order.
const BUILTIN_TOPICS: &[(&str, &str)] = &[
    ("news", "https://feeds.yle.fi/uutiset/v1/majorHeadlines/YLE_UUTISET.rss"),
    ("recent", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET"),
    ("most_read", "https://feeds.yle.fi/uutiset/v1/mostRead/YLE_UUTISET.rss"),
    ("kotimaa", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-34837"),
    ("ulkomaat", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-34953"),
    ("talous", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-19274"),
    ("politiikka", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-38033"),
    ("kulttuuri", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-150067"),
    ("viihde", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-36066"),
    ("tiede", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-819"),
    ("luonto", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-35354"),
    ("terveys", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-35138"),
    ("media", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-35057"),
    ("liikenne", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-12"),
    ("näkökulmat", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_UUTISET&concepts=18-35381"),
    ("urheilu", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_URHEILU"),
    ("selkouutiset", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_SELKOUUTISET"),
    ("english", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_NEWS"),
    ("sapmi", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_SAPMI"),
    ("novosti", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_NOVOSTI"),
    ("karjalakse", "https://feeds.yle.fi/uutiset/v1/recent.rss?publisherIds=YLE_KARJALAKSE"),
];

/// Errors raised while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two entries share the same key.
    #[error("Duplicate topic key: {0}")]
    DuplicateTopic(String),
    /// A key is empty or whitespace.
    #[error("Topic key must not be empty")]
    EmptyKey,
    /// The URL string could not be parsed.
    #[error("Invalid URL for topic '{topic}': {source}")]
    InvalidUrl {
        topic: String,
        #[source]
        source: url::ParseError,
    },
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme for topic '{topic}': {scheme} (only http/https allowed)")]
    UnsupportedScheme { topic: String, scheme: String },
}

/// A single topic key and the feed it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub key: String,
    pub url: String,
}

impl Topic {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
        }
    }
}

/// Immutable, ordered topic table.
#[derive(Debug, Clone)]
pub struct TopicRegistry {
    topics: Vec<Topic>,
}

impl TopicRegistry {
    /// Build a registry from the given entries, validating keys and URLs.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on an empty or duplicate key, or on a URL
    /// that does not parse as an absolute http(s) URL.
    pub fn new(topics: Vec<Topic>) -> Result<Self, RegistryError> {
        {
            let mut seen = HashSet::with_capacity(topics.len());
            for topic in &topics {
                if topic.key.trim().is_empty() {
                    return Err(RegistryError::EmptyKey);
                }
                if !seen.insert(topic.key.as_str()) {
                    return Err(RegistryError::DuplicateTopic(topic.key.clone()));
                }
                validate_feed_url(topic)?;
            }
        }

        Ok(Self { topics })
    }

    /// The Yle feed table.
    pub fn builtin() -> Self {
        Self {
            topics: BUILTIN_TOPICS
                .iter()
                .map(|(key, url)| Topic::new(*key, *url))
                .collect(),
        }
    }

    /// Returns a new registry with `extra` appended after the existing topics.
    pub fn with_extra(self, extra: Vec<Topic>) -> Result<Self, RegistryError> {
        if extra.is_empty() {
            return Ok(self);
        }
        let mut topics = self.topics;
        topics.extend(extra);
        Self::new(topics)
    }

    /// Look up the feed URL for `topic`.
    ///
    /// # Errors
    ///
    /// [`NewsError::InvalidArgument`] naming the topic and every valid key.
    pub fn resolve(&self, topic: &str) -> Result<&str, NewsError> {
        self.topics
            .iter()
            .find(|t| t.key == topic)
            .map(|t| t.url.as_str())
            .ok_or_else(|| NewsError::InvalidArgument {
                topic: topic.to_string(),
                available: self.available(),
            })
    }

    /// Topic keys in registry order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|t| t.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    /// Comma-joined list of valid keys.
    pub fn available(&self) -> String {
        self.keys().collect::<Vec<_>>().join(", ")
    }
}

fn validate_feed_url(topic: &Topic) -> Result<(), RegistryError> {
    let url = Url::parse(&topic.url).map_err(|source| RegistryError::InvalidUrl {
        topic: topic.key.clone(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(RegistryError::UnsupportedScheme {
            topic: topic.key.clone(),
            scheme: scheme.to_owned(),
        }),
    }
}
