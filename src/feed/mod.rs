//! Feed retrieval and parsing.
//!
//! - [`fetcher`] - single-shot HTTP GET with a body size cap
//! - [`parser`] - RSS/Atom parsing via the `feed-rs` crate into [`FeedEntry`] values
//!
//! Entries come back in document order with every field optional; the
//! `news` module turns them into response items.

mod fetcher;
mod parser;

pub use fetcher::{fetch_feed, FetchError, FetchSettings};
pub use parser::{parse_feed, FeedEntry};
