//! Yle news feeds served as an MCP `get_news` tool.
//!
//! - [`topics`] - the fixed topic → feed URL table
//! - [`feed`] - HTTP retrieval and RSS/Atom parsing
//! - [`news`] - normalization, sorting and the [`news::NewsService`] pipeline
//! - [`server`] - newline-delimited JSON-RPC host over stdio
//! - [`config`] - optional TOML configuration

pub mod config;
pub mod error;
pub mod feed;
pub mod news;
pub mod server;
pub mod topics;

pub use error::NewsError;
pub use news::{NewsItem, NewsResponse, NewsService};
pub use topics::TopicRegistry;
