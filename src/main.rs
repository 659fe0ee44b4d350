use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use yle_news::config::Config;
use yle_news::news::{NewsService, DEFAULT_LIMIT, DEFAULT_TOPIC};
use yle_news::server::{self, McpHandler};
use yle_news::TopicRegistry;

/// Get the default config file path (~/.config/yle-news/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("yle-news")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "yle-news", about = "MCP server for Yle news RSS feeds")]
struct Args {
    /// Config file (defaults to ~/.config/yle-news/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server on stdin/stdout (default)
    Serve,
    /// Fetch one topic and print the response as JSON
    Fetch {
        /// Topic key
        #[arg(long, default_value = DEFAULT_TOPIC)]
        topic: String,
        /// Maximum number of items (0 or below returns all)
        #[arg(long, default_value_t = DEFAULT_LIMIT, allow_negative_numbers = true)]
        limit: i64,
    },
    /// List the available topics
    Topics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol traffic, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let registry = TopicRegistry::builtin()
        .with_extra(config.extra_topics())
        .context("Invalid topic table")?;
    let service = NewsService::new(Arc::new(registry), config.fetch_settings());

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!(
                topics = service.registry().keys().count(),
                "Starting {} MCP server on stdio",
                server::SERVER_NAME
            );
            let handler = Arc::new(McpHandler::new(service));
            server::serve(handler, tokio::io::stdin(), tokio::io::stdout()).await?;
        }
        Command::Fetch { topic, limit } => {
            let response = service.get_news(&topic, limit).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Topics => {
            for topic in service.registry().iter() {
                println!("{}\t{}", topic.key, topic.url);
            }
        }
    }

    Ok(())
}
