//! shellcache entry point.
//!
//! Reads one JSON command per stdin line and writes one JSON reply per line
//! to stdout. Logging goes to stderr to keep stdout machine-readable.

use std::sync::Arc;

use anyhow::{Context, Result};
use shellcache_client::{FetchClient, FetchConfig};
use shellcache_core::{AppConfig, CacheDb};
use shellcache_worker::commands::{self, Command};
use shellcache_worker::{CachePolicy, Registration};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let policy = CachePolicy::from_config(&config)?;

    tracing::info!(db = %config.db_path.display(), origin = %config.origin, "starting shellcache");

    let store = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache store {}", config.db_path.display()))?;
    let network = FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        timeout: config.timeout(),
        origin: Some(config.origin_url()?),
        ..FetchConfig::default()
    })?;
    let registration = Registration::new(Arc::new(store), Arc::new(network));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Command>(line) {
            Ok(command) => commands::reply_line(commands::execute(&registration, &policy, command).await),
            Err(err) => {
                tracing::warn!(error = %err, "unparseable command");
                serde_json::json!({ "ok": false, "code": "INVALID_INPUT", "error": err.to_string() }).to_string()
            }
        };

        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    registration.flush().await;
    tracing::info!("stdin closed, shutting down");

    Ok(())
}
