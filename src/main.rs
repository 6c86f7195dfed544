mod config;
mod error;
mod handlers;
mod models;
mod scraping;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let today = Utc::now().with_timezone(&config.timezone).date_naive();

    handlers::poll::poll_all(&config, today).await
}
