//! Call-distribution server entry point
//!
//! Configuration comes from the environment (optionally via `.env`):
//! `ARI_HOST`, `ARI_PORT`, `ARI_USERNAME`, `ARI_PASSWORD`, `ARI_APP_NAME`,
//! `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `WRAP_UP_SECONDS`,
//! `CALL_CENTER_IDS` and `LOG_LEVEL`.

use tracing_subscriber::EnvFilter;

use acd_call_engine::config::CallCenterConfig;
use acd_call_engine::server::CallCenterServerBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = CallCenterConfig::from_env()?;
    let server = CallCenterServerBuilder::new().with_config(config).build().await?;
    server.run().await?;
    Ok(())
}
