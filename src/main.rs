use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use shopchat::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::parse();
    config.validate()?;
    info!(
        host = %config.host,
        port = config.port,
        id_parsing = ?config.id_parsing,
        "Starting chat server"
    );

    shopchat::face::serve(config).await
}
