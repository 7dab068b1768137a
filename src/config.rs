use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::warn;

use crate::action::IdParsing;
use crate::catalog::Catalog;

/// Upper bound on the simulated reply delay.
pub const MAX_DELAY_MS: u64 = 60_000;

/// Server settings. Every flag can also come from the environment, and a
/// `.env` file is read before parsing.
#[derive(Debug, Clone, Parser)]
#[command(name = "shopchat", version, about = "Storefront chat backend")]
pub struct Config {
    #[arg(long, env = "SHOPCHAT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "SHOPCHAT_PORT", default_value_t = 3000)]
    pub port: u16,

    /// How many consecutive ports to try when the first one is taken.
    #[arg(long, env = "SHOPCHAT_PORT_ATTEMPTS", default_value_t = 10)]
    pub port_attempts: u16,

    /// Require a bearer token from `/api/token` on every chat route.
    #[arg(long, env = "SHOPCHAT_REQUIRE_TOKEN")]
    pub require_token: bool,

    /// Key clients present in `X-Api-Key` to obtain a token.
    #[arg(long, env = "SHOPCHAT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(
        long,
        env = "SHOPCHAT_TOKEN_SECRET",
        default_value = "default_secret",
        hide_env_values = true
    )]
    pub token_secret: String,

    #[arg(long, env = "SHOPCHAT_TOKEN_TTL_SECS", default_value_t = 300)]
    pub token_ttl_secs: i64,

    /// Hand out tokens without checking the API key.
    #[arg(long, env = "SHOPCHAT_DEV_MODE")]
    pub dev_mode: bool,

    #[arg(long, env = "SHOPCHAT_DELAY_MIN_MS", default_value_t = 500)]
    pub delay_min_ms: u64,

    #[arg(long, env = "SHOPCHAT_DELAY_MAX_MS", default_value_t = 1500)]
    pub delay_max_ms: u64,

    /// Origins allowed by CORS. Empty mirrors the caller's origin.
    #[arg(
        long = "allow-origin",
        env = "SHOPCHAT_ALLOWED_ORIGINS",
        value_delimiter = ','
    )]
    pub allowed_origins: Vec<String>,

    /// JSON file replacing the built-in product catalog.
    #[arg(long, env = "SHOPCHAT_CATALOG")]
    pub catalog: Option<PathBuf>,

    #[arg(long, env = "SHOPCHAT_ID_PARSING", value_enum, default_value_t = IdParsing::Exact)]
    pub id_parsing: IdParsing,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.delay_min_ms > self.delay_max_ms {
            bail!(
                "delay_min_ms ({}) is greater than delay_max_ms ({})",
                self.delay_min_ms,
                self.delay_max_ms
            );
        }
        if self.delay_max_ms > MAX_DELAY_MS {
            bail!(
                "delay_max_ms ({}) exceeds the {} ms ceiling",
                self.delay_max_ms,
                MAX_DELAY_MS
            );
        }
        if self.port_attempts == 0 {
            bail!("port_attempts must be at least 1");
        }
        if self.token_ttl_secs <= 0 {
            bail!("token_ttl_secs must be positive");
        }
        if self.require_token && self.api_key.is_none() && !self.dev_mode {
            warn!("Token auth is on but no API key is set; /api/token will refuse everyone");
        }
        Ok(())
    }

    pub fn load_catalog(&self) -> Result<Arc<Catalog>> {
        let catalog = match &self.catalog {
            Some(path) => Catalog::load(path)
                .with_context(|| format!("loading catalog from {}", path.display()))?,
            None => Catalog::builtin(),
        };
        Ok(Arc::new(catalog))
    }
}
