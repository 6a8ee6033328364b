use anyhow::{Context, Result, bail};
use chrono::Duration;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub redis_url: String,
    pub http_addr: String,
    /// Share link lifetime; unset means links never expire.
    pub quote_token_ttl: Option<Duration>,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let redis_url = std::env::var("REDIS_URL").context("REDIS_URL is required")?;
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| default_http_addr.to_string());
        let quote_token_ttl = parse_token_ttl(std::env::var("QUOTE_TOKEN_TTL_DAYS").ok())?;

        Ok(Self {
            database_url,
            redis_url,
            http_addr,
            quote_token_ttl,
        })
    }
}

fn parse_token_ttl(raw: Option<String>) -> Result<Option<Duration>> {
    let Some(raw) = raw.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };

    let days: i64 = raw
        .parse()
        .with_context(|| format!("QUOTE_TOKEN_TTL_DAYS must be a whole number, got {raw}"))?;
    if days <= 0 {
        bail!("QUOTE_TOKEN_TTL_DAYS must be positive, got {days}");
    }

    Ok(Some(Duration::days(days)))
}
