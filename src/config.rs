//! Environment configuration.
//!
//! `.env` is loaded by `main` through dotenvy before [`Config::from_env`]
//! runs, so both sources go through the same lookup.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};
use rust_decimal::Decimal;

use crate::auth::Credentials;
use crate::ledger::PricingTerms;

const DEFAULT_LOG_FILTER: &str = "quote_ledger=info,tower_http=info";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub default_terms: PricingTerms,
    pub require_verification: bool,
    pub credentials: Credentials,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_terms = PricingTerms {
            markup_percent: parsed(&lookup, "DEFAULT_MARKUP_PERCENT", Decimal::ZERO)?,
            gst_percent: parsed(&lookup, "DEFAULT_GST_PERCENT", Decimal::from(5))?,
            rounding_unit: parsed(&lookup, "ROUNDING_UNIT", Decimal::TEN)?,
        };
        default_terms
            .validate()
            .map_err(|e| anyhow!("invalid default pricing terms: {}", e))?;

        let credentials = Credentials::parse(&lookup("API_TOKENS").unwrap_or_default())
            .context("API_TOKENS")?;

        let log_filter = lookup("LOG_LEVEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            bind_addr: parsed(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout: Duration::from_secs(parsed(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                5,
            )?),
            default_terms,
            require_verification: parsed(&lookup, "REQUIRE_VERIFICATION", true)?,
            credentials,
            log_filter,
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        _ => Ok(default),
    }
}
