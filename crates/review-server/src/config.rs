use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use review_db::DbOptions;

/// Server settings read from `REVIEW_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub db_readers: usize,
    pub busy_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset keys take their defaults;
    /// set but unparseable keys are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("REVIEW_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "REVIEW_PORT", 8080)?;
        let db_path = lookup("REVIEW_DB_PATH")
            .unwrap_or_else(|| "review.db".into())
            .into();
        let db_readers = parse_or(&lookup, "REVIEW_DB_READERS", 4)?;
        let busy_ms: u64 = parse_or(&lookup, "REVIEW_DB_BUSY_TIMEOUT_MS", 5000)?;

        Ok(Self {
            host,
            port,
            db_path,
            db_readers,
            busy_timeout: Duration::from_millis(busy_ms),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn db_options(&self) -> DbOptions {
        DbOptions {
            readers: self.db_readers,
            busy_timeout: self.busy_timeout,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value {:?}", key, raw)),
        None => Ok(default),
    }
}
