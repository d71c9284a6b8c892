use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_MAX_POLL_FAILURES: u32 = 5;

/// Client configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    /// `None` when unset; the `--base-url` flag may still supply it.
    pub api_url: Option<String>,
    pub poll_interval: Duration,
    pub max_poll_failures: u32,
    /// Applied to calls that otherwise have no timeout (model load, chat, downloads).
    pub request_timeout: Option<Duration>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let poll_interval_ms = parse_or(&lookup, "STELLARIS_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let max_poll_failures =
            parse_or(&lookup, "STELLARIS_MAX_POLL_FAILURES", DEFAULT_MAX_POLL_FAILURES)?;
        anyhow::ensure!(
            max_poll_failures > 0,
            "STELLARIS_MAX_POLL_FAILURES must be at least 1"
        );
        let request_timeout = lookup("STELLARIS_REQUEST_TIMEOUT_SECS")
            .map(|v| {
                v.parse::<u64>()
                    .context("STELLARIS_REQUEST_TIMEOUT_SECS must be a whole number of seconds")
            })
            .transpose()?
            .map(Duration::from_secs);

        Ok(Config {
            api_url: lookup("STELLARIS_API_URL").filter(|v| !v.trim().is_empty()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_poll_failures,
            request_timeout,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// The backend base URL: the explicit override wins over the environment.
    pub fn resolve_api_url(&self, override_url: Option<&str>) -> Result<String> {
        override_url
            .map(str::to_string)
            .or_else(|| self.api_url.clone())
            .context("Backend URL is not set: pass --base-url or set STELLARIS_API_URL")
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{v}'")),
        None => Ok(default),
    }
}
