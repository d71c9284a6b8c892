use std::sync::Arc;

use anyhow::Result;

use crate::backend::http::Timeouts;
use crate::backend::{Backend, HttpBackend};
use crate::config::Config;
use crate::job::PollSettings;

/// Shared application state handed to every CLI command.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub config: Config,
}

impl AppState {
    /// Builds the HTTP backend for the resolved base URL.
    pub fn connect(config: Config, base_url_override: Option<&str>) -> Result<Self> {
        let base_url = config.resolve_api_url(base_url_override)?;
        let timeouts = Timeouts {
            other: config.request_timeout,
            ..Timeouts::default()
        };
        tracing::info!("Using backend at {base_url}");

        Ok(Self {
            backend: Arc::new(HttpBackend::new(base_url, timeouts)),
            config,
        })
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.config.poll_interval,
            max_failures: self.config.max_poll_failures,
        }
    }
}
