use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Hosted backend (None = offline in-memory backend)
    pub backend_url: Option<String>,
    pub backend_anon_key: Option<String>,

    // Local persistence
    pub local_store_path: PathBuf,

    // Locale detection override (stands in for the browser language)
    pub app_locale: Option<String>,

    // Timings
    pub realtime_poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let backend_url = std::env::var("BACKEND_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        // The anon key is only needed when talking to a real backend
        let backend_anon_key = match backend_url {
            Some(_) => Some(
                std::env::var("BACKEND_ANON_KEY")
                    .context("BACKEND_ANON_KEY not set (required with BACKEND_URL)")?,
            ),
            None => None,
        };

        Ok(Self {
            backend_url,
            backend_anon_key,

            local_store_path: std::env::var("LOCAL_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".bond-portal/local.json")),

            app_locale: std::env::var("APP_LOCALE").ok().filter(|v| !v.is_empty()),

            realtime_poll_interval: Duration::from_secs(
                std::env::var("REALTIME_POLL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            ),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
        })
    }

    /// Whether the app runs against the in-memory backend.
    pub fn is_offline(&self) -> bool {
        self.backend_url.is_none()
    }
}
