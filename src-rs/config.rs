use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;
use crate::helpers::{env_opt, env_or, env_parse};
use crate::task::FailureMessageSource;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_POLL_INTERVAL_MS: u64 = 4000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_FAILURE_LIMIT: u32 = 1;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub csrf_cookie: String,
    pub csrf_header: String,
    pub poll_failure_limit: u32,
    pub failure_message_order: Vec<FailureMessageSource>,
    pub failure_fallback: String,
    pub history_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            csrf_cookie: "csrftoken".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
            poll_failure_limit: DEFAULT_POLL_FAILURE_LIMIT,
            failure_message_order: FailureMessageSource::default_order(),
            failure_fallback: "Download failed.".to_string(),
            history_path: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_or("DOWNLOADER_BASE_URL", &defaults.base_url),
            request_timeout: Duration::from_secs(env_parse(
                "DOWNLOADER_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )),
            poll_interval: Duration::from_millis(env_parse(
                "DOWNLOADER_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )),
            poll_failure_limit: env_parse(
                "DOWNLOADER_POLL_FAILURE_LIMIT",
                DEFAULT_POLL_FAILURE_LIMIT,
            ),
            history_path: env_opt("DOWNLOADER_HISTORY").map(PathBuf::from),
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Config("base url is empty".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(ClientError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.csrf_header.trim().is_empty() {
            return Err(ClientError::Config("csrf header name is empty".to_string()));
        }
        Ok(())
    }

    /// A limit of zero would never mark a record as failed; treat it as one.
    pub fn effective_poll_failure_limit(&self) -> u32 {
        self.poll_failure_limit.max(1)
    }
}
