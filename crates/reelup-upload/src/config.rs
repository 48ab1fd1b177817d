use std::time::Duration;

use reelup_types::limits::DEFAULT_CHUNK_SIZE;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?} as {expected}")]
    Parse {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },

    #[error("api url must start with http:// or https://, got {0:?}")]
    BadUrl(String),
}

/// Chunk retry schedule: after failed attempt `n`, wait `n * backoff_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base under which the `/upload/...` endpoints live, without a trailing slash.
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Used on resume when the server does not report the session's chunk size.
    pub default_chunk_size: u64,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.into(),
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Read `REELUP_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or empty keys keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("REELUP_API_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::BadUrl(url));
            }
            config.api_base_url = url;
        }

        if let Some(v) = get("REELUP_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(positive("REELUP_REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("REELUP_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = Duration::from_secs(positive("REELUP_CONNECT_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("REELUP_MAX_ATTEMPTS") {
            let attempts = positive("REELUP_MAX_ATTEMPTS", &v)?;
            config.retry.max_attempts = u32::try_from(attempts).map_err(|_| ConfigError::Parse {
                var: "REELUP_MAX_ATTEMPTS",
                value: v.clone(),
                expected: "a 32-bit count",
            })?;
        }
        if let Some(v) = get("REELUP_RETRY_BACKOFF_MS") {
            // Zero is allowed: retry immediately.
            let ms = parse_u64("REELUP_RETRY_BACKOFF_MS", &v)?;
            config.retry.backoff_step = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Full URL of an endpoint path such as `/upload/initiate`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

fn parse_u64(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Parse {
        var,
        value: value.to_string(),
        expected: "an unsigned integer",
    })
}

fn positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match parse_u64(var, value)? {
        0 => Err(ConfigError::Zero { var }),
        n => Ok(n),
    }
}
