use crate::error::{AnalyticsError, Result};
use reqwest::blocking::{Client, ClientBuilder};
use std::time::Duration;
use tracing::warn;

/// Default JWT exchange endpoint of the authentication service
pub const EXCHANGE_ENDPOINT: &str = "https://ims-na1.adobelogin.com/ims/exchange/jwt";

/// Default Analytics 2.0 API base URL, `{company_id}` is resolved per request
pub const BASE_URL: &str = "https://analytics.adobe.io/api/{company_id}";

/// Create the HTTP client for API requests
/// with connection pooling and explicit timeouts
pub fn create_rest_client(config: &ClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .pool_max_idle_per_host(50)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(AnalyticsError::from)
}

/// Configuration for the Analytics client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// JWT exchange endpoint
    pub exchange_endpoint: String,
    /// API base URL, may contain the `{company_id}` placeholder
    pub base_url: String,
    /// Total timeout of a single request
    pub timeout: Duration,
    /// Connect timeout of a single request
    pub connect_timeout: Duration,
    /// Retry policy for the token exchange and report pages
    pub retry: RetryPolicy,
    /// Number of report tables kept in the history
    pub history_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            exchange_endpoint: EXCHANGE_ENDPOINT.to_string(),
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            history_capacity: 16,
        }
    }
}

impl ClientConfig {
    /// Override the JWT exchange endpoint
    pub fn with_exchange_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.exchange_endpoint = endpoint.into();
        self
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set how many tables the report history keeps
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

/// Retry policy for transient network failures.
///
/// Only [`AnalyticsError::Network`] errors are retried. Server rejections,
/// including refused credentials, fail on the first attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), never above `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!(%e, attempt = attempt + 1, ?delay, "{} failed, retrying", what);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
