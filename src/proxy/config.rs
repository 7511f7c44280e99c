//! Run configuration captured once at run start

use crate::error::ConfigError;
use crate::proxy::models::ProxyScheme;
use reqwest::Url;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default per-probe timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of concurrent probes
pub const DEFAULT_MAX_CONCURRENT: usize = 50;

/// Largest bound the admission semaphore can hold
pub const MAX_CONCURRENT_LIMIT: usize = Semaphore::MAX_PERMITS;

/// Endpoint every probe requests through the candidate proxy
pub const DEFAULT_PROBE_URL: &str = "https://api.ipquery.io/?format=json&filter=location";

/// Configuration for one validation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Scheme applied to every record for the run
    pub scheme: ProxyScheme,
    /// Timeout for each probe, covering connect and full response
    pub timeout: Duration,
    /// Upper bound on simultaneous probes
    pub max_concurrent: usize,
    /// URL requested through each proxy
    pub probe_url: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scheme: ProxyScheme::Http,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            probe_url: DEFAULT_PROBE_URL.to_string(),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scheme(mut self, scheme: ProxyScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    /// Build a configuration from raw form fields.
    ///
    /// An empty concurrency field falls back to [`DEFAULT_MAX_CONCURRENT`];
    /// the timeout field is required and counted in whole seconds.
    pub fn from_inputs(
        scheme: &str,
        timeout_secs: &str,
        max_concurrent: &str,
    ) -> Result<Self, ConfigError> {
        let scheme: ProxyScheme = scheme.parse()?;
        let timeout = parse_number::<u64>("timeout", timeout_secs)?;

        let max_concurrent = if max_concurrent.trim().is_empty() {
            DEFAULT_MAX_CONCURRENT
        } else {
            parse_number::<usize>("thread count", max_concurrent)?
        };

        let config = Self::new()
            .with_scheme(scheme)
            .with_timeout(Duration::from_secs(timeout))
            .with_max_concurrent(max_concurrent);
        config.validate()?;
        Ok(config)
    }

    /// Check every field before a run may start
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CONCURRENT_LIMIT).contains(&self.max_concurrent) {
            return Err(ConfigError::InvalidConcurrency(self.max_concurrent));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }

        let url = Url::parse(&self.probe_url).map_err(|e| ConfigError::InvalidProbeUrl {
            url: self.probe_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidProbeUrl {
                url: self.probe_url.clone(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_default() {
        let config = RunConfig::default();
        assert_eq!(config.scheme, ProxyScheme::Http);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.probe_url, DEFAULT_PROBE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new()
            .with_scheme(ProxyScheme::Socks5)
            .with_timeout(Duration::from_secs(30))
            .with_max_concurrent(20)
            .with_probe_url("http://example.com");

        assert_eq!(config.scheme, ProxyScheme::Socks5);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrent, 20);
        assert_eq!(config.probe_url, "http://example.com");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = RunConfig::new().with_max_concurrent(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidConcurrency(0)));
    }

    #[test]
    fn test_oversized_concurrency_rejected() {
        let config = RunConfig::new().with_max_concurrent(usize::MAX);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency(usize::MAX))
        );

        let config = RunConfig::new().with_max_concurrent(MAX_CONCURRENT_LIMIT + 1);
        assert!(config.validate().is_err());
        let config = RunConfig::new().with_max_concurrent(MAX_CONCURRENT_LIMIT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = RunConfig::new().with_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimeout));
    }

    #[test]
    fn test_bad_probe_url_rejected() {
        let config = RunConfig::new().with_probe_url("not a url");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbeUrl { .. })
        ));

        let config = RunConfig::new().with_probe_url("ftp://example.com/file");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbeUrl { .. })
        ));
    }

    #[test]
    fn test_from_inputs() {
        let config = RunConfig::from_inputs("SOCKS4", "10", "25").unwrap();
        assert_eq!(config.scheme, ProxyScheme::Socks4);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrent, 25);
    }

    #[test]
    fn test_from_inputs_empty_threads_uses_default() {
        let config = RunConfig::from_inputs("http", "5", "").unwrap();
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
    }

    #[test]
    fn test_from_inputs_rejects_bad_numbers() {
        assert!(matches!(
            RunConfig::from_inputs("http", "abc", "10"),
            Err(ConfigError::InvalidNumber { field: "timeout", .. })
        ));
        assert!(matches!(
            RunConfig::from_inputs("http", "", "10"),
            Err(ConfigError::InvalidNumber { field: "timeout", .. })
        ));
        assert!(matches!(
            RunConfig::from_inputs("http", "5", "-3"),
            Err(ConfigError::InvalidNumber { field: "thread count", .. })
        ));
        assert_eq!(
            RunConfig::from_inputs("http", "5", "0"),
            Err(ConfigError::InvalidConcurrency(0))
        );
        assert_eq!(
            RunConfig::from_inputs("http", "0", "5"),
            Err(ConfigError::InvalidTimeout)
        );
        assert!(matches!(
            RunConfig::from_inputs("https", "5", "5"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
    }
}
