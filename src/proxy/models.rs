//! Proxy data models

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Proxy scheme used to route a probe through a candidate proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProxyScheme {
    #[default]
    Http,
    Socks4,
    Socks5,
}

impl ProxyScheme {
    /// Lower-case scheme used in proxy URLs
    pub fn url_scheme(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Socks4 => "socks4",
            ProxyScheme::Socks5 => "socks5",
        }
    }

    /// Upper-case label shown in the result table
    pub fn label(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "HTTP",
            ProxyScheme::Socks4 => "SOCKS4",
            ProxyScheme::Socks5 => "SOCKS5",
        }
    }

    /// Build the `scheme://address` proxy endpoint
    pub fn proxy_url(&self, address: &str) -> String {
        format!("{}://{}", self.url_scheme(), address)
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ProxyScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(ProxyScheme::Http),
            "socks4" => Ok(ProxyScheme::Socks4),
            "socks5" => Ok(ProxyScheme::Socks5),
            _ => Err(ConfigError::UnsupportedScheme(s.to_string())),
        }
    }
}

/// Probe classification of a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProbeStatus {
    #[default]
    Pending,
    Success,
    Failed,
    InvalidAddress,
}

impl ProbeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeStatus::Pending => "Pending",
            ProbeStatus::Success => "Success",
            ProbeStatus::Failed => "Failed",
            ProbeStatus::InvalidAddress => "Invalid Address",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProbeStatus::Pending)
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeStatus::Success)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome reported by a probe executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub elapsed: Duration,
}

impl ProbeOutcome {
    pub fn new(status: ProbeStatus, elapsed: Duration) -> Self {
        Self { status, elapsed }
    }

    pub fn success(elapsed: Duration) -> Self {
        Self::new(ProbeStatus::Success, elapsed)
    }

    pub fn failed(elapsed: Duration) -> Self {
        Self::new(ProbeStatus::Failed, elapsed)
    }

    pub fn invalid_address(elapsed: Duration) -> Self {
        Self::new(ProbeStatus::InvalidAddress, elapsed)
    }
}

/// One candidate proxy and its latest probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRecord {
    pub address: String,
    pub scheme: ProxyScheme,
    #[serde(with = "latency_ms")]
    pub latency: Duration,
    pub status: ProbeStatus,
}

impl ProxyRecord {
    /// Create a pending record
    pub fn new(address: String, scheme: ProxyScheme) -> Self {
        Self {
            address,
            scheme,
            latency: Duration::ZERO,
            status: ProbeStatus::Pending,
        }
    }

    /// Proxy URL handed out by the copy action
    pub fn proxy_url(&self) -> String {
        self.scheme.proxy_url(&self.address)
    }

    /// Latency formatted for the result table
    pub fn latency_display(&self) -> String {
        if self.status.is_terminal() {
            format!("{}ms", self.latency.as_millis())
        } else {
            "-".to_string()
        }
    }

    pub(crate) fn reset(&mut self, scheme: ProxyScheme) {
        self.scheme = scheme;
        self.latency = Duration::ZERO;
        self.status = ProbeStatus::Pending;
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.proxy_url())
    }
}

mod latency_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(latency: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(latency.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
