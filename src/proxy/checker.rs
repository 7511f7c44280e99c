//! Probe executor: one request through one candidate proxy

use crate::proxy::models::{ProbeOutcome, ProbeStatus, ProxyScheme};
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode, Url};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A single reachability check through a proxy.
///
/// `target` is the URL requested through the proxy; the controller passes the
/// one captured in the run configuration. Implementations must not retry and
/// must report the wall-clock time from the start of the call to the
/// classification, whatever the outcome.
pub trait Probe: Send + Sync {
    fn probe(
        &self,
        address: &str,
        scheme: ProxyScheme,
        target: &str,
        timeout: Duration,
    ) -> impl Future<Output = ProbeOutcome> + Send;
}

impl<P: Probe> Probe for Arc<P> {
    fn probe(
        &self,
        address: &str,
        scheme: ProxyScheme,
        target: &str,
        timeout: Duration,
    ) -> impl Future<Output = ProbeOutcome> + Send {
        (**self).probe(address, scheme, target, timeout)
    }
}

/// Probe that fetches the target URL through the proxy over HTTP
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProbe;

impl HttpProbe {
    async fn classify(
        &self,
        address: &str,
        scheme: ProxyScheme,
        target: &str,
        timeout: Duration,
    ) -> ProbeStatus {
        let Some(proxy) = connector_proxy(address, scheme) else {
            return ProbeStatus::InvalidAddress;
        };

        let client = match Client::builder()
            .proxy(proxy)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                debug!(address, error = %e, "failed to build proxied client");
                return ProbeStatus::Failed;
            }
        };

        // The client timeout already covers the body, the outer bound also
        // covers DNS and proxy handshakes that the connector does not time.
        match tokio::time::timeout(timeout, fetch(&client, target)).await {
            Ok(Ok(true)) => ProbeStatus::Success,
            Ok(Ok(false)) => ProbeStatus::Failed,
            Ok(Err(e)) => {
                debug!(address, error = %e, "probe request failed");
                ProbeStatus::Failed
            }
            Err(_) => {
                debug!(address, ?timeout, "probe timed out");
                ProbeStatus::Failed
            }
        }
    }
}

impl Probe for HttpProbe {
    async fn probe(
        &self,
        address: &str,
        scheme: ProxyScheme,
        target: &str,
        timeout: Duration,
    ) -> ProbeOutcome {
        let start = Instant::now();
        let status = self.classify(address, scheme, target, timeout).await;
        ProbeOutcome::new(status, start.elapsed())
    }
}

/// Parse `scheme://address` into a proxy the connector accepts
fn connector_proxy(address: &str, scheme: ProxyScheme) -> Option<ReqwestProxy> {
    let endpoint = scheme.proxy_url(address);
    let url = match Url::parse(&endpoint) {
        Ok(url) => url,
        Err(e) => {
            debug!(%endpoint, error = %e, "unparseable proxy endpoint");
            return None;
        }
    };
    url.host_str()?;

    match ReqwestProxy::all(url) {
        Ok(proxy) => Some(proxy),
        Err(e) => {
            debug!(%endpoint, error = %e, "proxy endpoint rejected by connector");
            None
        }
    }
}

/// `Ok(true)` only for a 200 response with a non-empty body
async fn fetch(client: &Client, url: &str) -> reqwest::Result<bool> {
    let response = client.get(url).send().await?;
    if response.status() != StatusCode::OK {
        debug!(status = %response.status(), "probe endpoint returned non-200");
        return Ok(false);
    }
    let body = response.bytes().await?;
    Ok(!body.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::config::DEFAULT_PROBE_URL;

    #[test]
    fn test_connector_proxy_accepts_host_port() {
        assert!(connector_proxy("127.0.0.1:8080", ProxyScheme::Http).is_some());
        assert!(connector_proxy("127.0.0.1:1080", ProxyScheme::Socks4).is_some());
        assert!(connector_proxy("127.0.0.1:1080", ProxyScheme::Socks5).is_some());
    }

    #[tokio::test]
    async fn test_socks4_refused_port_is_failed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = HttpProbe
            .probe(
                &addr.to_string(),
                ProxyScheme::Socks4,
                DEFAULT_PROBE_URL,
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(outcome.status, ProbeStatus::Failed);
    }

    #[test]
    fn test_connector_proxy_rejects_unparseable_endpoint() {
        assert!(connector_proxy("bad addr", ProxyScheme::Http).is_none());
        assert!(connector_proxy("127.0.0.1:99999", ProxyScheme::Http).is_none());
        assert!(connector_proxy("", ProxyScheme::Http).is_none());
    }

    #[tokio::test]
    async fn test_probe_invalid_address_is_immediate() {
        let outcome = HttpProbe
            .probe(
                "bad addr",
                ProxyScheme::Http,
                DEFAULT_PROBE_URL,
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(outcome.status, ProbeStatus::InvalidAddress);
        assert!(outcome.elapsed < Duration::from_secs(1));
    }
}
