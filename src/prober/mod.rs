//! Link probing engine
//!
//! Fans a batch of URLs out to concurrent reachability probes under a
//! global admission limit and fans the results back in preserving the
//! original input order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use reqwest::Client;
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Duration;
use url::{ParseError, Url};

use crate::config::Config;
use crate::core::constants::{probe_errors, probes, timeouts};
use crate::core::error::{LinkProbeError, Result};

/// Outcome of probing a single URL.
///
/// `status` is `0` when no response was obtained; `available` is true iff
/// a response arrived with a status in the success/redirect range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkResult {
    /// The exact input string that was probed
    pub url: String,
    /// Numeric HTTP status code, 0 if no response was obtainable
    pub status: u16,
    /// Whether a response with status in 200..400 was obtained
    pub available: bool,
    /// Classification of why the probe failed or availability is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the probe ran
    pub checked_at: DateTime<Utc>,
}

impl LinkResult {
    /// Create a result for a URL that produced an HTTP response.
    pub fn from_response(url: String, status: u16) -> Self {
        Self {
            url,
            status,
            available: (200..400).contains(&status),
            error: None,
            checked_at: Utc::now(),
        }
    }

    /// Create a result for a probe that obtained no response.
    pub fn failure(url: String, error: String) -> Self {
        Self {
            url,
            status: 0,
            available: false,
            error: Some(error),
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ProbeLinks {
    /// Probe every URL in `urls` and return one result per input, index-aligned.
    ///
    /// `None` is a caller error reported as a single synthetic failed result;
    /// an empty list is a valid zero-work batch and yields an empty result list.
    async fn check(&self, urls: Option<Vec<String>>) -> Vec<LinkResult>;
}

/// Concurrent link prober with a bounded admission gate.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    max_concurrent: usize,
}

impl Prober {
    /// Build a prober from configuration.
    ///
    /// Fails on a non-positive or excessive per-request timeout so that
    /// misconfiguration surfaces before any probing begins.
    pub fn new(config: &Config) -> Result<Self> {
        let timeout = config.timeout.unwrap_or(timeouts::DEFAULT_TIMEOUT_SECONDS);
        if timeout < timeouts::MIN_TIMEOUT_SECONDS {
            return Err(LinkProbeError::Config(format!(
                "probe timeout must be positive, got {timeout}s"
            )));
        }
        if timeout > timeouts::MAX_TIMEOUT_SECONDS {
            return Err(LinkProbeError::Config(format!(
                "probe timeout too large: {timeout}s (max {}s)",
                timeouts::MAX_TIMEOUT_SECONDS
            )));
        }

        let max_concurrent = config
            .max_concurrent_probes
            .unwrap_or(probes::MAX_CONCURRENT_PROBES);
        if max_concurrent == 0 {
            return Err(LinkProbeError::Config(
                "max_concurrent_probes must be at least 1".to_string(),
            ));
        }

        let user_agent = config.user_agent.as_deref().unwrap_or(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .connect_timeout(Duration::from_secs(timeouts::CONNECT_TIMEOUT_SECONDS))
            .redirect(Policy::limited(probes::MAX_REDIRECTS))
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            max_concurrent,
        })
    }
}

#[async_trait]
impl ProbeLinks for Prober {
    async fn check(&self, urls: Option<Vec<String>>) -> Vec<LinkResult> {
        let Some(urls) = urls else {
            return vec![LinkResult::failure(
                String::new(),
                probe_errors::MISSING_URL_LIST.to_string(),
            )];
        };
        if urls.is_empty() {
            return Vec::new();
        }

        let gate = Arc::new(Semaphore::new(self.max_concurrent));
        // Completion channel carries (original index, result) so the output
        // order never depends on completion order.
        let (tx, mut rx) = mpsc::channel::<(usize, LinkResult)>(urls.len());

        for (index, url) in urls.iter().enumerate() {
            let client = self.client.clone();
            let gate = Arc::clone(&gate);
            let tx = tx.clone();
            let url = url.clone();
            tokio::spawn(async move {
                // A fault inside one probe must not take down its siblings.
                let result = match AssertUnwindSafe(probe_url(&client, &gate, &url))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        LinkResult::failure(url, probe_errors::INTERNAL_FAULT.to_string())
                    }
                };
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<LinkResult>> = Vec::with_capacity(urls.len());
        slots.resize_with(urls.len(), || None);

        // The channel closes once every probe task has dropped its sender,
        // so this loop is the counting join over all dispatched probes.
        while let Some((index, result)) = rx.recv().await {
            slots[index] = Some(result);
        }

        slots
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| {
                    LinkResult::failure(url, probe_errors::INTERNAL_FAULT.to_string())
                })
            })
            .collect()
    }
}

/// Validate, parse and probe one URL, classifying every failure mode
/// into a `LinkResult` instead of an error.
async fn probe_url(client: &Client, gate: &Semaphore, raw_url: &str) -> LinkResult {
    let trimmed = raw_url.trim();
    if trimmed.is_empty() {
        return LinkResult::failure(raw_url.to_string(), probe_errors::EMPTY_URL.to_string());
    }

    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => parsed,
        Err(ParseError::RelativeUrlWithoutBase) => {
            return LinkResult::failure(
                raw_url.to_string(),
                format!("{}: missing scheme (http/https)", probe_errors::INVALID_URL),
            );
        }
        Err(ParseError::EmptyHost) => {
            return LinkResult::failure(
                raw_url.to_string(),
                format!("{}: missing host", probe_errors::INVALID_URL),
            );
        }
        Err(err) => {
            return LinkResult::failure(
                raw_url.to_string(),
                format!("{}: {err}", probe_errors::INVALID_URL),
            );
        }
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return LinkResult::failure(
                raw_url.to_string(),
                format!("{}: {scheme}", probe_errors::UNSUPPORTED_SCHEME),
            );
        }
    }

    if parsed.host_str().is_none() {
        return LinkResult::failure(
            raw_url.to_string(),
            format!("{}: missing host", probe_errors::INVALID_URL),
        );
    }

    // HEAD keeps the existence check cheap; fall back to GET only when the
    // HEAD request itself cannot be constructed.
    let request = match client.head(parsed.as_str()).build() {
        Ok(request) => request,
        Err(_) => match client.get(parsed.as_str()).build() {
            Ok(request) => request,
            Err(err) => {
                return LinkResult::failure(
                    raw_url.to_string(),
                    format!("{}: {err}", probe_errors::INVALID_URL),
                );
            }
        },
    };

    // Admission gate: held only for the duration of the network call and
    // released on every exit path, unwinding included.
    let permit = match gate.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            return LinkResult::failure(
                raw_url.to_string(),
                probe_errors::INTERNAL_FAULT.to_string(),
            );
        }
    };
    let response = client.execute(request).await;
    drop(permit);

    match response {
        Ok(response) => {
            let status = response.status();
            let mut result = LinkResult::from_response(raw_url.to_string(), status.as_u16());
            if status.as_u16() >= 400 {
                result.error = Some(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ));
            }
            result
        }
        Err(err) => LinkResult::failure(raw_url.to_string(), classify_error(&err)),
    }
}

/// Map a transport error onto the per-URL error taxonomy.
fn classify_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return format!("{}: {}", probe_errors::TIMEOUT, source_description(err));
    }
    if err.is_redirect() {
        return format!("{}: too many redirects", probe_errors::CONNECTION);
    }
    if is_dns_failure(err) {
        return format!("{}: {}", probe_errors::DNS, source_description(err));
    }
    if err.is_connect() {
        return format!("{}: {}", probe_errors::CONNECTION, source_description(err));
    }
    if err.is_builder() {
        return format!("{}: {err}", probe_errors::INVALID_URL);
    }
    format!("{}: {}", probe_errors::CONNECTION, source_description(err))
}

/// Name resolution failures surface deep in the error chain of a connect error.
fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = cause.source();
    }
    false
}

fn source_description(err: &reqwest::Error) -> String {
    std::error::Error::source(err)
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use mockito::Server;

    fn test_prober(timeout: u64) -> Prober {
        let config = Config {
            timeout: Some(timeout),
            max_concurrent_probes: Some(4),
            ..Default::default()
        };
        Prober::new(&config).expect("prober construction failed")
    }

    #[test]
    fn test_link_result__availability_follows_status_range() {
        assert!(LinkResult::from_response("irrelevant".to_string(), 200).available);
        assert!(LinkResult::from_response("irrelevant".to_string(), 301).available);
        assert!(LinkResult::from_response("irrelevant".to_string(), 399).available);
        assert!(!LinkResult::from_response("irrelevant".to_string(), 199).available);
        assert!(!LinkResult::from_response("irrelevant".to_string(), 400).available);
        assert!(!LinkResult::from_response("irrelevant".to_string(), 500).available);
    }

    #[test]
    fn test_link_result__failure_has_no_status() {
        let result = LinkResult::failure("http://a".to_string(), "boom".to_string());

        assert_eq!(result.status, 0);
        assert!(!result.available);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_prober__rejects_zero_timeout() {
        let config = Config {
            timeout: Some(0),
            ..Default::default()
        };

        assert!(matches!(
            Prober::new(&config),
            Err(LinkProbeError::Config(_))
        ));
    }

    #[test]
    fn test_prober__rejects_excessive_timeout() {
        let config = Config {
            timeout: Some(301),
            ..Default::default()
        };

        assert!(matches!(
            Prober::new(&config),
            Err(LinkProbeError::Config(_))
        ));
    }

    #[test]
    fn test_prober__rejects_zero_concurrency() {
        let config = Config {
            max_concurrent_probes: Some(0),
            ..Default::default()
        };

        assert!(matches!(
            Prober::new(&config),
            Err(LinkProbeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_check__when_list_missing__returns_synthetic_failure() {
        let prober = test_prober(1);

        let results = prober.check(None).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "");
        assert!(!results[0].available);
        assert_eq!(
            results[0].error.as_deref(),
            Some(probe_errors::MISSING_URL_LIST)
        );
    }

    #[tokio::test]
    async fn test_check__when_list_empty__returns_empty() {
        let prober = test_prober(1);

        let results = prober.check(Some(vec![])).await;

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_check__classifies_empty_url_without_network() {
        let prober = test_prober(1);

        let results = prober
            .check(Some(vec!["".to_string(), "   ".to_string()]))
            .await;

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.status, 0);
            assert!(!result.available);
            assert_eq!(result.error.as_deref(), Some(probe_errors::EMPTY_URL));
        }
        // The exact input string is preserved, whitespace included
        assert_eq!(results[1].url, "   ");
    }

    #[tokio::test]
    async fn test_check__classifies_missing_scheme() {
        let prober = test_prober(1);

        let results = prober.check(Some(vec!["not a url".to_string()])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].error.as_deref(),
            Some("invalid URL format: missing scheme (http/https)")
        );
    }

    #[tokio::test]
    async fn test_check__classifies_unsupported_scheme() {
        let prober = test_prober(1);

        let results = prober
            .check(Some(vec!["ftp://example.com/file".to_string()]))
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].error.as_deref(),
            Some("unsupported URL scheme: ftp")
        );
    }

    #[tokio::test]
    async fn test_check__classifies_missing_host() {
        let prober = test_prober(1);

        let results = prober.check(Some(vec!["http://".to_string()])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].error.as_deref(),
            Some("invalid URL format: missing host")
        );
    }

    #[tokio::test]
    async fn test_check__handles_url_with_status_code() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("HEAD", "/200")
            .with_status(200)
            .create_async()
            .await;
        let endpoint = server.url() + "/200";
        let prober = test_prober(5);

        let results = prober.check(Some(vec![endpoint.clone()])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, endpoint);
        assert_eq!(results[0].status, 200);
        assert!(results[0].available);
        assert_eq!(results[0].error, None);
    }

    #[tokio::test]
    async fn test_check__http_error_carries_reason_text() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("HEAD", "/404")
            .with_status(404)
            .create_async()
            .await;
        let endpoint = server.url() + "/404";
        let prober = test_prober(5);

        let results = prober.check(Some(vec![endpoint.clone()])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, 404);
        assert!(!results[0].available);
        assert_eq!(results[0].error.as_deref(), Some("HTTP 404: Not Found"));
    }

    #[tokio::test]
    async fn test_check__preserves_input_order() {
        let mut server = Server::new_async().await;
        let _m200 = server
            .mock("HEAD", "/200")
            .with_status(200)
            .create_async()
            .await;
        let _m503 = server
            .mock("HEAD", "/503")
            .with_status(503)
            .create_async()
            .await;
        let endpoint_200 = server.url() + "/200";
        let endpoint_503 = server.url() + "/503";
        let prober = test_prober(5);

        let urls = vec![
            endpoint_503.clone(),
            "not a url".to_string(),
            endpoint_200.clone(),
            "".to_string(),
        ];
        let results = prober.check(Some(urls.clone())).await;

        assert_eq!(results.len(), urls.len());
        for (result, url) in results.iter().zip(&urls) {
            assert_eq!(&result.url, url);
        }
        assert_eq!(results[0].status, 503);
        assert_eq!(results[2].status, 200);
        assert!(results[2].available);
    }

    #[tokio::test]
    async fn test_check__classifies_dns_failure() {
        let prober = test_prober(5);
        let endpoint = "https://non-existing-url.linkprobe".to_string();

        let results = prober.check(Some(vec![endpoint.clone()])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, endpoint);
        assert_eq!(results[0].status, 0);
        assert!(!results[0].available);
        assert!(
            results[0]
                .error
                .as_deref()
                .unwrap_or_default()
                .starts_with(probe_errors::DNS)
        );
    }

    #[tokio::test]
    async fn test_check__unreachable_address_fails() {
        let prober = test_prober(1);
        // RFC 5737 TEST-NET-1 address, never routable
        let endpoint = "http://192.0.2.1:81/unreachable".to_string();

        let results = prober.check(Some(vec![endpoint.clone()])).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, 0);
        assert!(!results[0].available);
        assert!(results[0].error.is_some());
    }

    // Counts concurrent in-flight requests with a hand-rolled transport to
    // observe the admission gate from the outside.
    #[tokio::test]
    async fn test_check__respects_concurrency_ceiling() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        break;
                    };
                    let current = Arc::clone(&current);
                    let peak = Arc::clone(&peak);
                    tokio::spawn(async move {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);

                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        let _ = socket
                            .write_all(
                                b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                            )
                            .await;
                        current.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            });
        }

        let config = Config {
            timeout: Some(5),
            max_concurrent_probes: Some(2),
            ..Default::default()
        };
        let prober = Prober::new(&config).expect("prober");
        let urls: Vec<String> = (0..6).map(|i| format!("http://{addr}/{i}")).collect();

        let results = prober.check(Some(urls)).await;

        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|result| result.available));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    // One syntactically invalid URL, one non-resolving host, one unreachable
    // address and one healthy endpoint, submitted together.
    #[tokio::test]
    async fn test_check__mixed_batch_scenario() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("HEAD", "/ok")
            .with_status(200)
            .create_async()
            .await;
        let healthy = server.url() + "/ok";
        let prober = test_prober(2);

        let urls = vec![
            "not a url".to_string(),
            "https://non-existing-url.linkprobe".to_string(),
            "http://192.0.2.1:81/stuck".to_string(),
            healthy.clone(),
        ];
        let results = prober.check(Some(urls.clone())).await;

        assert_eq!(results.len(), 4);
        for (result, url) in results.iter().zip(&urls) {
            assert_eq!(&result.url, url);
        }

        let available: Vec<_> = results.iter().filter(|r| r.available).collect();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].url, healthy);

        assert!(
            results[0]
                .error
                .as_deref()
                .unwrap_or_default()
                .starts_with(probe_errors::INVALID_URL)
        );
        assert!(
            results[1]
                .error
                .as_deref()
                .unwrap_or_default()
                .starts_with(probe_errors::DNS)
        );
        assert!(results[2].error.is_some());
        assert_eq!(results[3].error, None);
    }
}
