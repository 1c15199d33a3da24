//! Retrying layer over [`Transport`]: turns one unreliable request into a
//! resilient call that yields a decoded payload.
//!
//! Transient transport failures (connection, timeout, protocol, peer reset)
//! are retried with a linear backoff of `(max_retries * 1.5) - remaining`
//! seconds; the budget allows exactly `max_retries` attempts before the last
//! transient error propagates as [`FetchError::Exhausted`]. Decode failures
//! are permanent and never retried.

use std::sync::Arc;

use reqwest::Method;
use scraper::Html;
use std::time::Duration;
use thiserror::Error;

use super::tls_quiet;
use super::transport::{RawResponse, SendOptions, Transport, TransportError};

pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Retry budget exhausted; carries the last transient error.
    #[error("retries exhausted after {attempts} attempts for {url}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    /// Non-transient transport failure (bad URL, transport shut down).
    #[error(transparent)]
    Fatal(TransportError),
    /// Body is not valid UTF-8 (text decode only; markup decodes lossily).
    #[error("response body is not valid UTF-8")]
    DecodeText(#[source] std::string::FromUtf8Error),
    #[error("response body is not valid JSON: {0}")]
    DecodeJson(#[source] serde_json::Error),
}

#[derive(Clone)]
pub struct Requester {
    transport: Arc<Transport>,
    max_retries: u32,
}

impl Requester {
    /// A zero budget makes no sense for a retrying requester; it is bumped
    /// to a single attempt.
    pub fn new(transport: Arc<Transport>, max_retries: u32) -> Self {
        Self {
            transport,
            max_retries: max_retries.max(1),
        }
    }

    /// GET `url` and return the body as a UTF-8 string.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let raw = self.send(Method::GET, url, SendOptions::default()).await?;
        String::from_utf8(raw.body).map_err(FetchError::DecodeText)
    }

    /// GET `url` and parse the body as a lenient HTML document tree.
    /// Parsing itself cannot fail; invalid bytes are decoded lossily.
    pub async fn fetch_markup(&self, url: &str) -> Result<Html, FetchError> {
        let raw = self.send(Method::GET, url, SendOptions::default()).await?;
        Ok(Html::parse_document(&String::from_utf8_lossy(&raw.body)))
    }

    /// GET `url` and parse the body as JSON, regardless of the declared
    /// content type.
    pub async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let raw = self.send(Method::GET, url, SendOptions::default()).await?;
        serde_json::from_slice(&raw.body).map_err(FetchError::DecodeJson)
    }

    /// Retrying send with explicit method and request parts.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        opts: SendOptions<'_>,
    ) -> Result<RawResponse, FetchError> {
        // Installed for the whole call, dropped on every exit path
        let _quiet = tls_quiet::suppress();

        let mut remaining = self.max_retries;
        loop {
            match self.transport.send(method.clone(), url, opts).await {
                Ok(raw) => return Ok(raw),
                Err(err) if err.is_transient() => {
                    let wait = backoff(self.max_retries, remaining);
                    tracing::warn!(
                        url = url,
                        error = %err,
                        remaining = remaining - 1,
                        wait_secs = wait.as_secs_f64(),
                        "transient fetch failure, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    remaining -= 1;
                    if remaining == 0 {
                        return Err(FetchError::Exhausted {
                            url: url.to_string(),
                            attempts: self.max_retries,
                            source: err,
                        });
                    }
                }
                Err(err) => return Err(FetchError::Fatal(err)),
            }
        }
    }
}

/// Wait before the next attempt: `(max_retries * 1.5) - remaining` seconds,
/// clamped at zero. The wait grows as the budget shrinks.
fn backoff(max_retries: u32, remaining: u32) -> Duration {
    let secs = (f64::from(max_retries) * 1.5) - f64::from(remaining);
    Duration::from_secs_f64(secs.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transport::TransportConfig;
    use wiremock::matchers::{any, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn requester_with_timeout(timeout_ms: u64, max_retries: u32) -> Requester {
        let transport = Transport::new(&TransportConfig {
            total_timeout: Duration::from_millis(timeout_ms),
            ..TransportConfig::default()
        })
        .unwrap();
        Requester::new(Arc::new(transport), max_retries)
    }

    #[test]
    fn test_backoff_follows_formula() {
        assert_eq!(backoff(5, 5), Duration::from_secs_f64(2.5));
        assert_eq!(backoff(5, 4), Duration::from_secs_f64(3.5));
        assert_eq!(backoff(5, 1), Duration::from_secs_f64(6.5));
    }

    #[test]
    fn test_backoff_monotonic_and_never_negative() {
        for max_retries in 1..=6u32 {
            let mut last = Duration::ZERO;
            for remaining in (1..=max_retries).rev() {
                let wait = backoff(max_retries, remaining);
                assert!(wait >= last, "waits must not shrink across retries");
                last = wait;
            }
        }
        // Degenerate budgets clamp instead of going negative
        assert_eq!(backoff(0, 5), Duration::ZERO);
        assert_eq!(backoff(1, 2), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fetch_text_success_first_attempt() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain body"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let requester = requester_with_timeout(5_000, 5);
        let text = requester.fetch_text(&mock_server.uri()).await.unwrap();
        assert_eq!(text, "plain body");
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let mock_server = MockServer::start().await;
        // First attempt stalls past the timeout, second responds
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&mock_server)
            .await;

        let requester = requester_with_timeout(200, 3);
        let text = requester.fetch_text(&mock_server.uri()).await.unwrap();
        assert_eq!(text, "recovered");
    }

    #[tokio::test]
    async fn test_exhausted_after_exact_attempt_count() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .expect(2)
            .mount(&mock_server)
            .await;

        let requester = requester_with_timeout(150, 2);
        let err = requester.fetch_text(&mock_server.uri()).await.unwrap_err();
        match err {
            FetchError::Exhausted {
                attempts, source, ..
            } => {
                assert_eq!(attempts, 2);
                assert!(source.is_transient());
            }
            e => panic!("expected Exhausted, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_bad_url_is_fatal_not_retried() {
        let requester = requester_with_timeout(1_000, 5);
        let err = requester.fetch_text("definitely not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Fatal(TransportError::BadUrl(_))));
    }

    #[tokio::test]
    async fn test_json_decodes_despite_content_type() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"headline": "ok"}"#)
                    .insert_header("Content-Type", "text/html"),
            )
            .mount(&mock_server)
            .await;

        let requester = requester_with_timeout(5_000, 5);
        let value = requester.fetch_json(&mock_server.uri()).await.unwrap();
        assert_eq!(value["headline"], "ok");
    }

    #[tokio::test]
    async fn test_decode_failure_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not json>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let requester = requester_with_timeout(5_000, 5);
        let err = requester.fetch_json(&mock_server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::DecodeJson(_)));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_permanent_decode_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0xfd]))
            .expect(1)
            .mount(&mock_server)
            .await;

        let requester = requester_with_timeout(5_000, 5);
        let err = requester.fetch_text(&mock_server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::DecodeText(_)));
    }

    #[tokio::test]
    async fn test_markup_decodes_lossily() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .mount(&mock_server)
            .await;

        let requester = requester_with_timeout(5_000, 5);
        let document = requester.fetch_markup(&mock_server.uri()).await.unwrap();
        let selector = scraper::Selector::parse("p").unwrap();
        let text: String = document.select(&selector).next().unwrap().text().collect();
        assert_eq!(text, "hello");
    }
}
