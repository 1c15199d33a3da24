//! Raw HTTP transport: one shared connection pool with per-host concurrency
//! caps and a total-request timeout. Issues single requests without retry;
//! resilience lives one layer up in the requester.

use std::collections::HashMap;
use std::error::Error as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

use super::tls_quiet;

pub const DEFAULT_PER_HOST_LIMIT: usize = 200;
pub const DEFAULT_TOTAL_TIMEOUT_SECS: u64 = 300;

/// Browser-like user agent; several article sources serve stripped-down
/// markup (or none at all) to obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_1) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/75.0.3770.142 Safari/537.36";

/// Transport-level failures. The first three classes are transient and
/// eligible for retry by the requester; the rest fail the call outright.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, connect, TLS handshake, or peer-reset failure
    #[error("connection failed: {0}")]
    Connection(#[source] reqwest::Error),
    /// Total request timeout exceeded (send through body read)
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    /// HTTP-level breakage: invalid response framing, decode errors,
    /// truncated bodies
    #[error("protocol error: {0}")]
    Protocol(#[source] reqwest::Error),
    /// The request URL could not be parsed
    #[error("invalid request URL: {0}")]
    BadUrl(#[from] url::ParseError),
    /// The connection pool has already been released
    #[error("transport already shut down")]
    Closed,
}

impl TransportError {
    /// True for failures expected to resolve themselves on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Connection(_) | TransportError::Timeout(_) | TransportError::Protocol(_)
        )
    }
}

/// Fixed at construction; the transport is shared by every concurrent task.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub per_host_limit: usize,
    pub total_timeout: Duration,
    /// Off by default: article sources commonly present misconfigured
    /// certificates, and a failed crawl is worse than an unverified one.
    pub verify_tls: bool,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            per_host_limit: DEFAULT_PER_HOST_LIMIT,
            total_timeout: Duration::from_secs(DEFAULT_TOTAL_TIMEOUT_SECS),
            verify_tls: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Optional request parts for [`Transport::send`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions<'a> {
    pub body: Option<&'a str>,
    pub params: &'a [(&'a str, &'a str)],
    pub headers: &'a [(&'a str, &'a str)],
}

/// A fully read response. Status is reported but never treated as an error;
/// an error page simply fails extraction downstream.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

pub struct Transport {
    client: reqwest::Client,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
    per_host_limit: usize,
    closed: AtomicBool,
}

impl Transport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.total_timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(TransportError::Protocol)?;
        Ok(Self {
            client,
            hosts: Mutex::new(HashMap::new()),
            per_host_limit: config.per_host_limit.max(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Issues one request and reads the full body while holding a per-host
    /// permit. Fails with a classified [`TransportError`]; never retries.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        opts: SendOptions<'_>,
    ) -> Result<RawResponse, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let parsed = Url::parse(url)?;
        let permit = self
            .host_permits(&parsed)
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Closed)?;

        // Redacted view only: body size and param keys, never values
        tracing::debug!(
            method = %method,
            url = %parsed,
            body_bytes = opts.body.map(|b| b.len()),
            params = ?opts.params.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            "dispatching request"
        );

        let mut request = self.client.request(method, parsed);
        if !opts.params.is_empty() {
            request = request.query(opts.params);
        }
        if let Some(body) = opts.body {
            request = request.body(body.to_string());
        }
        for (name, value) in opts.headers {
            match (HeaderName::try_from(*name), HeaderValue::try_from(*value)) {
                (Ok(name), Ok(value)) => request = request.header(name, value),
                _ => tracing::warn!(header = name, "dropping malformed request header"),
            }
        }

        let result = async {
            let response = request.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        }
        .await;
        drop(permit);

        match result {
            Ok((status, bytes)) => {
                tracing::debug!(status = %status, bytes = bytes.len(), "response received");
                Ok(RawResponse {
                    status,
                    body: bytes.to_vec(),
                })
            }
            Err(err) => {
                let err = classify(err);
                if tls_quiet::suppressed() && is_tls_related(&err) {
                    tracing::debug!(url = url, error = %err, "TLS-related request failure (noise suppressed)");
                } else {
                    tracing::warn!(url = url, error = %err, "request failed");
                }
                Err(err)
            }
        }
    }

    /// Releases the connection pool. Idempotent; only the first call has
    /// effect, later sends fail with [`TransportError::Closed`].
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("transport connection pool released");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn host_permits(&self, url: &Url) -> Arc<Semaphore> {
        let host = url.host_str().unwrap_or_default().to_string();
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)))
            .clone()
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err)
    } else if err.is_connect() || is_peer_reset(&err) {
        TransportError::Connection(err)
    } else {
        TransportError::Protocol(err)
    }
}

fn is_peer_reset(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

fn is_tls_related(err: &TransportError) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("certificate")
            || text.contains("tls")
            || text.contains("ssl")
            || text.contains("handshake")
        {
            return true;
        }
        source = cause.source();
    }
    false
}
