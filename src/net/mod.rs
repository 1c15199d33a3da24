mod requester;
pub mod tls_quiet;
mod transport;

pub use requester::{FetchError, Requester, DEFAULT_MAX_RETRIES};
pub use transport::{
    RawResponse, SendOptions, Transport, TransportConfig, TransportError, DEFAULT_PER_HOST_LIMIT,
    DEFAULT_TOTAL_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
