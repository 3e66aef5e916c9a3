//! Shared HTTP Client Module
//!
//! One lazily built `reqwest::Client` for every completion request, so the
//! connection to the completion service is reused across pipeline stages.
//!
//! No request timeout is set. Local models can take minutes on long
//! prompts and retry policy belongs to the pipeline, not the transport.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Global HTTP client for completion service calls
pub static COMPLETION_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create completion HTTP client")
});

/// Get the global completion HTTP client
#[inline]
pub fn completion_client() -> &'static Client {
    &COMPLETION_CLIENT
}
