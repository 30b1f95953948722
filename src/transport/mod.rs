//! HTTP transports
//!
//! The orchestrator only needs "send this request, give me the body or fail".
//! Two adapters implement [`Transport`]:
//!
//! - [`ReqwestTransport`]: async reqwest client with user agent, timeout and
//!   connection pooling.
//! - [`StreamTransport`]: minimal blocking fetch through `ureq`, run on the
//!   blocking thread pool.
//!
//! Exactly one is chosen when the client is built, see [`from_config`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{HttpBackend, HttpConfig};
use crate::error::TransportError;
use crate::key::CallParameters;

mod full;
mod stream;

pub use full::ReqwestTransport;
pub use stream::StreamTransport;

/// Capability to perform one HTTP request and return the raw body
///
/// Method, user agent and timeout are fixed when the transport is built.
/// Empty `params` attach neither a query string nor a form body.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, params: &CallParameters) -> Result<Vec<u8>, TransportError>;
}

/// Build the transport selected by `config.backend`
pub fn from_config(config: &HttpConfig) -> Result<Arc<dyn Transport>, TransportError> {
    let transport: Arc<dyn Transport> = match config.backend {
        HttpBackend::Reqwest => Arc::new(ReqwestTransport::new(config)?),
        HttpBackend::Stream => Arc::new(StreamTransport::new(config)),
    };
    Ok(transport)
}

/// `"HTTP 404: Not Found"`
fn status_message(code: u16, reason: Option<&str>) -> String {
    format!("HTTP {}: {}", code, reason.unwrap_or("Unknown"))
}
