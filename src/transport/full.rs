use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tokio::time::timeout;

use super::{Transport, status_message};
use crate::config::HttpConfig;
use crate::error::TransportError;
use crate::key::CallParameters;

/// Async reqwest-backed transport
pub struct ReqwestTransport {
    client: Client,
    post: bool,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Create a new transport with the given configuration
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let timeout = config.timeout_seconds.map(Duration::from_secs);

        let mut builder = Client::builder()
            .user_agent(config.user_agent())
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            post: config.post,
            timeout,
        })
    }

    fn request(&self, url: &str, params: &CallParameters) -> RequestBuilder {
        let request = if self.post {
            self.client.post(url)
        } else {
            self.client.get(url)
        };

        match (params.is_empty(), self.post) {
            (true, _) => request,
            (false, true) => request.form(params.as_map()),
            (false, false) => request.query(params.as_map()),
        }
    }

    /// Send with the outer timeout applied
    async fn make_request(&self, url: &str, params: &CallParameters) -> Result<Response, TransportError> {
        let request_future = self.request(url, params).send();

        let response = match self.timeout {
            Some(limit) => timeout(limit, request_future)
                .await
                .map_err(|_| TransportError::Timeout {
                    url: url.to_string(),
                    timeout_seconds: limit.as_secs(),
                })?,
            None => request_future.await,
        };

        response.map_err(|err| self.map_error(url, err))
    }

    fn map_error(&self, url: &str, err: reqwest::Error) -> TransportError {
        match self.timeout {
            Some(limit) if err.is_timeout() => TransportError::Timeout {
                url: url.to_string(),
                timeout_seconds: limit.as_secs(),
            },
            _ => TransportError::Http(err),
        }
    }

    /// Get the underlying reqwest client (for advanced usage)
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, url: &str, params: &CallParameters) -> Result<Vec<u8>, TransportError> {
        let response = self.make_request(url, params).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: status_message(status.as_u16(), status.canonical_reason()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.map_error(url, err))?;
        Ok(bytes.to_vec())
    }
}
