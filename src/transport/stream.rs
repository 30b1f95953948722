use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use ureq::{Agent, AgentBuilder};

use super::{Transport, status_message};
use crate::config::HttpConfig;
use crate::error::TransportError;
use crate::key::CallParameters;

/// Minimal transport reading the response as a plain blocking stream
///
/// Same configuration surface as [`super::ReqwestTransport`], no connection
/// pool tuning. Each request runs on tokio's blocking pool.
#[derive(Clone)]
pub struct StreamTransport {
    agent: Agent,
    post: bool,
    timeout: Option<Duration>,
}

impl StreamTransport {
    pub fn new(config: &HttpConfig) -> Self {
        let timeout = config.timeout_seconds.map(Duration::from_secs);

        let mut builder = AgentBuilder::new().user_agent(&config.user_agent());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Self {
            agent: builder.build(),
            post: config.post,
            timeout,
        }
    }

    fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<Vec<u8>, TransportError> {
        let response = if self.post {
            let request = self.agent.post(url);
            if params.is_empty() {
                request.call()
            } else {
                let form: Vec<(&str, &str)> = params
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                request.send_form(&form)
            }
        } else {
            params
                .iter()
                .fold(self.agent.get(url), |request, (k, v)| request.query(k, v))
                .call()
        };

        match response {
            Ok(response) => {
                let mut body = Vec::new();
                response
                    .into_reader()
                    .read_to_end(&mut body)
                    .map_err(|err| self.io_error(url, err))?;
                Ok(body)
            }
            Err(ureq::Error::Status(code, response)) => Err(TransportError::Status {
                url: url.to_string(),
                status: code,
                message: status_message(code, Some(response.status_text())),
            }),
            Err(ureq::Error::Transport(transport)) => {
                if let Some(io) = find_io_error(&transport) {
                    let err = std::io::Error::new(io.kind(), transport.to_string());
                    return Err(self.io_error(url, err));
                }
                Err(TransportError::Request {
                    url: url.to_string(),
                    message: transport.to_string(),
                })
            }
        }
    }

    fn io_error(&self, url: &str, err: std::io::Error) -> TransportError {
        match (self.timeout, err.kind()) {
            (Some(limit), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) => {
                TransportError::Timeout {
                    url: url.to_string(),
                    timeout_seconds: limit.as_secs(),
                }
            }
            _ => TransportError::Request {
                url: url.to_string(),
                message: err.to_string(),
            },
        }
    }
}

fn find_io_error(err: &ureq::Transport) -> Option<&std::io::Error> {
    let mut source = std::error::Error::source(err);
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            return Some(io);
        }
        source = current.source();
    }
    None
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send(&self, url: &str, params: &CallParameters) -> Result<Vec<u8>, TransportError> {
        let this = self.clone();
        let owned_url = url.to_string();
        let pairs: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        tokio::task::spawn_blocking(move || this.fetch(&owned_url, &pairs))
            .await
            .map_err(|err| TransportError::Request {
                url: url.to_string(),
                message: format!("transport task failed: {}", err),
            })?
    }
}
