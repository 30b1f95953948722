use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use xml_api_client::error::{ArchiveResult, CacheResult};
use xml_api_client::{
    ArchiveStore, CacheStore, CallLog, CallParameters, CallTimer, RequestKey, Transport,
    TransportError,
};

/// Scripted transport that records every request it receives
pub struct MockTransport {
    responses: Mutex<Vec<MockResponse>>,
    request_log: Mutex<Vec<SentRequest>>,
}

#[derive(Clone, Debug)]
pub enum MockResponse {
    Body(Vec<u8>),
    Timeout,
    Status(u16),
}

#[derive(Clone, Debug)]
pub struct SentRequest {
    pub url: String,
    pub params: CallParameters,
}

impl MockTransport {
    /// Responses are served in order; the last one repeats
    pub fn new(responses: Vec<MockResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            request_log: Mutex::new(Vec::new()),
        })
    }

    pub fn body(xml: &str) -> Arc<Self> {
        Self::new(vec![MockResponse::Body(xml.as_bytes().to_vec())])
    }

    pub fn get_request_log(&self) -> Vec<SentRequest> {
        self.request_log.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, url: &str, params: &CallParameters) -> Result<Vec<u8>, TransportError> {
        self.request_log.lock().unwrap().push(SentRequest {
            url: url.to_string(),
            params: params.clone(),
        });

        let response = {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses
                    .first()
                    .cloned()
                    .unwrap_or(MockResponse::Status(500))
            }
        };

        match response {
            MockResponse::Body(body) => Ok(body),
            MockResponse::Timeout => Err(TransportError::Timeout {
                url: url.to_string(),
                timeout_seconds: 30,
            }),
            MockResponse::Status(status) => Err(TransportError::Status {
                url: url.to_string(),
                status,
                message: format!("HTTP {}", status),
            }),
        }
    }
}

/// In-memory cache that counts loads and saves
#[derive(Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    pub saves: Mutex<Vec<(RequestKey, Vec<u8>)>>,
    pub loads: Mutex<Vec<RequestKey>>,
}

impl RecordingCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pre-populate an entry, bypassing the save log
    pub fn seed(&self, key: &RequestKey, xml: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.cache_key(':'), xml.to_vec());
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn saved(&self) -> Vec<(RequestKey, Vec<u8>)> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheStore for RecordingCache {
    async fn load(&self, key: &RequestKey) -> CacheResult<Option<Vec<u8>>> {
        self.loads.lock().unwrap().push(key.clone());
        Ok(self.entries.lock().unwrap().get(&key.cache_key(':')).cloned())
    }

    async fn save(&self, key: &RequestKey, xml: &[u8]) -> CacheResult<()> {
        self.saves
            .lock()
            .unwrap()
            .push((key.clone(), xml.to_vec()));
        self.entries
            .lock()
            .unwrap()
            .insert(key.cache_key(':'), xml.to_vec());
        Ok(())
    }
}

/// Archive that keeps everything in memory
#[derive(Default)]
pub struct RecordingArchive {
    pub saves: Mutex<Vec<(RequestKey, Vec<u8>)>>,
}

impl RecordingArchive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn saved(&self) -> Vec<(RequestKey, Vec<u8>)> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveStore for RecordingArchive {
    async fn save(&self, key: &RequestKey, xml: &[u8]) -> ArchiveResult<()> {
        self.saves
            .lock()
            .unwrap()
            .push((key.clone(), xml.to_vec()));
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LogEvent {
    Start,
    Stop,
    Success {
        scope: String,
        operation: String,
        params: CallParameters,
        elapsed: Option<Duration>,
    },
    Error {
        scope: String,
        operation: String,
        params: CallParameters,
        message: String,
        elapsed: Option<Duration>,
    },
}

/// Logger that records every event in order
#[derive(Default)]
pub struct RecordingLog {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn successes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, LogEvent::Success { .. }))
            .count()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Error { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl CallLog for RecordingLog {
    fn start(&self) -> CallTimer {
        self.events.lock().unwrap().push(LogEvent::Start);
        CallTimer::start()
    }

    fn stop(&self, timer: CallTimer) -> Duration {
        self.events.lock().unwrap().push(LogEvent::Stop);
        timer.elapsed()
    }

    fn log(&self, scope: &str, operation: &str, params: &CallParameters, elapsed: Option<Duration>) {
        self.events.lock().unwrap().push(LogEvent::Success {
            scope: scope.to_string(),
            operation: operation.to_string(),
            params: params.clone(),
            elapsed,
        });
    }

    fn error_log(
        &self,
        scope: &str,
        operation: &str,
        params: &CallParameters,
        message: &str,
        elapsed: Option<Duration>,
    ) {
        self.events.lock().unwrap().push(LogEvent::Error {
            scope: scope.to_string(),
            operation: operation.to_string(),
            params: params.clone(),
            message: message.to_string(),
            elapsed,
        });
    }
}
