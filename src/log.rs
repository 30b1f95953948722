//! Call logging
//!
//! [`CallLog`] brackets each network fetch with `start`/`stop` and records one
//! line per completed or failed call. [`TracingLog`] emits these as structured
//! `tracing` events under the `xml_api_client::calls` target.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::LogConfig;
use crate::key::{API_KEY_PARAM, CallParameters, PUBLIC_PARTITION, USER_ID_PARAM};

/// Start of one network request
///
/// Each call owns its timer, so calls sharing a logger never see each other's
/// timings.
#[derive(Debug, Clone, Copy)]
pub struct CallTimer {
    started: Instant,
}

impl CallTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Sink for one line per finished call
///
/// `elapsed` is `None` when no network request was made, e.g. a cache hit.
pub trait CallLog: Send + Sync {
    /// Start timing a network request
    fn start(&self) -> CallTimer {
        CallTimer::start()
    }

    /// Stop timing; called on every outcome of the request
    fn stop(&self, timer: CallTimer) -> Duration {
        timer.elapsed()
    }

    /// Record a successful call
    fn log(&self, scope: &str, operation: &str, params: &CallParameters, elapsed: Option<Duration>);

    /// Record a failed call (transport, parse or API-level error)
    fn error_log(
        &self,
        scope: &str,
        operation: &str,
        params: &CallParameters,
        message: &str,
        elapsed: Option<Duration>,
    );
}

/// Logger that records nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl CallLog for NullLog {
    fn log(&self, _scope: &str, _operation: &str, _params: &CallParameters, _elapsed: Option<Duration>) {}

    fn error_log(
        &self,
        _scope: &str,
        _operation: &str,
        _params: &CallParameters,
        _message: &str,
        _elapsed: Option<Duration>,
    ) {
    }
}

/// Build the logger selected by `config.enabled`
pub fn from_config(config: &LogConfig) -> Arc<dyn CallLog> {
    if config.enabled {
        Arc::new(TracingLog::new())
    } else {
        Arc::new(NullLog)
    }
}

/// Logger backed by `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl TracingLog {
    pub fn new() -> Self {
        Self
    }
}

fn millis(elapsed: Option<Duration>) -> Option<u64> {
    elapsed.map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Parameters rendered for logs, with the API key masked
pub fn format_params(params: &CallParameters) -> String {
    params
        .iter()
        .map(|(name, value)| {
            if name == API_KEY_PARAM {
                format!("{}={}", name, mask(value))
            } else {
                format!("{}={}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{}...", visible)
}

fn partition(params: &CallParameters) -> &str {
    params.get(USER_ID_PARAM).unwrap_or(PUBLIC_PARTITION)
}

impl CallLog for TracingLog {
    fn log(&self, scope: &str, operation: &str, params: &CallParameters, elapsed: Option<Duration>) {
        tracing::info!(
            target: "xml_api_client::calls",
            partition = partition(params),
            scope,
            operation,
            params = %format_params(params),
            elapsed_ms = millis(elapsed),
            "API call succeeded"
        );
    }

    fn error_log(
        &self,
        scope: &str,
        operation: &str,
        params: &CallParameters,
        message: &str,
        elapsed: Option<Duration>,
    ) {
        tracing::error!(
            target: "xml_api_client::calls",
            partition = partition(params),
            scope,
            operation,
            params = %format_params(params),
            elapsed_ms = millis(elapsed),
            error = message,
            "API call failed"
        );
    }
}
