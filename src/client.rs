//! Request orchestration
//!
//! [`ApiClient::call_scoped`] runs one call through a fixed pipeline:
//!
//! 1. merge configured default parameters under the caller's, drop empty values
//! 2. cache lookup; a hit is parsed and returned without touching the network
//! 3. on a miss, fetch through the transport with credentials injected
//! 4. parse; transport and parse failures are logged once and returned as
//!    [`ApiCallError`]
//! 5. cache the raw bytes, then archive and log them when the payload has no
//!    `<error>` marker, or log the API error otherwise
//!
//! API-level errors are returned inside the [`ApiResult`]; only failures to
//! fetch or parse produce an `Err`.

use std::sync::Arc;
use std::time::Duration;

use crate::archive::{self, ArchiveStore};
use crate::cache::{self, CacheStore};
use crate::config::{Config, ConfigManager};
use crate::error::{ApiCallError, ClientError, ParseError};
use crate::key::{CallParameters, Credentials, RequestKey};
use crate::log::{self, CallLog};
use crate::response::{self, ApiResult, ParsedPayload};
use crate::transport::{self, Transport};

/// Scope used when none is given
pub const DEFAULT_SCOPE: &str = "account";

/// Client for one set of credentials
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<Config>,
    credentials: Credentials,
    scope: String,
    transport: Arc<dyn Transport>,
    cache: Arc<dyn CacheStore>,
    archive: Arc<dyn ArchiveStore>,
    log: Arc<dyn CallLog>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_base", &self.config.api.api_base)
            .field("user_id", &self.credentials.user_id())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ApiClient`]; unset collaborators are built from the config
pub struct ApiClientBuilder {
    config: Arc<Config>,
    credentials: Credentials,
    scope: String,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn CacheStore>>,
    archive: Option<Arc<dyn ArchiveStore>>,
    log: Option<Arc<dyn CallLog>>,
}

impl ApiClientBuilder {
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn archive(mut self, archive: Arc<dyn ArchiveStore>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn log(mut self, log: Arc<dyn CallLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Validate the configuration and assemble the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        ConfigManager::validate_config(&self.config)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => transport::from_config(&self.config.http)?,
        };
        let cache = self
            .cache
            .unwrap_or_else(|| cache::from_config(&self.config.cache));
        let archive = self
            .archive
            .unwrap_or_else(|| archive::from_config(&self.config.archive));
        let log = self
            .log
            .unwrap_or_else(|| log::from_config(&self.config.log));

        Ok(ApiClient {
            config: self.config,
            credentials: self.credentials,
            scope: self.scope,
            transport,
            cache,
            archive,
            log,
        })
    }
}

impl ApiClient {
    pub fn builder(config: impl Into<Arc<Config>>) -> ApiClientBuilder {
        ApiClientBuilder {
            config: config.into(),
            credentials: Credentials::anonymous(),
            scope: DEFAULT_SCOPE.to_string(),
            transport: None,
            cache: None,
            archive: None,
            log: None,
        }
    }

    /// Client with collaborators built from `config`
    pub fn new(
        config: impl Into<Arc<Config>>,
        credentials: Credentials,
        scope: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::builder(config)
            .credentials(credentials)
            .scope(scope)
            .build()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Same client, different default scope
    pub fn with_scope(&self, scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..self.clone()
        }
    }

    /// Full URL of an operation
    pub fn operation_url(&self, scope: &str, operation: &str) -> String {
        format!("{}{}/{}.xml.aspx", self.config.api.api_base, scope, operation)
    }

    /// Call `operation` in the client's default scope
    pub async fn call(
        &self,
        operation: &str,
        params: CallParameters,
    ) -> Result<ApiResult, ApiCallError> {
        self.call_scoped(&self.scope, operation, params).await
    }

    /// Call `operation` in `scope`
    pub async fn call_scoped(
        &self,
        scope: &str,
        operation: &str,
        params: CallParameters,
    ) -> Result<ApiResult, ApiCallError> {
        let params = params
            .overlaid_on(&self.config.api.additional_request_parameters)
            .filtered();
        let key = RequestKey::new(self.credentials.clone(), scope, operation, &params);

        if let Some(xml) = self.load_cached(&key).await {
            tracing::debug!(scope, operation, "cache hit");
            let payload = self.parse_or_log(&key, &params, &xml, None)?;
            return Ok(ApiResult::new(payload, xml, true));
        }

        tracing::debug!(scope, operation, "cache miss");
        let outgoing = params.with_credentials(&self.credentials);
        let url = self.operation_url(scope, operation);

        let timer = self.log.start();
        let fetched = self.transport.send(&url, &outgoing).await;
        let elapsed = Some(self.log.stop(timer));

        let xml = match fetched {
            Ok(xml) => xml,
            Err(err) => {
                self.log
                    .error_log(scope, operation, &outgoing, &err.to_string(), elapsed);
                return Err(ApiCallError::new(scope, operation, err));
            }
        };

        let payload = self.parse_or_log(&key, &outgoing, &xml, elapsed)?;

        if let Err(err) = self.cache.save(&key, &xml).await {
            tracing::warn!(scope, operation, error = %err, "failed to cache response");
        }

        if payload.has_error() {
            let message = format!(
                "{}: {}",
                payload.error_code().unwrap_or_default(),
                payload.error_text().unwrap_or_default()
            );
            self.log
                .error_log(scope, operation, &outgoing, &message, elapsed);
        } else {
            self.log.log(scope, operation, &outgoing, elapsed);
            if let Err(err) = self.archive.save(&key, &xml).await {
                tracing::warn!(scope, operation, error = %err, "failed to archive response");
            }
        }

        Ok(ApiResult::new(payload, xml, false))
    }

    async fn load_cached(&self, key: &RequestKey) -> Option<Vec<u8>> {
        match self.cache.load(key).await {
            Ok(hit) => hit,
            Err(err) => {
                tracing::warn!(
                    scope = %key.scope,
                    operation = %key.operation,
                    error = %err,
                    "cache lookup failed, fetching instead"
                );
                None
            }
        }
    }

    fn parse_or_log(
        &self,
        key: &RequestKey,
        params: &CallParameters,
        xml: &[u8],
        elapsed: Option<Duration>,
    ) -> Result<ParsedPayload, ApiCallError> {
        response::parse(xml).map_err(|err: ParseError| {
            self.log.error_log(
                &key.scope,
                &key.operation,
                params,
                &err.to_string(),
                elapsed,
            );
            ApiCallError::new(&key.scope, &key.operation, err)
        })
    }
}
