//! # xml-api-client Library
//!
//! An async client for XML web APIs addressed as `<base><scope>/<operation>.xml.aspx`,
//! with transparent response caching and archiving of successful calls.

pub mod archive;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod key;
pub mod log;
pub mod response;
pub mod transport;

pub use archive::{ArchiveStore, FileArchive, NullArchive, UmaskGuard};
pub use cache::{CacheMetadata, CacheStore, DiskCache, MemoryCache, NullCache, TieredCache};
pub use client::{ApiClient, ApiClientBuilder, DEFAULT_SCOPE};
pub use config::{
    ApiConfig, ArchiveConfig, CacheBackend, CacheConfig, Config, ConfigError, ConfigManager,
    HttpBackend, HttpConfig, LogConfig,
};
pub use error::{
    ApiCallError, ArchiveError, CacheError, CallFailure, ClientError, ParseError, TransportError,
};
pub use key::{CallParameters, Credentials, RequestKey};
pub use log::{CallLog, CallTimer, NullLog, TracingLog};
pub use response::{ApiErrorInfo, ApiResult, ParsedPayload, XmlElement};
pub use transport::{ReqwestTransport, StreamTransport, Transport};
