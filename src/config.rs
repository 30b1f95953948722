use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::key::{CallParameters, default_delimiter};

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main client configuration
///
/// Built once at startup and shared read-only by every call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub archive: ArchiveConfig,
    pub log: LogConfig,
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// URL prefix every `<scope>/<operation>.xml.aspx` path is appended to
    pub api_base: String,
    /// Parameters sent with every request; per-call parameters override them
    pub additional_request_parameters: CallParameters,
}

/// Which transport adapter to construct
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HttpBackend {
    /// Full-featured async client
    #[default]
    Reqwest,
    /// Minimal blocking stream fetch
    Stream,
}

/// HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub backend: HttpBackend,
    /// Send parameters as a form-encoded POST body instead of a query string
    pub post: bool,
    /// User agent string, library default when unset
    pub user_agent: Option<String>,
    /// Request timeout in seconds, no timeout when unset
    pub timeout_seconds: Option<u64>,
}

/// Which cache store to construct
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// No caching
    #[default]
    None,
    Memory,
    Disk,
    /// Memory in front of disk
    Tiered,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Cache directory path
    pub directory: PathBuf,
    /// Time-to-live for cached responses in seconds
    pub ttl_seconds: u64,
    /// Maximum number of entries in memory cache
    pub max_memory_entries: u64,
    /// Key component delimiter, platform default when unset
    pub delimiter: Option<char>,
}

/// Archive configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    /// Root directory of the dated archive tree
    pub directory: PathBuf,
    /// Key component delimiter, platform default when unset
    pub delimiter: Option<char>,
    /// Permission bits of archived files
    pub file_mode: u32,
    /// Permission bits of created directories
    pub dir_mode: u32,
}

/// Call logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.eveonline.com/".to_string(),
            additional_request_parameters: CallParameters::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            backend: HttpBackend::Reqwest,
            post: true,
            user_agent: None,
            timeout_seconds: Some(30),
        }
    }
}

impl HttpConfig {
    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("xml-api-client/{}", env!("CARGO_PKG_VERSION")))
    }
}

fn data_dir(leaf: &str) -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("xml-api-client")
        .join(leaf)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::None,
            directory: data_dir("cache"),
            ttl_seconds: 3600,
            max_memory_entries: 1000,
            delimiter: None,
        }
    }
}

impl CacheConfig {
    pub fn delimiter(&self) -> char {
        self.delimiter.unwrap_or_else(default_delimiter)
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: data_dir("archive"),
            delimiter: None,
            file_mode: 0o666,
            dir_mode: 0o777,
        }
    }
}

impl ArchiveConfig {
    pub fn delimiter(&self) -> char {
        self.delimiter.unwrap_or_else(default_delimiter)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

const CONFIG_NAMES: [&str; 4] = [
    "xml-api-client.toml",
    "xml-api-client.json",
    ".xml-api-client.toml",
    ".xml-api-client.json",
];

/// Configuration manager for loading and validating configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment
    pub async fn load_config(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        config = Self::apply_environment_overrides(config)?;
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        for name in &CONFIG_NAMES {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("xml-api-client");
            for name in &CONFIG_NAMES {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(api_base) = env.get("XML_API_BASE") {
            config.api.api_base = api_base;
        }

        // HTTP settings
        if let Some(backend) = env.get("XML_API_HTTP_BACKEND") {
            config.http.backend = match backend.to_lowercase().as_str() {
                "reqwest" => HttpBackend::Reqwest,
                "stream" => HttpBackend::Stream,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid XML_API_HTTP_BACKEND value: {}",
                        backend
                    )));
                }
            };
        }

        if let Some(post) = env.get("XML_API_HTTP_POST") {
            config.http.post = post.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid XML_API_HTTP_POST value: {}", post))
            })?;
        }

        if let Some(user_agent) = env.get("XML_API_USER_AGENT") {
            config.http.user_agent = Some(user_agent);
        }

        if let Some(timeout) = env.get("XML_API_TIMEOUT") {
            config.http.timeout_seconds = Some(timeout.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid XML_API_TIMEOUT value: {}", timeout))
            })?);
        }

        // Cache settings
        if let Some(backend) = env.get("XML_API_CACHE") {
            config.cache.backend = match backend.to_lowercase().as_str() {
                "none" => CacheBackend::None,
                "memory" => CacheBackend::Memory,
                "disk" => CacheBackend::Disk,
                "tiered" => CacheBackend::Tiered,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid XML_API_CACHE value: {}",
                        backend
                    )));
                }
            };
        }

        if let Some(cache_dir) = env.get("XML_API_CACHE_DIR") {
            config.cache.directory = PathBuf::from(cache_dir);
        }

        if let Some(cache_ttl) = env.get("XML_API_CACHE_TTL") {
            config.cache.ttl_seconds = cache_ttl.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid XML_API_CACHE_TTL value: {}", cache_ttl))
            })?;
        }

        // Archive settings
        if let Some(archive_dir) = env.get("XML_API_ARCHIVE_DIR") {
            config.archive.directory = PathBuf::from(archive_dir);
            config.archive.enabled = true;
        }

        // Log settings
        if let Some(enabled) = env.get("XML_API_LOG") {
            config.log.enabled = enabled.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid XML_API_LOG value: {}", enabled))
            })?;
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.api.api_base.is_empty() {
            return Err(ConfigError::Validation(
                "API base URL must not be empty".to_string(),
            ));
        }

        if !config.api.api_base.starts_with("http://")
            && !config.api.api_base.starts_with("https://")
        {
            return Err(ConfigError::Validation(format!(
                "API base URL must be http or https: {}",
                config.api.api_base
            )));
        }

        if config.http.timeout_seconds == Some(0) {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.cache.backend != CacheBackend::None && config.cache.ttl_seconds == 0 {
            return Err(ConfigError::Validation(
                "Cache TTL must be greater than 0".to_string(),
            ));
        }

        if matches!(
            config.cache.backend,
            CacheBackend::Memory | CacheBackend::Tiered
        ) && config.cache.max_memory_entries == 0
        {
            return Err(ConfigError::Validation(
                "Memory cache must allow at least one entry".to_string(),
            ));
        }

        for delimiter in [config.cache.delimiter, config.archive.delimiter]
            .into_iter()
            .flatten()
        {
            if delimiter == '/' || delimiter == '\\' || delimiter.is_whitespace() {
                return Err(ConfigError::Validation(format!(
                    "Invalid key delimiter: {:?}",
                    delimiter
                )));
            }
        }

        if config.archive.file_mode > 0o777 || config.archive.dir_mode > 0o777 {
            return Err(ConfigError::Validation(
                "Archive permission bits cannot exceed 0o777".to_string(),
            ));
        }

        Ok(())
    }
}
