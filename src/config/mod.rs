//! Configuration loading and management
//!
//! The server reads a single YAML document:
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8080
//! store:
//!   backend: sqlite          # in_memory | mysql | sqlite
//!   url: sqlite://puck.db
//!   max_connections: 5
//! logging:
//!   filter: info,puck=debug
//!   json: false
//! ```
//!
//! Every section is optional and falls back to its [`Default`].

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Complete configuration for the API server
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listening address
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port`, ready for a TCP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which storage backend to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    InMemory,
    Mysql,
    Sqlite,
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::InMemory => "in_memory",
            StoreBackend::Mysql => "mysql",
            StoreBackend::Sqlite => "sqlite",
        }
    }

    /// Whether the backend needs a connection url
    pub fn is_sql(&self) -> bool {
        !matches!(self, StoreBackend::InMemory)
    }
}

/// Storage backend and its connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_store_url"))]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Connection url, required by the SQL backends
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG` when set
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    5
}

fn default_filter() -> String {
    "info".to_string()
}

fn validate_store_url(store: &StoreConfig) -> Result<(), ValidationError> {
    let missing = store
        .url
        .as_deref()
        .is_none_or(|url| url.trim().is_empty());
    if store.backend.is_sql() && missing {
        let mut error = ValidationError::new("url_required");
        error.message = Some(
            format!(
                "store.url is required for the {} backend",
                store.backend.name()
            )
            .into(),
        );
        return Err(error);
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate_config()?;
        Ok(config)
    }

    /// Check value ranges and cross-field requirements
    pub fn validate_config(&self) -> Result<()> {
        self.validate()
            .map_err(|e| anyhow!("Invalid configuration: {}", e))
    }
}
