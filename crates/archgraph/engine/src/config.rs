//! Configuration for the knowledge-graph engine

use crate::error::{GraphError, GraphResult};
use crate::validation::RuleDefinition;
use serde::{Deserialize, Serialize};

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Traversal bounds
    #[serde(default)]
    pub traversal: TraversalConfig,

    /// Node listing pagination
    #[serde(default)]
    pub listing: ListingConfig,

    /// Write retry policy
    #[serde(default)]
    pub writes: WriteConfig,

    /// Validation rule registry
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Traversal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Largest accepted `depth`
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Page size when the caller gives none
    #[serde(default = "default_page_limit")]
    pub default_limit: usize,

    /// Page sizes above this are clamped
    #[serde(default = "default_max_page_limit")]
    pub max_limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_page_limit(),
        }
    }
}

/// Write configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Attempts per write before a conflict is surfaced
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Age in days after which an unmodified node is reported stale
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,

    /// Replaces the built-in rule registry when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleDefinition>>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            stale_after_days: default_stale_after_days(),
            rules: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory adjacency storage
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of plain text
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_max_depth() -> u32 {
    10
}

fn default_page_limit() -> usize {
    50
}

fn default_max_page_limit() -> usize {
    500
}

fn default_max_attempts() -> u32 {
    3
}

fn default_stale_after_days() -> i64 {
    180
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration: defaults, then an optional file, then
    /// `ARCHGRAPH_`-prefixed environment variables (`__` between sections,
    /// e.g. `ARCHGRAPH_TRAVERSAL__MAX_DEPTH=4`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ARCHGRAPH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> GraphResult<()> {
        if self.writes.max_attempts == 0 {
            return Err(GraphError::Validation(
                "writes.max_attempts must be at least 1".into(),
            ));
        }
        if self.listing.default_limit == 0 || self.listing.max_limit == 0 {
            return Err(GraphError::Validation("listing limits must be positive".into()));
        }
        if self.listing.default_limit > self.listing.max_limit {
            return Err(GraphError::Validation(
                "listing.default_limit exceeds listing.max_limit".into(),
            ));
        }
        if self.validation.stale_after_days < 0 {
            return Err(GraphError::Validation(
                "validation.stale_after_days must not be negative".into(),
            ));
        }
        Ok(())
    }
}
