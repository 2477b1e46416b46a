//! Configuration for access-daemon

use access_authz::{
    ApproverRule, AuthorizationOracle, HttpOracle, HttpOracleConfig, OracleError, StaticOracle,
};
use access_controller::ControllerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub controller: ControllerConfig,

    /// Where approval authority is checked
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8443)),
            enable_cors: true,
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Authorization oracle selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AuthorizationConfig {
    /// In-process allow-list
    Static {
        #[serde(default)]
        approvers: Vec<ApproverRule>,
    },

    /// Remote access review endpoint
    Http(HttpOracleConfig),
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        AuthorizationConfig::Static {
            approvers: Vec::new(),
        }
    }
}

impl AuthorizationConfig {
    pub fn build_oracle(&self) -> Result<Arc<dyn AuthorizationOracle>, OracleError> {
        match self {
            AuthorizationConfig::Static { approvers } => {
                Ok(Arc::new(StaticOracle::from_rules(approvers.clone())))
            }
            AuthorizationConfig::Http(config) => Ok(Arc::new(HttpOracle::new(config)?)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
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

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_body_size() -> usize {
    2 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `ACCESS_`-prefixed environment variables (`__` separates sections)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ACCESS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
