use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the consent API and the transmission commands.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub store: StoreConfig,
    pub catalog: CatalogConfig,
    pub channels: ChannelSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let store = StoreConfig {
            path: optional_var("ENTERPRISE_STORE_PATH").map(PathBuf::from),
        };

        let catalog = CatalogConfig {
            api_url: optional_var("CATALOG_API_URL"),
            api_token: optional_var("CATALOG_API_TOKEN"),
            cache_ttl: Duration::from_secs(numeric_var("CATALOG_CACHE_TTL_SECS", 3600)?),
        };

        let channels = ChannelSettings {
            lms_root_url: env::var("LMS_ROOT_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            provider_id: env::var("INTEGRATED_CHANNEL_PROVIDER_ID")
                .unwrap_or_else(|_| "EDX".to_string()),
            course_batch_size: numeric_var("SAPSF_COURSE_BATCH_SIZE", 1000)? as usize,
            sap: SapApiPaths {
                oauth_api_path: env::var("SAPSF_OAUTH_API_PATH")
                    .unwrap_or_else(|_| SapApiPaths::DEFAULT_OAUTH_PATH.to_string()),
                course_api_path: env::var("SAPSF_COURSE_API_PATH")
                    .unwrap_or_else(|_| SapApiPaths::DEFAULT_COURSE_PATH.to_string()),
                completion_status_api_path: env::var("SAPSF_COMPLETION_STATUS_API_PATH")
                    .unwrap_or_else(|_| SapApiPaths::DEFAULT_COMPLETION_PATH.to_string()),
            },
        };

        if channels.course_batch_size == 0 {
            return Err(ConfigError::InvalidNumber {
                var: "SAPSF_COURSE_BATCH_SIZE",
            });
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            store,
            catalog,
            channels,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn numeric_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional_var(name) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var: name }),
        None => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the snapshot store keeps its JSON document. `None` keeps state in memory.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

/// Catalog service access. Without an API URL the store's catalog snapshot is used.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub cache_ttl: Duration,
}

/// Settings shared by every integrated channel exporter and client.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub lms_root_url: String,
    pub provider_id: String,
    pub course_batch_size: usize,
    pub sap: SapApiPaths,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            lms_root_url: "http://localhost:8000".to_string(),
            provider_id: "EDX".to_string(),
            course_batch_size: 1000,
            sap: SapApiPaths::default(),
        }
    }
}

/// Endpoint paths appended to each customer's SuccessFactors base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SapApiPaths {
    pub oauth_api_path: String,
    pub course_api_path: String,
    pub completion_status_api_path: String,
}

impl SapApiPaths {
    pub const DEFAULT_OAUTH_PATH: &'static str = "learning/oauth-api/rest/v1/token";
    pub const DEFAULT_COURSE_PATH: &'static str =
        "learning/odatav4/public/admin/ocn/v1/OcnCourses";
    pub const DEFAULT_COMPLETION_PATH: &'static str =
        "learning/odatav4/public/admin/learningevent-service/v1/OCNLearningEvents";
}

impl Default for SapApiPaths {
    fn default() -> Self {
        Self {
            oauth_api_path: Self::DEFAULT_OAUTH_PATH.to_string(),
            course_api_path: Self::DEFAULT_COURSE_PATH.to_string(),
            completion_status_api_path: Self::DEFAULT_COMPLETION_PATH.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => {
                write!(f, "{var} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
