//! Layered settings for the API server, upstream sources and cache

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root settings, deserialized from `config/*.toml` and `CVE_RADAR__*` variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub apis: ApiConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Serve the OpenAPI document at `/api-docs/openapi.json`
    pub enable_docs: bool,
    /// Global request timeout in seconds applied at the HTTP layer.
    pub request_timeout_seconds: u64,
    /// Allowed CORS origins. `["*"]` allows any origin.
    pub allowed_origins: Vec<String>,
}

/// File cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    /// TTL for single CVE analyses
    pub ttl_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

/// Upstream source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub nvd: NvdConfig,
    pub epss: EpssConfig,
    pub kev: KevConfig,
}

/// NVD API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvdConfig {
    pub base_url: String,
    /// Raises the NVD rate limit; results are identical without it
    pub api_key: Option<String>,
    pub retry: RetrySettings,
    /// Longest publication window NVD accepts in one keyword query
    pub window_days: i64,
}

/// Retry tunables for one upstream source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub attempt_timeout_seconds: u64,
    pub initial_backoff_ms: u64,
}

/// FIRST EPSS API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpssConfig {
    pub base_url: String,
    pub retry: RetrySettings,
}

/// CISA KEV catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KevConfig {
    pub catalog_url: String,
    /// The catalog is a multi-megabyte download, so attempts get a longer timeout
    pub retry: RetrySettings,
}

/// Orchestration defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub bulk_concurrency: usize,
    pub keyword_page_size: u32,
    /// Window used by `/threats` when no start date is given
    pub keyword_default_days: i64,
    pub threat_cache_ttl_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_timeout_seconds: 10,
            initial_backoff_ms: 500,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                enable_docs: true,
                request_timeout_seconds: 120,
                allowed_origins: vec!["*".to_string()],
            },
            cache: CacheConfig {
                enabled: true,
                directory: PathBuf::from(".cve_radar_cache"),
                ttl_seconds: 3600,
                cleanup_interval_seconds: 900,
            },
            apis: ApiConfig {
                nvd: NvdConfig {
                    base_url: "https://services.nvd.nist.gov/rest/json".to_string(),
                    api_key: None,
                    retry: RetrySettings::default(),
                    window_days: 120,
                },
                epss: EpssConfig {
                    base_url: "https://api.first.org/data/v1/epss".to_string(),
                    retry: RetrySettings::default(),
                },
                kev: KevConfig {
                    catalog_url: "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json".to_string(),
                    retry: RetrySettings {
                        attempt_timeout_seconds: 30,
                        ..RetrySettings::default()
                    },
                },
            },
            analysis: AnalysisConfig {
                bulk_concurrency: 5,
                keyword_page_size: 200,
                keyword_default_days: 30,
                threat_cache_ttl_seconds: 600,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

impl Config {
    /// Build settings from defaults, config files and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CVE_RADAR")
                .prefix_separator("__")
                .separator("__"),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.apis.nvd.retry.max_attempts, 5);
        assert_eq!(config.apis.nvd.retry.attempt_timeout_seconds, 10);
        assert_eq!(config.apis.nvd.retry.initial_backoff_ms, 500);
        assert_eq!(config.apis.nvd.window_days, 120);
        assert_eq!(config.apis.epss.retry.max_attempts, 5);
        assert_eq!(config.apis.kev.retry.max_attempts, 5);
        assert_eq!(config.apis.kev.retry.attempt_timeout_seconds, 30);
        assert_eq!(config.analysis.bulk_concurrency, 5);
        assert_eq!(config.analysis.threat_cache_ttl_seconds, 600);
    }

    #[test]
    fn test_defaults_round_trip_through_config_builder() {
        let built = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default()).unwrap())
            .build()
            .unwrap();
        let config: Config = built.try_deserialize().unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.apis.nvd.api_key.is_none());
    }
}
