use serde::Deserialize;

use crate::infrastructure::storage::{PostgresConfig, StorageConfig, StorageType};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Experiment store selection
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// `memory` or `postgres`
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Falls back to the `DATABASE_URL` environment variable when unset
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Allowed cross-origin callers, e.g. the dashboard dev server
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Prometheus exposition
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Route serving the scrape output
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:8081".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            path: default_metrics_path(),
        }
    }
}

impl StorageSettings {
    /// Resolves the settings into a concrete storage configuration
    pub fn resolve(&self) -> anyhow::Result<StorageConfig> {
        self.resolve_with(std::env::var("DATABASE_URL").ok())
    }

    fn resolve_with(&self, env_database_url: Option<String>) -> anyhow::Result<StorageConfig> {
        let storage_type: StorageType = self.backend.parse()?;

        match storage_type {
            StorageType::InMemory => Ok(StorageConfig::in_memory()),
            StorageType::Postgres => {
                let url = self
                    .database_url
                    .clone()
                    .or(env_database_url)
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "storage.database_url or DATABASE_URL is required for the postgres backend"
                        )
                    })?;

                Ok(StorageConfig::postgres(
                    PostgresConfig::new(url).with_max_connections(self.max_connections),
                ))
            }
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:8081"]);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "server": {"host": "127.0.0.1", "port": 9000},
                "logging": {"level": "debug", "format": "json"},
                "storage": {"backend": "postgres"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.storage.backend, "postgres");
        assert_eq!(config.storage.max_connections, 10);
        assert_eq!(config.metrics.path, "/metrics");
    }

    #[test]
    fn test_metrics_can_be_disabled() {
        let config: AppConfig =
            serde_json::from_str(r#"{"metrics": {"enabled": false}}"#).unwrap();

        assert!(!config.metrics.enabled);
        assert_eq!(config.metrics.path, "/metrics");
    }

    #[test]
    fn test_resolve_memory_backend() {
        let settings = StorageSettings::default();
        let resolved = settings.resolve_with(None).unwrap();
        assert_eq!(resolved.storage_type(), StorageType::InMemory);
    }

    #[test]
    fn test_resolve_postgres_prefers_configured_url() {
        let settings = StorageSettings {
            backend: "pg".to_string(),
            database_url: Some("postgres://configured/db".to_string()),
            max_connections: 4,
        };

        match settings
            .resolve_with(Some("postgres://env/db".to_string()))
            .unwrap()
        {
            StorageConfig::Postgres(pg) => {
                assert_eq!(pg.url, "postgres://configured/db");
                assert_eq!(pg.max_connections, 4);
            }
            StorageConfig::InMemory => panic!("Expected Postgres config"),
        }
    }

    #[test]
    fn test_resolve_postgres_falls_back_to_env() {
        let settings = StorageSettings {
            backend: "postgres".to_string(),
            ..Default::default()
        };

        match settings
            .resolve_with(Some("postgres://env/db".to_string()))
            .unwrap()
        {
            StorageConfig::Postgres(pg) => assert_eq!(pg.url, "postgres://env/db"),
            StorageConfig::InMemory => panic!("Expected Postgres config"),
        }

        assert!(settings.resolve_with(None).is_err());
    }

    #[test]
    fn test_resolve_unknown_backend() {
        let settings = StorageSettings {
            backend: "sqlite".to_string(),
            ..Default::default()
        };
        assert!(settings.resolve_with(None).is_err());
    }
}
