use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::catalog::CatalogOptions;
use crate::player::EmbedTemplates;

/// Environment variable overriding `server.admin_api_key`.
pub const ADMIN_KEY_ENV: &str = "ANICATALOG_ADMIN_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub catalog: CatalogConfig,

    pub player: PlayerConfig,

    pub observability: ObservabilityConfig,
}

/// Where catalog documents live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Process-local store; contents are lost on exit.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub store_backend: StoreBackend,

    pub log_level: String,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/anicatalog.db".to_string(),
            store_backend: StoreBackend::Sqlite,
            log_level: "info".to_string(),
            event_bus_buffer_size: 100,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Key admin requests must present. Admin routes reject everything when
    /// unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 6790,
            cors_allowed_origins: vec![
                "http://localhost:6790".to_string(),
                "http://127.0.0.1:6790".to_string(),
            ],
            admin_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Episodes released within this many days count as new (default: 7)
    pub new_episode_window_days: u32,

    pub recommendation_limit: usize,

    /// Score at which a recommendation is shown as a strong match (default: 4)
    pub strong_match_threshold: u32,

    pub watch_history_capacity: usize,

    /// Delete titles with this name once on startup.
    pub sample_title_sentinel: String,

    pub purge_sample_titles: bool,

    /// Conditional write retries before a mutation gives up (default: 3)
    pub toggle_retry_limit: u32,

    /// Memoized listings kept per snapshot version (default: 256)
    pub view_cache_capacity: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            new_episode_window_days: 7,
            recommendation_limit: 12,
            strong_match_threshold: 4,
            watch_history_capacity: 20,
            sample_title_sentinel: "Sample Anime".to_string(),
            purge_sample_titles: true,
            toggle_retry_limit: 3,
            view_cache_capacity: 256,
        }
    }
}

impl CatalogConfig {
    #[must_use]
    pub fn options(&self) -> CatalogOptions {
        CatalogOptions {
            purge_sample_titles: self.purge_sample_titles,
            sample_title_sentinel: self.sample_title_sentinel.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Loading indicator timeout while an embed starts (default: 8000)
    pub load_timeout_ms: u64,

    pub embeds: EmbedTemplates,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 8000,
            embeds: EmbedTemplates::default(),
        }
    }
}

impl PlayerConfig {
    #[must_use]
    pub const fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "anicatalog".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Applies environment overrides. Only the admin key is read from the
    /// environment.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ADMIN_KEY_ENV)
            && !key.trim().is_empty()
        {
            self.server.admin_api_key = Some(key);
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("anicatalog").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".anicatalog").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.store_backend == StoreBackend::Sqlite
            && self.general.database_path.is_empty()
        {
            anyhow::bail!("Database path cannot be empty for the sqlite backend");
        }

        if self.general.event_bus_buffer_size == 0 {
            anyhow::bail!("Event bus buffer size must be > 0");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("min_db_connections cannot exceed max_db_connections");
        }

        if self.catalog.new_episode_window_days == 0 {
            anyhow::bail!("New episode window must be at least one day");
        }

        if self.catalog.watch_history_capacity == 0 {
            anyhow::bail!("Watch history capacity must be > 0");
        }

        if self.player.load_timeout_ms == 0 {
            anyhow::bail!("Player load timeout must be > 0");
        }

        self.player
            .embeds
            .validate()
            .context("Invalid embed template")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.catalog.new_episode_window_days, 7);
        assert_eq!(config.catalog.recommendation_limit, 12);
        assert_eq!(config.catalog.strong_match_threshold, 4);
        assert_eq!(config.catalog.watch_history_capacity, 20);
        assert_eq!(config.catalog.sample_title_sentinel, "Sample Anime");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[catalog]"));
        assert!(toml_str.contains("[player.embeds]"));
        assert!(!toml_str.contains("admin_api_key"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"
            store_backend = "memory"

            [catalog]
            new_episode_window_days = 14

            [server]
            admin_api_key = "secret"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.store_backend, StoreBackend::Memory);
        assert_eq!(config.catalog.new_episode_window_days, 14);
        assert_eq!(config.server.admin_api_key.as_deref(), Some("secret"));

        assert_eq!(config.catalog.recommendation_limit, 12);
    }

    #[test]
    fn broken_templates_fail_validation() {
        let mut config = Config::default();
        config.player.embeds.mega = "not a url {raw}".to_string();
        assert!(config.validate().is_err());
    }
}
