//! Configuration service implementation.
//!
//! Loads [`AppConfig`] from `~/.config/ageline/config.toml` (or an explicit
//! path) and caches it. A missing file yields the defaults.

use ageline_core::config::AppConfig;
use ageline_core::error::{AgelineError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::paths::AgelinePaths;

/// Configuration service that loads and caches the application configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl ConfigService {
    /// Creates a service reading the default configuration file.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a service reading `path` instead of the default location.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading from file if not cached.
    ///
    /// Load failures are logged and the defaults are used.
    pub fn get_config(&self) -> AppConfig {
        {
            let read_lock = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = match self.load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("[ConfigService] Falling back to default config: {}", e);
                AppConfig::default()
            }
        };

        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = Some(loaded.clone());
        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = None;
    }

    /// Reads and parses the configuration file without touching the cache.
    pub fn load(&self) -> Result<AppConfig> {
        let path = self.config_path()?;
        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            tracing::debug!(
                "[ConfigService] No config at {}, using defaults",
                path.display()
            );
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AgelineError::io(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    fn config_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => AgelinePaths::config_file().map_err(|e| AgelineError::config(e.to_string())),
        }
    }

    /// Data directory layout for the loaded configuration.
    ///
    /// `data_dir` in the file wins over `AGELINE_DATA_DIR` and the platform
    /// default.
    pub fn paths(&self) -> Result<AgelinePaths> {
        let config = self.get_config();
        AgelinePaths::new(config.data_dir.as_deref())
            .map_err(|e| AgelineError::config(e.to_string()))
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("config.toml"));

        let config = service.get_config();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_loads_and_caches() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "data_dir = \"/tmp/ageline-test\"\n[pipeline]\nmax_concurrent_transitions = 2\n",
        )
        .unwrap();
        let service = ConfigService::with_path(&path);

        let config = service.get_config();
        assert_eq!(config.pipeline.max_concurrent_transitions, 2);
        assert_eq!(
            service.paths().unwrap().base_dir(),
            Path::new("/tmp/ageline-test")
        );

        std::fs::write(&path, "[pipeline]\nmax_concurrent_transitions = 7\n").unwrap();
        assert_eq!(service.get_config().pipeline.max_concurrent_transitions, 2);

        service.invalidate_cache();
        assert_eq!(service.get_config().pipeline.max_concurrent_transitions, 7);
    }

    #[test]
    fn test_invalid_file_is_an_error_on_strict_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline\n").unwrap();
        let service = ConfigService::with_path(&path);

        assert!(service.load().is_err());
        assert_eq!(service.get_config(), AppConfig::default());
    }
}
