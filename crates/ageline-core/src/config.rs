//! Configuration model.
//!
//! Loaded from `config.toml` by the infrastructure layer. Every field has a
//! default so partial files are accepted.

use crate::retime::DurationBounds;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub providers: ProviderConfig,
    pub logging: LoggingSettings,
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum concurrent transition-generation calls per job.
    pub max_concurrent_transitions: usize,
    /// Requested length of each transition clip.
    pub transition_duration_secs: u32,
    pub aspect_ratio: String,
    pub target_width: u32,
    pub target_height: u32,
    pub output_fps: u32,
    pub min_final_duration_secs: f64,
    pub max_final_duration_secs: f64,
    pub default_final_duration_secs: f64,
    /// How long job records stay pollable.
    pub job_retention_secs: u64,
    /// Upper bound on waiting for speculative transitions before assembly.
    pub speculative_wait_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transitions: 3,
            transition_duration_secs: 5,
            aspect_ratio: "9:16".to_string(),
            target_width: 720,
            target_height: 1280,
            output_fps: 30,
            min_final_duration_secs: 4.0,
            max_final_duration_secs: 120.0,
            default_final_duration_secs: 20.0,
            job_retention_secs: 3600,
            speculative_wait_secs: 300,
        }
    }
}

impl PipelineConfig {
    pub fn duration_bounds(&self) -> DurationBounds {
        DurationBounds {
            min_secs: self.min_final_duration_secs,
            max_secs: self.max_final_duration_secs,
        }
    }

    pub fn speculative_wait(&self) -> Duration {
        Duration::from_secs(self.speculative_wait_secs)
    }

    pub fn job_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.job_retention_secs as i64)
    }

    /// Concurrency cap, never below one.
    pub fn transition_concurrency(&self) -> usize {
        self.max_concurrent_transitions.max(1)
    }
}

/// Endpoint settings for one remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: Option<String>,
}

impl EndpointConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }
}

/// Remote collaborator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub image: EndpointConfig,
    pub video: EndpointConfig,
    /// Optional; classification is skipped when not configured.
    pub classifier: EndpointConfig,
    pub request_timeout_secs: u64,
    /// Interval between status checks for asynchronous predictions.
    pub poll_interval_ms: u64,
    /// Maximum status checks before a prediction is considered lost.
    pub max_poll_attempts: u32,
    /// ffmpeg binary used for assembly.
    pub ffmpeg_path: String,
    /// ffprobe binary used for duration probing.
    pub ffprobe_path: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            image: EndpointConfig::default(),
            video: EndpointConfig::default(),
            classifier: EndpointConfig::default(),
            request_timeout_secs: 120,
            poll_interval_ms: 2000,
            max_poll_attempts: 300,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[pipeline]
max_concurrent_transitions = 5

[providers.image]
base_url = "https://images.example.com"
api_key = "secret"
"#,
        )
        .unwrap();

        assert_eq!(config.pipeline.max_concurrent_transitions, 5);
        assert_eq!(config.pipeline.transition_duration_secs, 5);
        assert!(config.providers.image.is_configured());
        assert!(!config.providers.classifier.is_configured());
        assert_eq!(config.providers.ffmpeg_path, "ffmpeg");
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_concurrency_never_zero() {
        let config = PipelineConfig {
            max_concurrent_transitions: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.transition_concurrency(), 1);
    }
}
