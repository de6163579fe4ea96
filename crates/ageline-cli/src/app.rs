//! Wiring of the use case from configuration.

use ageline_application::{AgeProgressionUseCase, Collaborators, JobRegistries, PipelineContext};
use ageline_core::config::{AppConfig, EndpointConfig};
use ageline_core::error::{AgelineError, Result as AgelineResult};
use ageline_core::job::SystemClock;
use ageline_core::provider::{
    GenderClassifier, ImageOptions, ImageSynthesizer, TransitionSynthesizer,
};
use ageline_execution::FfmpegTranscoder;
use ageline_infrastructure::{AgelinePaths, FileManifestRepository};
use ageline_interaction::{
    DefaultPromptBuilder, GenderApiClient, ImageApiClient, TransitionApiClient,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Remote services a command depends on.
#[derive(Debug, Clone, Copy)]
pub enum Provider {
    Image,
    Video,
}

impl Provider {
    fn endpoint(self, config: &AppConfig) -> &EndpointConfig {
        match self {
            Provider::Image => &config.providers.image,
            Provider::Video => &config.providers.video,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Provider::Image => "providers.image.base_url",
            Provider::Video => "providers.video.base_url",
        }
    }
}

/// Fails fast when a command needs a provider that has no endpoint.
pub fn require_providers(config: &AppConfig, providers: &[Provider]) -> anyhow::Result<()> {
    let missing: Vec<&str> = providers
        .iter()
        .filter(|p| !p.endpoint(config).is_configured())
        .map(|p| p.key())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("{} must be set in the config file", missing.join(", "))
    }
}

/// Stands in for a provider whose endpoint could not be set up, so that
/// commands that never call it still work.
struct Unavailable {
    reason: String,
}

impl Unavailable {
    fn error(&self) -> AgelineError {
        AgelineError::config(self.reason.clone())
    }
}

#[async_trait]
impl ImageSynthesizer for Unavailable {
    async fn generate(
        &self,
        _reference_images: &[PathBuf],
        _prompt: &str,
        _options: &ImageOptions,
    ) -> AgelineResult<String> {
        Err(self.error())
    }

    async fn download(&self, _url: &str, _dest: &Path) -> AgelineResult<()> {
        Err(self.error())
    }
}

#[async_trait]
impl TransitionSynthesizer for Unavailable {
    async fn generate_transition(
        &self,
        _start_image: &Path,
        _end_image: &Path,
        _prompt: &str,
        _duration_secs: u32,
        _aspect_ratio: &str,
    ) -> AgelineResult<String> {
        Err(self.error())
    }

    async fn download(&self, _url: &str, _dest: &Path) -> AgelineResult<()> {
        Err(self.error())
    }
}

fn unavailable(service: &str, e: AgelineError) -> Arc<Unavailable> {
    tracing::debug!("[App] {} provider unavailable: {}", service, e);
    Arc::new(Unavailable {
        reason: e.to_string(),
    })
}

fn collaborators(config: &AppConfig) -> Collaborators {
    let providers = &config.providers;

    let images: Arc<dyn ImageSynthesizer> = match ImageApiClient::from_config(providers) {
        Ok(client) => Arc::new(client),
        Err(e) => unavailable("image", e),
    };
    let transitions: Arc<dyn TransitionSynthesizer> =
        match TransitionApiClient::from_config(providers) {
            Ok(client) => Arc::new(client),
            Err(e) => unavailable("video", e),
        };
    let classifier = match GenderApiClient::from_config(providers) {
        Ok(client) => client.map(|c| Arc::new(c) as Arc<dyn GenderClassifier>),
        Err(e) => {
            tracing::warn!("[App] Gender classifier disabled: {}", e);
            None
        }
    };

    Collaborators {
        images,
        transitions,
        classifier,
        prompts: Arc::new(DefaultPromptBuilder::new()),
        transcoder: Arc::new(FfmpegTranscoder::from_config(providers)),
    }
}

/// Builds the use case backed by the file repository under `paths`.
pub fn build_usecase(config: &AppConfig, paths: AgelinePaths) -> AgeProgressionUseCase {
    let repository = Arc::new(FileManifestRepository::with_paths(paths.clone()));
    let ctx = PipelineContext::new(
        repository,
        paths,
        config.pipeline.clone(),
        collaborators(config),
    );
    let registries =
        JobRegistries::in_memory(config.pipeline.job_retention(), Arc::new(SystemClock));
    AgeProgressionUseCase::new(ctx, registries)
}
