//! Shared dependencies handed to every job.

use ageline_core::config::PipelineConfig;
use ageline_core::provider::{
    GenderClassifier, ImageSynthesizer, PromptBuilder, TransitionSynthesizer, Transcoder,
};
use ageline_core::session::ManifestRepository;
use ageline_infrastructure::AgelinePaths;
use std::sync::Arc;

/// External collaborators used by the pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub images: Arc<dyn ImageSynthesizer>,
    pub transitions: Arc<dyn TransitionSynthesizer>,
    /// Optional; without it the gender hint stays unset.
    pub classifier: Option<Arc<dyn GenderClassifier>>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub transcoder: Arc<dyn Transcoder>,
}

/// Everything a background job needs, cheap to clone into a task.
#[derive(Clone)]
pub struct PipelineContext {
    pub repository: Arc<dyn ManifestRepository>,
    pub paths: AgelinePaths,
    pub config: PipelineConfig,
    pub collaborators: Collaborators,
}

impl PipelineContext {
    pub fn new(
        repository: Arc<dyn ManifestRepository>,
        paths: AgelinePaths,
        config: PipelineConfig,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            repository,
            paths,
            config,
            collaborators,
        }
    }
}
