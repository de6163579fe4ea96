//! Collaborator interfaces consumed by the pipeline.
//!
//! The pipeline never talks to a network service or a subprocess directly;
//! it goes through these traits so that the remote image and video models,
//! the classifier, prompt wording and the transcoder can all be swapped or
//! faked independently.

use crate::error::Result;
use crate::session::{Age, BackgroundMode, GenderHint, NarrativeTrack};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Options passed along with an image-synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub aspect_ratio: String,
    pub background_mode: BackgroundMode,
}

/// Image synthesis service.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    /// Generates an image from reference images and a prompt.
    ///
    /// # Returns
    ///
    /// URL of the generated image.
    async fn generate(
        &self,
        reference_images: &[PathBuf],
        prompt: &str,
        options: &ImageOptions,
    ) -> Result<String>;

    /// Downloads a generated image to `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Video transition synthesis service.
#[async_trait]
pub trait TransitionSynthesizer: Send + Sync {
    /// Generates a clip morphing `start_image` into `end_image`.
    ///
    /// # Returns
    ///
    /// URL of the generated clip.
    async fn generate_transition(
        &self,
        start_image: &Path,
        end_image: &Path,
        prompt: &str,
        duration_secs: u32,
        aspect_ratio: &str,
    ) -> Result<String>;

    /// Downloads a generated clip to `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Best-effort gender classifier.
#[async_trait]
pub trait GenderClassifier: Send + Sync {
    /// Predicts a locked gender hint for the subject in `image`.
    async fn predict(&self, image: &Path) -> Result<GenderHint>;
}

/// Inputs for the background-normalization prompt.
#[derive(Debug, Clone)]
pub struct SourcePromptContext {
    pub gender_hint: GenderHint,
}

/// Inputs for one frame prompt.
#[derive(Debug, Clone)]
pub struct FramePromptContext {
    pub age: Age,
    /// Age of the frame used as input, `None` for the first frame.
    pub previous_age: Option<Age>,
    pub index: usize,
    pub total: usize,
    pub background_mode: BackgroundMode,
    pub gender_hint: GenderHint,
    pub narrative_track: Option<NarrativeTrack>,
}

/// Inputs for one transition prompt.
#[derive(Debug, Clone)]
pub struct TransitionPromptContext {
    pub from_age: Age,
    pub to_age: Age,
    pub background_mode: BackgroundMode,
    pub narrative_track: Option<NarrativeTrack>,
}

/// Builds prompt text for every generation call.
///
/// Only the wording lives behind this trait; sequencing stays in the pipeline.
pub trait PromptBuilder: Send + Sync {
    fn source_prompt(&self, ctx: &SourcePromptContext) -> String;
    fn frame_prompt(&self, ctx: &FramePromptContext) -> String;
    fn transition_prompt(&self, ctx: &TransitionPromptContext) -> String;
}

/// One assembly request for the transcoder.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyRequest {
    /// Clips in playback order.
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Playback speed multiplier, always >= 1.0.
    pub speed_factor: f64,
}

/// External transcoding process.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Duration of a media file in seconds.
    async fn clip_duration(&self, clip: &Path) -> Result<f64>;

    /// Scales, pads, concatenates and retimes `request.inputs` into
    /// `request.output`, dropping audio.
    ///
    /// # Errors
    ///
    /// `AgelineError::Assembly` carrying the captured stderr when the
    /// process exits unsuccessfully.
    async fn assemble(&self, request: &AssemblyRequest) -> Result<()>;
}
