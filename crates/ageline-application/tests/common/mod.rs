#![allow(dead_code)]

use ageline_application::{
    AgeProgressionUseCase, Collaborators, CreateSessionRequest, JobRegistries, PipelineContext,
};
use ageline_core::config::PipelineConfig;
use ageline_core::error::{AgelineError, Result};
use ageline_core::job::{FrameJobSnapshot, ManualClock, VideoJobSnapshot};
use ageline_core::provider::{
    AssemblyRequest, FramePromptContext, GenderClassifier, ImageOptions, ImageSynthesizer,
    PromptBuilder, SourcePromptContext, Transcoder, TransitionPromptContext,
    TransitionSynthesizer,
};
use ageline_core::session::{Age, BackgroundMode, GenderHint, PairKey, SessionManifest};
use ageline_infrastructure::{AgelinePaths, FileManifestRepository};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

async fn write_file(dest: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, contents).await?;
    Ok(())
}

/// Parses `age_<n>` file stems back into ages.
fn age_of(path: &Path) -> Age {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("age_"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct ImageCall {
    pub inputs: Vec<PathBuf>,
    pub prompt: String,
}

/// Image synthesizer that "generates" by writing the URL into the file.
pub struct FakeImageSynth {
    delay: Duration,
    calls: Mutex<Vec<ImageCall>>,
    fail_on_call: Mutex<Option<usize>>,
}

impl FakeImageSynth {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: Mutex::new(Vec::new()),
            fail_on_call: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<ImageCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Makes the call with this zero-based index fail.
    pub fn fail_on_call(&self, index: Option<usize>) {
        *self.fail_on_call.lock().unwrap() = index;
    }
}

#[async_trait]
impl ImageSynthesizer for FakeImageSynth {
    async fn generate(
        &self,
        reference_images: &[PathBuf],
        prompt: &str,
        _options: &ImageOptions,
    ) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(ImageCall {
                inputs: reference_images.to_vec(),
                prompt: prompt.to_string(),
            });
            calls.len() - 1
        };
        if *self.fail_on_call.lock().unwrap() == Some(index) {
            return Err(AgelineError::collaborator("image", "model overloaded"));
        }
        Ok(format!("fake://image/{index}"))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        write_file(dest, url.as_bytes()).await
    }
}

/// Transition synthesizer that tracks how many calls overlap.
pub struct FakeTransitionSynth {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<PairKey>>,
    failing: Mutex<HashSet<PairKey>>,
}

impl FakeTransitionSynth {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn calls(&self) -> Vec<PairKey> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn fail_pair(&self, key: PairKey) {
        self.failing.lock().unwrap().insert(key);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }
}

#[async_trait]
impl TransitionSynthesizer for FakeTransitionSynth {
    async fn generate_transition(
        &self,
        start_image: &Path,
        end_image: &Path,
        _prompt: &str,
        _duration_secs: u32,
        _aspect_ratio: &str,
    ) -> Result<String> {
        let key = PairKey::new(age_of(start_image), age_of(end_image));
        self.calls.lock().unwrap().push(key);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&key) {
            return Err(AgelineError::collaborator("video", format!("{key} rejected")));
        }
        Ok(format!("fake://clip/{key}"))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        write_file(dest, url.as_bytes()).await
    }
}

/// Transcoder that records the assembly request instead of running ffmpeg.
pub struct FakeTranscoder {
    clip_secs: f64,
    delay: Duration,
    fail: AtomicBool,
    requests: Mutex<Vec<AssemblyRequest>>,
}

impl FakeTranscoder {
    pub fn new(clip_secs: f64, delay: Duration) -> Self {
        Self {
            clip_secs,
            delay,
            fail: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AssemblyRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn clip_duration(&self, clip: &Path) -> Result<f64> {
        if !clip.exists() {
            return Err(AgelineError::assembly(
                format!("ffprobe failed for {}", clip.display()),
                "No such file or directory",
            ));
        }
        Ok(self.clip_secs)
    }

    async fn assemble(&self, request: &AssemblyRequest) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(AgelineError::assembly(
                "ffmpeg exited with exit status: 1",
                "Invalid filter graph",
            ));
        }
        write_file(&request.output, b"final").await
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ClassifierBehavior {
    Returns(GenderHint),
    Fails,
}

pub struct FakeClassifier {
    behavior: ClassifierBehavior,
    calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn new(behavior: ClassifierBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenderClassifier for FakeClassifier {
    async fn predict(&self, _image: &Path) -> Result<GenderHint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            ClassifierBehavior::Returns(hint) => Ok(hint),
            ClassifierBehavior::Fails => Err(AgelineError::collaborator("classifier", "timeout")),
        }
    }
}

/// Prompts that expose their inputs, so tests can assert on them.
pub struct EchoPromptBuilder;

impl PromptBuilder for EchoPromptBuilder {
    fn source_prompt(&self, ctx: &SourcePromptContext) -> String {
        format!("source gender={:?}", ctx.gender_hint)
    }

    fn frame_prompt(&self, ctx: &FramePromptContext) -> String {
        format!("frame age={} gender={:?}", ctx.age, ctx.gender_hint)
    }

    fn transition_prompt(&self, ctx: &TransitionPromptContext) -> String {
        format!("transition {}-{}", ctx.from_age, ctx.to_age)
    }
}

pub struct HarnessOptions {
    pub max_concurrent_transitions: usize,
    pub image_delay: Duration,
    pub transition_delay: Duration,
    pub assembly_delay: Duration,
    pub classifier: Option<ClassifierBehavior>,
    pub speculative_wait_secs: u64,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            max_concurrent_transitions: 3,
            image_delay: Duration::ZERO,
            transition_delay: Duration::ZERO,
            assembly_delay: Duration::ZERO,
            classifier: None,
            speculative_wait_secs: 30,
        }
    }
}

/// A use case wired to fakes over a temporary data directory.
pub struct Harness {
    pub temp_dir: TempDir,
    pub paths: AgelinePaths,
    pub reference: PathBuf,
    pub images: Arc<FakeImageSynth>,
    pub transitions: Arc<FakeTransitionSynth>,
    pub transcoder: Arc<FakeTranscoder>,
    pub classifier: Option<Arc<FakeClassifier>>,
    pub clock: Arc<ManualClock>,
    pub usecase: AgeProgressionUseCase,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(options: HarnessOptions) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let reference = temp_dir.path().join("upload.png");
        std::fs::write(&reference, b"reference photo").unwrap();

        let paths = AgelinePaths::at(temp_dir.path().join("data"));
        let repository = Arc::new(FileManifestRepository::with_paths(paths.clone()));

        let images = Arc::new(FakeImageSynth::new(options.image_delay));
        let transitions = Arc::new(FakeTransitionSynth::new(options.transition_delay));
        let transcoder = Arc::new(FakeTranscoder::new(5.0, options.assembly_delay));
        let classifier = options
            .classifier
            .map(|behavior| Arc::new(FakeClassifier::new(behavior)));

        let config = PipelineConfig {
            max_concurrent_transitions: options.max_concurrent_transitions,
            speculative_wait_secs: options.speculative_wait_secs,
            ..PipelineConfig::default()
        };
        let collaborators = Collaborators {
            images: images.clone(),
            transitions: transitions.clone(),
            classifier: classifier
                .clone()
                .map(|c| c as Arc<dyn GenderClassifier>),
            prompts: Arc::new(EchoPromptBuilder),
            transcoder: transcoder.clone(),
        };

        let clock = Arc::new(ManualClock::default());
        let registries = JobRegistries::in_memory(config.job_retention(), clock.clone());
        let ctx = PipelineContext::new(repository, paths.clone(), config, collaborators);

        Self {
            temp_dir,
            paths,
            reference,
            images,
            transitions,
            transcoder,
            classifier,
            clock,
            usecase: AgeProgressionUseCase::new(ctx, registries),
        }
    }

    pub async fn create_session(&self, ages: &[Age], mode: BackgroundMode) -> SessionManifest {
        self.create_session_with_hint(ages, mode, GenderHint::Auto)
            .await
    }

    pub async fn create_session_with_hint(
        &self,
        ages: &[Age],
        mode: BackgroundMode,
        gender_hint: GenderHint,
    ) -> SessionManifest {
        self.usecase
            .create_session(CreateSessionRequest {
                reference_image: self.reference.clone(),
                ages: ages.to_vec(),
                background_mode: mode,
                gender_hint,
            })
            .await
            .unwrap()
    }

    pub async fn manifest(&self, session_id: &str) -> SessionManifest {
        self.usecase.manifest(session_id).await.unwrap()
    }

    /// Moves the registry clock so later jobs sort as more recent.
    pub fn tick(&self) {
        self.clock.advance(chrono::Duration::seconds(1));
    }

    pub async fn run_frames(&self, session_id: &str) -> FrameJobSnapshot {
        self.tick();
        let ticket = self.usecase.start_frame_job(session_id).await.unwrap();
        self.wait_for_frame_job(&ticket.job_id).await
    }

    pub async fn wait_for_frame_job(&self, job_id: &str) -> FrameJobSnapshot {
        for _ in 0..1000 {
            let snapshot = self.usecase.frame_job_status(job_id).unwrap();
            if snapshot.status.is_finished() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("frame job {job_id} did not finish");
    }

    /// Waits until the latest frame job has no speculative work left.
    pub async fn wait_for_speculative(&self, session_id: &str) {
        let job = self
            .usecase
            .registries()
            .latest_frame_job(session_id)
            .unwrap();
        for _ in 0..1000 {
            if job.scheduler().pending_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("speculative transitions for {session_id} did not settle");
    }

    pub async fn run_video(
        &self,
        session_id: &str,
        duration_secs: Option<f64>,
    ) -> VideoJobSnapshot {
        self.tick();
        let ticket = self
            .usecase
            .start_video_job(session_id, duration_secs)
            .await
            .unwrap();
        self.wait_for_video_job(&ticket.job_id).await
    }

    pub async fn wait_for_video_job(&self, job_id: &str) -> VideoJobSnapshot {
        for _ in 0..1000 {
            let snapshot = self.usecase.video_job_status(job_id).unwrap();
            if snapshot.status.is_finished() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("video job {job_id} did not finish");
    }
}
