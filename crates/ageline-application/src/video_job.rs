//! Video-creation job.
//!
//! Reconciles the transitions a session needs against what speculation and
//! earlier runs already produced, generates the gaps, then hands the clips
//! to the transcoder in age order.

use ageline_core::Outcome;
use ageline_core::error::{AgelineError, Result};
use ageline_core::job::{AssemblyStage, JobProgress, JobStatus, VideoJobSnapshot, VideoJobTicket};
use ageline_core::provider::AssemblyRequest;
use ageline_core::retime::RetimePlan;
use ageline_core::session::{FinalVideo, PairKey, SessionManifest, Transition};
use ageline_infrastructure::media_store;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::context::PipelineContext;
use crate::frame_pipeline::merge_transitions;
use crate::transition_scheduler::{TransitionRequest, TransitionScheduler};

struct VideoJobState {
    status: JobStatus,
    progress: JobProgress,
    stage: AssemblyStage,
    transitions: Vec<Transition>,
    final_video: Option<FinalVideo>,
    reused_pairs: Vec<PairKey>,
    error: Option<String>,
    updated_at: String,
}

/// A video-creation job.
pub struct VideoJob {
    job_id: String,
    session_id: String,
    created_at: String,
    requested_duration_secs: Option<f64>,
    state: Mutex<VideoJobState>,
}

impl VideoJob {
    /// Creates a queued job for a session with `pair_count` transitions.
    pub fn new(
        job_id: impl Into<String>,
        session_id: impl Into<String>,
        pair_count: usize,
        requested_duration_secs: Option<f64>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            job_id: job_id.into(),
            session_id: session_id.into(),
            created_at: now.clone(),
            requested_duration_secs,
            state: Mutex::new(VideoJobState {
                status: JobStatus::Queued,
                // Every pair, then retiming, then finalizing
                progress: JobProgress::new(pair_count + 2),
                stage: AssemblyStage::Idle,
                transitions: Vec::new(),
                final_video: None,
                reused_pairs: Vec::new(),
                error: None,
                updated_at: now,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VideoJobState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut VideoJobState)) {
        let mut state = self.lock();
        f(&mut state);
        state.updated_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn requested_duration_secs(&self) -> Option<f64> {
        self.requested_duration_secs
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    pub fn stage(&self) -> AssemblyStage {
        self.lock().stage
    }

    pub fn ticket(&self) -> VideoJobTicket {
        VideoJobTicket {
            job_id: self.job_id.clone(),
            session_id: self.session_id.clone(),
        }
    }

    pub fn mark_running(&self) {
        self.update(|s| {
            s.status = JobStatus::Running;
            s.progress.message = "Starting".to_string();
        });
    }

    pub fn enter_stage(&self, stage: AssemblyStage, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| {
            s.stage = stage;
            s.progress.message = message;
        });
    }

    pub fn record_reused(&self, key: PairKey) {
        self.update(|s| {
            s.reused_pairs.push(key);
            s.progress.completed += 1;
        });
    }

    pub fn record_generated(&self, key: PairKey) {
        self.update(|s| {
            s.progress.completed += 1;
            s.progress.message = format!("Generated transition {key}");
        });
    }

    pub fn record_transitions(&self, transitions: Vec<Transition>) {
        self.update(|s| s.transitions = transitions);
    }

    /// Marks one non-pair step (retiming) done.
    pub fn advance(&self) {
        self.update(|s| s.progress.completed += 1);
    }

    pub fn complete(&self, final_video: FinalVideo) {
        self.update(|s| {
            s.status = JobStatus::Completed;
            s.stage = AssemblyStage::Done;
            s.progress.completed = s.progress.total;
            s.progress.message = "Completed".to_string();
            s.final_video = Some(final_video);
        });
    }

    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.update(|s| {
            s.status = JobStatus::Failed;
            s.progress.message = "Failed".to_string();
            s.error = Some(error);
        });
    }

    pub fn snapshot(&self) -> VideoJobSnapshot {
        let state = self.lock();
        VideoJobSnapshot {
            job_id: self.job_id.clone(),
            session_id: self.session_id.clone(),
            status: state.status,
            progress: state.progress.clone(),
            stage: state.stage,
            transitions: state.transitions.clone(),
            final_video: state.final_video.clone(),
            reused_pairs: state.reused_pairs.clone(),
            error: state.error.clone(),
            created_at: self.created_at.clone(),
            updated_at: state.updated_at.clone(),
        }
    }
}

/// Runs a video job to completion, recording the outcome on the job.
///
/// `speculative` is the scheduler of the session's latest frame job, whose
/// in-flight transitions are awaited (bounded) before reconciliation.
pub async fn run_video_job(
    ctx: PipelineContext,
    job: Arc<VideoJob>,
    speculative: Option<Arc<TransitionScheduler>>,
) {
    job.mark_running();
    tracing::info!(
        session_id = %job.session_id(),
        job_id = %job.job_id(),
        "[VideoJob] Video job started"
    );

    match create_video(&ctx, &job, speculative.as_deref()).await {
        Ok(final_video) => {
            tracing::info!(
                session_id = %job.session_id(),
                job_id = %job.job_id(),
                duration_secs = final_video.duration_secs,
                speed_factor = final_video.speed_factor,
                "[VideoJob] Video job completed"
            );
            job.complete(final_video);
        }
        Err(e) => {
            tracing::error!(
                session_id = %job.session_id(),
                job_id = %job.job_id(),
                "[VideoJob] Video job failed: {}",
                e
            );
            job.fail(describe(&e));
        }
    }
}

/// Error text kept on the job, with the transcoder's stderr when present.
fn describe(error: &AgelineError) -> String {
    match error {
        AgelineError::Assembly { stderr, .. } if !stderr.trim().is_empty() => {
            format!("{error}\n{}", stderr.trim())
        }
        _ => error.to_string(),
    }
}

async fn load_complete(ctx: &PipelineContext, session_id: &str) -> Result<SessionManifest> {
    let manifest = ctx
        .repository
        .find_by_id(session_id)
        .await?
        .ok_or_else(|| AgelineError::not_found("Session", session_id.to_string()))?;
    ensure_assemblable(&manifest)?;
    Ok(manifest)
}

/// Checks that a manifest has every frame and at least one pair to bridge.
pub fn ensure_assemblable(manifest: &SessionManifest) -> Result<()> {
    if !manifest.is_complete() {
        return Err(AgelineError::invalid_state(format!(
            "session {} has {} of {} frames; generate all frames first",
            manifest.session_id,
            manifest.frames.len(),
            manifest.ages.len()
        )));
    }
    if manifest.required_pairs().is_empty() {
        return Err(AgelineError::invalid_state(
            "at least two ages are required to assemble a video",
        ));
    }
    Ok(())
}

async fn create_video(
    ctx: &PipelineContext,
    job: &VideoJob,
    speculative: Option<&TransitionScheduler>,
) -> Result<FinalVideo> {
    let session_id = job.session_id().to_string();
    load_complete(ctx, &session_id).await?;

    job.enter_stage(AssemblyStage::Editing, "Collecting transitions");
    if let Some(scheduler) = speculative {
        collect_speculative(ctx, &session_id, scheduler).await?;
    }

    let transitions = reconcile_transitions(ctx, job, &session_id, speculative).await?;
    job.record_transitions(transitions.clone());

    job.enter_stage(AssemblyStage::Retiming, "Measuring transitions");
    let mut durations = Vec::with_capacity(transitions.len());
    for transition in &transitions {
        durations.push(
            ctx.collaborators
                .transcoder
                .clip_duration(&transition.video_path)
                .await?,
        );
    }
    let requested = job
        .requested_duration_secs()
        .unwrap_or(ctx.config.default_final_duration_secs);
    let plan = RetimePlan::compute(&durations, requested, ctx.config.duration_bounds())?;
    job.advance();

    job.enter_stage(AssemblyStage::Finalizing, "Assembling final video");
    let output = ctx.paths.final_video_path(&session_id);
    let request = AssemblyRequest {
        inputs: transitions.iter().map(|t| t.video_path.clone()).collect(),
        output: output.clone(),
        width: ctx.config.target_width,
        height: ctx.config.target_height,
        fps: ctx.config.output_fps,
        speed_factor: plan.speed_factor,
    };
    ctx.collaborators.transcoder.assemble(&request).await?;

    let final_video = FinalVideo {
        video_path: output,
        duration_secs: plan.target_duration_secs,
        speed_factor: plan.speed_factor,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    let recorded = final_video.clone();
    ctx.repository
        .update(
            &session_id,
            Box::new(move |m: &mut SessionManifest| m.set_final_video(recorded)),
        )
        .await?;
    Ok(final_video)
}

/// Waits for the frame job's speculative transitions and merges the ones
/// that finished into the manifest.
///
/// Returns how many finished transitions were offered to the manifest.
pub(crate) async fn collect_speculative(
    ctx: &PipelineContext,
    session_id: &str,
    scheduler: &TransitionScheduler,
) -> Result<usize> {
    let outcomes = scheduler.await_pending(ctx.config.speculative_wait()).await;
    let mut finished = Vec::new();
    for (key, outcome) in outcomes {
        match outcome {
            Outcome::Succeeded(transition) => finished.push(transition),
            Outcome::Skipped(reason) | Outcome::Failed(reason) => {
                tracing::debug!(
                    session_id = %session_id,
                    pair = %key,
                    "[VideoJob] Speculative transition unavailable: {}",
                    reason
                );
            }
        }
    }
    if finished.is_empty() {
        return Ok(0);
    }
    let count = finished.len();
    ctx.repository
        .update(
            session_id,
            Box::new(move |m: &mut SessionManifest| {
                merge_transitions(m, finished);
                Ok(())
            }),
        )
        .await?;
    Ok(count)
}

/// Produces a valid transition for every consecutive pair, in age order.
///
/// A recorded transition is reused only if it was made from the current
/// frames and its file is still on disk. Everything else is regenerated
/// with bounded concurrency, and the reconciled list replaces the
/// manifest's. Generation shares the frame job's permits when there is one,
/// since its speculative calls may still be running.
async fn reconcile_transitions(
    ctx: &PipelineContext,
    job: &VideoJob,
    session_id: &str,
    speculative: Option<&TransitionScheduler>,
) -> Result<Vec<Transition>> {
    let manifest = load_complete(ctx, session_id).await?;
    let scheduler = match speculative {
        Some(frame_scheduler) => {
            TransitionScheduler::with_permits(session_id, ctx.clone(), frame_scheduler.permits())
        }
        None => TransitionScheduler::new(session_id, ctx.clone()),
    };
    let mut reused = Vec::new();
    let mut stale = Vec::new();
    let mut missing = Vec::new();

    for key in manifest.required_pairs() {
        let (from, to) = match (manifest.frame(key.from_age), manifest.frame(key.to_age)) {
            (Some(from), Some(to)) => (from.clone(), to.clone()),
            _ => {
                return Err(AgelineError::invalid_state(format!(
                    "frames for {key} are missing"
                )));
            }
        };

        if let Some(existing) = manifest.transition(key) {
            if existing.matches_frames(&from, &to)
                && media_store::is_usable_file(&existing.video_path).await
            {
                reused.push(existing.clone());
                job.record_reused(key);
                continue;
            }
            stale.push(existing.video_path.clone());
        }
        missing.push(TransitionRequest {
            from,
            to,
            background_mode: manifest.background_mode,
            narrative_track: manifest.narrative_track,
        });
    }

    // Stale clips share their pair's path with the replacement
    media_store::remove_orphans(&stale).await;
    tracing::info!(
        session_id = %session_id,
        reused = reused.len(),
        missing = missing.len(),
        "[VideoJob] Reconciled transitions"
    );
    for request in missing {
        scheduler.schedule(request);
    }

    let mut transitions = reused;
    let mut failures = Vec::new();
    for (key, outcome) in scheduler.await_all().await {
        match outcome {
            Outcome::Succeeded(transition) => {
                job.record_generated(key);
                transitions.push(transition);
            }
            Outcome::Skipped(reason) | Outcome::Failed(reason) => {
                failures.push(format!("{key}: {reason}"));
            }
        }
    }
    transitions.sort_by_key(|t| t.key());

    if !failures.is_empty() {
        // Keep what did succeed so a retry can reuse it
        let partial = transitions.clone();
        ctx.repository
            .update(
                session_id,
                Box::new(move |m: &mut SessionManifest| {
                    merge_transitions(m, partial);
                    Ok(())
                }),
            )
            .await?;
        return Err(AgelineError::collaborator(
            "transition",
            format!("failed to generate {}", failures.join("; ")),
        ));
    }

    let active: Vec<PathBuf> = transitions.iter().map(|t| t.video_path.clone()).collect();
    let recorded = transitions.clone();
    ctx.repository
        .update(
            session_id,
            Box::new(move |m: &mut SessionManifest| {
                m.set_transitions(Vec::new());
                for transition in recorded {
                    m.upsert_transition(transition)?;
                }
                Ok(())
            }),
        )
        .await?;

    media_store::remove_untracked(&ctx.paths.transitions_dir(session_id), &active).await;
    Ok(transitions)
}
