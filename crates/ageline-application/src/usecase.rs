//! Age-progression use case.
//!
//! This module provides the `AgeProgressionUseCase`, the surface callers use
//! to create sessions, start and poll the two background jobs, and
//! regenerate individual frames.

use ageline_core::error::{AgelineError, Result};
use ageline_core::job::{
    AssemblyStage, FrameJobSnapshot, FrameJobTicket, JobProgress, JobStatus, SpeculativeStatus,
    VideoJobSnapshot, VideoJobTicket,
};
use ageline_core::session::{
    Age, BackgroundMode, GenderHint, RegenerateTarget, SessionManifest, validate_ages,
};
use ageline_infrastructure::media_store;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::frame_job::FrameJob;
use crate::frame_pipeline::run_frame_job;
use crate::regeneration::{Regeneration, regenerate};
use crate::registry::JobRegistries;
use crate::transition_scheduler::TransitionScheduler;
use crate::video_job::{VideoJob, collect_speculative, ensure_assemblable, run_video_job};

/// Input for [`AgeProgressionUseCase::create_session`].
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    /// Uploaded photo; copied into the session directory.
    pub reference_image: PathBuf,
    pub ages: Vec<Age>,
    pub background_mode: BackgroundMode,
    pub gender_hint: GenderHint,
}

/// Manifest plus the latest known state of both jobs.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub manifest: SessionManifest,
    pub frame_job: FrameJobSnapshot,
    pub video_job: VideoJobSnapshot,
}

/// Removes the session from the in-progress set when regeneration ends.
struct RegenerationGuard {
    active: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl Drop for RegenerationGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.session_id);
    }
}

/// Use case for running age-progression sessions.
///
/// # Responsibilities
///
/// - Creating sessions and importing the reference photo
/// - Starting frame and video jobs as background tasks
/// - Answering polls from the job registries, or from the manifest once a
///   record has expired
/// - Rejecting work that would race with a running job
pub struct AgeProgressionUseCase {
    ctx: PipelineContext,
    registries: JobRegistries,
    /// Sessions with a regeneration in progress. Its lock is also held
    /// across every conflict check and the registration that follows it.
    regenerating: Arc<Mutex<HashSet<String>>>,
}

impl AgeProgressionUseCase {
    pub fn new(ctx: PipelineContext, registries: JobRegistries) -> Self {
        Self {
            ctx,
            registries,
            regenerating: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn registries(&self) -> &JobRegistries {
        &self.registries
    }

    /// Creates a session and writes its initial manifest.
    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionManifest> {
        validate_ages(&request.ages)?;

        let session_id = Uuid::new_v4().to_string();
        let extension = request
            .reference_image
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("png");
        let reference = self.ctx.paths.reference_path(&session_id, extension);
        media_store::import_reference(&request.reference_image, &reference).await?;

        let manifest = SessionManifest::new(
            session_id,
            reference,
            request.ages,
            request.background_mode,
            request.gender_hint,
        )?;
        self.ctx.repository.save(&manifest).await?;

        tracing::info!(
            session_id = %manifest.session_id,
            ages = ?manifest.ages,
            "[AgeProgression] Session created"
        );
        Ok(manifest)
    }

    /// Loads a session manifest.
    pub async fn manifest(&self, session_id: &str) -> Result<SessionManifest> {
        self.ctx
            .repository
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| AgelineError::not_found("Session", session_id.to_string()))
    }

    pub async fn session_ids(&self) -> Result<Vec<String>> {
        self.ctx.repository.list_ids().await
    }

    fn admission(&self) -> MutexGuard<'_, HashSet<String>> {
        self.regenerating.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts a frame job in the background.
    ///
    /// Frames already in the manifest are kept, so this also resumes a job
    /// that failed or was lost to a restart. Rejected while a frame job,
    /// a video job or a regeneration is active for the session.
    pub async fn start_frame_job(&self, session_id: &str) -> Result<FrameJobTicket> {
        let manifest = self.manifest(session_id).await?;

        let total_steps = manifest.ages.len() + usize::from(manifest.requires_source_frame());
        let scheduler = Arc::new(TransitionScheduler::new(session_id, self.ctx.clone()));
        let job = Arc::new(FrameJob::new(
            Uuid::new_v4().to_string(),
            session_id,
            total_steps,
            scheduler,
        ));
        {
            let regenerating = self.admission();
            if regenerating.contains(session_id) {
                return Err(AgelineError::conflict(format!(
                    "a frame is being regenerated for session {session_id}"
                )));
            }
            if let Some(video) = self.registries.active_video_job(session_id) {
                return Err(AgelineError::conflict(format!(
                    "video job {} is still running for session {session_id}",
                    video.job_id()
                )));
            }
            self.registries.insert_frame_job(job.clone())?;
        }

        tokio::spawn(run_frame_job(self.ctx.clone(), job.clone()));
        Ok(job.ticket())
    }

    /// Snapshot of a registered frame job.
    pub fn frame_job_status(&self, job_id: &str) -> Result<FrameJobSnapshot> {
        self.registries
            .frame_job(job_id)
            .map(|job| job.snapshot())
            .ok_or_else(|| AgelineError::not_found("FrameJob", job_id.to_string()))
    }

    /// Re-derives a frame job snapshot from the manifest alone.
    ///
    /// A complete frame set reads as a completed job; anything short of it
    /// reads as a job that failed and needs to be restarted.
    pub async fn frame_job_from_manifest(&self, session_id: &str) -> Result<FrameJobSnapshot> {
        let manifest = self.manifest(session_id).await?;
        let with_source = manifest.requires_source_frame();
        let total = manifest.ages.len() + usize::from(with_source);
        let completed =
            manifest.frames.len() + usize::from(with_source && manifest.source_frame.is_some());
        let complete = manifest.is_complete();

        let (status, message, error) = if complete {
            (JobStatus::Completed, "Completed".to_string(), None)
        } else {
            (
                JobStatus::Failed,
                "Interrupted".to_string(),
                Some(format!(
                    "frame generation did not finish ({} of {} frames); start a new frame job to resume",
                    manifest.frames.len(),
                    manifest.ages.len()
                )),
            )
        };

        Ok(FrameJobSnapshot {
            job_id: String::new(),
            session_id: manifest.session_id.clone(),
            status,
            progress: JobProgress {
                completed,
                total,
                current_age: manifest.frames.last().map(|f| f.age),
                message,
            },
            source_frame: manifest.source_frame.clone(),
            frames: manifest.frames.clone(),
            transitions: manifest
                .transitions
                .iter()
                .map(|t| (t.key().to_string(), SpeculativeStatus::Completed))
                .collect(),
            transitions_in_flight: 0,
            error,
            created_at: manifest.created_at.clone(),
            updated_at: manifest.updated_at.clone(),
        })
    }

    /// Waits (bounded) for the latest frame job's speculative transitions
    /// and records the finished ones in the manifest.
    ///
    /// For callers about to drop the process, so clips that finished after
    /// the frame job's last save point are not lost.
    pub async fn persist_speculative(&self, session_id: &str) -> Result<usize> {
        match self.registries.latest_frame_job(session_id) {
            Some(job) => collect_speculative(&self.ctx, session_id, job.scheduler()).await,
            None => Ok(0),
        }
    }

    /// Regenerates one frame, cascading invalidation downstream.
    ///
    /// Rejected while the session has a frame job running or still
    /// generating speculative transitions, an active video job, or another
    /// regeneration in progress.
    pub async fn regenerate_frame(
        &self,
        session_id: &str,
        target: RegenerateTarget,
    ) -> Result<Regeneration> {
        let _guard = {
            let mut active = self.admission();
            if let Some(job) = self.registries.latest_frame_job(session_id) {
                if job.is_busy() {
                    return Err(AgelineError::conflict(format!(
                        "frame job {} is still running for session {session_id}",
                        job.job_id()
                    )));
                }
            }
            if let Some(job) = self.registries.active_video_job(session_id) {
                return Err(AgelineError::conflict(format!(
                    "video job {} is still running for session {session_id}",
                    job.job_id()
                )));
            }
            if !active.insert(session_id.to_string()) {
                return Err(AgelineError::conflict(format!(
                    "a frame is already being regenerated for session {session_id}"
                )));
            }
            RegenerationGuard {
                active: self.regenerating.clone(),
                session_id: session_id.to_string(),
            }
        };

        regenerate(&self.ctx, session_id, target).await
    }

    /// Starts a video job in the background.
    ///
    /// `duration_secs` is the requested output length; the configured
    /// default is used when absent.
    pub async fn start_video_job(
        &self,
        session_id: &str,
        duration_secs: Option<f64>,
    ) -> Result<VideoJobTicket> {
        if let Some(duration) = duration_secs {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(AgelineError::invalid_state(format!(
                    "requested duration {duration} must be positive"
                )));
            }
        }

        let manifest = self.manifest(session_id).await?;
        ensure_assemblable(&manifest)?;

        let job = Arc::new(VideoJob::new(
            Uuid::new_v4().to_string(),
            session_id,
            manifest.required_pairs().len(),
            duration_secs,
        ));
        {
            let regenerating = self.admission();
            if regenerating.contains(session_id) {
                return Err(AgelineError::conflict(format!(
                    "a frame is being regenerated for session {session_id}"
                )));
            }
            if let Some(frame_job) = self.registries.latest_frame_job(session_id) {
                if frame_job.is_active() {
                    return Err(AgelineError::conflict(format!(
                        "frame job {} is still running for session {session_id}",
                        frame_job.job_id()
                    )));
                }
            }
            self.registries.insert_video_job(job.clone())?;
        }

        let speculative = self
            .registries
            .latest_frame_job(session_id)
            .map(|frame_job| frame_job.scheduler().clone());
        tokio::spawn(run_video_job(self.ctx.clone(), job.clone(), speculative));
        Ok(job.ticket())
    }

    /// Snapshot of a registered video job.
    pub fn video_job_status(&self, job_id: &str) -> Result<VideoJobSnapshot> {
        self.registries
            .video_job(job_id)
            .map(|job| job.snapshot())
            .ok_or_else(|| AgelineError::not_found("VideoJob", job_id.to_string()))
    }

    /// Re-derives a video job snapshot from the manifest alone.
    pub async fn video_status_from_manifest(&self, session_id: &str) -> Result<VideoJobSnapshot> {
        let manifest = self.manifest(session_id).await?;
        let pairs = manifest.required_pairs().len();
        let mut progress = JobProgress::new(pairs + 2);

        let (status, stage, error) = match &manifest.final_video {
            Some(_) => {
                progress.completed = progress.total;
                progress.message = "Completed".to_string();
                (JobStatus::Completed, AssemblyStage::Done, None)
            }
            None => {
                progress.completed = manifest.transitions.len();
                progress.message = "Not assembled".to_string();
                (
                    JobStatus::Failed,
                    AssemblyStage::Idle,
                    Some("no final video recorded; start a video job".to_string()),
                )
            }
        };

        Ok(VideoJobSnapshot {
            job_id: String::new(),
            session_id: manifest.session_id.clone(),
            status,
            progress,
            stage,
            transitions: manifest.transitions.clone(),
            final_video: manifest.final_video.clone(),
            reused_pairs: Vec::new(),
            error,
            created_at: manifest.created_at.clone(),
            updated_at: manifest.updated_at.clone(),
        })
    }

    /// Manifest plus job state, preferring live job records.
    pub async fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let manifest = self.manifest(session_id).await?;
        let frame_job = match self.registries.latest_frame_job(session_id) {
            Some(job) => job.snapshot(),
            None => self.frame_job_from_manifest(session_id).await?,
        };
        let video_job = match self.registries.latest_video_job(session_id) {
            Some(job) => job.snapshot(),
            None => self.video_status_from_manifest(session_id).await?,
        };
        Ok(SessionStatus {
            manifest,
            frame_job,
            video_job,
        })
    }

    /// Drops expired job records.
    pub fn sweep_jobs(&self) -> usize {
        self.registries.sweep()
    }
}
