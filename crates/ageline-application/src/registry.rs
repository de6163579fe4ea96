//! Job registries for pollable in-memory job records.

use ageline_core::error::{AgelineError, Result};
use ageline_core::job::{Clock, InMemoryJobStore, JobStore};
use std::sync::Arc;

use crate::frame_job::FrameJob;
use crate::video_job::VideoJob;

/// Frame and video job records, each kept for the retention window.
#[derive(Clone)]
pub struct JobRegistries {
    frame_jobs: Arc<dyn JobStore<FrameJob>>,
    video_jobs: Arc<dyn JobStore<VideoJob>>,
}

impl JobRegistries {
    pub fn new(
        frame_jobs: Arc<dyn JobStore<FrameJob>>,
        video_jobs: Arc<dyn JobStore<VideoJob>>,
    ) -> Self {
        Self {
            frame_jobs,
            video_jobs,
        }
    }

    /// In-memory registries sharing one retention window and clock.
    pub fn in_memory(retention: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(InMemoryJobStore::new(retention, clock.clone())),
            Arc::new(InMemoryJobStore::new(retention, clock)),
        )
    }

    pub fn frame_job(&self, job_id: &str) -> Option<Arc<FrameJob>> {
        self.frame_jobs.get(job_id)
    }

    pub fn video_job(&self, job_id: &str) -> Option<Arc<VideoJob>> {
        self.video_jobs.get(job_id)
    }

    /// Registers a frame job unless the session already has one running.
    pub fn insert_frame_job(&self, job: Arc<FrameJob>) -> Result<()> {
        let session_id = job.session_id().to_string();
        self.frame_jobs
            .put_unless(job.job_id().to_string(), job, &|existing: &FrameJob| {
                existing.session_id() == session_id && existing.is_active()
            })
            .map_err(|existing| {
                AgelineError::conflict(format!(
                    "frame job {} is already running for session {}",
                    existing.job_id(),
                    session_id
                ))
            })
    }

    /// Registers a video job unless the session already has one queued or
    /// running.
    pub fn insert_video_job(&self, job: Arc<VideoJob>) -> Result<()> {
        let session_id = job.session_id().to_string();
        self.video_jobs
            .put_unless(job.job_id().to_string(), job, &|existing: &VideoJob| {
                existing.session_id() == session_id && existing.is_active()
            })
            .map_err(|existing| {
                AgelineError::conflict(format!(
                    "video job {} is already running for session {}",
                    existing.job_id(),
                    session_id
                ))
            })
    }

    /// Most recently registered frame job for a session.
    pub fn latest_frame_job(&self, session_id: &str) -> Option<Arc<FrameJob>> {
        self.frame_jobs
            .find(&|job: &FrameJob| job.session_id() == session_id)
            .into_iter()
            .next()
    }

    /// Most recently registered video job for a session.
    pub fn latest_video_job(&self, session_id: &str) -> Option<Arc<VideoJob>> {
        self.video_jobs
            .find(&|job: &VideoJob| job.session_id() == session_id)
            .into_iter()
            .next()
    }

    pub fn active_video_job(&self, session_id: &str) -> Option<Arc<VideoJob>> {
        self.video_jobs
            .find(&|job: &VideoJob| job.session_id() == session_id && job.is_active())
            .into_iter()
            .next()
    }

    /// Drops expired records from both registries.
    pub fn sweep(&self) -> usize {
        let removed = self.frame_jobs.sweep() + self.video_jobs.sweep();
        if removed > 0 {
            tracing::debug!("[JobRegistries] Swept {} expired job record(s)", removed);
        }
        removed
    }
}
