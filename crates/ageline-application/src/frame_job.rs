//! In-memory record of a frame-generation job.

use ageline_core::job::{FrameJobSnapshot, FrameJobTicket, JobProgress, JobStatus};
use ageline_core::session::{Age, Frame, SourceFrame};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::transition_scheduler::TransitionScheduler;

struct FrameJobState {
    status: JobStatus,
    progress: JobProgress,
    source_frame: Option<SourceFrame>,
    frames: Vec<Frame>,
    error: Option<String>,
    updated_at: String,
}

/// A frame-generation job.
///
/// Progress fields sit behind one mutex so that a snapshot never mixes two
/// updates; speculative-transition bookkeeping lives in the owned
/// [`TransitionScheduler`] and uses atomic counters instead.
pub struct FrameJob {
    job_id: String,
    session_id: String,
    created_at: String,
    scheduler: Arc<TransitionScheduler>,
    state: Mutex<FrameJobState>,
}

impl FrameJob {
    /// Creates a queued job with `total_steps` steps to go.
    pub fn new(
        job_id: impl Into<String>,
        session_id: impl Into<String>,
        total_steps: usize,
        scheduler: Arc<TransitionScheduler>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            job_id: job_id.into(),
            session_id: session_id.into(),
            created_at: now.clone(),
            scheduler,
            state: Mutex::new(FrameJobState {
                status: JobStatus::Queued,
                progress: JobProgress::new(total_steps),
                source_frame: None,
                frames: Vec::new(),
                error: None,
                updated_at: now,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrameJobState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut FrameJobState)) {
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

    pub fn scheduler(&self) -> &Arc<TransitionScheduler> {
        &self.scheduler
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Active, or still waiting on speculative transitions it started.
    pub fn is_busy(&self) -> bool {
        self.is_active() || self.scheduler.pending_count() > 0
    }

    pub fn ticket(&self) -> FrameJobTicket {
        FrameJobTicket {
            job_id: self.job_id.clone(),
            session_id: self.session_id.clone(),
            total_steps: self.lock().progress.total,
        }
    }

    pub fn mark_running(&self) {
        self.update(|s| {
            s.status = JobStatus::Running;
            s.progress.message = "Starting".to_string();
        });
    }

    /// Sets the progress message for the step about to run.
    pub fn begin_step(&self, current_age: Option<Age>, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| {
            s.progress.current_age = current_age;
            s.progress.message = message;
        });
    }

    pub fn record_source(&self, source: SourceFrame) {
        self.update(|s| {
            s.source_frame = Some(source);
            s.progress.completed += 1;
        });
    }

    pub fn record_frame(&self, frame: Frame) {
        self.update(|s| {
            s.progress.current_age = Some(frame.age);
            s.progress.message = format!("Generated frame for age {}", frame.age);
            s.frames.push(frame);
            s.progress.completed += 1;
        });
    }

    pub fn complete(&self) {
        self.update(|s| {
            s.status = JobStatus::Completed;
            s.progress.completed = s.progress.total;
            s.progress.current_age = None;
            s.progress.message = "Completed".to_string();
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

    pub fn snapshot(&self) -> FrameJobSnapshot {
        let transitions = self.scheduler.status_map();
        let transitions_in_flight = self.scheduler.in_flight();
        let state = self.lock();
        FrameJobSnapshot {
            job_id: self.job_id.clone(),
            session_id: self.session_id.clone(),
            status: state.status,
            progress: state.progress.clone(),
            source_frame: state.source_frame.clone(),
            frames: state.frames.clone(),
            transitions,
            transitions_in_flight,
            error: state.error.clone(),
            created_at: self.created_at.clone(),
            updated_at: state.updated_at.clone(),
        }
    }
}
