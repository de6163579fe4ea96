//! Job status and snapshot models.
//!
//! Snapshots are the only thing pollers ever see of a running job.

use crate::session::{Age, FinalVideo, Frame, PairKey, SourceFrame, Transition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of a background job.
///
/// There is no partial-success state: a job ends either `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Queued or running.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    pub fn is_finished(&self) -> bool {
        !self.is_active()
    }
}

/// Step counter plus a free-text message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub completed: usize,
    pub total: usize,
    pub current_age: Option<Age>,
    pub message: String,
}

impl JobProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            current_age: None,
            message: "Queued".to_string(),
        }
    }

    /// Completion ratio in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.total as f64).min(1.0)
    }
}

/// Where the video-creation job is within assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStage {
    #[default]
    Idle,
    /// Reconciling and generating transition clips.
    Editing,
    /// Probing clips and computing the speed factor.
    Retiming,
    /// Running the transcoder and persisting the result.
    Finalizing,
    Done,
}

/// State of one speculatively generated transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeculativeStatus {
    Running,
    Completed,
    Failed,
}

/// Point-in-time view of a frame-generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameJobSnapshot {
    pub job_id: String,
    pub session_id: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub source_frame: Option<SourceFrame>,
    pub frames: Vec<Frame>,
    /// Speculative transition status keyed by `from-to`.
    pub transitions: BTreeMap<String, SpeculativeStatus>,
    pub transitions_in_flight: usize,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Point-in-time view of a video-creation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJobSnapshot {
    pub job_id: String,
    pub session_id: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub stage: AssemblyStage,
    pub transitions: Vec<Transition>,
    pub final_video: Option<FinalVideo>,
    /// Pairs reused from earlier generation rather than regenerated.
    pub reused_pairs: Vec<PairKey>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Handle returned when a frame-generation job starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameJobTicket {
    pub job_id: String,
    pub session_id: String,
    pub total_steps: usize,
}

/// Handle returned when a video-creation job starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoJobTicket {
    pub job_id: String,
    pub session_id: String,
}
