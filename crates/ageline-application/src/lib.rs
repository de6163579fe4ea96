//! Application layer: background jobs and the use case facade.
//!
//! # Module Structure
//!
//! - `context`: dependencies shared by every job
//! - `frame_pipeline` / `frame_job`: chained frame generation
//! - `transition_scheduler`: speculative, bounded-concurrency transitions
//! - `video_job`: reconciliation, retiming and assembly
//! - `regeneration`: single-frame regeneration with cascade invalidation
//! - `registry`: pollable job records
//! - `usecase`: `AgeProgressionUseCase`

pub mod context;
pub mod frame_job;
pub mod frame_pipeline;
pub mod regeneration;
pub mod registry;
pub mod transition_scheduler;
pub mod usecase;
pub mod video_job;

pub use context::{Collaborators, PipelineContext};
pub use frame_job::FrameJob;
pub use regeneration::Regeneration;
pub use registry::JobRegistries;
pub use transition_scheduler::{TransitionHandle, TransitionRequest, TransitionScheduler};
pub use usecase::{AgeProgressionUseCase, CreateSessionRequest, SessionStatus};
pub use video_job::VideoJob;
