//! Job domain module.
//!
//! Status/progress models for the two background job kinds and the
//! in-memory store that keeps their records for polling.
//!
//! # Module Structure
//!
//! - `model`: `JobStatus`, `JobProgress`, `AssemblyStage`, snapshots and tickets
//! - `store`: `JobStore` trait, `InMemoryJobStore`, and the `Clock` abstraction

mod model;
mod store;

// Re-export public API
pub use model::{
    AssemblyStage, FrameJobSnapshot, FrameJobTicket, JobProgress, JobStatus, SpeculativeStatus,
    VideoJobSnapshot, VideoJobTicket,
};
pub use store::{Clock, InMemoryJobStore, JobStore, ManualClock, SystemClock};
