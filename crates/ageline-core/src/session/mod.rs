//! Session domain module.
//!
//! This module contains the session manifest model, cascade invalidation
//! rules, and the repository interface for manifest persistence.
//!
//! # Module Structure
//!
//! - `model`: Manifest, frame, transition and final-video records
//! - `invalidation`: Regeneration cascade (`invalidate_from`)
//! - `repository`: Repository trait for manifest persistence
//!
//! # Usage
//!
//! ```ignore
//! use ageline_core::session::{SessionManifest, ManifestRepository, RegenerateTarget};
//! ```

mod invalidation;
mod model;
mod repository;

// Re-export public API
pub use invalidation::{Invalidation, RegenerateTarget};
pub use model::{
    Age, BackgroundMode, FinalVideo, Frame, GenderHint, MAX_AGE, NarrativeTrack, PairKey,
    SessionManifest, SourceFrame, Transition, validate_ages,
};
pub use repository::{ManifestMutation, ManifestRepository};
