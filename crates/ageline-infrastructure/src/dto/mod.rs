//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs represent the versioned schema for persisted manifests.
//! They are private to the infrastructure layer and handle the evolution
//! of the storage format over time.
//!
//! ## Schema Versioning (Semantic Versioning)
//!
//! - **MAJOR (X.0.0)**: Breaking changes (field removal, type changes)
//! - **MINOR (1.X.0)**: Backward-compatible additions (new optional fields)
//!
//! ### SessionManifest Version History
//! - **1.0.0**: Initial schema

mod manifest;

pub use manifest::{
    FinalVideoV1_0_0, FrameV1_0_0, ManifestV1_0_0, SourceFrameV1_0_0, TransitionV1_0_0,
    create_manifest_migrator,
};
