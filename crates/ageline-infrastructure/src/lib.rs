//! Infrastructure layer for Ageline: filesystem layout, versioned manifest
//! persistence and configuration loading.

pub mod config_service;
pub mod dto;
pub mod manifest_repository;
pub mod media_store;
pub mod paths;
pub mod storage;

pub use config_service::ConfigService;
pub use manifest_repository::FileManifestRepository;
pub use paths::{AgelinePaths, PathError};
