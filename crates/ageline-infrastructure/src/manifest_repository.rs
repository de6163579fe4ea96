//! File-based session manifest repository.
//!
//! Stores each manifest as versioned JSON at
//! `{data_dir}/sessions/{session_id}/manifest.json`.
//!
//! Writes are serialized twice: an in-process async mutex orders updates
//! issued by concurrent jobs, and an exclusive file lock guards against a
//! second process. Every write replaces the file atomically.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio::task;

use ageline_core::error::{AgelineError, Result};
use ageline_core::session::{ManifestMutation, ManifestRepository, SessionManifest};

use crate::dto::create_manifest_migrator;
use crate::paths::AgelinePaths;
use crate::storage::{AtomicJsonError, AtomicJsonFile};

const ENTITY: &str = "session_manifest";

/// Manifest repository backed by one JSON file per session.
pub struct FileManifestRepository {
    paths: AgelinePaths,
    write_lock: Mutex<()>,
}

impl FileManifestRepository {
    /// Creates a repository rooted at the default data directory.
    pub fn new() -> Result<Self> {
        let paths = AgelinePaths::new(None).map_err(|e| AgelineError::config(e.to_string()))?;
        Ok(Self::with_paths(paths))
    }

    pub fn with_paths(paths: AgelinePaths) -> Self {
        Self {
            paths,
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a repository with a custom base path (for testing).
    pub fn with_base_path(base: PathBuf) -> Self {
        Self::with_paths(AgelinePaths::at(base))
    }

    pub fn paths(&self) -> &AgelinePaths {
        &self.paths
    }

    fn decode(value: serde_json::Value) -> Result<SessionManifest> {
        let migrator = create_manifest_migrator();
        migrator
            .load_flat_from(ENTITY, value)
            .map_err(|e| AgelineError::migration(format!("Failed to migrate manifest: {}", e)))
    }

    fn encode(manifest: &SessionManifest) -> Result<serde_json::Value> {
        let migrator = create_manifest_migrator();
        let json_str = migrator
            .save_domain_flat(ENTITY, manifest.clone())
            .map_err(|e| AgelineError::migration(format!("Failed to serialize manifest: {}", e)))?;
        Ok(serde_json::from_str(&json_str)?)
    }

    fn load_sync(path: &Path) -> Result<Option<SessionManifest>> {
        let file = AtomicJsonFile::new(path.to_path_buf());
        match file.load()? {
            Some(value) => Ok(Some(Self::decode(value)?)),
            None => Ok(None),
        }
    }

    fn save_sync(path: &Path, manifest: &SessionManifest) -> Result<()> {
        manifest.check_invariants()?;
        let value = Self::encode(manifest)?;
        AtomicJsonFile::new(path.to_path_buf()).save(&value)?;
        Ok(())
    }

    fn update_sync(
        path: &Path,
        session_id: &str,
        mutation: ManifestMutation,
    ) -> Result<SessionManifest> {
        let file = AtomicJsonFile::new(path.to_path_buf());
        let session_id = session_id.to_string();
        let updated = file.update(move |current| {
            let value = current.ok_or_else(|| AgelineError::not_found("Session", session_id))?;
            let mut manifest = Self::decode(value)?;
            mutation(&mut manifest)?;
            manifest.touch();
            manifest.check_invariants()?;
            Self::encode(&manifest).map_err(AtomicJsonError::from)
        })?;
        Self::decode(updated)
    }

    fn list_ids_sync(sessions_dir: &Path) -> Result<Vec<String>> {
        if !sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(sessions_dir)? {
            let entry = entry?;
            if entry.path().join("manifest.json").is_file() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn join_error(e: task::JoinError) -> AgelineError {
    AgelineError::io(format!("Failed to spawn blocking task: {}", e))
}

#[async_trait]
impl ManifestRepository for FileManifestRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<SessionManifest>> {
        let path = self.paths.manifest_path(session_id);
        task::spawn_blocking(move || Self::load_sync(&path))
            .await
            .map_err(join_error)?
    }

    async fn save(&self, manifest: &SessionManifest) -> Result<()> {
        let path = self.paths.manifest_path(&manifest.session_id);
        let manifest = manifest.clone();

        let _guard = self.write_lock.lock().await;
        task::spawn_blocking(move || Self::save_sync(&path, &manifest))
            .await
            .map_err(join_error)??;

        tracing::debug!("[ManifestRepository] Saved manifest");
        Ok(())
    }

    async fn update(
        &self,
        session_id: &str,
        mutation: ManifestMutation,
    ) -> Result<SessionManifest> {
        let path = self.paths.manifest_path(session_id);
        let id = session_id.to_string();

        let _guard = self.write_lock.lock().await;
        let manifest = task::spawn_blocking(move || Self::update_sync(&path, &id, mutation))
            .await
            .map_err(join_error)??;

        tracing::debug!(
            "[ManifestRepository] Updated manifest for session {}",
            session_id
        );
        Ok(manifest)
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let sessions_dir = self.paths.sessions_dir();
        task::spawn_blocking(move || Self::list_ids_sync(&sessions_dir))
            .await
            .map_err(join_error)?
    }
}
