//! Manifest repository trait.
//!
//! Defines the interface for session manifest persistence.

use super::model::SessionManifest;
use crate::error::Result;
use async_trait::async_trait;

/// A mutation applied to the freshly loaded manifest inside
/// [`ManifestRepository::update`].
pub type ManifestMutation = Box<dyn FnOnce(&mut SessionManifest) -> Result<()> + Send + 'static>;

/// An abstract repository for session manifests.
///
/// The manifest is the only durable state of a session. Writers never merge
/// partial changes: they re-load the current manifest, mutate it, and store
/// the whole object back.
///
/// # Implementation Notes
///
/// Implementations should handle:
/// - Schema versioning of the stored document
/// - Atomic replacement of the stored document
/// - Serializing concurrent `update` calls for the same session
#[async_trait]
pub trait ManifestRepository: Send + Sync {
    /// Finds a manifest by session ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(SessionManifest))`: Manifest found
    /// - `Ok(None)`: No such session
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<SessionManifest>>;

    /// Stores a manifest, replacing any previous version.
    async fn save(&self, manifest: &SessionManifest) -> Result<()>;

    /// Re-loads the manifest, applies `mutation`, and saves the result.
    ///
    /// Nothing is written if the mutation fails.
    ///
    /// # Returns
    ///
    /// - `Ok(SessionManifest)`: The manifest as persisted
    /// - `Err(AgelineError::NotFound)`: No such session
    async fn update(&self, session_id: &str, mutation: ManifestMutation) -> Result<SessionManifest>;

    /// Lists the IDs of all stored sessions.
    async fn list_ids(&self) -> Result<Vec<String>>;
}
