//! Single-frame regeneration with cascade invalidation.

use ageline_core::error::{AgelineError, Result};
use ageline_core::session::{Invalidation, RegenerateTarget, SessionManifest};
use ageline_infrastructure::media_store;
use std::sync::{Arc, Mutex};

use crate::context::PipelineContext;
use crate::frame_pipeline::{generate_frame, generate_source_frame};

/// Result of regenerating one frame.
#[derive(Debug, Clone)]
pub struct Regeneration {
    /// The manifest as persisted after the cascade.
    pub manifest: SessionManifest,
    pub invalidation: Invalidation,
    /// Orphaned files actually deleted from disk.
    pub removed_files: usize,
}

/// Regenerates `target` and drops everything that depended on it.
///
/// The new image is written over the old one at its deterministic path. The
/// manifest is updated next, and only once it is durable are the orphaned
/// files deleted.
pub async fn regenerate(
    ctx: &PipelineContext,
    session_id: &str,
    target: RegenerateTarget,
) -> Result<Regeneration> {
    let manifest = ctx
        .repository
        .find_by_id(session_id)
        .await?
        .ok_or_else(|| AgelineError::not_found("Session", session_id.to_string()))?;

    tracing::info!(
        session_id = %session_id,
        "[Regeneration] Regenerating {}",
        target
    );

    let captured: Arc<Mutex<Option<Invalidation>>> = Arc::new(Mutex::new(None));
    let sink = captured.clone();

    let updated = match target {
        RegenerateTarget::Source => {
            if !manifest.requires_source_frame() {
                return Err(AgelineError::invalid_state(
                    "sessions without a flat backdrop have no source frame",
                ));
            }
            let source = generate_source_frame(ctx, &manifest).await?;
            ctx.repository
                .update(
                    session_id,
                    Box::new(move |m: &mut SessionManifest| {
                        let invalidation = m.invalidate_from(RegenerateTarget::Source)?;
                        m.source_frame = Some(source);
                        *sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(invalidation);
                        Ok(())
                    }),
                )
                .await?
        }
        RegenerateTarget::Age(age) => {
            if manifest.frame(age).is_none() {
                return Err(AgelineError::not_found("frame", age.to_string()));
            }
            let index = manifest.age_index(age).ok_or_else(|| {
                AgelineError::invalid_state(format!("age {age} is not part of this session"))
            })?;
            let frame = generate_frame(ctx, &manifest, index).await?;
            ctx.repository
                .update(
                    session_id,
                    Box::new(move |m: &mut SessionManifest| {
                        let invalidation = m.invalidate_from(RegenerateTarget::Age(age))?;
                        m.replace_frame(frame)?;
                        *sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(invalidation);
                        Ok(())
                    }),
                )
                .await?
        }
    };

    let invalidation = captured
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
        .unwrap_or_default();
    let removed_files = media_store::remove_orphans(&invalidation.orphaned_paths).await;

    tracing::info!(
        session_id = %session_id,
        removed_frames = invalidation.removed_frames.len(),
        removed_transitions = invalidation.removed_transitions.len(),
        final_video_removed = invalidation.final_video_removed,
        "[Regeneration] Regenerated {}",
        target
    );

    Ok(Regeneration {
        manifest: updated,
        invalidation,
        removed_files,
    })
}
