//! Frame generation pipeline.
//!
//! Walks the session's ages in order. Each frame is generated from the
//! previous frame's image (or the anchor for the first age), persisted, and
//! then paired with its predecessor for speculative transition generation.
//! Frames already in the manifest are kept, so a new job resumes an
//! interrupted one.

use ageline_core::Outcome;
use ageline_core::error::{AgelineError, Result};
use ageline_core::provider::{FramePromptContext, ImageOptions, SourcePromptContext};
use ageline_core::session::{
    Frame, GenderHint, PairKey, SessionManifest, SourceFrame, Transition,
};
use ageline_infrastructure::media_store;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::frame_job::FrameJob;
use crate::transition_scheduler::TransitionRequest;

/// Runs a frame job to completion, recording the outcome on the job.
pub async fn run_frame_job(ctx: PipelineContext, job: Arc<FrameJob>) {
    job.mark_running();
    tracing::info!(
        session_id = %job.session_id(),
        job_id = %job.job_id(),
        "[FramePipeline] Frame job started"
    );

    match generate_frames(&ctx, &job).await {
        Ok(()) => {
            job.complete();
            tracing::info!(
                session_id = %job.session_id(),
                job_id = %job.job_id(),
                "[FramePipeline] Frame job completed"
            );
        }
        Err(e) => {
            tracing::error!(
                session_id = %job.session_id(),
                job_id = %job.job_id(),
                "[FramePipeline] Frame job failed: {}",
                e
            );
            save_completed_transitions(&ctx, &job).await;
            job.fail(e.to_string());
        }
    }
}

/// Records transitions that finished since the last save point. Used on the
/// failure path, where errors here must not mask the original one.
async fn save_completed_transitions(ctx: &PipelineContext, job: &FrameJob) {
    let completed = job.scheduler().completed();
    if completed.is_empty() {
        return;
    }
    let count = completed.len();
    let result = ctx
        .repository
        .update(
            job.session_id(),
            Box::new(move |m: &mut SessionManifest| {
                merge_transitions(m, completed);
                Ok(())
            }),
        )
        .await;
    match result {
        Ok(_) => tracing::debug!(
            session_id = %job.session_id(),
            count,
            "[FramePipeline] Saved completed transitions after failure"
        ),
        Err(e) => tracing::warn!(
            session_id = %job.session_id(),
            "[FramePipeline] Could not save completed transitions: {}",
            e
        ),
    }
}

async fn generate_frames(ctx: &PipelineContext, job: &FrameJob) -> Result<()> {
    let session_id = job.session_id().to_string();
    let repository = &ctx.repository;
    let mut manifest = repository
        .find_by_id(&session_id)
        .await?
        .ok_or_else(|| AgelineError::not_found("Session", session_id.clone()))?;

    if manifest.requires_source_frame() {
        match manifest.source_frame.clone() {
            Some(source) => job.record_source(source),
            None => {
                job.begin_step(None, "Normalizing reference background");
                let source = generate_source_frame(ctx, &manifest).await?;
                let recorded = source.clone();
                manifest = repository
                    .update(
                        &session_id,
                        Box::new(move |m: &mut SessionManifest| {
                            m.source_frame = Some(recorded);
                            Ok(())
                        }),
                    )
                    .await?;
                job.record_source(source);
            }
        }
    }

    let ages = manifest.ages.clone();
    for (index, age) in ages.iter().copied().enumerate() {
        let frame = match manifest.frame(age).cloned() {
            Some(existing) => {
                job.record_frame(existing.clone());
                existing
            }
            None => {
                job.begin_step(
                    Some(age),
                    format!("Generating frame {}/{} (age {})", index + 1, ages.len(), age),
                );
                let frame = generate_frame(ctx, &manifest, index).await?;
                let pushed = frame.clone();
                let completed = job.scheduler().completed();
                manifest = repository
                    .update(
                        &session_id,
                        Box::new(move |m: &mut SessionManifest| {
                            m.push_frame(pushed)?;
                            merge_transitions(m, completed);
                            Ok(())
                        }),
                    )
                    .await?;
                job.record_frame(frame.clone());

                if index == 0 {
                    manifest = lock_gender_hint(ctx, manifest, &frame).await?;
                }
                frame
            }
        };

        if index > 0 {
            schedule_pair(job, &manifest, ages[index - 1], &frame).await?;
        }
    }

    let completed = job.scheduler().completed();
    if !completed.is_empty() {
        repository
            .update(
                &session_id,
                Box::new(move |m: &mut SessionManifest| {
                    merge_transitions(m, completed);
                    Ok(())
                }),
            )
            .await?;
    }
    Ok(())
}

/// Hands `(previous, frame)` to the scheduler unless the manifest already
/// holds a valid clip for the pair.
async fn schedule_pair(
    job: &FrameJob,
    manifest: &SessionManifest,
    previous_age: u32,
    frame: &Frame,
) -> Result<()> {
    let previous = manifest.frame(previous_age).cloned().ok_or_else(|| {
        AgelineError::internal(format!("frame for age {previous_age} vanished"))
    })?;

    let key = PairKey::new(previous.age, frame.age);
    if let Some(existing) = manifest.transition(key) {
        if existing.matches_frames(&previous, frame)
            && media_store::is_usable_file(&existing.video_path).await
        {
            return Ok(());
        }
    }

    job.scheduler().schedule(TransitionRequest {
        from: previous,
        to: frame.clone(),
        background_mode: manifest.background_mode,
        narrative_track: manifest.narrative_track,
    });
    Ok(())
}

/// Records completed speculative transitions whose frames are still current.
pub(crate) fn merge_transitions(manifest: &mut SessionManifest, completed: Vec<Transition>) {
    for transition in completed {
        let key = transition.key();
        if manifest.transition(key) == Some(&transition) {
            continue;
        }
        if let Err(e) = manifest.upsert_transition(transition) {
            tracing::debug!(
                session_id = %manifest.session_id,
                pair = %key,
                "[FramePipeline] Skipping speculative transition: {}",
                e
            );
        }
    }
}

pub(crate) fn image_options(ctx: &PipelineContext, manifest: &SessionManifest) -> ImageOptions {
    ImageOptions {
        aspect_ratio: ctx.config.aspect_ratio.clone(),
        background_mode: manifest.background_mode,
    }
}

/// Generates the background-normalized anchor from the reference photo.
pub(crate) async fn generate_source_frame(
    ctx: &PipelineContext,
    manifest: &SessionManifest,
) -> Result<SourceFrame> {
    let images = &ctx.collaborators.images;
    let prompt = ctx
        .collaborators
        .prompts
        .source_prompt(&SourcePromptContext {
            gender_hint: manifest.gender_hint,
        });

    let url = images
        .generate(
            &[manifest.reference_image.clone()],
            &prompt,
            &image_options(ctx, manifest),
        )
        .await?;
    let dest = ctx.paths.source_frame_path(&manifest.session_id);
    images.download(&url, &dest).await?;

    Ok(SourceFrame {
        id: Uuid::new_v4().to_string(),
        image_path: dest,
        prompt,
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Generates the frame at `index`, conditioned on its predecessor.
pub(crate) async fn generate_frame(
    ctx: &PipelineContext,
    manifest: &SessionManifest,
    index: usize,
) -> Result<Frame> {
    let age = *manifest.ages.get(index).ok_or_else(|| {
        AgelineError::invalid_state(format!("no age at position {index}"))
    })?;
    let input = manifest.input_for(age)?;
    let prompt = ctx.collaborators.prompts.frame_prompt(&FramePromptContext {
        age,
        previous_age: index.checked_sub(1).map(|i| manifest.ages[i]),
        index,
        total: manifest.ages.len(),
        background_mode: manifest.background_mode,
        gender_hint: manifest.gender_hint,
        narrative_track: manifest.narrative_track,
    });

    let images = &ctx.collaborators.images;
    let url = images
        .generate(
            std::slice::from_ref(&input),
            &prompt,
            &image_options(ctx, manifest),
        )
        .await?;
    let dest = ctx.paths.frame_path(&manifest.session_id, age);
    images.download(&url, &dest).await?;

    tracing::debug!(
        session_id = %manifest.session_id,
        age = age,
        "[FramePipeline] Frame generated"
    );

    Ok(Frame {
        id: Uuid::new_v4().to_string(),
        age,
        image_path: dest,
        prompt,
        input_path: input,
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Best-effort gender classification of the first frame.
pub async fn classify_gender(
    ctx: &PipelineContext,
    current: GenderHint,
    frame: &Frame,
) -> Outcome<GenderHint> {
    if current.is_locked() {
        return Outcome::Skipped("gender hint already set".to_string());
    }
    let Some(classifier) = &ctx.collaborators.classifier else {
        return Outcome::Skipped("no classifier configured".to_string());
    };
    match classifier.predict(&frame.image_path).await {
        Ok(hint) if hint.is_locked() => Outcome::Succeeded(hint),
        Ok(_) => Outcome::Skipped("classifier returned no confident prediction".to_string()),
        Err(e) => Outcome::Failed(e.to_string()),
    }
}

async fn lock_gender_hint(
    ctx: &PipelineContext,
    manifest: SessionManifest,
    frame: &Frame,
) -> Result<SessionManifest> {
    match classify_gender(ctx, manifest.gender_hint, frame).await {
        Outcome::Succeeded(hint) => {
            tracing::info!(
                session_id = %manifest.session_id,
                "[FramePipeline] Locked gender hint to {:?}",
                hint
            );
            ctx.repository
                .update(
                    &manifest.session_id,
                    Box::new(move |m: &mut SessionManifest| {
                        m.gender_hint = hint;
                        Ok(())
                    }),
                )
                .await
        }
        Outcome::Skipped(reason) => {
            tracing::debug!(
                session_id = %manifest.session_id,
                "[FramePipeline] Gender classification skipped: {}",
                reason
            );
            Ok(manifest)
        }
        Outcome::Failed(reason) => {
            tracing::warn!(
                session_id = %manifest.session_id,
                "[FramePipeline] Gender classification failed: {}",
                reason
            );
            Ok(manifest)
        }
    }
}
