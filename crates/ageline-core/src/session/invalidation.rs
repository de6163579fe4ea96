//! Cascade invalidation for frame regeneration.
//!
//! All manifest-side effects of regenerating a frame live here. The
//! mutation only edits the in-memory manifest and reports which files no
//! longer belong to it; deleting those files is left to the caller, after
//! the updated manifest has been persisted.

use super::model::{Age, PairKey, SessionManifest};
use crate::error::{AgelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which frame is being regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "age", rename_all = "snake_case")]
pub enum RegenerateTarget {
    /// The background-normalized anchor frame.
    Source,
    /// The frame for one age.
    Age(Age),
}

impl std::fmt::Display for RegenerateTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegenerateTarget::Source => write!(f, "source"),
            RegenerateTarget::Age(age) => write!(f, "age {age}"),
        }
    }
}

/// What an invalidation removed from the manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invalidation {
    pub removed_frames: Vec<Age>,
    pub removed_transitions: Vec<PairKey>,
    pub final_video_removed: bool,
    /// Files no longer referenced by the manifest.
    pub orphaned_paths: Vec<PathBuf>,
}

impl Invalidation {
    pub fn is_empty(&self) -> bool {
        self.removed_frames.is_empty()
            && self.removed_transitions.is_empty()
            && !self.final_video_removed
    }
}

impl SessionManifest {
    /// Drops everything downstream of `target`.
    ///
    /// - `Source`: every frame, every transition and the final video.
    /// - `Age(k)`: every transition and the final video. Frames are kept;
    ///   the caller replaces frame `k` itself.
    ///
    /// The image of the target itself is not reported as orphaned since it
    /// is overwritten in place by the regenerated output.
    pub fn invalidate_from(&mut self, target: RegenerateTarget) -> Result<Invalidation> {
        let mut invalidation = Invalidation::default();

        match target {
            RegenerateTarget::Source => {
                if !self.requires_source_frame() {
                    return Err(AgelineError::invalid_state(
                        "sessions without a flat backdrop have no source frame",
                    ));
                }
                for frame in self.frames.drain(..) {
                    invalidation.removed_frames.push(frame.age);
                    invalidation.orphaned_paths.push(frame.image_path);
                }
            }
            RegenerateTarget::Age(age) => {
                if self.frame(age).is_none() {
                    return Err(AgelineError::not_found("frame", age.to_string()));
                }
            }
        }

        for transition in self.transitions.drain(..) {
            invalidation.removed_transitions.push(transition.key());
            invalidation.orphaned_paths.push(transition.video_path);
        }

        if let Some(video) = self.final_video.take() {
            invalidation.final_video_removed = true;
            invalidation.orphaned_paths.push(video.video_path);
        }

        self.touch();
        Ok(invalidation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::model::test_support::complete_manifest;
    use crate::session::model::{BackgroundMode, FinalVideo};

    fn with_final_video(mut manifest: SessionManifest) -> SessionManifest {
        manifest
            .set_final_video(FinalVideo {
                video_path: PathBuf::from("/s/final/final.mp4"),
                duration_secs: 8.0,
                speed_factor: 1.25,
                created_at: "2025-01-01T00:00:00Z".to_string(),
            })
            .unwrap();
        manifest
    }

    #[test]
    fn test_invalidate_source_clears_everything_downstream() {
        let mut manifest = with_final_video(complete_manifest(&[0, 7, 12]));
        manifest.background_mode = BackgroundMode::Flat;

        let invalidation = manifest.invalidate_from(RegenerateTarget::Source).unwrap();

        assert!(manifest.frames.is_empty());
        assert!(manifest.transitions.is_empty());
        assert!(manifest.final_video.is_none());
        assert_eq!(invalidation.removed_frames, vec![0, 7, 12]);
        assert_eq!(invalidation.removed_transitions.len(), 2);
        assert!(invalidation.final_video_removed);
        // 3 frame images + 2 clips + final video
        assert_eq!(invalidation.orphaned_paths.len(), 6);
        assert!(manifest.check_invariants().is_ok());
    }

    #[test]
    fn test_invalidate_age_keeps_frames_but_drops_all_transitions() {
        let mut manifest = with_final_video(complete_manifest(&[0, 7, 12]));
        let frames_before = manifest.frames.clone();

        let invalidation = manifest.invalidate_from(RegenerateTarget::Age(7)).unwrap();

        assert_eq!(manifest.frames, frames_before);
        assert!(manifest.transitions.is_empty());
        assert!(manifest.final_video.is_none());
        assert!(invalidation.removed_frames.is_empty());
        assert_eq!(
            invalidation.removed_transitions,
            vec![PairKey::new(0, 7), PairKey::new(7, 12)]
        );
        assert!(invalidation
            .orphaned_paths
            .contains(&PathBuf::from("/s/final/final.mp4")));
        assert!(!invalidation
            .orphaned_paths
            .contains(&PathBuf::from("/s/frames/age_7.png")));
    }

    #[test]
    fn test_invalidate_unknown_age_is_rejected_without_mutation() {
        let mut manifest = complete_manifest(&[0, 7, 12]);
        let before = manifest.clone();

        let err = manifest.invalidate_from(RegenerateTarget::Age(30)).unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(manifest, before);
    }

    #[test]
    fn test_invalidate_source_rejected_in_narrative_mode() {
        let mut manifest = complete_manifest(&[0, 7]);
        assert!(manifest.invalidate_from(RegenerateTarget::Source).is_err());
        assert_eq!(manifest.frames.len(), 2);
    }
}
