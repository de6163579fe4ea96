//! Session manifest DTOs and migrations
//!
//! ## Version History
//! - **1.0.0**: Initial schema with source frame, frames, transitions and final video

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use version_migrate::{FromDomain, IntoDomain, Versioned};

use ageline_core::session::{
    BackgroundMode, FinalVideo, Frame, GenderHint, NarrativeTrack, SessionManifest, SourceFrame,
    Transition,
};

// ============================================================================
// Nested DTOs
// ============================================================================

/// Source frame DTO V1.0.0
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFrameV1_0_0 {
    pub id: String,
    pub image_path: PathBuf,
    pub prompt: String,
    pub created_at: String,
}

impl From<&SourceFrame> for SourceFrameV1_0_0 {
    fn from(frame: &SourceFrame) -> Self {
        SourceFrameV1_0_0 {
            id: frame.id.clone(),
            image_path: frame.image_path.clone(),
            prompt: frame.prompt.clone(),
            created_at: frame.created_at.clone(),
        }
    }
}

impl From<SourceFrameV1_0_0> for SourceFrame {
    fn from(dto: SourceFrameV1_0_0) -> Self {
        SourceFrame {
            id: dto.id,
            image_path: dto.image_path,
            prompt: dto.prompt,
            created_at: dto.created_at,
        }
    }
}

/// Frame DTO V1.0.0
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameV1_0_0 {
    pub id: String,
    pub age: u32,
    pub image_path: PathBuf,
    pub prompt: String,
    pub input_path: PathBuf,
    pub created_at: String,
}

impl From<&Frame> for FrameV1_0_0 {
    fn from(frame: &Frame) -> Self {
        FrameV1_0_0 {
            id: frame.id.clone(),
            age: frame.age,
            image_path: frame.image_path.clone(),
            prompt: frame.prompt.clone(),
            input_path: frame.input_path.clone(),
            created_at: frame.created_at.clone(),
        }
    }
}

impl From<FrameV1_0_0> for Frame {
    fn from(dto: FrameV1_0_0) -> Self {
        Frame {
            id: dto.id,
            age: dto.age,
            image_path: dto.image_path,
            prompt: dto.prompt,
            input_path: dto.input_path,
            created_at: dto.created_at,
        }
    }
}

/// Transition DTO V1.0.0
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionV1_0_0 {
    pub from_age: u32,
    pub to_age: u32,
    pub from_frame_id: String,
    pub to_frame_id: String,
    pub video_path: PathBuf,
    #[serde(default)]
    pub prompt: String,
    pub created_at: String,
}

impl From<&Transition> for TransitionV1_0_0 {
    fn from(transition: &Transition) -> Self {
        TransitionV1_0_0 {
            from_age: transition.from_age,
            to_age: transition.to_age,
            from_frame_id: transition.from_frame_id.clone(),
            to_frame_id: transition.to_frame_id.clone(),
            video_path: transition.video_path.clone(),
            prompt: transition.prompt.clone(),
            created_at: transition.created_at.clone(),
        }
    }
}

impl From<TransitionV1_0_0> for Transition {
    fn from(dto: TransitionV1_0_0) -> Self {
        Transition {
            from_age: dto.from_age,
            to_age: dto.to_age,
            from_frame_id: dto.from_frame_id,
            to_frame_id: dto.to_frame_id,
            video_path: dto.video_path,
            prompt: dto.prompt,
            created_at: dto.created_at,
        }
    }
}

/// Final video DTO V1.0.0
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalVideoV1_0_0 {
    pub video_path: PathBuf,
    pub duration_secs: f64,
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
    pub created_at: String,
}

fn default_speed_factor() -> f64 {
    1.0
}

impl From<&FinalVideo> for FinalVideoV1_0_0 {
    fn from(video: &FinalVideo) -> Self {
        FinalVideoV1_0_0 {
            video_path: video.video_path.clone(),
            duration_secs: video.duration_secs,
            speed_factor: video.speed_factor,
            created_at: video.created_at.clone(),
        }
    }
}

impl From<FinalVideoV1_0_0> for FinalVideo {
    fn from(dto: FinalVideoV1_0_0) -> Self {
        FinalVideo {
            video_path: dto.video_path,
            duration_secs: dto.duration_secs,
            speed_factor: dto.speed_factor,
            created_at: dto.created_at,
        }
    }
}

// ============================================================================
// SessionManifest DTOs
// ============================================================================

/// Session manifest DTO V1.0.0
#[derive(Debug, Clone, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.0.0")]
#[serde(rename_all = "camelCase")]
pub struct ManifestV1_0_0 {
    pub session_id: String,
    pub reference_image: PathBuf,
    #[serde(default)]
    pub background_mode: BackgroundMode,
    #[serde(default)]
    pub gender_hint: GenderHint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_track: Option<NarrativeTrack>,
    pub ages: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_frame: Option<SourceFrameV1_0_0>,
    #[serde(default)]
    pub frames: Vec<FrameV1_0_0>,
    #[serde(default)]
    pub transitions: Vec<TransitionV1_0_0>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video: Option<FinalVideoV1_0_0>,
    pub created_at: String,
    pub updated_at: String,
}

/// Convert ManifestV1_0_0 DTO to domain model
impl IntoDomain<SessionManifest> for ManifestV1_0_0 {
    fn into_domain(self) -> SessionManifest {
        SessionManifest {
            session_id: self.session_id,
            reference_image: self.reference_image,
            background_mode: self.background_mode,
            gender_hint: self.gender_hint,
            narrative_track: self.narrative_track,
            ages: self.ages,
            source_frame: self.source_frame.map(Into::into),
            frames: self.frames.into_iter().map(Into::into).collect(),
            transitions: self.transitions.into_iter().map(Into::into).collect(),
            final_video: self.final_video.map(Into::into),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<&SessionManifest> for ManifestV1_0_0 {
    fn from(manifest: &SessionManifest) -> Self {
        ManifestV1_0_0 {
            session_id: manifest.session_id.clone(),
            reference_image: manifest.reference_image.clone(),
            background_mode: manifest.background_mode,
            gender_hint: manifest.gender_hint,
            narrative_track: manifest.narrative_track,
            ages: manifest.ages.clone(),
            source_frame: manifest.source_frame.as_ref().map(Into::into),
            frames: manifest.frames.iter().map(Into::into).collect(),
            transitions: manifest.transitions.iter().map(Into::into).collect(),
            final_video: manifest.final_video.as_ref().map(Into::into),
            created_at: manifest.created_at.clone(),
            updated_at: manifest.updated_at.clone(),
        }
    }
}

/// Convert domain model to ManifestV1_0_0 DTO (for version-migrate save support)
impl FromDomain<SessionManifest> for ManifestV1_0_0 {
    fn from_domain(manifest: SessionManifest) -> Self {
        ManifestV1_0_0::from(&manifest)
    }
}

// ============================================================================
// Migrator factory
// ============================================================================

/// Creates a Migrator for SessionManifest entities.
pub fn create_manifest_migrator() -> version_migrate::Migrator {
    version_migrate::migrator!("session_manifest" => [
        ManifestV1_0_0,
        SessionManifest
    ], save = true)
    .expect("Failed to create session_manifest migrator")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_flat_v1_0_0() {
        let migrator = create_manifest_migrator();
        let value = json!({
            "version": "1.0.0",
            "sessionId": "abc",
            "referenceImage": "/s/abc/reference.png",
            "backgroundMode": "flat",
            "ages": [0, 7],
            "frames": [{
                "id": "f0",
                "age": 0,
                "imagePath": "/s/abc/frames/age_0.png",
                "prompt": "p",
                "inputPath": "/s/abc/frames/source.png",
                "createdAt": "2024-01-01T00:00:00Z"
            }],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });

        let manifest: SessionManifest = migrator.load_flat_from("session_manifest", value).unwrap();
        assert_eq!(manifest.session_id, "abc");
        assert_eq!(manifest.gender_hint, GenderHint::Auto);
        assert_eq!(manifest.frames.len(), 1);
        assert!(manifest.transitions.is_empty());
        assert!(manifest.final_video.is_none());
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let migrator = create_manifest_migrator();
        let manifest = SessionManifest::new(
            "abc",
            "/s/abc/reference.png",
            vec![0, 7, 12],
            BackgroundMode::Narrative,
            GenderHint::Female,
        )
        .unwrap();

        let saved = migrator
            .save_domain_flat("session_manifest", manifest.clone())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&saved).unwrap();
        assert_eq!(value["genderHint"], "female");

        let loaded: SessionManifest = migrator.load_flat_from("session_manifest", value).unwrap();
        assert_eq!(loaded, manifest);
    }
}
