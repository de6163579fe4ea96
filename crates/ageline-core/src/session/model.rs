//! Session manifest domain model.
//!
//! The manifest is the single durable record of one age-progression run:
//! the reference photo, the ordered ages, every generated frame and
//! transition, and the assembled final video.

use crate::error::{AgelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Subject age in years.
pub type Age = u32;

/// Oldest age a session may target.
pub const MAX_AGE: Age = 120;

/// How the backdrop behind the subject is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    /// Plain studio backdrop. Requires the normalized source frame.
    #[default]
    Flat,
    /// Narrative scene that follows one story track across ages.
    Narrative,
}

/// Gender hint used by prompt construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenderHint {
    /// Not specified; may be locked by the classifier after frame 1.
    #[default]
    Auto,
    Male,
    Female,
}

impl GenderHint {
    /// Returns true when the hint is fixed and must not be re-derived.
    pub fn is_locked(&self) -> bool {
        !matches!(self, GenderHint::Auto)
    }
}

/// Story track for narrative-scene sessions.
///
/// Selected once per session and never reselected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeTrack {
    Seaside,
    CityLife,
    Countryside,
    Academia,
    Travel,
}

impl NarrativeTrack {
    /// All tracks in catalogue order.
    pub const ALL: [NarrativeTrack; 5] = [
        NarrativeTrack::Seaside,
        NarrativeTrack::CityLife,
        NarrativeTrack::Countryside,
        NarrativeTrack::Academia,
        NarrativeTrack::Travel,
    ];

    /// Deterministically picks a track for the given session id.
    pub fn pick_for(session_id: &str) -> Self {
        let sum: u64 = session_id.bytes().map(u64::from).sum();
        Self::ALL[(sum % Self::ALL.len() as u64) as usize]
    }

    /// Short scene description fed to prompt construction.
    pub fn scene(&self) -> &'static str {
        match self {
            NarrativeTrack::Seaside => "a seaside town",
            NarrativeTrack::CityLife => "a busy city",
            NarrativeTrack::Countryside => "the countryside",
            NarrativeTrack::Academia => "a school and university campus",
            NarrativeTrack::Travel => "places around the world",
        }
    }
}

/// Identifies a transition by its endpoint ages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub from_age: Age,
    pub to_age: Age,
}

impl PairKey {
    pub fn new(from_age: Age, to_age: Age) -> Self {
        Self { from_age, to_age }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from_age, self.to_age)
    }
}

/// The background-normalized anchor frame (flat mode only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFrame {
    /// Generation identity; changes on every regeneration.
    pub id: String,
    pub image_path: PathBuf,
    pub prompt: String,
    pub created_at: String,
}

/// A generated portrait of the subject at one age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Generation identity; changes on every regeneration.
    pub id: String,
    pub age: Age,
    pub image_path: PathBuf,
    /// Exact prompt sent to the image-synthesis service.
    pub prompt: String,
    /// The single image the frame was conditioned on.
    pub input_path: PathBuf,
    pub created_at: String,
}

/// A generated clip bridging two consecutive frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from_age: Age,
    pub to_age: Age,
    /// Id of the `from` frame the clip was generated from.
    pub from_frame_id: String,
    /// Id of the `to` frame the clip was generated from.
    pub to_frame_id: String,
    pub video_path: PathBuf,
    pub prompt: String,
    pub created_at: String,
}

impl Transition {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.from_age, self.to_age)
    }

    /// Returns true if this clip was generated from exactly these frames.
    pub fn matches_frames(&self, from: &Frame, to: &Frame) -> bool {
        self.from_age == from.age
            && self.to_age == to.age
            && self.from_frame_id == from.id
            && self.to_frame_id == to.id
    }
}

/// The assembled output video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVideo {
    pub video_path: PathBuf,
    pub duration_secs: f64,
    pub speed_factor: f64,
    pub created_at: String,
}

/// Durable record of one generation session.
///
/// Invariants:
/// - `ages` is non-empty and strictly ascending
/// - `frames` is sorted by age and is a prefix-dense subset of `ages`
///   (frame `k` exists only if frames `0..k` exist)
/// - `transitions` only reference consecutive ages and are sorted
/// - `final_video` exists only if every age has a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    pub session_id: String,
    pub reference_image: PathBuf,
    pub background_mode: BackgroundMode,
    pub gender_hint: GenderHint,
    pub narrative_track: Option<NarrativeTrack>,
    pub ages: Vec<Age>,
    pub source_frame: Option<SourceFrame>,
    pub frames: Vec<Frame>,
    pub transitions: Vec<Transition>,
    pub final_video: Option<FinalVideo>,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionManifest {
    /// Creates an empty manifest after validating the age list.
    ///
    /// A narrative track is selected here, once, when the background mode
    /// is [`BackgroundMode::Narrative`].
    pub fn new(
        session_id: impl Into<String>,
        reference_image: impl Into<PathBuf>,
        ages: Vec<Age>,
        background_mode: BackgroundMode,
        gender_hint: GenderHint,
    ) -> Result<Self> {
        validate_ages(&ages)?;
        let session_id = session_id.into();
        let now = chrono::Utc::now().to_rfc3339();
        let narrative_track = match background_mode {
            BackgroundMode::Narrative => Some(NarrativeTrack::pick_for(&session_id)),
            BackgroundMode::Flat => None,
        };

        Ok(Self {
            session_id,
            reference_image: reference_image.into(),
            background_mode,
            gender_hint,
            narrative_track,
            ages,
            source_frame: None,
            frames: Vec::new(),
            transitions: Vec::new(),
            final_video: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Updates `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Whether flat mode requires a normalized source frame.
    pub fn requires_source_frame(&self) -> bool {
        self.background_mode == BackgroundMode::Flat
    }

    /// Image used as the generation input for the first frame.
    pub fn anchor_image(&self) -> &Path {
        match &self.source_frame {
            Some(source) => &source.image_path,
            None => &self.reference_image,
        }
    }

    /// Looks up the frame for an age.
    pub fn frame(&self, age: Age) -> Option<&Frame> {
        self.frames.iter().find(|f| f.age == age)
    }

    /// Position of an age in the age list.
    pub fn age_index(&self, age: Age) -> Option<usize> {
        self.ages.iter().position(|a| *a == age)
    }

    /// True when every age has a frame.
    pub fn is_complete(&self) -> bool {
        self.frames.len() == self.ages.len()
    }

    /// The next age still lacking a frame, if any.
    pub fn next_missing_age(&self) -> Option<Age> {
        self.ages.get(self.frames.len()).copied()
    }

    /// Image the frame at `age` must be conditioned on: the previous
    /// frame's output, or the anchor for the first age.
    pub fn input_for(&self, age: Age) -> Result<PathBuf> {
        let index = self.age_index(age).ok_or_else(|| {
            AgelineError::invalid_state(format!("age {age} is not part of this session"))
        })?;
        if index == 0 {
            return Ok(self.anchor_image().to_path_buf());
        }
        let previous_age = self.ages[index - 1];
        self.frame(previous_age)
            .map(|f| f.image_path.clone())
            .ok_or_else(|| {
                AgelineError::invalid_state(format!(
                    "frame for age {previous_age} must exist before age {age}"
                ))
            })
    }

    /// Appends the next frame in age order.
    pub fn push_frame(&mut self, frame: Frame) -> Result<()> {
        match self.next_missing_age() {
            Some(expected) if expected == frame.age => {
                self.frames.push(frame);
                self.touch();
                Ok(())
            }
            Some(expected) => Err(AgelineError::invalid_state(format!(
                "expected frame for age {expected}, got {}",
                frame.age
            ))),
            None => Err(AgelineError::invalid_state(format!(
                "all frames already exist; cannot append age {}",
                frame.age
            ))),
        }
    }

    /// Replaces an existing frame record wholesale.
    pub fn replace_frame(&mut self, frame: Frame) -> Result<()> {
        let slot = self
            .frames
            .iter_mut()
            .find(|f| f.age == frame.age)
            .ok_or_else(|| AgelineError::not_found("frame", frame.age.to_string()))?;
        *slot = frame;
        self.touch();
        Ok(())
    }

    /// Consecutive age pairs, in age order.
    pub fn required_pairs(&self) -> Vec<PairKey> {
        self.ages
            .windows(2)
            .map(|w| PairKey::new(w[0], w[1]))
            .collect()
    }

    /// The recorded transition for a pair.
    pub fn transition(&self, key: PairKey) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.key() == key)
    }

    /// Records a transition, replacing any previous one for the same pair.
    ///
    /// The pair must be consecutive and both endpoint frames must be the
    /// current generation the clip was made from.
    pub fn upsert_transition(&mut self, transition: Transition) -> Result<()> {
        let key = transition.key();
        if !self.required_pairs().contains(&key) {
            return Err(AgelineError::invalid_state(format!(
                "{key} is not a consecutive age pair"
            )));
        }
        let (from, to) = match (self.frame(key.from_age), self.frame(key.to_age)) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                return Err(AgelineError::invalid_state(format!(
                    "frames for {key} are missing"
                )));
            }
        };
        if !transition.matches_frames(from, to) {
            return Err(AgelineError::invalid_state(format!(
                "transition {key} was generated from outdated frames"
            )));
        }

        self.transitions.retain(|t| t.key() != key);
        self.transitions.push(transition);
        self.transitions.sort_by_key(|t| t.key());
        self.touch();
        Ok(())
    }

    /// Replaces the transition list wholesale (sorted by pair).
    pub fn set_transitions(&mut self, mut transitions: Vec<Transition>) {
        transitions.sort_by_key(|t| t.key());
        transitions.dedup_by_key(|t| t.key());
        self.transitions = transitions;
        self.touch();
    }

    /// Records the final video. Requires a complete frame set.
    pub fn set_final_video(&mut self, video: FinalVideo) -> Result<()> {
        if !self.is_complete() {
            return Err(AgelineError::invalid_state(format!(
                "final video requires {} frames, have {}",
                self.ages.len(),
                self.frames.len()
            )));
        }
        self.final_video = Some(video);
        self.touch();
        Ok(())
    }

    /// Verifies the structural invariants listed on the type.
    pub fn check_invariants(&self) -> Result<()> {
        validate_ages(&self.ages)?;

        if self.frames.len() > self.ages.len() {
            return Err(AgelineError::invalid_state("more frames than ages"));
        }
        for (frame, age) in self.frames.iter().zip(&self.ages) {
            if frame.age != *age {
                return Err(AgelineError::invalid_state(format!(
                    "frames are not dense: found age {} where {} was expected",
                    frame.age, age
                )));
            }
        }

        let pairs = self.required_pairs();
        for window in self.transitions.windows(2) {
            if window[0].key() >= window[1].key() {
                return Err(AgelineError::invalid_state("transitions are not sorted"));
            }
        }
        for transition in &self.transitions {
            if !pairs.contains(&transition.key()) {
                return Err(AgelineError::invalid_state(format!(
                    "transition {} is not a consecutive pair",
                    transition.key()
                )));
            }
        }

        if self.final_video.is_some() && !self.is_complete() {
            return Err(AgelineError::invalid_state(
                "final video present without a complete frame set",
            ));
        }
        Ok(())
    }
}

/// Validates a session age list: non-empty, strictly ascending, within range.
pub fn validate_ages(ages: &[Age]) -> Result<()> {
    if ages.is_empty() {
        return Err(AgelineError::invalid_state("at least one age is required"));
    }
    if let Some(age) = ages.iter().find(|a| **a > MAX_AGE) {
        return Err(AgelineError::invalid_state(format!(
            "age {age} exceeds the maximum of {MAX_AGE}"
        )));
    }
    if ages.windows(2).any(|w| w[0] >= w[1]) {
        return Err(AgelineError::invalid_state(
            "ages must be unique and strictly ascending",
        ));
    }
    Ok(())
}
