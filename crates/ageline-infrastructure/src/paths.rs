//! Unified path management for Ageline data.
//!
//! Every file the pipeline reads or writes is resolved here so that the
//! layout stays deterministic: the same session, age or pair always maps to
//! the same path.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/ageline/
//! └── config.toml                     # Application configuration
//!
//! ~/.local/share/ageline/             # Data directory (AGELINE_DATA_DIR overrides)
//! └── sessions/
//!     └── <session_id>/
//!         ├── manifest.json           # Session manifest (versioned)
//!         ├── reference.<ext>         # Uploaded reference photo
//!         ├── frames/
//!         │   ├── source.png          # Background-normalized anchor
//!         │   └── age_<age>.png
//!         ├── transitions/
//!         │   └── <from>-<to>.mp4
//!         └── final/
//!             └── final.mp4
//! ```

use ageline_core::session::{Age, PairKey};
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "AGELINE_DATA_DIR";

const APP_NAME: &str = "ageline";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Path layout rooted at one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgelinePaths {
    base: PathBuf,
}

impl AgelinePaths {
    /// Creates a layout rooted at `base_dir`, or at the default data
    /// directory when `None`.
    ///
    /// # Errors
    ///
    /// Returns `PathError::HomeDirNotFound` if no default can be resolved.
    pub fn new(base_dir: Option<&Path>) -> Result<Self, PathError> {
        let base = match base_dir {
            Some(dir) => dir.to_path_buf(),
            None => Self::default_data_dir()?,
        };
        Ok(Self { base })
    }

    /// Creates a layout rooted at `base`.
    pub fn at(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolves the data directory: `AGELINE_DATA_DIR`, else the platform
    /// data directory with `ageline` appended.
    pub fn default_data_dir() -> Result<PathBuf, PathError> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        dirs::data_dir()
            .map(|d| d.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the ageline configuration directory.
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|d| d.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.base.join("sessions")
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(session_id)
    }

    pub fn manifest_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("manifest.json")
    }

    /// Reference photo path, keeping the uploaded file's extension.
    pub fn reference_path(&self, session_id: &str, extension: &str) -> PathBuf {
        let extension = extension.trim_start_matches('.');
        let extension = if extension.is_empty() { "png" } else { extension };
        self.session_dir(session_id)
            .join(format!("reference.{}", extension.to_lowercase()))
    }

    pub fn frames_dir(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("frames")
    }

    pub fn source_frame_path(&self, session_id: &str) -> PathBuf {
        self.frames_dir(session_id).join("source.png")
    }

    pub fn frame_path(&self, session_id: &str, age: Age) -> PathBuf {
        self.frames_dir(session_id).join(format!("age_{age}.png"))
    }

    pub fn transitions_dir(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("transitions")
    }

    pub fn transition_path(&self, session_id: &str, pair: PairKey) -> PathBuf {
        self.transitions_dir(session_id).join(format!("{pair}.mp4"))
    }

    pub fn final_video_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("final").join("final.mp4")
    }
}
