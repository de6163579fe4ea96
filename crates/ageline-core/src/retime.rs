//! Retiming of the concatenated transitions to a target duration.

use crate::error::{AgelineError, Result};
use serde::{Deserialize, Serialize};

/// Allowed range for the final video duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationBounds {
    pub min_secs: f64,
    pub max_secs: f64,
}

/// How the concatenated clips are sped up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetimePlan {
    /// Sum of the source clip durations.
    pub raw_duration_secs: f64,
    /// Output duration after retiming.
    pub target_duration_secs: f64,
    /// `raw / target`, never below 1.0.
    pub speed_factor: f64,
}

impl RetimePlan {
    /// Computes the speed factor that brings `clip_durations` to the
    /// requested duration.
    ///
    /// The request is clamped into `bounds`, then capped at the raw
    /// duration: clips are only ever sped up.
    pub fn compute(
        clip_durations: &[f64],
        requested_secs: f64,
        bounds: DurationBounds,
    ) -> Result<Self> {
        if clip_durations.is_empty() {
            return Err(AgelineError::invalid_state("no clips to retime"));
        }
        if clip_durations.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(AgelineError::invalid_state(
                "clip durations must be positive",
            ));
        }
        if !requested_secs.is_finite() || requested_secs <= 0.0 {
            return Err(AgelineError::invalid_state(format!(
                "requested duration {requested_secs} must be positive"
            )));
        }
        if bounds.min_secs <= 0.0 || bounds.min_secs > bounds.max_secs {
            return Err(AgelineError::config(format!(
                "invalid duration bounds {}..{}",
                bounds.min_secs, bounds.max_secs
            )));
        }

        let raw: f64 = clip_durations.iter().sum();
        let clamped = requested_secs.clamp(bounds.min_secs, bounds.max_secs);
        let target = clamped.min(raw);
        let speed_factor = raw / target;

        Ok(Self {
            raw_duration_secs: raw,
            target_duration_secs: target,
            speed_factor,
        })
    }

    /// True when no speed change is applied.
    pub fn is_identity(&self) -> bool {
        (self.speed_factor - 1.0).abs() < f64::EPSILON
    }
}
