//! Outcome of a best-effort step.

use serde::{Deserialize, Serialize};

/// Result of work whose failure must not abort the caller.
///
/// Used for the gender classifier and speculative transitions, where
/// "did not run" and "ran and failed" need to stay distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Succeeded(T),
    /// The step was not attempted.
    Skipped(String),
    /// The step ran and failed.
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// The success value, if any.
    pub fn succeeded(self) -> Option<T> {
        match self {
            Outcome::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Succeeded(value) => Outcome::Succeeded(value),
            Outcome::Skipped(reason) => Outcome::Skipped(reason.clone()),
            Outcome::Failed(reason) => Outcome::Failed(reason.clone()),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Outcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Succeeded(value),
            Err(err) => Outcome::Failed(err.to_string()),
        }
    }
}
