use std::fmt;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Workflow phase of a session
///
/// `Generating` and `Editing` mean exactly one generation call is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Generating,
    Editing,
}

impl Phase {
    pub fn is_busy(self) -> bool {
        self != Phase::Idle
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Generating => write!(f, "generating"),
            Phase::Editing => write!(f, "editing"),
        }
    }
}

/// Session operation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Please upload a logo first.")]
    MissingLogo,

    #[error("No mockup to work on yet; select a product first.")]
    NoCurrentVersion,

    #[error("Session is busy ({phase}); wait for the current request to finish.")]
    Busy { phase: Phase },

    #[error("Version {0} is not in this session's history")]
    VersionNotFound(Uuid),

    #[error("{0}")]
    GenerationFailed(String),

    #[error("Too many live sessions (limit {limit}); try again later.")]
    Capacity { limit: usize },
}
