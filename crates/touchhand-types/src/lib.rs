use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Left/right designation of a tracked controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Both hands, left first.
    pub const ALL: [Handedness; 2] = [Handedness::Left, Handedness::Right];
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Left => write!(f, "left"),
            Handedness::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Handedness {
    type Err = TouchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Handedness::Left),
            "right" | "r" => Ok(Handedness::Right),
            other => Err(TouchError::InvalidInput(format!(
                "unknown handedness '{other}' (expected left or right)"
            ))),
        }
    }
}

/// What happens to the device session when the last handle is released.
///
/// The vendor runtime does not tolerate repeated init/shutdown cycles within
/// one process, so the session is kept alive by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    /// Never tear the session down mid-process.
    #[default]
    RetainForProcess,
    /// Destroy the session and shut the SDK down when the count hits zero.
    DestroyOnLastRelease,
}

impl fmt::Display for TeardownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownPolicy::RetainForProcess => write!(f, "retain_for_process"),
            TeardownPolicy::DestroyOnLastRelease => write!(f, "destroy_on_last_release"),
        }
    }
}

impl FromStr for TeardownPolicy {
    type Err = TouchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain_for_process" | "retain" => Ok(TeardownPolicy::RetainForProcess),
            "destroy_on_last_release" | "destroy" => Ok(TeardownPolicy::DestroyOnLastRelease),
            other => Err(TouchError::InvalidInput(format!(
                "unknown teardown policy '{other}'"
            ))),
        }
    }
}

/// Error type spanning runtime failures, session misuse, and bad input.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TouchError {
    #[error("VR runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("VR runtime error during {operation}: {details}")]
    Runtime { operation: String, details: String },

    #[error("Session still in use by {outstanding} handle(s)")]
    SessionInUse { outstanding: u32 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
