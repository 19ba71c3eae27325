use serde::{Deserialize, Serialize};
use std::fmt;

/// Trigger event states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    /// Event recorded, resolution not finished yet
    Initialized,
    /// At least one rebuild is planned or running
    Building,
    /// Every rebuild finished and none failed
    Complete,
    /// Every rebuild finished and at least one failed
    CompleteFailed,
    /// Nothing to rebuild, or the event was rejected by policy
    Skipped,
}

impl EventState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::CompleteFailed | Self::Skipped)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Building)
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Building => write!(f, "building"),
            Self::Complete => write!(f, "complete"),
            Self::CompleteFailed => write!(f, "complete_failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for EventState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialized" => Ok(Self::Initialized),
            "building" => Ok(Self::Building),
            "complete" => Ok(Self::Complete),
            "complete_failed" => Ok(Self::CompleteFailed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid event state: {s}")),
        }
    }
}

impl Default for EventState {
    fn default() -> Self {
        Self::Initialized
    }
}

/// Rebuild unit states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactBuildState {
    /// Waiting to be handed to the build system
    Planned,
    /// Build submitted and running
    Building,
    /// Build finished successfully
    Done,
    /// Build failed, or was never attempted because of a failure upstream
    Failed,
    /// Intentionally not built
    Skipped,
}

impl ArtifactBuildState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Planned | Self::Building)
    }

    /// Check if reaching this state requires a reason string
    pub fn requires_reason(&self) -> bool {
        matches!(self, Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for ArtifactBuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::Building => write!(f, "building"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for ArtifactBuildState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(Self::Planned),
            "building" => Ok(Self::Building),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid artifact build state: {s}")),
        }
    }
}

impl Default for ArtifactBuildState {
    fn default() -> Self {
        Self::Planned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_state_terminal_check() {
        assert!(EventState::Complete.is_terminal());
        assert!(EventState::CompleteFailed.is_terminal());
        assert!(EventState::Skipped.is_terminal());
        assert!(!EventState::Initialized.is_terminal());
        assert!(!EventState::Building.is_terminal());
    }

    #[test]
    fn test_build_state_terminal_check() {
        assert!(ArtifactBuildState::Done.is_terminal());
        assert!(ArtifactBuildState::Failed.is_terminal());
        assert!(ArtifactBuildState::Skipped.is_terminal());
        assert!(!ArtifactBuildState::Planned.is_terminal());
        assert!(!ArtifactBuildState::Building.is_terminal());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(EventState::CompleteFailed.to_string(), "complete_failed");
        assert_eq!(
            "skipped".parse::<EventState>().unwrap(),
            EventState::Skipped
        );
        assert_eq!(ArtifactBuildState::Done.to_string(), "done");
        assert_eq!(
            "planned".parse::<ArtifactBuildState>().unwrap(),
            ArtifactBuildState::Planned
        );
        assert!("unknown".parse::<ArtifactBuildState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&EventState::CompleteFailed).unwrap();
        assert_eq!(json, "\"complete_failed\"");
        let state: ArtifactBuildState = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(state, ArtifactBuildState::Failed);
    }
}
