use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of artifact a rebuild unit produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Image,
    Rpm,
    Module,
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Rpm => write!(f, "rpm"),
            Self::Module => write!(f, "module"),
        }
    }
}

impl std::str::FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "rpm" => Ok(Self::Rpm),
            "module" => Ok(Self::Module),
            _ => Err(format!("Invalid artifact type: {s}")),
        }
    }
}

/// Why a rebuild unit exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RebuildReason {
    /// Contains content fixed by the triggering event
    #[default]
    Directly,
    /// Built on top of a directly affected artifact
    Dependency,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directly => write!(f, "directly"),
            Self::Dependency => write!(f, "dependency"),
        }
    }
}

impl std::str::FromStr for RebuildReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directly" => Ok(Self::Directly),
            "dependency" => Ok(Self::Dependency),
            _ => Err(format!("Invalid rebuild reason: {s}")),
        }
    }
}
