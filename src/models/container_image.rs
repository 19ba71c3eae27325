use serde::{Deserialize, Serialize};

/// Normalized view of one image candidate, produced by resolution and consumed
/// by a single planning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerImage {
    pub nvr: String,
    /// Component name used as the rebuild unit's name
    pub name: String,
    pub repository: Option<String>,
    pub commit: Option<String>,
    pub target: Option<String>,
    pub git_branch: Option<String>,
    #[serde(default)]
    pub arches: Vec<String>,
    /// NVR of the image this one is built from
    pub parent: Option<String>,
    /// Error captured while resolving this image's metadata
    pub error: Option<String>,
    #[serde(default)]
    pub published: bool,
    /// Directly affected by the event (as opposed to pulled in as a dependency)
    #[serde(default = "default_true")]
    pub directly_affected: bool,
    #[serde(default)]
    pub flatpak: bool,
    #[serde(default = "default_true")]
    pub isolated: bool,
}

fn default_true() -> bool {
    true
}

impl ContainerImage {
    pub fn new(nvr: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            nvr: nvr.into(),
            name: name.into(),
            directly_affected: true,
            isolated: true,
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
