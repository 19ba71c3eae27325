use serde::{Deserialize, Serialize};

/// Advisory as carried by an incoming event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrataAdvisory {
    pub errata_id: i64,
    /// Human-facing name, e.g. `RHBA-2024:1234`
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub content_types: Vec<String>,
    pub reporter: Option<String>,
    /// NVRs of builds attached to the advisory
    #[serde(default)]
    pub builds: Vec<String>,
}

impl ErrataAdvisory {
    pub fn new(errata_id: i64, name: impl Into<String>) -> Self {
        Self {
            errata_id,
            name: name.into(),
            state: "SHIPPED_LIVE".to_string(),
            ..Default::default()
        }
    }

    pub fn with_builds<I, S>(mut self, builds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builds = builds.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types = content_types.into_iter().map(Into::into).collect();
        self
    }
}
