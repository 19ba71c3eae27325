//! Typed views of catalog records. Only fields the resolver reads are modeled.

use crate::constants::catalog::BUNDLE_LABEL;
use serde::{Deserialize, Serialize};

/// Index image published for one platform version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorIndex {
    #[serde(default)]
    pub path: Option<String>,
    pub ocp_version: String,
    #[serde(default)]
    pub organization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedImage {
    pub image: String,
    #[serde(default)]
    pub name: Option<String>,
    pub digest: String,
}

/// Operator bundle record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorBundle {
    pub csv_name: String,
    pub version_original: String,
    #[serde(default)]
    pub bundle_path_digest: Option<String>,
    #[serde(default)]
    pub bundle_path: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub related_images: Vec<RelatedImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrewInfo {
    pub build: String,
    #[serde(default)]
    pub nvra: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryTag {
    pub name: String,
}

/// Where an image is (or will be) published
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRepository {
    pub registry: String,
    pub repository: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub manifest_list_digest: Option<String>,
    #[serde(default)]
    pub manifest_schema2_digest: Option<String>,
    #[serde(default)]
    pub tags: Vec<RepositoryTag>,
}

impl ImageRepository {
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedData {
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Container image record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogImage {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub brew: Option<BrewInfo>,
    #[serde(default)]
    pub repositories: Vec<ImageRepository>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub parsed_data: Option<ParsedData>,
}

impl CatalogImage {
    pub fn nvr(&self) -> Option<&str> {
        self.brew.as_ref().map(|b| b.build.as_str())
    }

    pub fn is_bundle(&self) -> bool {
        self.parsed_data.as_ref().map_or(false, |data| {
            data.labels
                .iter()
                .any(|l| l.name == BUNDLE_LABEL && l.value == "true")
        })
    }
}

/// Repository placement of an image, with the image id needed for manifest lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub image_id: String,
    pub registry: String,
    pub repository: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RpmEntry {
    pub nvra: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RpmManifest {
    #[serde(default)]
    pub rpms: Vec<RpmEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RepositoryRecord {
    #[serde(default)]
    pub auto_rebuild_tags: Vec<String>,
}

/// `name-version-release.arch` -> `name-version-release`
pub fn strip_arch(nvra: &str) -> &str {
    match nvra.rfind('.') {
        Some(idx) => &nvra[..idx],
        None => nvra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_deserializes_with_partial_fields() {
        let image: CatalogImage = serde_json::from_value(serde_json::json!({
            "_id": "abc",
            "brew": {"build": "foo-operator-2.1-2", "nvra": "foo-operator-2.1-2.amd64"},
            "repositories": [{
                "registry": "registry.example.com",
                "repository": "foo/foo-operator-bundle",
                "published": true,
                "manifest_list_digest": "sha256:12345",
                "tags": [{"name": "2"}, {"name": "2.1"}]
            }]
        }))
        .unwrap();
        assert_eq!(image.nvr(), Some("foo-operator-2.1-2"));
        assert_eq!(
            image.repositories[0].tag_names().collect::<Vec<_>>(),
            vec!["2", "2.1"]
        );
        assert!(!image.is_bundle());
    }

    #[test]
    fn test_strip_arch() {
        assert_eq!(strip_arch("openssl-1.1.1k-4.el8.x86_64"), "openssl-1.1.1k-4.el8");
        assert_eq!(strip_arch("noarch"), "noarch");
    }
}
