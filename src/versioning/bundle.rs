//! # Bundle Versions and CSV Patches
//!
//! Operator bundles carry a semantic version in their ClusterServiceVersion
//! (CSV). A rebuilt bundle gets the rebuild stamp `0.<timestamp>.p` in the
//! version's build metadata, a CSV name derived from the new version, and an
//! annotation pointing at the CSV it substitutes.

use super::clock::RebuildStamp;
use crate::constants::bundle::{LEGACY_MARKER, MARKER, SUBSTITUTES_FOR_ANNOTATION};
use crate::error::{FreshmakerError, FreshmakerResult};
use semver::{BuildMetadata, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// New bundle version and the stamp that was applied to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleVersion {
    pub version: String,
    pub fm_suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvMetadata {
    pub name: String,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvSpec {
    pub version: String,
}

/// Field-level CSV update applied before the bundle is rebuilt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvUpdate {
    pub metadata: CsvMetadata,
    pub spec: CsvSpec,
}

impl CsvUpdate {
    pub fn substitutes_for(&self) -> Option<&str> {
        self.metadata
            .annotations
            .get(SUBSTITUTES_FOR_ANNOTATION)
            .map(String::as_str)
    }
}

/// Whether `version` parses as a semantic version
pub fn is_valid_semver(version: &str) -> bool {
    Version::parse(version).is_ok()
}

/// Strip a trailing `0.<digits><marker>` stamp from build metadata, if any
fn strip_previous_stamp(build: &str) -> Option<&str> {
    let rest = build
        .strip_suffix(LEGACY_MARKER)
        .or_else(|| build.strip_suffix(MARKER))?;
    let (head, digits) = rest.rsplit_once('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if head == "0" {
        return Some("");
    }
    // Keep the `.` joining earlier build metadata to the stamp
    head.strip_suffix(".0").map(|prefix| &head[..prefix.len() + 1])
}

/// Stamp a bundle version for a rebuild.
///
/// A previous stamp (current or legacy marker) is replaced rather than
/// accumulated. Otherwise the stamp is appended to existing build metadata
/// with `.` or becomes the build metadata after `+`.
pub fn rebuild_bundle_version(version: &str, stamp: RebuildStamp) -> FreshmakerResult<BundleVersion> {
    let mut parsed = Version::parse(version)
        .map_err(|e| FreshmakerError::Version(format!("Invalid bundle version {version}: {e}")))?;
    let fm_suffix = format!("0.{}{MARKER}", stamp.timestamp());

    let build = parsed.build.as_str();
    let new_build = if let Some(prefix) = strip_previous_stamp(build) {
        format!("{prefix}{fm_suffix}")
    } else if !build.is_empty() {
        format!("{build}.{fm_suffix}")
    } else {
        fm_suffix.clone()
    };

    parsed.build = BuildMetadata::new(&new_build)
        .map_err(|e| FreshmakerError::Version(format!("Invalid build metadata {new_build}: {e}")))?;

    Ok(BundleVersion {
        version: parsed.to_string(),
        fm_suffix,
    })
}

/// Derive the rebuilt CSV name.
///
/// Two rules, applied in order:
/// * DNS-safe substitution: when the version with `+` spelled as `-` occurs in
///   the name, it is replaced by the rebuilt version spelled the same way. A
///   name carrying an earlier stamp keeps its `-` joiner.
/// * Dot append fallback: otherwise `.<fm_suffix>` is appended.
pub fn csv_name(name: &str, version: &str, rebuilt_version: &str, fm_suffix: &str) -> String {
    let dns_safe_version = version.replace('+', "-");
    if name.contains(&dns_safe_version) {
        let dns_safe_rebuilt = rebuilt_version.replace('+', "-");
        name.replace(&dns_safe_version, &dns_safe_rebuilt)
    } else {
        format!("{name}.{fm_suffix}")
    }
}

/// Build the CSV update for a rebuilt bundle
pub fn csv_updates(name: &str, version: &str, stamp: RebuildStamp) -> FreshmakerResult<CsvUpdate> {
    let rebuilt = rebuild_bundle_version(version, stamp)?;
    let new_name = csv_name(name, version, &rebuilt.version, &rebuilt.fm_suffix);

    let mut annotations = BTreeMap::new();
    annotations.insert(SUBSTITUTES_FOR_ANNOTATION.to_string(), name.to_string());

    Ok(CsvUpdate {
        metadata: CsvMetadata {
            name: new_name,
            annotations,
        },
        spec: CsvSpec {
            version: rebuilt.version,
        },
    })
}
