//! # Package Identifiers
//!
//! Parsing and ordering of `name-version-release` identifiers using the RPM
//! version comparison rules, plus the rebuilt identifier stamp for images.

use crate::error::{FreshmakerError, FreshmakerResult};
use crate::models::ArtifactType;
use std::cmp::Ordering;
use std::fmt;

/// Parsed `[epoch:]name-version-release`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nvr {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: Option<u32>,
}

impl Nvr {
    /// Split from the right, so names may contain dashes
    pub fn parse(s: &str) -> FreshmakerResult<Self> {
        let (epoch, rest) = match s.split_once(':') {
            Some((e, rest)) if !e.is_empty() && e.bytes().all(|b| b.is_ascii_digit()) => {
                let epoch = e
                    .parse::<u32>()
                    .map_err(|err| FreshmakerError::Version(format!("Invalid epoch in {s}: {err}")))?;
                (Some(epoch), rest)
            }
            _ => (None, s),
        };

        let mut parts = rest.rsplitn(3, '-');
        let release = parts.next().unwrap_or_default();
        let version = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        if name.is_empty() || version.is_empty() || release.is_empty() {
            return Err(FreshmakerError::Version(format!(
                "Invalid NVR, expected name-version-release: {s}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            epoch,
        })
    }

    /// `name-version`, used to match exception lists
    pub fn name_version(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Display for Nvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{epoch}:")?;
        }
        write!(f, "{}-{}-{}", self.name, self.version, self.release)
    }
}

impl std::str::FromStr for Nvr {
    type Err = FreshmakerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Compare two version or release strings segment by segment, as rpm does.
///
/// Numeric segments compare numerically and beat alphabetic ones, `~` sorts
/// before anything (even the end of the string) and `^` sorts after the end of
/// the string but before any further segment.
pub fn rpm_vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let one = a.as_bytes();
    let two = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    let is_sep = |c: u8| !c.is_ascii_alphanumeric() && c != b'~' && c != b'^';

    loop {
        while i < one.len() && is_sep(one[i]) {
            i += 1;
        }
        while j < two.len() && is_sep(two[j]) {
            j += 1;
        }

        let c1 = one.get(i).copied();
        let c2 = two.get(j).copied();

        if c1 == Some(b'~') || c2 == Some(b'~') {
            if c1 != Some(b'~') {
                return Ordering::Greater;
            }
            if c2 != Some(b'~') {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if c1 == Some(b'^') || c2 == Some(b'^') {
            if c1.is_none() {
                return Ordering::Less;
            }
            if c2.is_none() {
                return Ordering::Greater;
            }
            if c1 != Some(b'^') {
                return Ordering::Greater;
            }
            if c2 != Some(b'^') {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if c1.is_none() || c2.is_none() {
            break;
        }

        let numeric = one[i].is_ascii_digit();
        let take = |bytes: &[u8], start: usize| -> usize {
            let mut end = start;
            while end < bytes.len()
                && (if numeric {
                    bytes[end].is_ascii_digit()
                } else {
                    bytes[end].is_ascii_alphabetic()
                })
            {
                end += 1;
            }
            end
        };
        let end1 = take(one, i);
        let end2 = take(two, j);
        let seg1 = &a[i..end1];
        let seg2 = &b[j..end2];

        if seg2.is_empty() {
            // Segment types differ; numeric wins
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            let s1 = seg1.trim_start_matches('0');
            let s2 = seg2.trim_start_matches('0');
            s1.len().cmp(&s2.len()).then_with(|| s1.cmp(s2))
        } else {
            seg1.cmp(seg2)
        };
        if ord != Ordering::Equal {
            return ord;
        }

        i = end1;
        j = end2;
    }

    match (i >= one.len(), j >= two.len()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

/// Epoch, then version, then release
pub fn compare_evr(a: &Nvr, b: &Nvr) -> Ordering {
    a.epoch
        .unwrap_or(0)
        .cmp(&b.epoch.unwrap_or(0))
        .then_with(|| rpm_vercmp(&a.version, &b.version))
        .then_with(|| rpm_vercmp(&a.release, &b.release))
}

/// Name first, then EVR
pub fn compare_nvr(a: &Nvr, b: &Nvr) -> Ordering {
    a.name.cmp(&b.name).then_with(|| compare_evr(a, b))
}

/// Sort NVR strings; unparseable entries sort last in input order
pub fn sort_by_nvr(nvrs: &mut [String], reverse: bool) {
    nvrs.sort_by(|a, b| {
        let ord = match (Nvr::parse(a), Nvr::parse(b)) {
            (Ok(a), Ok(b)) => compare_nvr(&a, &b),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => Ordering::Equal,
        };
        if reverse {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// NVR of the rebuilt image: first release component, the rebuild
/// timestamp and the configured suffix.
///
/// Only images get a stamped NVR; other artifact kinds return `None`.
pub fn rebuilt_nvr(
    artifact_type: ArtifactType,
    nvr: &str,
    timestamp: i64,
    suffix: &str,
) -> FreshmakerResult<Option<String>> {
    if artifact_type != ArtifactType::Image {
        return Ok(None);
    }
    let parsed = Nvr::parse(nvr)?;
    let first = parsed.release.split('.').next().unwrap_or_default();
    Ok(Some(format!(
        "{}-{}-{first}.{timestamp}{suffix}",
        parsed.name, parsed.version
    )))
}
