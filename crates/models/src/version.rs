use crate::error::{Error, ErrorKind, Result};
use crate::{Manifest, PackageId, Reference, SupportedPlatform, SwiftVersion};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::UtcDateTime;

/// Opaque version identity, assigned by storage and handed to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionId(pub i64);
impl Display for VersionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Marks a version as the representative one for a package.
///
/// Only marked versions are eligible for builds. A package has at most one
/// version carrying each marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Latest {
    DefaultBranch,
    Release,
}
impl Latest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Latest::DefaultBranch => "default_branch",
            Latest::Release => "release",
        }
    }
}
impl FromStr for Latest {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "default_branch" => Self::DefaultBranch,
            "release" => Self::Release,
            _ => exn::bail!(ErrorKind::parse("latest", s)),
        })
    }
}
impl Display for Latest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A reconciled revision of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub id: Option<VersionId>,
    pub package_id: PackageId,
    pub reference: Option<Reference>,
    pub commit: Option<String>,
    pub commit_date: Option<UtcDateTime>,
    pub published_at: Option<UtcDateTime>,
    /// Name declared by the package manifest (not the repository name).
    pub package_name: Option<String>,
    pub swift_versions: Vec<SwiftVersion>,
    pub supported_platforms: Vec<SupportedPlatform>,
    pub latest: Option<Latest>,
}
impl Version {
    pub fn new(package_id: PackageId, reference: Option<Reference>) -> Self {
        Self {
            id: None,
            package_id,
            reference,
            commit: None,
            commit_date: None,
            published_at: None,
            package_name: None,
            swift_versions: Vec::new(),
            supported_platforms: Vec::new(),
            latest: None,
        }
    }

    /// Build an (unpersisted) version from a git tag name.
    ///
    /// Fails if the tag is not a semantic version.
    pub fn from_tag(package_id: PackageId, tag_name: impl Into<String>) -> Result<Self> {
        Ok(Self::new(package_id, Some(Reference::tag(tag_name)?)))
    }

    pub fn is_branch(&self) -> bool {
        self.reference.as_ref().is_some_and(Reference::is_branch)
    }

    /// The revision to check out, if there is one.
    pub fn revision(&self) -> Option<&str> {
        self.reference.as_ref().map(Reference::name)
    }

    /// Copy the fields the pipeline cares about from a decoded manifest.
    ///
    /// Declared language versions that don't parse are dropped rather than
    /// failing the whole version.
    pub fn apply_manifest(&mut self, manifest: &Manifest) {
        self.package_name = Some(manifest.name.clone());
        self.swift_versions = manifest.swift_versions();
        self.supported_platforms = manifest.supported_platforms();
    }

    pub fn supports_major_swift_version(&self, major: u32) -> bool {
        crate::supports_major_swift_version(major, &self.swift_versions)
    }
}

/// The branch version with the most recent commit date.
///
/// Branch versions without a commit date never win.
pub fn latest_branch_version(versions: &[Version]) -> Option<&Version> {
    versions
        .iter()
        .filter(|v| v.is_branch())
        .filter_map(|v| v.commit_date.map(|date| (date, v)))
        .max_by_key(|(date, _)| *date)
        .map(|(_, v)| v)
}

/// Mark the highest stable tag as the latest release, clearing any previous
/// release marker. Pre-release tags are only considered when there is no
/// stable tag at all.
///
/// Returns the index of the marked version.
pub fn mark_latest_release(versions: &mut [Version]) -> Option<usize> {
    for version in versions.iter_mut() {
        if version.latest == Some(Latest::Release) {
            version.latest = None;
        }
    }
    let shared: &[Version] = versions;
    let candidates = || {
        shared
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.reference.as_ref().and_then(Reference::semver).map(|semver| (i, semver)))
    };
    let index = candidates()
        .filter(|(_, semver)| semver.is_stable())
        .max_by(|(_, a), (_, b)| a.cmp(b))
        .or_else(|| candidates().max_by(|(_, a), (_, b)| a.cmp(b)))
        .map(|(i, _)| i)?;
    versions[index].latest = Some(Latest::Release);
    Some(index)
}
