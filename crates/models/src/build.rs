use crate::error::{Error, ErrorKind};
use crate::{Platform, SwiftVersion, VersionId};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildId(pub i64);
impl Display for BuildId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a build as reported back by the builder.
///
/// `Pending` is recorded locally once a trigger has been accepted, so that
/// the same cell isn't dispatched again before the report arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    Pending,
    Success,
    Failure,
    Timeout,
}
impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
            BuildStatus::Timeout => "timeout",
        }
    }
}
impl FromStr for BuildStatus {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "success" | "ok" => Self::Success,
            "failure" | "failed" => Self::Failure,
            "timeout" => Self::Timeout,
            _ => exn::bail!(ErrorKind::parse("build status", s)),
        })
    }
}
impl Display for BuildStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A recorded build for one cell of the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub id: Option<BuildId>,
    pub version_id: VersionId,
    pub platform: Platform,
    pub swift_version: SwiftVersion,
    pub status: BuildStatus,
}
impl Build {
    pub fn new(version_id: VersionId, pair: BuildPair, status: BuildStatus) -> Self {
        Self {
            id: None,
            version_id,
            platform: pair.platform,
            swift_version: pair.swift_version,
            status,
        }
    }

    pub fn pair(&self) -> BuildPair {
        BuildPair::from(self)
    }
}

/// One cell of the build matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildPair {
    pub platform: Platform,
    pub swift_version: SwiftVersion,
}
impl BuildPair {
    pub fn new(platform: Platform, swift_version: SwiftVersion) -> Self {
        Self { platform, swift_version }
    }
}
impl From<&Build> for BuildPair {
    fn from(build: &Build) -> Self {
        Self::new(build.platform, build.swift_version)
    }
}
impl Display for BuildPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} / swift {}", self.platform, self.swift_version)
    }
}
