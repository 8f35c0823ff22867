use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::UtcDateTime;

/// Opaque package identity, assigned by storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub i64);
impl Display for PackageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}
impl FromStr for PackageId {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|_| Error::from(ErrorKind::parse("package id", s)))
    }
}

/// Analysis status of a package, the only externally visible outcome of a
/// pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    /// Ingested but never analyzed.
    #[default]
    New,
    AnalysisInProgress,
    Ok,
    AnalysisFailed,
}
impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "new",
            Status::AnalysisInProgress => "analysis_in_progress",
            Status::Ok => "ok",
            Status::AnalysisFailed => "analysis_failed",
        }
    }
}
impl FromStr for Status {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "new" => Self::New,
            "analysis_in_progress" => Self::AnalysisInProgress,
            "ok" => Self::Ok,
            "analysis_failed" => Self::AnalysisFailed,
            _ => exn::bail!(ErrorKind::parse("package status", s)),
        })
    }
}
impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A cataloged source repository.
///
/// `id` is `None` until the package has been persisted; most of the pipeline
/// refuses to work with unpersisted packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub id: Option<PackageId>,
    pub url: String,
    pub status: Status,
    pub last_commit_at: Option<UtcDateTime>,
}
impl Package {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            status: Status::New,
            last_commit_at: None,
        }
    }

    pub fn with_id(mut self, id: PackageId) -> Self {
        self.id = Some(id);
        self
    }
}
