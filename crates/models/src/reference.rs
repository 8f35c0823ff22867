use crate::SemVer;
use crate::error::Result;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A git revision a [`Version`](crate::Version) points at.
///
/// Tags keep their original name alongside the parsed version, because that
/// is what has to be checked out (`v1.2.3` and `1.2.3` parse to the same
/// [`SemVer`] but are different refs).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Branch(String),
    Tag { version: SemVer, name: String },
}
impl Reference {
    pub fn branch(name: impl Into<String>) -> Self {
        Self::Branch(name.into())
    }

    /// Parse a tag name into a tag reference.
    ///
    /// Fails if the tag is not a semantic version.
    pub fn tag(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let version = name.parse::<SemVer>()?;
        Ok(Self::Tag { version, name })
    }

    /// The ref name to hand to `git checkout`.
    pub fn name(&self) -> &str {
        match self {
            Self::Branch(name) => name,
            Self::Tag { name, .. } => name,
        }
    }

    pub fn semver(&self) -> Option<&SemVer> {
        match self {
            Self::Branch(_) => None,
            Self::Tag { version, .. } => Some(version),
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Self::Branch(_))
    }
}
impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_keeps_original_name() {
        let reference = Reference::tag("v1.2.3").unwrap();
        assert_eq!(reference.name(), "v1.2.3");
        assert_eq!(reference.semver(), Some(&SemVer::new(1, 2, 3)));
        assert_eq!(reference.to_string(), "v1.2.3");
        assert!(!reference.is_branch());
    }

    #[test]
    fn test_tag_rejects_non_semver() {
        assert!(Reference::tag("nightly").is_err());
    }

    #[test]
    fn test_branch() {
        let reference = Reference::branch("main");
        assert!(reference.is_branch());
        assert_eq!(reference.semver(), None);
        assert_eq!(reference.to_string(), "main");
    }
}
