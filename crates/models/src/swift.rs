use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A Swift toolchain (language) version.
///
/// Manifests declare these loosely (`"5"`, `"4.2"`), so missing components
/// default to zero. Displays as `major.minor`, with the patch component only
/// when non-zero, which keeps the stored form stable for the build dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwiftVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}
impl SwiftVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// The `major.minor` form handed to the builder.
    pub fn short(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// Whether this declared language version satisfies a toolchain with the
    /// given major version (a package declaring Swift 5 also builds with 4).
    pub fn supports_major(&self, major: u32) -> bool {
        self.major >= major
    }
}
impl FromStr for SwiftVersion {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut components = [0u32; 3];
        let mut count = 0;
        for part in s.trim().split('.') {
            if count == components.len() || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                exn::bail!(ErrorKind::parse("swift version", s));
            }
            components[count] = part.parse::<u32>().or_raise(|| ErrorKind::parse("swift version", s))?;
            count += 1;
        }
        let [major, minor, patch] = components;
        Ok(Self { major, minor, patch })
    }
}
impl Display for SwiftVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.patch {
            0 => write!(f, "{}.{}", self.major, self.minor),
            patch => write!(f, "{}.{}.{}", self.major, self.minor, patch),
        }
    }
}
impl Serialize for SwiftVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
impl<'de> Deserialize<'de> for SwiftVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| serde::de::Error::custom(format!("invalid swift version: {s}")))
    }
}

/// Whether any of the declared language versions satisfies the given major
/// toolchain version.
pub fn supports_major_swift_version(major: u32, values: &[SwiftVersion]) -> bool {
    values.iter().any(|v| v.supports_major(major))
}
