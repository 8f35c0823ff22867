use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A build platform the external builder knows how to target.
///
/// Which of these are *active* (part of the build matrix) is configuration,
/// not a property of the platform itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Ios,
    MacosSpm,
    MacosXcodebuild,
    MacosSpmArm,
    MacosXcodebuildArm,
    Linux,
    Tvos,
    Watchos,
}
impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::Ios,
        Platform::MacosSpm,
        Platform::MacosXcodebuild,
        Platform::MacosSpmArm,
        Platform::MacosXcodebuildArm,
        Platform::Linux,
        Platform::Tvos,
        Platform::Watchos,
    ];

    /// Identifier passed to the builder as `BUILD_PLATFORM` and stored on
    /// build records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::MacosSpm => "macos-spm",
            Platform::MacosXcodebuild => "macos-xcodebuild",
            Platform::MacosSpmArm => "macos-spm-arm",
            Platform::MacosXcodebuildArm => "macos-xcodebuild-arm",
            Platform::Linux => "linux",
            Platform::Tvos => "tvos",
            Platform::Watchos => "watchos",
        }
    }
}
impl FromStr for Platform {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::from(ErrorKind::parse("platform", s)))
    }
}
impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A platform (and minimum OS version) declared by a package manifest.
///
/// Unlike [`Platform`] this is free-form: it is whatever the package author
/// wrote, e.g. `ios 13.0` or `macos 10.15`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportedPlatform {
    pub name: String,
    pub version: String,
}
impl SupportedPlatform {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }
}
impl Display for SupportedPlatform {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} {}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ios", Platform::Ios)]
    #[case("macos-spm", Platform::MacosSpm)]
    #[case("MacOS-XcodeBuild", Platform::MacosXcodebuild)]
    #[case("macos-xcodebuild-arm", Platform::MacosXcodebuildArm)]
    #[case(" linux ", Platform::Linux)]
    fn test_parse(#[case] input: &str, #[case] expected: Platform) {
        assert_eq!(input.parse::<Platform>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "windows".parse::<Platform>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "platform", .. }));
    }

    #[test]
    fn test_serde_matches_identifier() {
        for platform in Platform::ALL {
            let json = serde_json::to_string(&platform).unwrap();
            assert_eq!(json, format!("\"{}\"", platform.as_str()));
            assert_eq!(serde_json::from_str::<Platform>(&json).unwrap(), platform);
        }
    }
}
