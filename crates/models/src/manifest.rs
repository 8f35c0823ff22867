//! Decoded output of `swift package dump-package`.
//!
//! Only the handful of fields the pipeline stores are modelled; everything
//! else in the dump is ignored.

use crate::error::{ErrorKind, Result};
use crate::{SupportedPlatform, SwiftVersion};
use exn::ResultExt;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub platforms: Option<Vec<ManifestPlatform>>,
    #[serde(default)]
    pub swift_language_versions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPlatform {
    pub platform_name: String,
    pub version: String,
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).or_raise(|| ErrorKind::InvalidManifest)
    }

    /// Declared language versions, skipping any that don't parse.
    pub fn swift_versions(&self) -> Vec<SwiftVersion> {
        self.swift_language_versions
            .iter()
            .flatten()
            .filter_map(|v| v.parse().ok())
            .collect()
    }

    pub fn supported_platforms(&self) -> Vec<SupportedPlatform> {
        self.platforms
            .iter()
            .flatten()
            .map(|p| SupportedPlatform::new(&p.platform_name, &p.version))
            .collect()
    }
}
