//! Build matrix arithmetic.

use crate::error::ErrorKind;
use crate::{Context, Outcome};
use buildfleet_models::{Build, BuildPair, PackageId, Platform, SwiftVersion, Version};
use exn::ResultExt;
use std::collections::HashSet;

/// The active platforms and toolchain versions. Every platform is built
/// with every toolchain version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMatrix {
    platforms: Vec<Platform>,
    swift_versions: Vec<SwiftVersion>,
}

impl BuildMatrix {
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn new(
        platforms: impl IntoIterator<Item = Platform>,
        swift_versions: impl IntoIterator<Item = SwiftVersion>,
    ) -> Self {
        fn dedup<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
            let mut unique = Vec::new();
            for item in items {
                if !unique.contains(&item) {
                    unique.push(item);
                }
            }
            unique
        }
        Self {
            platforms: dedup(platforms),
            swift_versions: dedup(swift_versions),
        }
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn swift_versions(&self) -> &[SwiftVersion] {
        &self.swift_versions
    }

    /// Every cell of the matrix, platform-major.
    pub fn pairs(&self) -> impl Iterator<Item = BuildPair> + '_ {
        self.platforms
            .iter()
            .flat_map(|platform| self.swift_versions.iter().map(|swift| BuildPair::new(*platform, *swift)))
    }

    /// Number of builds a fully covered version has.
    pub fn size(&self) -> usize {
        self.platforms.len() * self.swift_versions.len()
    }

    /// Cells with no recorded build, whatever that build's status.
    ///
    /// Builds for platforms or toolchain versions outside the matrix are
    /// ignored.
    pub fn missing<'a>(&self, builds: impl IntoIterator<Item = &'a Build>) -> HashSet<BuildPair> {
        let mut missing: HashSet<BuildPair> = self.pairs().collect();
        for build in builds {
            missing.remove(&build.pair());
        }
        missing
    }
}

/// The cells still to be built for one eligible version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBuilds {
    pub version: Version,
    pub pairs: HashSet<BuildPair>,
}

/// For every eligible version of a package (one carrying a latest marker),
/// the matrix cells it has no build for. Fully covered versions are
/// included with an empty set.
pub async fn missing_builds(ctx: &Context, package_id: PackageId) -> Outcome<Vec<MissingBuilds>> {
    let eligible = ctx
        .repo
        .list_eligible_versions_with_builds(package_id)
        .await
        .or_raise(|| ErrorKind::Storage)?;
    Ok(eligible
        .into_iter()
        .map(|(version, builds)| MissingBuilds { pairs: ctx.matrix.missing(&builds), version })
        .collect())
}
