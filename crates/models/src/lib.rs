//! Domain types shared by every stage of the build-fleet pipeline.

mod build;
pub mod error;
mod manifest;
mod package;
mod platform;
mod reference;
mod semver;
mod swift;
mod version;

pub use build::{Build, BuildId, BuildPair, BuildStatus};
pub use error::{Error, ErrorKind, Result};
pub use manifest::{Manifest, ManifestPlatform};
pub use package::{Package, PackageId, Status};
pub use platform::{Platform, SupportedPlatform};
pub use reference::Reference;
pub use semver::SemVer;
pub use swift::{SwiftVersion, supports_major_swift_version};
pub use version::{Latest, Version, VersionId, latest_branch_version, mark_latest_release};
