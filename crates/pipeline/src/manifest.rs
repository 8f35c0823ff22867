use crate::error::ErrorKind;
use crate::{Context, Outcome};
use buildfleet_models::{Manifest, Package, Version};
use buildfleet_shell::Command;
use exn::{OptionExt, ResultExt};
use std::path::Path;
use tracing::instrument;

async fn run(ctx: &Context, command: &Command, path: &Path) -> Outcome<String> {
    ctx.shell.run(command, Some(path)).await.map_err(|err| ErrorKind::command_failed(err, command))
}

/// Check out `version` in the mirror of `package` and decode the manifest
/// at that revision.
///
/// Holds the mirror's lock from checkout until the manifest has been
/// dumped, so concurrent resolutions of the same package never see each
/// other's revision.
#[instrument(skip_all, fields(package = %package.url, revision = version.revision().unwrap_or_default()))]
pub async fn resolve_manifest(ctx: &Context, package: &Package, version: &Version) -> Outcome<Manifest> {
    let path = ctx.checkout_path(package)?;
    let revision = version
        .revision()
        .filter(|revision| !revision.is_empty())
        .ok_or_raise(|| ErrorKind::InvalidRevision(version.id))?;

    let output = {
        let _lock = ctx.locks.lock(&path).await;
        run(ctx, &Command::Checkout { reference: revision.to_string() }, &path).await?;
        run(ctx, &Command::DumpPackage, &path).await?
    };
    Manifest::from_json(&output).or_raise(|| ErrorKind::InvalidManifest)
}

/// Copy the manifest's fields onto `version` and save it.
pub async fn update_version(ctx: &Context, version: &mut Version, manifest: &Manifest) -> Outcome<()> {
    version.apply_manifest(manifest);
    ctx.repo.update_version(version).await.or_raise(|| ErrorKind::Storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MANIFEST, URL};
    use buildfleet_models::{PackageId, Reference, SupportedPlatform, SwiftVersion};
    use buildfleet_shell::{MockRepo, MockShell};
    use std::sync::Arc;
    use std::time::Duration;

    fn path() -> std::path::PathBuf {
        testing::checkout_path(URL)
    }

    fn repo() -> MockRepo {
        MockRepo::default()
            .with_tag("1.0.0", MANIFEST)
            .with_tag("1.1.0", r#"{"name": "Renamed"}"#)
            .with_tag("1.2.0", "not json")
            .with_tag_without_manifest("1.3.0")
    }

    fn package() -> Package {
        Package::new(URL).with_id(PackageId(1))
    }

    fn version(tag: &str) -> Version {
        Version::from_tag(PackageId(1), tag).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_the_requested_revision() {
        let shell = Arc::new(MockShell::default().with_repo(URL, repo()).with_checkout(path(), URL));
        let (_db, ctx) = testing::context(shell.clone()).await;

        let manifest = resolve_manifest(&ctx, &package(), &version("1.0.0")).await.unwrap();
        assert_eq!(manifest.name, "Pkg");
        let manifest = resolve_manifest(&ctx, &package(), &version("1.1.0")).await.unwrap();
        assert_eq!(manifest.name, "Renamed");

        let history: Vec<_> = shell.history().into_iter().map(|(command, _)| command).collect();
        assert_eq!(
            history,
            [
                Command::Checkout { reference: "1.0.0".to_string() },
                Command::DumpPackage,
                Command::Checkout { reference: "1.1.0".to_string() },
                Command::DumpPackage,
            ]
        );
    }

    #[tokio::test]
    async fn test_failures() {
        let shell = Arc::new(MockShell::default().with_repo(URL, repo()).with_checkout(path(), URL));
        let (_db, ctx) = testing::context(shell).await;

        let err = resolve_manifest(&ctx, &package(), &version("1.2.0")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidManifest));
        let err = resolve_manifest(&ctx, &package(), &version("1.3.0")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ExternalCommandFailed { .. }));
        let err = resolve_manifest(&ctx, &package(), &version("9.9.9")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ExternalCommandFailed { command, .. } if command.contains("checkout")));
        let err = resolve_manifest(&ctx, &package(), &Version::new(PackageId(1), None)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRevision(None)));
        let err = resolve_manifest(&ctx, &Package::new("nope"), &version("1.0.0")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPackageUrl { .. }));
    }

    #[tokio::test]
    async fn test_empty_branch_name_has_no_revision() {
        let shell = Arc::new(MockShell::default());
        let (_db, ctx) = testing::context(shell.clone()).await;
        let version = Version::new(PackageId(1), Some(Reference::branch("")));
        let err = resolve_manifest(&ctx, &package(), &version).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRevision(_)));
        assert!(shell.history().is_empty());
    }

    #[tokio::test]
    async fn test_same_package_is_serialized() {
        let shell = Arc::new(
            MockShell::default()
                .with_repo(URL, repo())
                .with_checkout(path(), URL)
                .with_latency(Duration::from_millis(5)),
        );
        let (_db, ctx) = testing::context(shell.clone()).await;
        let package = package();
        let (a, b, c) = (version("1.0.0"), version("1.1.0"), version("1.0.0"));
        let (a, b, c) = tokio::join!(
            resolve_manifest(&ctx, &package, &a),
            resolve_manifest(&ctx, &package, &b),
            resolve_manifest(&ctx, &package, &c),
        );
        // Each dump saw the revision its own checkout selected.
        assert_eq!(a.unwrap().name, "Pkg");
        assert_eq!(b.unwrap().name, "Renamed");
        assert_eq!(c.unwrap().name, "Pkg");
        assert_eq!(shell.peak_concurrency(&path()), 1);
    }

    #[tokio::test]
    async fn test_update_version_persists_manifest_fields() {
        let shell = Arc::new(MockShell::default());
        let (_db, ctx) = testing::context(shell).await;
        let package = ctx.repo().insert_package(URL).await.unwrap();
        let package_id = package.id.unwrap();
        let mut versions = ctx
            .repo()
            .replace_versions(package_id, &[Version::from_tag(package_id, "1.0.0").unwrap()])
            .await
            .unwrap();

        let manifest = Manifest::from_json(MANIFEST).unwrap();
        update_version(&ctx, &mut versions[0], &manifest).await.unwrap();

        let stored = ctx.repo().list_versions(package_id).await.unwrap();
        assert_eq!(stored[0].package_name.as_deref(), Some("Pkg"));
        assert_eq!(stored[0].swift_versions, [SwiftVersion::new(5, 0, 0)]);
        assert_eq!(stored[0].supported_platforms, [SupportedPlatform::new("ios", "13.0")]);

        let mut unsaved = Version::from_tag(package_id, "2.0.0").unwrap();
        let err = update_version(&ctx, &mut unsaved, &manifest).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage));
    }
}
