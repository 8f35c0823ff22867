use crate::error::{ErrorKind, Result};
use crate::{Context, Outcome};
use buildfleet_models::{Package, Version, mark_latest_release};
use buildfleet_shell::Command;
use exn::{OptionExt, ResultExt};
use tracing::instrument;

/// Replace the stored versions of `package` with one version per tag in
/// its mirror, marking the highest release as the latest one.
///
/// The mirror must be up to date already (see
/// [`ensure_checkout`](crate::ensure_checkout)). A tag that isn't a
/// semantic version fails the whole reconciliation and leaves the stored
/// versions untouched.
///
/// The default branch is not turned into a version.
#[instrument(skip_all, fields(package = %package.url))]
pub async fn reconcile_versions(ctx: &Context, package: &Package) -> Outcome<Vec<Version>> {
    let path = ctx.checkout_path(package)?;
    let package_id = package
        .id
        .ok_or_raise(|| ErrorKind::InvariantViolation("package must be persisted before reconciliation"))?;

    let command = Command::ListTags;
    let output = {
        let _lock = ctx.locks.lock(&path).await;
        ctx.shell.run(&command, Some(&path)).await.map_err(|err| ErrorKind::command_failed(err, &command))?
    };
    let mut versions = output
        .lines()
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(|tag| Version::from_tag(package_id, tag).or_raise(|| ErrorKind::InvalidTag(tag.to_string())))
        .collect::<Result<Vec<_>>>()?;
    mark_latest_release(&mut versions);

    let versions = ctx.repo.replace_versions(package_id, &versions).await.or_raise(|| ErrorKind::Storage)?;
    tracing::info!(count = versions.len(), "Versions reconciled");
    Ok(versions)
}
