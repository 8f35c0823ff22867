use crate::error::ErrorKind;
use crate::{Context, Outcome};
use buildfleet_models::{Package, PackageId};
use exn::ResultExt;

/// Packages to analyze next: never analyzed ones first, then the ones
/// analyzed longest ago.
pub async fn select_update_candidates(ctx: &Context, limit: usize) -> Outcome<Vec<Package>> {
    ctx.repo.fetch_update_candidates(limit).await.or_raise(|| ErrorKind::Storage)
}

/// Packages whose eligible version has fewer builds than the matrix has
/// cells, stalest version first.
pub async fn select_build_candidates(ctx: &Context, limit: usize) -> Outcome<Vec<PackageId>> {
    ctx.repo
        .fetch_build_candidates(limit, ctx.matrix.size())
        .await
        .or_raise(|| ErrorKind::Storage)
}
