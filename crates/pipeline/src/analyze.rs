//! Batch analysis: checkout, reconcile, and resolve every version of a
//! batch of packages, then record one final status per package.

use crate::error::{ErrorKind, Result};
use crate::{Context, Outcome, ensure_checkout, reconcile_versions, resolve_manifest, select_update_candidates};
use buildfleet_models::{Package, PackageId, Status, Version};
use exn::{OptionExt, ResultExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use tracing::instrument;

/// What a batch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    pub packages_ok: usize,
    pub packages_failed: usize,
    pub versions_resolved: usize,
    pub versions_failed: usize,
}

impl AnalysisReport {
    fn record(&mut self, package: &PackageAnalysis) {
        match package.status {
            Status::Ok => self.packages_ok += 1,
            _ => self.packages_failed += 1,
        }
        self.versions_resolved += package.resolved;
        self.versions_failed += package.failed;
    }
}

#[derive(Debug)]
struct PackageAnalysis {
    status: Status,
    resolved: usize,
    failed: usize,
}

impl PackageAnalysis {
    const FAILED: Self = Self { status: Status::AnalysisFailed, resolved: 0, failed: 0 };
}

/// Analyze up to `limit` packages, picked by
/// [`select_update_candidates`].
pub async fn analyze(ctx: &Context, limit: usize) -> Result<AnalysisReport> {
    let packages = select_update_candidates(ctx, limit).await?;
    analyze_packages(ctx, packages).await
}

/// Analyze the packages with the given ids. Unknown ids are skipped.
pub async fn analyze_ids(ctx: &Context, ids: &[PackageId]) -> Result<AnalysisReport> {
    let packages = ctx.repo.fetch_packages(ids).await.or_raise(|| ErrorKind::Storage)?;
    analyze_packages(ctx, packages).await
}

/// Analyze a batch of packages, at most [`Context::with_concurrency`] at a
/// time.
///
/// A failure inside one package only affects that package's status. The
/// batch itself only fails when the checkouts directory can't be prepared
/// or a package status can't be written; in the latter case the remaining
/// packages are still processed before the first such error is returned.
#[instrument(skip_all, fields(packages = packages.len()))]
pub async fn analyze_packages(ctx: &Context, packages: Vec<Package>) -> Result<AnalysisReport> {
    prepare_checkouts(ctx).await?;

    let mut futures: VecDeque<_> = packages.iter().map(|package| analyze_package(ctx, package)).collect();
    let mut processing = FuturesUnordered::new();
    processing.extend(futures.drain(..ctx.concurrency.min(futures.len())));

    let mut report = AnalysisReport::default();
    let mut fatal: Vec<crate::error::Error> = Vec::new();
    while let Some(result) = processing.next().await {
        match result {
            Ok(package) => report.record(&package),
            Err(err) => {
                tracing::error!(error = ?err, "Could not record package status");
                fatal.push(err);
            },
        }
        // Refill in submission order.
        if let Some(next) = futures.pop_front() {
            processing.push(next);
        }
    }

    tracing::info!(
        ok = report.packages_ok,
        failed = report.packages_failed,
        versions_resolved = report.versions_resolved,
        versions_failed = report.versions_failed,
        "Analysis finished"
    );
    match fatal.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

/// Create the checkouts directory (not its parents) if it's missing.
async fn prepare_checkouts(ctx: &Context) -> Result<()> {
    let path = ctx.checkouts();
    if !ctx.shell.exists(path).await.or_raise(|| ErrorKind::Io)? {
        tracing::info!(path = %path.display(), "Creating checkouts directory");
        ctx.shell.create_dir(path).await.or_raise(|| ErrorKind::Io)?;
    }
    Ok(())
}

/// Run one package through the pipeline and record its final status.
///
/// Only a failed status write is returned as an error.
#[instrument(skip_all, fields(package = %package.url))]
async fn analyze_package(ctx: &Context, package: &Package) -> Result<PackageAnalysis> {
    let id = package.id.ok_or_raise(|| ErrorKind::InvariantViolation("only stored packages can be analyzed"))?;
    ctx.repo.update_package_status(id, Status::AnalysisInProgress).await.or_raise(|| ErrorKind::Storage)?;

    let analysis = match process_package(ctx, package).await {
        Ok(analysis) => analysis,
        Err(err) => {
            tracing::error!(package = %package.url, error = ?err, "Package analysis failed");
            PackageAnalysis::FAILED
        },
    };
    ctx.repo.update_package_status(id, analysis.status).await.or_raise(|| ErrorKind::Storage)?;
    tracing::debug!(status = %analysis.status, "Package status recorded");
    Ok(analysis)
}

async fn process_package(ctx: &Context, package: &Package) -> Outcome<PackageAnalysis> {
    let path = ensure_checkout(ctx, package).await?;
    let versions = reconcile_versions(ctx, package).await?;

    let mut analysis = PackageAnalysis { status: Status::Ok, resolved: 0, failed: 0 };
    for mut version in versions {
        match resolve_version(ctx, package, &mut version).await {
            Ok(()) => analysis.resolved += 1,
            Err(err) => {
                tracing::warn!(
                    package = %package.url,
                    path = %path.display(),
                    revision = version.revision().unwrap_or_default(),
                    error = ?err,
                    "Version analysis failed"
                );
                analysis.failed += 1;
            },
        }
    }
    if analysis.failed > 0 {
        analysis.status = Status::AnalysisFailed;
    }
    Ok(analysis)
}

async fn resolve_version(ctx: &Context, package: &Package, version: &mut Version) -> Outcome<()> {
    let manifest = resolve_manifest(ctx, package, version).await?;
    crate::update_version(ctx, version, &manifest).await
}
