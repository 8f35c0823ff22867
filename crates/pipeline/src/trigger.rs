//! Dispatching missing builds to the CI builder.

use crate::error::{ErrorKind, Result};
use crate::{Context, MissingBuilds, missing_builds, select_build_candidates};
use buildfleet_gitlab::{Builder, TriggerRequest};
use buildfleet_models::{BuildStatus, PackageId};
use exn::ResultExt;
use tracing::instrument;

/// What a triggering run did, counted in build cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerReport {
    /// Accepted by the builder and recorded as pending.
    pub triggered: usize,
    /// Rejected by the builder or never answered.
    pub failed: usize,
    /// Unknown packages and eligible versions with nothing to check out.
    pub skipped: usize,
}

/// Trigger every missing build of up to `limit` packages, picked by
/// [`select_build_candidates`].
pub async fn trigger_builds(ctx: &Context, builder: &Builder, limit: usize) -> Result<TriggerReport> {
    builder.trigger_credentials().or_raise(|| ErrorKind::MissingCredentials)?;
    let ids = select_build_candidates(ctx, limit).await?;
    trigger_builds_for(ctx, builder, &ids).await
}

/// Trigger every missing build of the given packages.
///
/// Credentials are checked before anything else; without them no request
/// is made. Every accepted trigger is recorded as a pending build so the
/// same cell isn't dispatched again before its result comes in.
#[instrument(skip_all, fields(packages = ids.len()))]
pub async fn trigger_builds_for(ctx: &Context, builder: &Builder, ids: &[PackageId]) -> Result<TriggerReport> {
    builder.trigger_credentials().or_raise(|| ErrorKind::MissingCredentials)?;

    let mut report = TriggerReport::default();
    for id in ids {
        let Some(package) = ctx.repo.get_package(*id).await.or_raise(|| ErrorKind::Storage)? else {
            tracing::warn!(package_id = %id, "Unknown package, skipping");
            report.skipped += 1;
            continue;
        };
        for MissingBuilds { version, pairs } in missing_builds(ctx, *id).await? {
            let (Some(version_id), Some(reference)) = (version.id, version.reference) else {
                tracing::warn!(package = %package.url, "Eligible version without a revision, skipping");
                report.skipped += 1;
                continue;
            };
            let mut pairs: Vec<_> = pairs.into_iter().collect();
            pairs.sort();
            for pair in pairs {
                let request = TriggerRequest {
                    clone_url: package.url.clone(),
                    platform: pair.platform,
                    reference: reference.clone(),
                    swift_version: pair.swift_version,
                    version_id,
                };
                match builder.trigger_build(&request).await {
                    Ok(status) if status.is_success() => {
                        ctx.repo
                            .record_build(version_id, pair, BuildStatus::Pending)
                            .await
                            .or_raise(|| ErrorKind::Storage)?;
                        report.triggered += 1;
                    },
                    Ok(status) => {
                        tracing::warn!(package = %package.url, %reference, %pair, %status, "Build trigger rejected");
                        report.failed += 1;
                    },
                    Err(err) => {
                        let url = &package.url;
                        tracing::error!(package = %url, %reference, %pair, error = ?err, "Build trigger failed");
                        report.failed += 1;
                    },
                }
            }
        }
    }
    tracing::info!(
        triggered = report.triggered,
        failed = report.failed,
        skipped = report.skipped,
        "Build triggering finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, URL};
    use buildfleet_gitlab::{Credentials, MockTransport, StatusCode};
    use buildfleet_models::{BuildPair, Latest, Platform, SwiftVersion, Version, VersionId};
    use buildfleet_shell::MockShell;
    use rstest::rstest;
    use std::sync::Arc;

    const SITE_API: &str = "https://site.example/api";

    fn credentials() -> Credentials {
        Credentials {
            pipeline_token: Some("pipeline".to_string()),
            builder_token: Some("builder".to_string()),
            api_token: None,
        }
    }

    fn builder(transport: &Arc<MockTransport>, credentials: Credentials) -> Builder {
        Builder::new(transport.clone(), SITE_API).with_credentials(credentials)
    }

    /// A package with tags 1.0.0 and 1.1.0, the latter marked latest.
    async fn tagged_package(ctx: &Context) -> (PackageId, VersionId) {
        let package_id = ctx.repo().insert_package(URL).await.unwrap().id.unwrap();
        let mut versions: Vec<Version> =
            ["1.0.0", "1.1.0"].iter().map(|tag| Version::from_tag(package_id, *tag).unwrap()).collect();
        versions[1].latest = Some(Latest::Release);
        let versions = ctx.repo().replace_versions(package_id, &versions).await.unwrap();
        (package_id, versions[1].id.unwrap())
    }

    #[rstest]
    #[case(None, Some("builder"))]
    #[case(Some("pipeline"), None)]
    #[case(None, None)]
    #[tokio::test]
    async fn test_missing_credentials_make_no_calls(
        #[case] pipeline: Option<&str>,
        #[case] builder_token: Option<&str>,
    ) {
        let (_db, ctx) = testing::context(Arc::new(MockShell::default())).await;
        let (package_id, _) = tagged_package(&ctx).await;
        let transport = Arc::new(MockTransport::default());
        let credentials = Credentials {
            pipeline_token: pipeline.map(str::to_string),
            builder_token: builder_token.map(str::to_string),
            api_token: Some("api".to_string()),
        };
        let builder = builder(&transport, credentials);

        let err = trigger_builds(&ctx, &builder, 10).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingCredentials));
        let err = trigger_builds_for(&ctx, &builder, &[package_id]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingCredentials));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_triggers_every_missing_cell_once() {
        let (_db, ctx) = testing::context(Arc::new(MockShell::default())).await;
        let (_, version_id) = tagged_package(&ctx).await;
        let transport = Arc::new(MockTransport::default());
        let builder = builder(&transport, credentials());

        let report = trigger_builds(&ctx, &builder, 10).await.unwrap();
        assert_eq!(report, TriggerReport { triggered: 4, failed: 0, skipped: 0 });

        let posts = transport.posts();
        assert_eq!(posts.len(), 4);
        for post in &posts {
            assert_eq!(post.field("token"), Some("pipeline"));
            assert_eq!(post.field("variables[BUILDER_TOKEN]"), Some("builder"));
            assert_eq!(post.field("variables[CLONE_URL]"), Some(URL));
            assert_eq!(post.field("variables[REFERENCE]"), Some("1.1.0"));
            assert_eq!(post.field("variables[VERSION_ID]"), Some(version_id.to_string().as_str()));
            assert_eq!(post.field("variables[API_BASEURL]"), Some(SITE_API));
        }
        let swift: Vec<_> = posts.iter().filter_map(|p| p.field("variables[SWIFT_VERSION]")).collect();
        assert_eq!(swift.iter().filter(|v| **v == "5.1").count(), 2);
        assert_eq!(swift.iter().filter(|v| **v == "5.2").count(), 2);

        let builds = ctx.repo().list_builds(version_id).await.unwrap();
        assert_eq!(builds.len(), 4);
        assert!(builds.iter().all(|b| b.status == BuildStatus::Pending));

        // Pending records cover the matrix: nothing left to do.
        let report = trigger_builds(&ctx, &builder, 10).await.unwrap();
        assert_eq!(report, TriggerReport::default());
        assert_eq!(transport.posts().len(), 4);
    }

    #[tokio::test]
    async fn test_only_missing_cells_are_triggered() {
        let (_db, ctx) = testing::context(Arc::new(MockShell::default())).await;
        let (package_id, version_id) = tagged_package(&ctx).await;
        let done = BuildPair::new(Platform::Linux, SwiftVersion::new(5, 2, 0));
        ctx.repo().record_build(version_id, done, BuildStatus::Failure).await.unwrap();
        let transport = Arc::new(MockTransport::default());

        let report = trigger_builds_for(&ctx, &builder(&transport, credentials()), &[package_id]).await.unwrap();
        assert_eq!(report.triggered, 3);
        assert!(!transport.posts().iter().any(|p| {
            p.field("variables[BUILD_PLATFORM]") == Some("linux") && p.field("variables[SWIFT_VERSION]") == Some("5.2")
        }));
        // The reported failure is kept, not overwritten with pending.
        let builds = ctx.repo().list_builds(version_id).await.unwrap();
        let linux = builds.iter().find(|b| b.pair() == done).unwrap();
        assert_eq!(linux.status, BuildStatus::Failure);
    }

    #[tokio::test]
    async fn test_rejected_triggers_are_not_recorded() {
        let (_db, ctx) = testing::context(Arc::new(MockShell::default())).await;
        let (package_id, version_id) = tagged_package(&ctx).await;
        let transport = Arc::new(MockTransport::default().with_post_status(StatusCode::SERVICE_UNAVAILABLE));

        let report = trigger_builds_for(&ctx, &builder(&transport, credentials()), &[package_id]).await.unwrap();
        assert_eq!(report, TriggerReport { triggered: 0, failed: 4, skipped: 0 });
        assert!(ctx.repo().list_builds(version_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_ineligible_packages() {
        let (_db, ctx) = testing::context(Arc::new(MockShell::default())).await;
        let untagged = ctx.repo().insert_package("https://example.com/untagged").await.unwrap().id.unwrap();
        let transport = Arc::new(MockTransport::default());

        let ids = [PackageId(404), untagged];
        let report = trigger_builds_for(&ctx, &builder(&transport, credentials()), &ids).await.unwrap();
        assert_eq!(report, TriggerReport { triggered: 0, failed: 0, skipped: 1 });
        assert_eq!(transport.call_count(), 0);
    }
}
