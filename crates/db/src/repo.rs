//! Repository for packages and the versions and builds they own.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{BuildRow, PackageRow, VersionRow};
use buildfleet_models::{Build, BuildPair, BuildStatus, Package, PackageId, Status, Version, VersionId};
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use std::collections::HashMap;
use time::UtcDateTime;
use tracing::instrument;

fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

fn limit(value: usize) -> Result<i64> {
    i64::try_from(value).or_raise(|| ErrorKind::InvalidData("limit"))
}

/// Repository for managing packages, versions and builds.
///
/// # Relationships
///
/// - A package owns its versions; a version owns its builds.
/// - Versions are only ever replaced as a whole set per package
///   ([`replace_versions`](Self::replace_versions)), never merged.
/// - A build is unique per (version, platform, toolchain version).
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Packages
    // =========================================================================

    /// Catalog a new package. Fails if the URL is already known.
    pub async fn insert_package(&self, url: impl AsRef<str>) -> Result<Package> {
        let now = now();
        let row: PackageRow = sqlx::query_as(include_str!("../queries/insert_package.sql"))
            .bind(url.as_ref())
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.try_into()
    }

    pub async fn get_package(&self, id: PackageId) -> Result<Option<Package>> {
        let row: Option<PackageRow> = sqlx::query_as(include_str!("../queries/get_package.sql"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Package::try_from).transpose()
    }

    /// Fetch packages by id, in the order given. Unknown ids are skipped.
    pub async fn fetch_packages(&self, ids: &[PackageId]) -> Result<Vec<Package>> {
        let mut packages = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.get_package(id).await? {
                Some(package) => packages.push(package),
                None => tracing::warn!(package_id = %id, "Package not found; skipping"),
            }
        }
        Ok(packages)
    }

    /// Packages due for analysis: never-analyzed packages first, then the
    /// least recently updated.
    pub async fn fetch_update_candidates(&self, limit: usize) -> Result<Vec<Package>> {
        let rows: Vec<PackageRow> = sqlx::query_as(include_str!("../queries/fetch_update_candidates.sql"))
            .bind(self::limit(limit)?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Package::try_from).collect()
    }

    pub async fn update_package_status(&self, id: PackageId, status: Status) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/update_package_status.sql"))
            .bind(status.as_str())
            .bind(now())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotPersisted("package"));
        }
        Ok(())
    }

    // =========================================================================
    // Versions
    // =========================================================================

    /// Replace every version of a package with `versions`, in one
    /// transaction. Readers never observe the package without versions.
    ///
    /// Returns the inserted versions with their new ids, in input order.
    #[instrument(skip(self, versions), fields(count = versions.len()))]
    pub async fn replace_versions(&self, package_id: PackageId, versions: &[Version]) -> Result<Vec<Version>> {
        let now = now();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let deleted = sqlx::query(include_str!("../queries/delete_versions.sql"))
            .bind(package_id.0)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        let mut inserted = Vec::with_capacity(versions.len());
        for version in versions {
            let mut version = version.clone();
            version.package_id = package_id;
            let row = VersionRow::try_from(&version)?;
            let (id,): (i64,) = sqlx::query_as(include_str!("../queries/insert_version.sql"))
                .bind(row.package_id)
                .bind(row.reference_kind)
                .bind(row.reference_name)
                .bind(row.commit_hash)
                .bind(row.commit_date)
                .bind(row.published_at)
                .bind(row.package_name)
                .bind(row.swift_versions)
                .bind(row.supported_platforms)
                .bind(row.latest)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            version.id = Some(VersionId(id));
            inserted.push(version);
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(deleted, inserted = inserted.len(), "Versions replaced");
        Ok(inserted)
    }

    /// Save the mutable fields of an already persisted version.
    pub async fn update_version(&self, version: &Version) -> Result<()> {
        let id = version.id.ok_or_raise(|| ErrorKind::NotPersisted("version"))?;
        let row = VersionRow::try_from(version)?;
        let result = sqlx::query(include_str!("../queries/update_version.sql"))
            .bind(row.commit_hash)
            .bind(row.commit_date)
            .bind(row.published_at)
            .bind(row.package_name)
            .bind(row.swift_versions)
            .bind(row.supported_platforms)
            .bind(row.latest)
            .bind(now())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotPersisted("version"));
        }
        Ok(())
    }

    pub async fn list_versions(&self, package_id: PackageId) -> Result<Vec<Version>> {
        let rows: Vec<VersionRow> = sqlx::query_as(include_str!("../queries/list_versions.sql"))
            .bind(package_id.0)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Version::try_from).collect()
    }

    /// The versions of a package that carry a latest marker (the only ones
    /// that get built), each with its recorded builds.
    pub async fn list_eligible_versions_with_builds(
        &self,
        package_id: PackageId,
    ) -> Result<Vec<(Version, Vec<Build>)>> {
        let versions: Vec<VersionRow> = sqlx::query_as(include_str!("../queries/list_eligible_versions.sql"))
            .bind(package_id.0)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let builds: Vec<BuildRow> = sqlx::query_as(include_str!("../queries/list_eligible_builds.sql"))
            .bind(package_id.0)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut by_version: HashMap<VersionId, Vec<Build>> = HashMap::new();
        for row in builds {
            let build = Build::try_from(row)?;
            by_version.entry(build.version_id).or_default().push(build);
        }
        versions
            .into_iter()
            .map(|row| {
                let version = Version::try_from(row)?;
                let builds = version.id.and_then(|id| by_version.remove(&id)).unwrap_or_default();
                Ok((version, builds))
            })
            .collect()
    }

    // =========================================================================
    // Builds
    // =========================================================================

    /// Packages whose eligible version has fewer than `expected` build
    /// records, stalest version first, at most `limit` of them.
    ///
    /// `expected` is the size of the active build matrix.
    pub async fn fetch_build_candidates(&self, limit: usize, expected: usize) -> Result<Vec<PackageId>> {
        let rows: Vec<(i64,)> = sqlx::query_as(include_str!("../queries/fetch_build_candidates.sql"))
            .bind(i64::try_from(expected).or_raise(|| ErrorKind::InvalidData("expected build count"))?)
            .bind(self::limit(limit)?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(|(id,)| PackageId(id)).collect())
    }

    /// Record the status of a build, creating it if this is the first report
    /// for the (version, platform, toolchain version) pair.
    ///
    /// Later reports for the same pair update the existing record; there is
    /// never more than one.
    pub async fn record_build(&self, version_id: VersionId, pair: BuildPair, status: BuildStatus) -> Result<Build> {
        let now = now();
        let row: BuildRow = sqlx::query_as(include_str!("../queries/upsert_build.sql"))
            .bind(version_id.0)
            .bind(pair.platform.as_str())
            .bind(pair.swift_version.to_string())
            .bind(status.as_str())
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.try_into()
    }

    pub async fn list_builds(&self, version_id: VersionId) -> Result<Vec<Build>> {
        let rows: Vec<BuildRow> = sqlx::query_as(include_str!("../queries/list_builds.sql"))
            .bind(version_id.0)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Build::try_from).collect()
    }
}
