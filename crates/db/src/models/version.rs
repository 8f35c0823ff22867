use crate::error::{Error, ErrorKind};
use crate::models::timestamp;
use buildfleet_models::{Latest, PackageId, Reference, SupportedPlatform, SwiftVersion, Version, VersionId};
use exn::ResultExt;
use serde_json::{from_str as from_json, to_string as to_json};

const BRANCH: &str = "branch";
const TAG: &str = "tag";

#[derive(sqlx::FromRow)]
pub(crate) struct VersionRow {
    #[sqlx(default)]
    pub(crate) id: Option<i64>,
    pub(crate) package_id: i64,
    pub(crate) reference_kind: Option<String>,
    pub(crate) reference_name: Option<String>,
    pub(crate) commit_hash: Option<String>,
    pub(crate) commit_date: Option<i64>,
    pub(crate) published_at: Option<i64>,
    pub(crate) package_name: Option<String>,
    pub(crate) swift_versions: String,
    pub(crate) supported_platforms: String,
    pub(crate) latest: Option<String>,
}
impl TryFrom<&Version> for VersionRow {
    type Error = Error;
    fn try_from(version: &Version) -> Result<Self, Self::Error> {
        let (reference_kind, reference_name) = match &version.reference {
            Some(Reference::Branch(name)) => (Some(BRANCH.to_string()), Some(name.clone())),
            Some(Reference::Tag { name, .. }) => (Some(TAG.to_string()), Some(name.clone())),
            None => (None, None),
        };
        Ok(Self {
            id: version.id.map(|id| id.0),
            package_id: version.package_id.0,
            reference_kind,
            reference_name,
            commit_hash: version.commit.clone(),
            commit_date: version.commit_date.map(|d| d.unix_timestamp()),
            published_at: version.published_at.map(|d| d.unix_timestamp()),
            package_name: version.package_name.clone(),
            swift_versions: to_json(&version.swift_versions).or_raise(|| ErrorKind::InvalidData("swift versions"))?,
            supported_platforms: to_json(&version.supported_platforms)
                .or_raise(|| ErrorKind::InvalidData("supported platforms"))?,
            latest: version.latest.map(|l| l.as_str().to_string()),
        })
    }
}
impl TryFrom<VersionRow> for Version {
    type Error = Error;
    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        let reference = match (row.reference_kind.as_deref(), row.reference_name) {
            (Some(BRANCH), Some(name)) => Some(Reference::Branch(name)),
            (Some(TAG), Some(name)) => Some(Reference::tag(name).or_raise(|| ErrorKind::InvalidData("tag reference"))?),
            (None, None) => None,
            _ => exn::bail!(ErrorKind::InvalidData("reference")),
        };
        Ok(Self {
            id: row.id.map(VersionId),
            package_id: PackageId(row.package_id),
            reference,
            commit: row.commit_hash,
            commit_date: timestamp(row.commit_date, "commit date")?,
            published_at: timestamp(row.published_at, "published date")?,
            package_name: row.package_name,
            swift_versions: from_json::<Vec<SwiftVersion>>(&row.swift_versions)
                .or_raise(|| ErrorKind::InvalidData("swift versions"))?,
            supported_platforms: from_json::<Vec<SupportedPlatform>>(&row.supported_platforms)
                .or_raise(|| ErrorKind::InvalidData("supported platforms"))?,
            latest: row
                .latest
                .map(|l| l.parse::<Latest>().or_raise(|| ErrorKind::InvalidData("latest")))
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::UtcDateTime;

    #[test]
    fn test_row_conversion_keeps_tag_name() {
        let mut version = Version::from_tag(PackageId(1), "v1.2.3").unwrap();
        version.id = Some(VersionId(9));
        version.swift_versions = vec![SwiftVersion::new(5, 0, 0), SwiftVersion::new(4, 2, 0)];
        version.supported_platforms = vec![SupportedPlatform::new("ios", "13.0")];
        version.latest = Some(Latest::Release);
        version.commit_date = Some(UtcDateTime::from_unix_timestamp(1_588_000_000).unwrap());
        let row = VersionRow::try_from(&version).unwrap();
        assert_eq!(row.reference_kind.as_deref(), Some("tag"));
        assert_eq!(row.reference_name.as_deref(), Some("v1.2.3"));
        assert_eq!(row.swift_versions, r#"["5.0","4.2"]"#);
        assert_eq!(Version::try_from(row).unwrap(), version);
    }

    #[test]
    fn test_mismatched_reference_columns_are_rejected() {
        let mut row = VersionRow::try_from(&Version::new(PackageId(1), None)).unwrap();
        row.reference_kind = Some("tag".to_string());
        let err = Version::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("reference")));
    }
}
