use crate::error::{Error, ErrorKind};
use buildfleet_models::{Build, BuildId, BuildStatus, Platform, SwiftVersion, VersionId};
use exn::ResultExt;

#[derive(sqlx::FromRow)]
pub(crate) struct BuildRow {
    pub(crate) id: i64,
    pub(crate) version_id: i64,
    pub(crate) platform: String,
    pub(crate) swift_version: String,
    pub(crate) status: String,
}
impl TryFrom<BuildRow> for Build {
    type Error = Error;
    fn try_from(row: BuildRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(BuildId(row.id)),
            version_id: VersionId(row.version_id),
            platform: row.platform.parse::<Platform>().or_raise(|| ErrorKind::InvalidData("build platform"))?,
            swift_version: row
                .swift_version
                .parse::<SwiftVersion>()
                .or_raise(|| ErrorKind::InvalidData("build swift version"))?,
            status: row.status.parse::<BuildStatus>().or_raise(|| ErrorKind::InvalidData("build status"))?,
        })
    }
}
