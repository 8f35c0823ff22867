use crate::error::{Error, ErrorKind};
use crate::models::timestamp;
use buildfleet_models::{Package, PackageId, Status};
use exn::ResultExt;

#[derive(sqlx::FromRow)]
pub(crate) struct PackageRow {
    pub(crate) id: i64,
    pub(crate) url: String,
    pub(crate) status: String,
    #[sqlx(default)]
    pub(crate) last_commit_at: Option<i64>,
}
impl TryFrom<PackageRow> for Package {
    type Error = Error;
    fn try_from(row: PackageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(PackageId(row.id)),
            url: row.url,
            status: row.status.parse::<Status>().or_raise(|| ErrorKind::InvalidData("package status"))?,
            last_commit_at: timestamp(row.last_commit_at, "last commit date")?,
        })
    }
}
