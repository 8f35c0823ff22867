mod build;
mod package;
mod version;

pub(crate) use self::build::BuildRow;
pub(crate) use self::package::PackageRow;
pub(crate) use self::version::VersionRow;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;

pub(crate) fn timestamp(value: Option<i64>, field: &'static str) -> Result<Option<UtcDateTime>> {
    value.map(|ts| UtcDateTime::from_unix_timestamp(ts).or_raise(|| ErrorKind::InvalidData(field))).transpose()
}
