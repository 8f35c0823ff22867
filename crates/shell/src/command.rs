use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// The external commands the pipeline runs against a package checkout.
///
/// Everything except [`Command::Clone`] runs inside an existing checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Full clone of `url` into `dest`.
    Clone { url: String, dest: PathBuf },
    /// Update an existing mirror in place.
    ///
    /// Checkouts are left on a detached `HEAD` after manifest resolution, so
    /// this fetches (tags included, pruning deleted ones) instead of merging
    /// into a branch.
    Pull,
    /// Switch the working tree to a branch or tag, discarding local changes.
    Checkout { reference: String },
    ListTags,
    /// Emit the package description at the current revision as JSON.
    DumpPackage,
}
impl Command {
    pub fn program(&self) -> &'static str {
        match self {
            Command::DumpPackage => "swift",
            _ => "git",
        }
    }

    pub fn args(&self) -> Vec<OsString> {
        let args: &[&str] = match self {
            Command::Clone { url, dest } => {
                return ["clone", "--quiet", "--", url.as_str()]
                    .into_iter()
                    .map(OsString::from)
                    .chain([dest.clone().into_os_string()])
                    .collect();
            },
            Command::Pull => &["fetch", "--quiet", "--force", "--tags", "--prune", "--prune-tags", "origin"],
            Command::Checkout { reference } => {
                return ["checkout", "--quiet", "--force", reference.as_str()].into_iter().map(OsString::from).collect();
            },
            Command::ListTags => &["tag", "--list"],
            Command::DumpPackage => &["package", "dump-package"],
        };
        args.iter().map(OsString::from).collect()
    }
}
impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.program())?;
        for arg in self.args() {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        Command::Clone { url: "https://example.com/pkg".to_string(), dest: PathBuf::from("/tmp/example.com-pkg") },
        "git clone --quiet -- https://example.com/pkg /tmp/example.com-pkg"
    )]
    #[case(Command::Pull, "git fetch --quiet --force --tags --prune --prune-tags origin")]
    #[case(Command::Checkout { reference: "1.0.0".to_string() }, "git checkout --quiet --force 1.0.0")]
    #[case(Command::ListTags, "git tag --list")]
    #[case(Command::DumpPackage, "swift package dump-package")]
    fn test_display(#[case] command: Command, #[case] expected: &str) {
        assert_eq!(command.to_string(), expected);
    }
}
