//! Local mirrors of package repositories.

use crate::error::{ErrorKind, Result};
use crate::{Context, Outcome};
use buildfleet_models::Package;
use buildfleet_shell::Command;
use exn::ResultExt;
use std::path::PathBuf;
use tracing::instrument;

/// Directory name of the mirror for `package`: the URL's host followed by
/// its path segments, joined with `-`, lowercased, without a trailing
/// `.git`, then the first 8 hex digits of the BLAKE3 hash of the normalized
/// `host/path` (`https://github.com/Foo/Bar.git` → `github.com-foo-bar-<hash>`).
///
/// Joining with `-` alone is ambiguous (`a-b/c` and `a/b-c`), the hash keeps
/// distinct repositories apart. The key only depends on the URL, so it is
/// stable across runs. URLs without a scheme, host, or path (including
/// scp-style git remotes) have no key.
pub fn cache_directory_key(package: &Package) -> Result<String> {
    let invalid = || ErrorKind::InvalidPackageUrl { id: package.id, url: package.url.clone() };
    let url = package.url.trim();
    let Some((scheme, rest)) = url.split_once("://") else {
        exn::bail!(invalid());
    };
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
        exn::bail!(invalid());
    }
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let host_and_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host_and_port.split(':').next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if host.is_empty() || segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
        exn::bail!(invalid());
    }
    let mut normalized = format!("{host}/{}", segments.join("/")).to_lowercase();
    if let Some(stripped) = normalized.strip_suffix(".git") {
        normalized.truncate(stripped.len());
    }
    let digest = blake3::hash(normalized.as_bytes()).to_string();
    Ok(format!("{}-{}", normalized.replace('/', "-"), &digest[..KEY_HASH_LEN]))
}

const KEY_HASH_LEN: usize = 8;

/// Make sure the mirror of `package` exists and is up to date: clone it
/// if the directory is missing, fetch into it otherwise.
///
/// Returns the path of the mirror.
#[instrument(skip_all, fields(package = %package.url))]
pub async fn ensure_checkout(ctx: &Context, package: &Package) -> Outcome<PathBuf> {
    let path = ctx.checkout_path(package)?;
    let _lock = ctx.locks.lock(&path).await;
    let exists = ctx.shell.exists(&path).await.or_raise(|| ErrorKind::Io)?;
    let (command, cwd) = if exists {
        tracing::debug!(path = %path.display(), "Updating checkout");
        (Command::Pull, Some(path.as_path()))
    } else {
        tracing::info!(path = %path.display(), "Cloning");
        (Command::Clone { url: package.url.clone(), dest: path.clone() }, None)
    };
    ctx.shell.run(&command, cwd).await.map_err(|err| ErrorKind::command_failed(err, &command))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, URL};
    use buildfleet_models::PackageId;
    use buildfleet_shell::{MockRepo, MockShell};
    use rstest::rstest;
    use std::sync::Arc;

    fn key(url: &str) -> String {
        cache_directory_key(&Package::new(url)).unwrap()
    }

    #[rstest]
    #[case("https://github.com/foo/bar", "github.com-foo-bar")]
    #[case("https://github.com/Foo/Bar.git", "github.com-foo-bar")]
    #[case("https://github.com/foo/bar/", "github.com-foo-bar")]
    #[case("https://user@git.example.com:8443/group/sub/pkg.git", "git.example.com-group-sub-pkg")]
    #[case("https://example.com/pkg?ref=main#readme", "example.com-pkg")]
    fn test_cache_directory_key(#[case] url: &str, #[case] readable: &str) {
        let key = key(url);
        let (prefix, hash) = key.rsplit_once('-').unwrap();
        assert_eq!(prefix, readable);
        assert_eq!(hash.len(), KEY_HASH_LEN);
        assert!(hash.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[rstest]
    #[case("https://github.com/foo/bar", "https://github.com/Foo/Bar.git")]
    #[case("https://github.com/foo/bar", "ssh://git@github.com:22/foo/bar/")]
    #[case("https://example.com/pkg", "https://example.com/pkg?ref=main#readme")]
    fn test_cache_directory_key_is_stable_for_equivalent_urls(#[case] a: &str, #[case] b: &str) {
        assert_eq!(key(a), key(b));
    }

    #[rstest]
    #[case("https://example.com/a-b/c", "https://example.com/a/b-c")]
    #[case("https://example.com/a/b", "https://example.com-a/b")]
    #[case("https://example.com/pkg", "https://example.com/pkg.git/x")]
    fn test_cache_directory_key_keeps_distinct_repositories_apart(#[case] a: &str, #[case] b: &str) {
        assert_ne!(key(a), key(b));
    }

    #[rstest]
    #[case("")]
    #[case("github.com/foo/bar")]
    #[case("git@github.com:foo/bar.git")]
    #[case("https://github.com")]
    #[case("https://github.com/")]
    #[case("https:///foo/bar")]
    #[case("file:///srv/git/pkg")]
    #[case("https://github.com/../etc")]
    fn test_cache_directory_key_rejects(#[case] url: &str) {
        let package = Package::new(url).with_id(PackageId(4));
        let err = cache_directory_key(&package).unwrap_err();
        match &*err {
            ErrorKind::InvalidPackageUrl { id, url: reported } => {
                assert_eq!(*id, Some(PackageId(4)));
                assert_eq!(reported, url);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_clones_when_absent_and_pulls_when_present() {
        let shell = Arc::new(MockShell::default().with_repo(URL, MockRepo::default()));
        let (_db, ctx) = testing::context(shell.clone()).await;
        let package = Package::new(URL);

        let path = ensure_checkout(&ctx, &package).await.unwrap();
        assert_eq!(path, testing::checkout_path(URL));
        ensure_checkout(&ctx, &package).await.unwrap();

        let history = shell.history();
        assert!(matches!(&history[0].0, Command::Clone { dest, .. } if *dest == path));
        assert_eq!(history[1], (Command::Pull, Some(path)));
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_ambiguous_urls_get_separate_mirrors() {
        let (a, b) = ("https://example.com/a-b/c", "https://example.com/a/b-c");
        let shell = Arc::new(MockShell::default().with_repo(a, MockRepo::default()).with_repo(b, MockRepo::default()));
        let (_db, ctx) = testing::context(shell.clone()).await;

        let path_a = ensure_checkout(&ctx, &Package::new(a)).await.unwrap();
        let path_b = ensure_checkout(&ctx, &Package::new(b)).await.unwrap();
        assert_ne!(path_a, path_b);

        // Both were cloned; the second never fetched into the first mirror.
        let history = shell.history();
        assert_eq!(history.len(), 2);
        assert!(matches!(&history[0].0, Command::Clone { url, dest } if url == a && *dest == path_a));
        assert!(matches!(&history[1].0, Command::Clone { url, dest } if url == b && *dest == path_b));
    }

    #[tokio::test]
    async fn test_clone_failure_is_reported() {
        let shell = Arc::new(MockShell::default());
        let (_db, ctx) = testing::context(shell).await;
        let err = ensure_checkout(&ctx, &Package::new("https://example.com/missing")).await.unwrap_err();
        match &*err {
            ErrorKind::ExternalCommandFailed { command, output } => {
                assert!(command.starts_with("git clone"));
                assert!(output.contains("not found"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_pull_failure_is_reported() {
        let path = testing::checkout_path(URL);
        let shell = Arc::new(
            MockShell::default().with_repo(URL, MockRepo::default().failing_fetch()).with_checkout(&path, URL),
        );
        let (_db, ctx) = testing::context(shell).await;
        let err = ensure_checkout(&ctx, &Package::new(URL)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ExternalCommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_invalid_url_runs_nothing() {
        let shell = Arc::new(MockShell::default());
        let (_db, ctx) = testing::context(shell.clone()).await;
        let err = ensure_checkout(&ctx, &Package::new("not a url")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPackageUrl { .. }));
        assert!(shell.history().is_empty());
    }
}
