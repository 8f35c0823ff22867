//! Layered configuration.
//!
//! Values are merged in increasing priority from built-in defaults, a TOML
//! file, and `BUILDFLEET_`-prefixed environment variables (nested keys are
//! separated by `__`, e.g. `BUILDFLEET_GITLAB__PIPELINE_TOKEN`).

pub mod error;

use crate::error::{ErrorKind, Result};
use buildfleet_gitlab::{Credentials, DEFAULT_BASE_URL, DEFAULT_BRANCH, DEFAULT_PROJECT_ID};
use buildfleet_models::{Platform, SwiftVersion};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "BUILDFLEET_";
pub const FILE_NAME: &str = "buildfleet.toml";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "buildfleet")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file.
    pub database: PathBuf,
    /// Directory holding one mirror per package. Created on first analysis.
    pub checkouts: PathBuf,
    /// Public site URL; the builder reports results to `{site_url}/api`.
    pub site_url: String,
    pub gitlab: GitlabConfig,
    pub matrix: MatrixConfig,
    pub analysis: AnalysisConfig,
    pub builds: BuildsConfig,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabConfig {
    pub base_url: String,
    pub project_id: u64,
    /// Branch of the builder project whose pipeline gets triggered.
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

/// The active build matrix: every platform is built with every toolchain
/// version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub platforms: Vec<Platform>,
    pub swift_versions: Vec<SwiftVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Packages per `analyze` run, unless given on the command line.
    pub limit: usize,
    /// Packages analyzed at the same time.
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildsConfig {
    /// Packages per `trigger-builds` run, unless given on the command line.
    pub limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let dirs = project_dirs();
        Self {
            database: dirs
                .as_ref()
                .map_or_else(|| PathBuf::from("buildfleet.sqlite3"), |d| d.data_dir().join("buildfleet.sqlite3")),
            checkouts: dirs.as_ref().map_or_else(|| PathBuf::from("checkouts"), |d| d.cache_dir().join("checkouts")),
            site_url: "http://localhost:8080".to_string(),
            gitlab: GitlabConfig::default(),
            matrix: MatrixConfig::default(),
            analysis: AnalysisConfig { limit: 1, concurrency: 8 },
            builds: BuildsConfig { limit: 1 },
        }
    }
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: DEFAULT_PROJECT_ID,
            branch: DEFAULT_BRANCH.to_string(),
            pipeline_token: None,
            builder_token: None,
            api_token: None,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for GitlabConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitlabConfig")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("branch", &self.branch)
            .field("credentials", &self.credentials())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            platforms: vec![
                Platform::Ios,
                Platform::MacosSpm,
                Platform::MacosXcodebuild,
                Platform::Linux,
                Platform::Tvos,
                Platform::Watchos,
            ],
            swift_versions: vec![
                SwiftVersion::new(4, 2, 0),
                SwiftVersion::new(5, 0, 0),
                SwiftVersion::new(5, 1, 0),
                SwiftVersion::new(5, 2, 0),
            ],
        }
    }
}

impl GitlabConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            pipeline_token: self.pipeline_token.clone(),
            builder_token: self.builder_token.clone(),
            api_token: self.api_token.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// The default config file location, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(FILE_NAME))
    }

    /// Build the layered provider without extracting it.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(file));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(path)?)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Invalid)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |key, reason| ErrorKind::InvalidValue { key, reason };
        if self.matrix.platforms.is_empty() {
            exn::bail!(invalid("matrix.platforms", "at least one platform is required"));
        }
        if self.matrix.swift_versions.is_empty() {
            exn::bail!(invalid("matrix.swift_versions", "at least one toolchain version is required"));
        }
        if self.analysis.concurrency == 0 {
            exn::bail!(invalid("analysis.concurrency", "must be greater than zero"));
        }
        if self.gitlab.timeout_secs == 0 {
            exn::bail!(invalid("gitlab.timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }

    /// Where the builder posts its results.
    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.site_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn load(jail: &Jail, file: Option<&str>) -> Result<Config> {
        match file {
            Some(contents) => {
                let path = jail.directory().join(FILE_NAME);
                std::fs::write(&path, contents).unwrap();
                Config::load(Some(&path))
            },
            // Skip the user's real config file.
            None => Config::from_figment(
                Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed(ENV_PREFIX).split("__")),
            ),
        }
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|jail| {
            let config = load(jail, None).unwrap();
            assert_eq!(config.gitlab.base_url, "https://gitlab.com/api/v4");
            assert_eq!(config.gitlab.project_id, 19564054);
            assert_eq!(config.gitlab.branch, "main");
            assert_eq!(config.gitlab.pipeline_token, None);
            assert_eq!(config.matrix.platforms.len(), 6);
            assert_eq!(config.matrix.swift_versions.len(), 4);
            assert_eq!(config.analysis, AnalysisConfig { limit: 1, concurrency: 8 });
            assert_eq!(config.builds.limit, 1);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.set_env("BUILDFLEET_GITLAB__PIPELINE_TOKEN", "from-env");
            jail.set_env("BUILDFLEET_ANALYSIS__LIMIT", "25");
            let config = load(
                jail,
                Some(
                    r#"
                    site_url = "https://site.example/"
                    [gitlab]
                    pipeline_token = "from-file"
                    builder_token = "builder"
                    [matrix]
                    platforms = ["linux", "macos-spm"]
                    swift_versions = ["5.2", "5.3"]
                    "#,
                ),
            )
            .unwrap();
            assert_eq!(config.gitlab.pipeline_token.as_deref(), Some("from-env"));
            assert_eq!(config.gitlab.builder_token.as_deref(), Some("builder"));
            assert_eq!(config.analysis.limit, 25);
            assert_eq!(config.matrix.platforms, [Platform::Linux, Platform::MacosSpm]);
            assert_eq!(config.matrix.swift_versions, [SwiftVersion::new(5, 2, 0), SwiftVersion::new(5, 3, 0)]);
            assert_eq!(config.api_base_url(), "https://site.example/api");
            Ok(())
        });
    }

    #[test]
    fn test_empty_matrix_is_rejected() {
        Jail::expect_with(|jail| {
            let err = load(jail, Some("[matrix]\nplatforms = []\nswift_versions = [\"5.2\"]\n")).unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidValue { key: "matrix.platforms", .. }));
            let err = load(jail, Some("[matrix]\nplatforms = [\"ios\"]\nswift_versions = []\n")).unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidValue { key: "matrix.swift_versions", .. }));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_platform_is_rejected() {
        Jail::expect_with(|jail| {
            let err = load(jail, Some("[matrix]\nplatforms = [\"windows\"]\n")).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_debug_hides_tokens() {
        let mut config = Config::default();
        config.gitlab.api_token = Some("very-secret".to_string());
        assert!(!format!("{config:?}").contains("very-secret"));
    }
}
