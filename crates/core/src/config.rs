//! TOML-based configuration for mirrorcheck.
//!
//! A config names the two repositories being compared (`left` and `right`),
//! the transforms each one applies to fetched content, and the ordered list
//! of file pairs to compare. Secrets are referenced through `_env` fields and
//! resolved at runtime via [`AppConfig::resolve_env_vars`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::models::FilePair;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// The canonical side.
    pub left: RepoConfig,

    /// The mirror side.
    pub right: RepoConfig,

    /// Ordered file pairs to compare.
    #[serde(default)]
    pub files: Vec<FilePair>,
}

fn default_log_level() -> String {
    "warn".into()
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// Version-control backend of one side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Git,
    Svn,
}

impl std::fmt::Display for RepoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Svn => write!(f, "svn"),
        }
    }
}

/// Settings for one side of the comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub kind: RepoKind,

    /// Root of the working copy / checkout.
    pub path: PathBuf,

    /// Override for the backend binary (`git` / `svn`).
    #[serde(default)]
    pub executable: Option<String>,

    /// Override for the backend's cost hint.
    #[serde(default)]
    pub slow: Option<bool>,

    /// Extra glob patterns (relative paths) to treat as ignored.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// SVN username.
    #[serde(default)]
    pub username: Option<String>,

    /// Environment variable holding the SVN password.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Extra `--name value` options passed to every backend command.
    /// An empty value renders as a bare `--name` flag.
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// Content transforms, applied in order.
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<String>,
}

impl RepoConfig {
    pub fn new(kind: RepoKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            executable: None,
            slow: None,
            ignore_patterns: Vec::new(),
            username: None,
            password_env: None,
            options: BTreeMap::new(),
            transforms: Vec::new(),
            password: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// One entry of a side's transform pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformConfig {
    /// Drop comments tagged `@<tag>`.
    RemoveMarkedComments { tag: String },

    /// Ordered regex substitutions, optionally restricted to matching files.
    Substitute {
        substitutions: Vec<SubstitutionConfig>,
        #[serde(default)]
        files: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubstitutionConfig {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;

        debug!(files = config.files.len(), "configuration parsed successfully");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Resolve `password_env` references on both sides.
    ///
    /// A missing variable only logs a warning; anonymous access may still
    /// work against the backend.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");
        for (side, repo) in [("left", &mut self.left), ("right", &mut self.right)] {
            if let Some(ref env_name) = repo.password_env {
                repo.password = resolve_optional_env(env_name, &format!("{}.password_env", side));
            }
        }
        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    ///
    /// `files_from_cli` is `true` when file pairs come from the command line,
    /// in which case an empty `files` table is allowed.
    pub fn validate(&self, files_from_cli: bool) -> Result<(), ConfigError> {
        for (side, repo) in [("left", &self.left), ("right", &self.right)] {
            if repo.path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.path", side),
                    detail: "repository path must not be empty".into(),
                });
            }
            if repo.kind == RepoKind::Git && (repo.password_env.is_some() || repo.username.is_some()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.username", side),
                    detail: "credentials are only supported for svn repositories".into(),
                });
            }
            if let Some(ref exe) = repo.executable {
                if exe.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("{}.executable", side),
                        detail: "executable must not be empty".into(),
                    });
                }
            }
        }

        if self.files.is_empty() && !files_from_cli {
            return Err(ConfigError::InvalidValue {
                field: "files".into(),
                detail: "no file pairs to compare".into(),
            });
        }
        for (idx, pair) in self.files.iter().enumerate() {
            if pair.left.trim().is_empty() || pair.right.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("files[{}]", idx),
                    detail: "left and right paths must not be empty".into(),
                });
            }
        }

        info!("configuration validated successfully");
        Ok(())
    }
}

/// Resolve an environment variable, returning `None` (with a warning) if
/// it is not set.
fn resolve_optional_env(var_name: &str, field_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => {
            debug!(var = var_name, field = field_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(var = var_name, field = field_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(var = var_name, field = field_name, "env var is not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level = "debug"

[left]
kind = "git"
path = "/work/canonical"
ignore_patterns = ["vendor/**"]

[[left.transforms]]
kind = "remove_marked_comments"
tag = "mirror-only"

[right]
kind = "svn"
path = "/work/mirror"
username = "deploy"
password_env = "MIRRORCHECK_TEST_SVN_PASSWORD"

[right.options]
config-dir = "/tmp/svncfg"

[[right.transforms]]
kind = "substitute"
files = ["*.php"]
substitutions = [
    { pattern = "Version: [0-9.]+", replacement = "Version: X" },
]

[[files]]
left = "src/plugin.php"
right = "plugin.php"

[[files]]
left = "readme.txt"
right = "readme.txt"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.left.kind, RepoKind::Git);
        assert_eq!(config.right.kind, RepoKind::Svn);
        assert_eq!(config.left.ignore_patterns, vec!["vendor/**".to_string()]);
        assert_eq!(
            config.right.options.get("config-dir"),
            Some(&"/tmp/svncfg".to_string())
        );
        assert_eq!(
            config.left.transforms,
            vec![TransformConfig::RemoveMarkedComments {
                tag: "mirror-only".into()
            }]
        );
        match &config.right.transforms[0] {
            TransformConfig::Substitute { substitutions, files } => {
                assert_eq!(files, &vec!["*.php".to_string()]);
                assert_eq!(substitutions[0].replacement, "Version: X");
            }
            other => panic!("unexpected transform: {other:?}"),
        }
        // Order of file pairs is preserved.
        assert_eq!(config.files[0], FilePair::new("src/plugin.php", "plugin.php"));
        assert_eq!(config.files[1].left, "readme.txt");
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_defaults() {
        let toml = r#"
[left]
kind = "git"
path = "a"
[right]
kind = "git"
path = "b"
"#;
        let config = AppConfig::from_toml(toml).unwrap();
        assert_eq!(config.log_level, "warn");
        assert!(config.files.is_empty());
        assert!(config.left.transforms.is_empty());
        assert!(config.right.slow.is_none());
        assert!(config.validate(false).is_err());
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_validate_rejects_git_credentials() {
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        config.left.password_env = Some("X".into());
        let err = config.validate(false).unwrap_err();
        assert!(err.to_string().contains("left.username"));
    }

    #[test]
    fn test_validate_rejects_empty_pair() {
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        config.files.push(FilePair::new("", "x"));
        let err = config.validate(false).unwrap_err();
        assert!(err.to_string().contains("files[2]"));
    }

    #[test]
    fn test_unknown_transform_kind_is_parse_error() {
        let toml = r#"
[left]
kind = "git"
path = "a"
[[left.transforms]]
kind = "rot13"
[right]
kind = "git"
path = "b"
"#;
        assert!(matches!(AppConfig::from_toml(toml), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_resolve_env_vars() {
        let mut config = AppConfig::from_toml(SAMPLE).unwrap();
        std::env::set_var("MIRRORCHECK_TEST_SVN_PASSWORD", "hunter2");
        config.resolve_env_vars().unwrap();
        assert_eq!(config.right.password.as_deref(), Some("hunter2"));
        assert!(config.left.password.is_none());
        std::env::remove_var("MIRRORCHECK_TEST_SVN_PASSWORD");
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load_from_file("/nonexistent/mirrorcheck.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.files.len(), 2);
    }
}
