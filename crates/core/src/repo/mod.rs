//! The read-only repository contract consumed by the comparator, plus the
//! Git and SVN backends that implement it.

pub mod git;
pub mod svn;

pub use git::{GitRepo, GitSettings};
pub use svn::{SvnRepo, SvnSettings};

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::{RepoConfig, RepoKind};
use crate::errors::{CoreError, RepoError};
use crate::exec::{CommandRunner, SystemRunner};
use crate::models::{Commit, RevisionMeta, WORKING_COPY};
use crate::transform::{trim_trailing_newlines, TransformPipeline};

/// Newest-first history of one file.
///
/// Each call to [`Repository::revisions_of_file`] produces a fresh sequence
/// from the newest revision; backends page lazily underneath.
pub type CommitIter<'a> = Box<dyn Iterator<Item = Commit> + 'a>;

/// Read-only access to one version-controlled tree.
///
/// Implementations are not required to be `Sync`: a comparison run owns its
/// repositories.
pub trait Repository {
    /// Short label for logs (`git:/path`, `svn:/path`).
    fn label(&self) -> String;

    /// Cost hint: `true` when per-revision fetches are expensive (remote).
    fn is_slow(&self) -> bool;

    fn is_ignored(&self, path: &str) -> bool;

    /// Raw file body at `revision`, or at the working copy when `None`.
    fn read_file(&self, path: &str, revision: Option<&str>) -> Result<String, RepoError>;

    /// Transforms applied by [`get_file`](Self::get_file).
    fn transforms(&self) -> &TransformPipeline;

    fn revisions_of_file<'a>(&'a self, path: &str) -> CommitIter<'a>;

    fn meta_data_of_revision(&self, revision: &str) -> Result<RevisionMeta, RepoError>;

    /// Normalized file body, or `None` when the file (or revision) is
    /// unavailable for any reason.
    fn get_file(&self, path: &str, revision: Option<&str>) -> Option<String> {
        match self.read_file(path, revision) {
            Ok(raw) => Some(self.transforms().apply(&raw, path)),
            Err(e) => {
                debug!(
                    repo = %self.label(),
                    path,
                    revision = revision.unwrap_or(WORKING_COPY),
                    error = %e,
                    "file unavailable"
                );
                None
            }
        }
    }
}

/// Open the repository described by `config` with the system command runner.
pub fn open_repository(config: &RepoConfig) -> Result<Box<dyn Repository>, CoreError> {
    open_repository_with(config, Arc::new(SystemRunner))
}

/// Open the repository described by `config`, running backend commands
/// through `runner`.
///
/// Fails before any comparison when the path is not a repository or a
/// transform is misconfigured.
pub fn open_repository_with(
    config: &RepoConfig,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn Repository>, CoreError> {
    let pipeline = TransformPipeline::from_config(&config.transforms)?;
    info!(kind = %config.kind, path = %config.path.display(), transforms = pipeline.len(), "opening repository");

    let repo: Box<dyn Repository> = match config.kind {
        RepoKind::Git => {
            let settings = GitSettings {
                executable: config.executable.clone().unwrap_or_else(|| "git".into()),
                slow: config.slow,
                ignore_patterns: config.ignore_patterns.clone(),
            };
            Box::new(GitRepo::open(&config.path, settings, pipeline, runner)?)
        }
        RepoKind::Svn => {
            let settings = SvnSettings {
                executable: config.executable.clone().unwrap_or_else(|| "svn".into()),
                slow: config.slow,
                ignore_patterns: config.ignore_patterns.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
                options: config.options.clone(),
            };
            Box::new(SvnRepo::open(&config.path, settings, pipeline, runner)?)
        }
    };
    Ok(repo)
}

// ---------------------------------------------------------------------------
// Working-copy entry
// ---------------------------------------------------------------------------

/// Wraps a committed history so an uncommitted change to the file shows up
/// as its newest entry, the [`Commit::working_copy`] sentinel.
///
/// The sentinel is yielded only when the working copy exists and its
/// normalized content differs from the newest commit (or the file has no
/// commits yet). Backends must serve `read_file(path, Some(WORKING_COPY))`
/// from the working copy.
pub struct WorkingCopyFirst<'a> {
    repo: &'a dyn Repository,
    path: String,
    committed: CommitIter<'a>,
    pending: Option<Commit>,
    started: bool,
}

impl<'a> WorkingCopyFirst<'a> {
    pub fn wrap(repo: &'a dyn Repository, path: &str, committed: CommitIter<'a>) -> CommitIter<'a> {
        Box::new(Self {
            repo,
            path: path.to_string(),
            committed,
            pending: None,
            started: false,
        })
    }

    fn first(&mut self) -> Option<Commit> {
        let newest = self.committed.next();
        let Some(local) = self.repo.get_file(&self.path, None) else {
            return newest;
        };
        let modified = match &newest {
            Some(commit) => self
                .repo
                .get_file(&commit.path, Some(&commit.revision))
                .map_or(true, |committed| {
                    trim_trailing_newlines(&committed) != trim_trailing_newlines(&local)
                }),
            None => true,
        };
        if !modified {
            return newest;
        }
        debug!(repo = %self.repo.label(), path = %self.path, "working copy differs from newest commit");
        self.pending = newest;
        Some(Commit::working_copy(self.path.clone()))
    }
}

impl Iterator for WorkingCopyFirst<'_> {
    type Item = Commit;

    fn next(&mut self) -> Option<Commit> {
        if !self.started {
            self.started = true;
            return self.first();
        }
        if let Some(commit) = self.pending.take() {
            return Some(commit);
        }
        self.committed.next()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Read `<root>/<path>` from the working copy.
pub(crate) fn read_working_copy(root: &Path, path: &str) -> Result<String, RepoError> {
    let full = root.join(path);
    std::fs::read(&full)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RepoError::FileNotFound {
                path: path.to_string(),
                revision: WORKING_COPY.to_string(),
            },
            _ => RepoError::IoError(e),
        })
}

/// Parse an ISO-8601 timestamp with offset into UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// `true` when any `/`-separated component of `path` equals `component`.
pub(crate) fn has_component(path: &str, component: &str) -> bool {
    path.split('/').any(|piece| piece == component)
}

/// The first configured glob pattern matching `path`.
pub(crate) fn matches_any_glob(path: &str, patterns: &[String]) -> Option<String> {
    patterns
        .iter()
        .find(|p| glob_match::glob_match(p, path))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Committed history from a fixed list; the working copy is `local`.
    struct Scripted {
        local: Option<&'static str>,
        commits: Vec<(&'static str, &'static str)>,
        transforms: TransformPipeline,
    }

    impl Repository for Scripted {
        fn label(&self) -> String {
            "scripted".into()
        }

        fn is_slow(&self) -> bool {
            false
        }

        fn is_ignored(&self, _path: &str) -> bool {
            false
        }

        fn read_file(&self, path: &str, revision: Option<&str>) -> Result<String, RepoError> {
            let not_found = || RepoError::FileNotFound {
                path: path.to_string(),
                revision: revision.unwrap_or(WORKING_COPY).to_string(),
            };
            match revision {
                None | Some(WORKING_COPY) => self.local.map(str::to_string).ok_or_else(not_found),
                Some(rev) => self
                    .commits
                    .iter()
                    .find(|(r, _)| *r == rev)
                    .map(|(_, content)| content.to_string())
                    .ok_or_else(not_found),
            }
        }

        fn transforms(&self) -> &TransformPipeline {
            &self.transforms
        }

        fn revisions_of_file<'a>(&'a self, path: &str) -> CommitIter<'a> {
            let owned = path.to_string();
            let committed = Box::new(
                self.commits
                    .iter()
                    .map(move |(rev, _)| Commit::new(*rev, None, owned.clone())),
            );
            WorkingCopyFirst::wrap(self, path, committed)
        }

        fn meta_data_of_revision(&self, _revision: &str) -> Result<RevisionMeta, RepoError> {
            Err(RepoError::ParseError("no metadata".into()))
        }
    }

    fn revisions(repo: &Scripted) -> Vec<String> {
        repo.revisions_of_file("a.txt").map(|c| c.revision).collect()
    }

    #[test]
    fn test_working_copy_first_when_modified() {
        let repo = Scripted {
            local: Some("two\n"),
            commits: vec![("r2", "one\n"), ("r1", "zero\n")],
            transforms: TransformPipeline::new(),
        };
        assert_eq!(revisions(&repo), vec!["HEAD", "r2", "r1"]);
        let first = repo.revisions_of_file("a.txt").next().unwrap();
        assert!(first.is_working_copy());
        assert_eq!(first.path, "a.txt");
    }

    #[test]
    fn test_working_copy_omitted_when_clean_or_absent() {
        let clean = Scripted {
            local: Some("one"),
            commits: vec![("r2", "one\n"), ("r1", "zero\n")],
            transforms: TransformPipeline::new(),
        };
        assert_eq!(revisions(&clean), vec!["r2", "r1"]);

        let deleted = Scripted {
            local: None,
            commits: vec![("r1", "zero\n")],
            transforms: TransformPipeline::new(),
        };
        assert_eq!(revisions(&deleted), vec!["r1"]);
    }

    #[test]
    fn test_working_copy_only_for_uncommitted_file() {
        let repo = Scripted {
            local: Some("new\n"),
            commits: Vec::new(),
            transforms: TransformPipeline::new(),
        };
        assert_eq!(revisions(&repo), vec!["HEAD"]);
    }

    #[test]
    fn test_has_component() {
        assert!(has_component(".git/config", ".git"));
        assert!(has_component("a/.svn/entries", ".svn"));
        assert!(!has_component("a/.gitignore", ".git"));
    }

    #[test]
    fn test_matches_any_glob() {
        let patterns = vec!["vendor/**".to_string(), "*.min.js".to_string()];
        assert_eq!(matches_any_glob("vendor/a/b.php", &patterns), Some("vendor/**".into()));
        assert_eq!(matches_any_glob("app.min.js", &patterns), Some("*.min.js".into()));
        assert_eq!(matches_any_glob("src/app.js", &patterns), None);
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:00:00+00:00");
        let ts = parse_timestamp("2025-01-10T08:15:30.123456Z").unwrap();
        assert_eq!(ts.timestamp(), 1736496930);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_read_working_copy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        assert_eq!(read_working_copy(dir.path(), "a.txt").unwrap(), "hello\n");
        let err = read_working_copy(dir.path(), "missing.txt").unwrap_err();
        assert!(matches!(err, RepoError::FileNotFound { .. }));
    }

    #[test]
    fn test_open_repository_rejects_bad_transform_before_backend() {
        let mut config = RepoConfig::new(RepoKind::Git, "/nonexistent/repo");
        config.transforms.push(crate::config::TransformConfig::RemoveMarkedComments { tag: String::new() });
        let err = open_repository(&config).err().unwrap();
        assert!(matches!(err, CoreError::Transform(_)));
    }

    #[test]
    fn test_open_repository_rejects_non_repository() {
        let dir = tempfile::tempdir().unwrap();
        let config = RepoConfig::new(RepoKind::Git, dir.path());
        let err = open_repository(&config).err().unwrap();
        assert!(matches!(err, CoreError::Repo(RepoError::RepositoryNotFound { .. })));
    }
}
