//! Subversion backend, driven through the `svn` CLI.
//!
//! Paths handed to and returned from this backend are relative to the
//! checkout root. Historical reads go through the repository URL so renamed
//! files resolve at the revision they were recorded under.

pub mod parser;

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use self::parser::{parse_svn_info, parse_svn_log, SvnInfo, SvnLogEntry};
use super::{has_component, matches_any_glob, parse_timestamp, read_working_copy, CommitIter, Repository, WorkingCopyFirst};
use crate::errors::RepoError;
use crate::exec::{CommandOutput, CommandRunner};
use crate::models::{Commit, RevisionMeta, WORKING_COPY};
use crate::transform::TransformPipeline;

/// Entries requested per `svn log` page.
const PAGE_SIZE: usize = 100;

/// Per-backend settings fixed at construction.
#[derive(Debug, Clone)]
pub struct SvnSettings {
    pub executable: String,
    pub slow: Option<bool>,
    pub ignore_patterns: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Extra global options; an empty value renders as a bare flag.
    pub options: BTreeMap<String, String>,
}

impl Default for SvnSettings {
    fn default() -> Self {
        Self {
            executable: "svn".into(),
            slow: None,
            ignore_patterns: Vec::new(),
            username: None,
            password: None,
            options: BTreeMap::new(),
        }
    }
}

impl SvnSettings {
    /// Global options appended to every subcommand. With `redact`, the
    /// password value is replaced so the result is safe to log.
    fn global_args(&self, redact: bool) -> Vec<String> {
        let mut args = vec!["--non-interactive".to_string()];
        for (name, value) in &self.options {
            args.push(format!("--{}", name.replace('_', "-")));
            if !value.is_empty() {
                args.push(value.clone());
            }
        }
        if let Some(ref username) = self.username {
            args.push("--username".into());
            args.push(username.clone());
        }
        if let Some(ref password) = self.password {
            args.push("--password".into());
            args.push(if redact { "REDACTED".into() } else { password.clone() });
        }
        args
    }
}

pub struct SvnRepo {
    root: PathBuf,
    settings: SvnSettings,
    transforms: TransformPipeline,
    runner: Arc<dyn CommandRunner>,
    info: SvnInfo,
    /// Repository path of the checkout, e.g. `/trunk/`.
    path_prefix: String,
}

impl SvnRepo {
    /// Open the checkout at `root`, reading its URL and repository root.
    pub fn open<P: AsRef<Path>>(
        root: P,
        settings: SvnSettings,
        transforms: TransformPipeline,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, RepoError> {
        let root = root.as_ref();
        let not_found = || RepoError::RepositoryNotFound {
            kind: "svn".into(),
            path: root.display().to_string(),
        };
        if !root.is_dir() {
            return Err(not_found());
        }

        let mut repo = Self {
            root: root.to_path_buf(),
            settings,
            transforms,
            runner,
            info: SvnInfo {
                url: String::new(),
                root_url: String::new(),
            },
            path_prefix: "/".into(),
        };

        let output = repo.exec(&["info", "--xml", "."])?;
        if !output.is_success() {
            return Err(not_found());
        }
        repo.info = parse_svn_info(&output.stdout)?;
        repo.path_prefix = repo.info.path_prefix();
        info!(
            path = %root.display(),
            url = %repo.info.url,
            prefix = %repo.path_prefix,
            "opened svn working copy"
        );
        Ok(repo)
    }

    fn exec(&self, args: &[&str]) -> Result<CommandOutput, RepoError> {
        let mut full: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        full.extend(self.settings.global_args(false));
        let output = self.runner.run(&self.settings.executable, &full, &self.root)?;

        let redacted = self.settings.global_args(true).join(" ");
        let cmd = format!("{} {} {}", self.settings.executable, args.join(" "), redacted);
        debug!(cmd = %cmd, status = output.exit_code, "ran svn command");
        if !output.stderr.trim().is_empty() {
            warn!(cmd = %cmd, status = output.exit_code, stderr = %output.stderr.trim(), "svn reported an error");
        }
        Ok(output)
    }

    /// URL of checkout-relative `path`.
    fn url_of(&self, path: &str) -> String {
        format!("{}/{}", self.info.url.trim_end_matches('/'), path)
    }

    /// Map a repository path (`/trunk/a.php`) back to a checkout path.
    fn relative_path<'p>(&self, repo_path: &'p str) -> Option<&'p str> {
        repo_path.strip_prefix(self.path_prefix.as_str())
    }
}

impl Repository for SvnRepo {
    fn label(&self) -> String {
        format!("svn:{}", self.root.display())
    }

    fn is_slow(&self) -> bool {
        self.settings.slow.unwrap_or_else(|| self.info.is_remote())
    }

    fn is_ignored(&self, path: &str) -> bool {
        if has_component(path, ".svn") {
            debug!(path, "ignoring .svn file");
            return true;
        }
        if let Some(pattern) = matches_any_glob(path, &self.settings.ignore_patterns) {
            debug!(path, pattern = %pattern, "file matches ignore pattern");
            return true;
        }
        // Only meaningful for files present in the working copy.
        match self.exec(&["status", path]) {
            Ok(output) => output.stdout.starts_with('I'),
            Err(e) => {
                debug!(path, error = %e, "svn status failed");
                false
            }
        }
    }

    fn read_file(&self, path: &str, revision: Option<&str>) -> Result<String, RepoError> {
        let revision = match revision {
            None | Some(WORKING_COPY) => return read_working_copy(&self.root, path),
            Some(revision) => revision,
        };
        let target = format!("{}@{}", self.url_of(path), revision);
        let output = self.exec(&["cat", &target])?;
        if !output.is_success() {
            return Err(RepoError::FileNotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn transforms(&self) -> &TransformPipeline {
        &self.transforms
    }

    fn revisions_of_file<'a>(&'a self, path: &str) -> CommitIter<'a> {
        let committed = Box::new(SvnHistory {
            repo: self,
            path: path.to_string(),
            next_peg: Some("BASE".to_string()),
            buffer: VecDeque::new(),
        });
        WorkingCopyFirst::wrap(self, path, committed)
    }

    fn meta_data_of_revision(&self, revision: &str) -> Result<RevisionMeta, RepoError> {
        let stdout = self
            .exec(&["log", "--xml", "-r", revision, &self.info.root_url])?
            .into_result()?;
        let entry = parse_svn_log(&stdout)
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::ParseError(format!("no log entry for revision {}", revision)))?;
        Ok(RevisionMeta {
            author: entry.author,
            date: entry.date,
            message: entry.message.trim().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// History paging
// ---------------------------------------------------------------------------

/// Lazily paged `svn log` for one file, following copies back to their
/// source path.
struct SvnHistory<'a> {
    repo: &'a SvnRepo,
    /// Path of the file at the oldest revision seen so far.
    path: String,
    next_peg: Option<String>,
    buffer: VecDeque<Commit>,
}

impl SvnHistory<'_> {
    #[instrument(skip(self), fields(repo = %self.repo.root.display(), path = %self.path))]
    fn fetch_page(&mut self) {
        let Some(peg) = self.next_peg.take() else {
            return;
        };
        // BASE only resolves against the working copy; later pages use URLs.
        let target = if peg == "BASE" {
            format!("{}@BASE", self.path)
        } else {
            format!("{}@{}", self.repo.url_of(&self.path), peg)
        };
        let limit = PAGE_SIZE.to_string();
        let output = match self
            .repo
            .exec(&["log", "--verbose", "--quiet", "--xml", "--limit", &limit, &target])
        {
            Ok(output) if output.is_success() => output,
            Ok(output) => {
                warn!(status = output.exit_code, "svn log failed, ending history");
                return;
            }
            Err(e) => {
                warn!(error = %e, "svn log failed, ending history");
                return;
            }
        };

        let entries = parse_svn_log(&output.stdout);
        debug!(peg = %peg, count = entries.len(), "fetched svn history page");
        let full_page = entries.len() == PAGE_SIZE;
        let mut last_revision = 0;
        for entry in &entries {
            last_revision = entry.revision;
            self.buffer.push_back(Commit::new(
                entry.revision.to_string(),
                parse_timestamp(&entry.date),
                self.path.clone(),
            ));
            match self.copy_source(entry) {
                CopySource::Unchanged => {}
                CopySource::Moved(previous) => self.path = previous,
                CopySource::Outside(source) => {
                    debug!(source = %source, "file copied from outside the checkout, ending history");
                    return;
                }
            }
        }
        if full_page && last_revision > 1 {
            self.next_peg = Some((last_revision - 1).to_string());
        }
    }

    /// Where the current path was copied from in `entry`, if anywhere.
    fn copy_source(&self, entry: &SvnLogEntry) -> CopySource {
        for changed in &entry.changed_paths {
            if self.repo.relative_path(&changed.path) != Some(self.path.as_str()) {
                continue;
            }
            if let Some(ref from) = changed.copy_from_path {
                return match self.repo.relative_path(from) {
                    Some(previous) => CopySource::Moved(previous.to_string()),
                    None => CopySource::Outside(from.clone()),
                };
            }
        }
        CopySource::Unchanged
    }
}

enum CopySource {
    Unchanged,
    Moved(String),
    Outside(String),
}

impl Iterator for SvnHistory<'_> {
    type Item = Commit;

    fn next(&mut self) -> Option<Commit> {
        if self.buffer.is_empty() {
            self.fetch_page();
        }
        self.buffer.pop_front()
    }
}
