//! Git backend.
//!
//! The tree is opened with `git2` (which also answers ignore checks); file
//! history and historical contents come from the `git` CLI so `--follow`
//! rename tracking matches what users see in `git log`.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::Repository as Git2Repository;
use tracing::{debug, info, instrument, warn};

use super::{has_component, matches_any_glob, parse_timestamp, read_working_copy, CommitIter, Repository, WorkingCopyFirst};
use crate::errors::RepoError;
use crate::exec::{CommandOutput, CommandRunner};
use crate::models::{Commit, RevisionMeta, WORKING_COPY};
use crate::transform::TransformPipeline;

/// Entries requested per `git log` page.
const PAGE_SIZE: usize = 100;

/// Short hash, parents and ISO author date, separated by US (0x1f).
const LOG_FORMAT: &str = "--pretty=format:%h%x1f%p%x1f%aI";

const META_FORMAT: &str = "--pretty=format:%an <%ae>%x00%aI%x00%B";

/// Per-backend settings fixed at construction.
#[derive(Debug, Clone)]
pub struct GitSettings {
    pub executable: String,
    pub slow: Option<bool>,
    pub ignore_patterns: Vec<String>,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            executable: "git".into(),
            slow: None,
            ignore_patterns: Vec::new(),
        }
    }
}

pub struct GitRepo {
    repo: Git2Repository,
    root: PathBuf,
    settings: GitSettings,
    transforms: TransformPipeline,
    runner: Arc<dyn CommandRunner>,
}

impl GitRepo {
    /// Open the working tree at `root`.
    pub fn open<P: AsRef<Path>>(
        root: P,
        settings: GitSettings,
        transforms: TransformPipeline,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, RepoError> {
        let root = root.as_ref();
        let not_found = || RepoError::RepositoryNotFound {
            kind: "git".into(),
            path: root.display().to_string(),
        };
        let repo = Git2Repository::open(root).map_err(|_| not_found())?;
        if repo.is_bare() {
            return Err(not_found());
        }
        info!(path = %root.display(), "opened git repository");
        Ok(Self {
            repo,
            root: root.to_path_buf(),
            settings,
            transforms,
            runner,
        })
    }

    fn exec(&self, args: &[&str]) -> Result<CommandOutput, RepoError> {
        let mut full: Vec<String> = vec!["-c".into(), "core.quotePath=false".into()];
        full.extend(args.iter().map(|a| a.to_string()));
        let output = self.runner.run(&self.settings.executable, &full, &self.root)?;
        debug!(
            cmd = %format!("{} {}", self.settings.executable, args.join(" ")),
            status = output.exit_code,
            "ran git command"
        );
        Ok(output)
    }
}

impl Repository for GitRepo {
    fn label(&self) -> String {
        format!("git:{}", self.root.display())
    }

    fn is_slow(&self) -> bool {
        self.settings.slow.unwrap_or(false)
    }

    fn is_ignored(&self, path: &str) -> bool {
        if has_component(path, ".git") {
            debug!(path, "ignoring .git file");
            return true;
        }
        if let Some(pattern) = matches_any_glob(path, &self.settings.ignore_patterns) {
            debug!(path, pattern = %pattern, "file matches ignore pattern");
            return true;
        }
        match self.repo.is_path_ignored(path) {
            Ok(ignored) => ignored,
            Err(e) => {
                debug!(path, error = %e, "git ignore check failed");
                false
            }
        }
    }

    fn read_file(&self, path: &str, revision: Option<&str>) -> Result<String, RepoError> {
        let revision = match revision {
            None | Some(WORKING_COPY) => return read_working_copy(&self.root, path),
            Some(revision) => revision,
        };
        let spec = format!("{}:{}", revision, path);
        let output = self.exec(&["show", &spec])?;
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
        let committed = Box::new(GitHistory {
            repo: self,
            path: path.to_string(),
            next_start: Some("HEAD".to_string()),
            buffer: VecDeque::new(),
        });
        WorkingCopyFirst::wrap(self, path, committed)
    }

    fn meta_data_of_revision(&self, revision: &str) -> Result<RevisionMeta, RepoError> {
        let stdout = self.exec(&["log", "-n", "1", META_FORMAT, revision])?.into_result()?;
        let mut parts = stdout.splitn(3, '\0');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(author), Some(date), Some(message)) => Ok(RevisionMeta {
                author: author.to_string(),
                date: date.to_string(),
                message: message.trim().to_string(),
            }),
            _ => Err(RepoError::ParseError(format!(
                "unexpected git log output for {}",
                revision
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// History paging
// ---------------------------------------------------------------------------

/// Lazily paged `git log --follow` for one file.
struct GitHistory<'a> {
    repo: &'a GitRepo,
    /// Path at the oldest commit seen so far.
    path: String,
    next_start: Option<String>,
    buffer: VecDeque<Commit>,
}

impl GitHistory<'_> {
    #[instrument(skip(self), fields(repo = %self.repo.root.display(), path = %self.path))]
    fn fetch_page(&mut self) {
        let Some(start) = self.next_start.take() else {
            return;
        };
        let limit = PAGE_SIZE.to_string();
        let args: [&str; 9] = [
            "log",
            "--name-only",
            "--follow",
            "-n",
            limit.as_str(),
            LOG_FORMAT,
            start.as_str(),
            "--",
            self.path.as_str(),
        ];
        let output = match self.repo.exec(&args) {
            Ok(output) if output.is_success() => output,
            Ok(output) => {
                warn!(status = output.exit_code, stderr = %output.stderr.trim(), "git log failed, ending history");
                return;
            }
            Err(e) => {
                warn!(error = %e, "git log failed, ending history");
                return;
            }
        };

        let entries = parse_git_log(&output.stdout, &self.path);
        debug!(start = %start, count = entries.len(), "fetched git history page");
        if entries.len() == PAGE_SIZE {
            if let Some(last) = entries.last() {
                self.next_start = last.parents.first().cloned();
                self.path = last.commit.path.clone();
            }
        }
        self.buffer.extend(entries.into_iter().map(|e| e.commit));
    }
}

impl Iterator for GitHistory<'_> {
    type Item = Commit;

    fn next(&mut self) -> Option<Commit> {
        if self.buffer.is_empty() {
            self.fetch_page();
        }
        self.buffer.pop_front()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GitLogEntry {
    commit: Commit,
    parents: Vec<String>,
}

/// Parse `git log --name-only` output produced with [`LOG_FORMAT`].
///
/// Entries without a file name (merges) inherit the path of the newer entry.
fn parse_git_log(output: &str, path: &str) -> Vec<GitLogEntry> {
    let mut entries: Vec<GitLogEntry> = Vec::new();
    let mut current_path = path.to_string();
    let mut named = false;

    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        if line.contains('\x1f') {
            let mut fields = line.splitn(3, '\x1f');
            let revision = fields.next().unwrap_or_default().trim();
            if revision.is_empty() {
                warn!(line, "skipping git log entry without a revision");
                continue;
            }
            let parents = fields
                .next()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let date = fields.next().and_then(parse_timestamp);
            entries.push(GitLogEntry {
                commit: Commit::new(revision, date, current_path.clone()),
                parents,
            });
            named = false;
        } else if !line.trim().is_empty() && !named {
            if let Some(entry) = entries.last_mut() {
                entry.commit.path = line.to_string();
                current_path = line.to_string();
                named = true;
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;

    fn header(rev: &str, parents: &str, date: &str) -> String {
        format!("{}\x1f{}\x1f{}", rev, parents, date)
    }

    fn init_repo(runner: ScriptedRunner) -> (tempfile::TempDir, GitRepo, Arc<ScriptedRunner>) {
        let dir = tempfile::tempdir().unwrap();
        Git2Repository::init(dir.path()).unwrap();
        let runner = Arc::new(runner);
        let repo = GitRepo::open(
            dir.path(),
            GitSettings::default(),
            TransformPipeline::new(),
            runner.clone(),
        )
        .unwrap();
        (dir, repo, runner)
    }

    #[test]
    fn test_parse_git_log_with_rename() {
        let output = format!(
            "{}\nsrc/new.php\n\n{}\nsrc/new.php\n\n{}\nold.php\n",
            header("c3", "c2", "2024-03-03T10:00:00+00:00"),
            header("c2", "c1", "2024-03-02T10:00:00+00:00"),
            header("c1", "", "2024-03-01T10:00:00+01:00"),
        );
        let entries = parse_git_log(&output, "src/new.php");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].commit.revision, "c3");
        assert_eq!(entries[0].parents, vec!["c2".to_string()]);
        assert_eq!(entries[2].commit.path, "old.php");
        assert!(entries[2].parents.is_empty());
        assert_eq!(
            entries[2].commit.date.unwrap().to_rfc3339(),
            "2024-03-01T09:00:00+00:00"
        );
    }

    #[test]
    fn test_parse_git_log_merge_without_names() {
        let output = format!(
            "{}\n\n{}\na.js\n",
            header("m1", "p1 p2", "2024-03-03T10:00:00+00:00"),
            header("p1", "p0", "2024-03-02T10:00:00+00:00"),
        );
        let entries = parse_git_log(&output, "a.js");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].commit.path, "a.js");
        assert_eq!(entries[0].parents.len(), 2);
    }

    #[test]
    fn test_parse_git_log_empty() {
        assert!(parse_git_log("", "a.js").is_empty());
    }

    #[test]
    fn test_open_rejects_plain_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = GitRepo::open(
            dir.path(),
            GitSettings::default(),
            TransformPipeline::new(),
            Arc::new(ScriptedRunner::new()),
        );
        assert!(matches!(result, Err(RepoError::RepositoryNotFound { .. })));
    }

    #[test]
    fn test_history_pages_follow_parent_and_renamed_path() {
        let mut page1 = String::new();
        for i in (1..=PAGE_SIZE).rev() {
            let rev = format!("n{}", i);
            let parent = if i == 1 { "o9".to_string() } else { format!("n{}", i - 1) };
            let path = if i == 1 { "old.php" } else { "new.php" };
            page1.push_str(&format!("{}\n{}\n\n", header(&rev, &parent, "2024-01-01T00:00:00Z"), path));
        }
        let page2 = format!(
            "{}\nold.php\n\n{}\nold.php\n",
            header("o9", "o8", "2023-12-31T00:00:00Z"),
            header("o8", "", "2023-12-30T00:00:00Z"),
        );
        let runner = ScriptedRunner::new()
            .on(&["log", "o9", "-- old.php"], CommandOutput::success(page2))
            .on(&["log", "HEAD", "-- new.php"], CommandOutput::success(page1));
        let (_dir, repo, runner) = init_repo(runner);

        let history: Vec<Commit> = repo.revisions_of_file("new.php").collect();
        assert_eq!(history.len(), PAGE_SIZE + 2);
        assert_eq!(history[0].revision, format!("n{}", PAGE_SIZE));
        assert_eq!(history[PAGE_SIZE - 1].path, "old.php");
        assert_eq!(history[PAGE_SIZE + 1].revision, "o8");
        assert_eq!(runner.calls().len(), 2);

        // A fresh sequence starts again from HEAD.
        assert_eq!(repo.revisions_of_file("new.php").next().unwrap().revision, format!("n{}", PAGE_SIZE));
    }

    #[test]
    fn test_history_starts_with_uncommitted_change() {
        let runner = ScriptedRunner::new()
            .on(
                &["log", "HEAD", "-- a.txt"],
                CommandOutput::success(format!("{}\na.txt\n", header("c1", "", "2024-01-01T00:00:00Z"))),
            )
            .on(&["show c1:a.txt"], CommandOutput::success("one\n"));
        let (dir, repo, runner) = init_repo(runner);
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();

        let history: Vec<Commit> = repo.revisions_of_file("a.txt").collect();
        let revs: Vec<&str> = history.iter().map(|c| c.revision.as_str()).collect();
        assert_eq!(revs, vec!["HEAD", "c1"]);
        assert!(history[0].is_working_copy());

        // The sentinel reads the working copy, never `git show HEAD:`.
        assert_eq!(repo.read_file("a.txt", Some(WORKING_COPY)).unwrap(), "one\ntwo\n");
        assert!(runner.calls().iter().all(|c| !c.contains("show HEAD:")));

        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        let revs: Vec<String> = repo.revisions_of_file("a.txt").map(|c| c.revision).collect();
        assert_eq!(revs, vec!["c1".to_string()]);
    }

    #[test]
    fn test_history_stops_on_failure() {
        let (_dir, repo, _runner) = init_repo(ScriptedRunner::new());
        assert_eq!(repo.revisions_of_file("a.js").count(), 0);
    }

    #[test]
    fn test_read_file_at_revision() {
        let runner = ScriptedRunner::new()
            .on(&["show abc:src/a.js"], CommandOutput::success("let a = 1;\n"))
            .on(&["show"], CommandOutput::failure(128, "fatal: path does not exist"));
        let (_dir, repo, _runner) = init_repo(runner);
        assert_eq!(repo.read_file("src/a.js", Some("abc")).unwrap(), "let a = 1;\n");
        assert!(matches!(
            repo.read_file("src/a.js", Some("def")),
            Err(RepoError::FileNotFound { .. })
        ));
        assert_eq!(repo.get_file("src/a.js", Some("def")), None);
    }

    #[test]
    fn test_working_copy_and_ignores() {
        let (dir, repo, _runner) = init_repo(ScriptedRunner::new());
        std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi\n").unwrap();
        assert_eq!(repo.get_file("a.txt", None).as_deref(), Some("hi\n"));
        assert_eq!(repo.get_file("missing.txt", None), None);
        assert!(repo.is_ignored("debug.log"));
        assert!(repo.is_ignored(".git/HEAD"));
        assert!(!repo.is_ignored("a.txt"));
        assert!(!repo.is_slow());
    }

    #[test]
    fn test_meta_data_of_revision() {
        let runner = ScriptedRunner::new().on(
            &["log", "-n 1", "abc"],
            CommandOutput::success("Ann <ann@example.com>\x002024-03-01T10:00:00+00:00\x00Fix banner\n\n"),
        );
        let (_dir, repo, _runner) = init_repo(runner);
        let meta = repo.meta_data_of_revision("abc").unwrap();
        assert_eq!(meta.author, "Ann <ann@example.com>");
        assert_eq!(meta.date, "2024-03-01T10:00:00+00:00");
        assert_eq!(meta.message, "Fix banner");
    }
}
