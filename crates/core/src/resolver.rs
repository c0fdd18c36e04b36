//! Common-ancestor search.
//!
//! Walks two file histories to find the most recent revision on each side
//! whose normalized content is identical, and collects the commits made on
//! each side since then. The side flagged slow drives the outer loop; the
//! other side's history is materialized once and its contents are fetched at
//! most once per search.

use std::collections::HashMap;

use tracing::{debug, info, instrument};

use crate::models::Commit;
use crate::repo::Repository;
use crate::transform::trim_trailing_newlines;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One side of a search: a repository and the file's current path in it.
#[derive(Clone, Copy)]
pub struct Endpoint<'a> {
    pub repo: &'a dyn Repository,
    pub path: &'a str,
}

impl<'a> Endpoint<'a> {
    pub fn new(repo: &'a dyn Repository, path: &'a str) -> Self {
        Self { repo, path }
    }
}

/// Per-side outcome of a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideMatch {
    /// The matching revision.
    pub ancestor: Commit,
    /// Available revisions newer than `ancestor`, newest first.
    pub subsequent_commits: Vec<Commit>,
}

/// A matching revision pair, already mapped back to left/right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonAncestor {
    pub left: SideMatch,
    pub right: SideMatch,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Find the most recent pair of revisions with equal normalized content.
///
/// Returns `None` when no revision of one history matches any revision of
/// the other. Revisions whose content cannot be fetched are skipped and do
/// not count as subsequent commits. When several fast-side revisions match,
/// the newest one wins.
#[instrument(skip_all, fields(left = %left.path, right = %right.path))]
pub fn find_common_ancestor(left: Endpoint<'_>, right: Endpoint<'_>) -> Option<CommonAncestor> {
    let left_drives = left.repo.is_slow();
    let (slow, fast) = if left_drives { (left, right) } else { (right, left) };
    info!(
        slow = %slow.repo.label(),
        fast = %fast.repo.label(),
        "searching for common ancestor"
    );

    let (slow_match, fast_match) = search(slow, fast)?;
    let found = if left_drives {
        CommonAncestor {
            left: slow_match,
            right: fast_match,
        }
    } else {
        CommonAncestor {
            left: fast_match,
            right: slow_match,
        }
    };
    info!(
        left_revision = %found.left.ancestor.revision,
        right_revision = %found.right.ancestor.revision,
        left_ahead = found.left.subsequent_commits.len(),
        right_ahead = found.right.subsequent_commits.len(),
        "common ancestor found"
    );
    Some(found)
}

fn search(slow: Endpoint<'_>, fast: Endpoint<'_>) -> Option<(SideMatch, SideMatch)> {
    let fast_commits: Vec<Commit> = fast.repo.revisions_of_file(fast.path).collect();
    debug!(count = fast_commits.len(), "materialized fast-side history");
    if fast_commits.is_empty() {
        info!("fast side has no history, no common ancestor");
        return None;
    }

    let mut cache = ContentCache::new(fast.repo);
    let mut slow_visited: Vec<Commit> = Vec::new();

    for slow_commit in slow.repo.revisions_of_file(slow.path) {
        let Some(slow_raw) = slow.repo.get_file(&slow_commit.path, Some(&slow_commit.revision)) else {
            debug!(revision = %slow_commit.revision, path = %slow_commit.path, "slow-side revision unavailable, eliding");
            continue;
        };
        let slow_content = trim_trailing_newlines(&slow_raw);

        let mut fast_visited: Vec<Commit> = Vec::new();
        for fast_commit in &fast_commits {
            let equal = match cache.get(fast_commit) {
                None => continue,
                Some(fast_content) => fast_content == slow_content,
            };
            if !equal {
                fast_visited.push(fast_commit.clone());
                continue;
            }
            debug!(fetches = cache.fetches, "fast-side content fetches for search");
            return Some((
                SideMatch {
                    ancestor: slow_commit,
                    subsequent_commits: slow_visited,
                },
                SideMatch {
                    ancestor: fast_commit.clone(),
                    subsequent_commits: fast_visited,
                },
            ));
        }
        slow_visited.push(slow_commit);
    }

    info!(
        slow_revisions = slow_visited.len(),
        fast_revisions = fast_commits.len(),
        "histories exhausted without a match"
    );
    None
}

/// Normalized fast-side contents keyed by revision. `None` records an
/// unavailable revision so it is not fetched again.
struct ContentCache<'a> {
    repo: &'a dyn Repository,
    contents: HashMap<String, Option<String>>,
    fetches: usize,
}

impl<'a> ContentCache<'a> {
    fn new(repo: &'a dyn Repository) -> Self {
        Self {
            repo,
            contents: HashMap::new(),
            fetches: 0,
        }
    }

    fn get(&mut self, commit: &Commit) -> Option<&str> {
        if !self.contents.contains_key(&commit.revision) {
            self.fetches += 1;
            let content = self
                .repo
                .get_file(&commit.path, Some(&commit.revision))
                .map(|raw| trim_trailing_newlines(&raw).to_string());
            if content.is_none() {
                debug!(revision = %commit.revision, path = %commit.path, "fast-side revision unavailable, eliding");
            }
            self.contents.insert(commit.revision.clone(), content);
        }
        self.contents.get(&commit.revision).and_then(|c| c.as_deref())
    }
}
