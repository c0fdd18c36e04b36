//! Per-file-pair sync classification.

use tracing::{debug, info};

use crate::models::{ComparisonResult, FilePair, SideInfo, SyncStatus};
use crate::repo::Repository;
use crate::resolver::{find_common_ancestor, CommonAncestor, Endpoint, SideMatch};
use crate::transform::trim_trailing_newlines;

/// Compares files between a left and a right repository.
///
/// Holds no state between pairs; every call reads the repositories afresh.
pub struct Comparator<'r> {
    left: &'r dyn Repository,
    right: &'r dyn Repository,
}

impl<'r> Comparator<'r> {
    pub fn new(left: &'r dyn Repository, right: &'r dyn Repository) -> Self {
        Self { left, right }
    }

    /// Classify every pair in order. Ignored pairs produce no result.
    pub fn compare(&self, pairs: &[FilePair]) -> Vec<ComparisonResult> {
        info!(pairs = pairs.len(), "comparing file pairs");
        pairs
            .iter()
            .filter_map(|pair| self.compare_file(&pair.left, &pair.right))
            .collect()
    }

    /// Classify one pair, or `None` when either side ignores its path.
    pub fn compare_file(&self, left_path: &str, right_path: &str) -> Option<ComparisonResult> {
        if self.left.is_ignored(left_path) || self.right.is_ignored(right_path) {
            info!(left = left_path, right = right_path, "skipping ignored file");
            return None;
        }

        let left_head = self.left.get_file(left_path, None);
        let right_head = self.right.get_file(right_path, None);

        let result = match (left_head, right_head) {
            (None, None) => {
                // Absent everywhere counts as agreeing; `exists` tells it apart.
                info!(left = left_path, right = right_path, "file missing on both sides");
                ComparisonResult {
                    status: SyncStatus::InSync,
                    left: SideInfo::missing(left_path),
                    right: SideInfo::missing(right_path),
                }
            }
            (Some(_), None) => {
                info!(file = left_path, "file only exists on the left");
                ComparisonResult {
                    status: SyncStatus::NewInLeft,
                    left: SideInfo::at_head(left_path),
                    right: SideInfo::missing(right_path),
                }
            }
            (None, Some(_)) => {
                info!(file = right_path, "file only exists on the right");
                ComparisonResult {
                    status: SyncStatus::NewInRight,
                    left: SideInfo::missing(left_path),
                    right: SideInfo::at_head(right_path),
                }
            }
            (Some(l), Some(r)) if trim_trailing_newlines(&l) == trim_trailing_newlines(&r) => {
                info!(left = left_path, right = right_path, "files are in sync");
                ComparisonResult {
                    status: SyncStatus::InSync,
                    left: SideInfo::at_head(left_path),
                    right: SideInfo::at_head(right_path),
                }
            }
            (Some(_), Some(_)) => {
                info!(left = left_path, right = right_path, "head contents differ, resolving ancestor");
                self.resolve(left_path, right_path)
            }
        };

        debug!(status = %result.status, left = left_path, right = right_path, "pair classified");
        Some(result)
    }

    fn resolve(&self, left_path: &str, right_path: &str) -> ComparisonResult {
        let found = find_common_ancestor(
            Endpoint::new(self.left, left_path),
            Endpoint::new(self.right, right_path),
        );
        let Some(found) = found else {
            info!(left = left_path, right = right_path, "no common ancestor");
            return ComparisonResult {
                status: SyncStatus::NoCommonAncestor,
                left: SideInfo::unmatched(left_path),
                right: SideInfo::unmatched(right_path),
            };
        };

        let status = classify(&found);
        info!(
            %status,
            left_ahead = found.left.subsequent_commits.len(),
            right_ahead = found.right.subsequent_commits.len(),
            "drift classified"
        );
        ComparisonResult {
            status,
            left: matched_side(left_path, found.left),
            right: matched_side(right_path, found.right),
        }
    }
}

/// Status for a found ancestor, from which sides have moved since it.
pub fn classify(found: &CommonAncestor) -> SyncStatus {
    match (
        found.left.subsequent_commits.is_empty(),
        found.right.subsequent_commits.is_empty(),
    ) {
        (true, _) => SyncStatus::RightAhead,
        (false, true) => SyncStatus::LeftAhead,
        (false, false) => SyncStatus::Divergent,
    }
}

fn matched_side(file: &str, side: SideMatch) -> SideInfo {
    SideInfo {
        file: file.to_string(),
        exists: true,
        ancestor: Some(side.ancestor),
        subsequent_commits: side.subsequent_commits,
    }
}
