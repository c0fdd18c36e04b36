//! Domain model types used throughout mirrorcheck.
//!
//! These types bridge the repository backends, the ancestor resolver, the
//! comparator, and the report renderers in the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Revision label reported for the current working copy.
pub const WORKING_COPY: &str = "HEAD";

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// A single revision in a file's history.
///
/// `path` is the file's path at that revision; it differs from the requested
/// path when the file was renamed later on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub revision: String,
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "file")]
    pub path: String,
}

impl Commit {
    pub fn new(revision: impl Into<String>, date: Option<DateTime<Utc>>, path: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            date,
            path: path.into(),
        }
    }

    /// The working-copy sentinel used as the trivial ancestor at head.
    pub fn working_copy(path: impl Into<String>) -> Self {
        Self::new(WORKING_COPY, None, path)
    }

    pub fn is_working_copy(&self) -> bool {
        self.revision == WORKING_COPY && self.date.is_none()
    }
}

/// Reporting-only metadata about a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMeta {
    pub author: String,
    pub date: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Comparison input / output
// ---------------------------------------------------------------------------

/// One entry of the ordered left-path to right-path mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePair {
    pub left: String,
    pub right: String,
}

impl FilePair {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Parse `left=right`, or a single path used on both sides.
    pub fn parse(spec: &str) -> Option<Self> {
        let (left, right) = match spec.split_once('=') {
            Some((l, r)) => (l.trim(), r.trim()),
            None => (spec.trim(), spec.trim()),
        };
        if left.is_empty() || right.is_empty() {
            return None;
        }
        Some(Self::new(left, right))
    }
}

/// Sync status of a single file pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    NewInLeft,
    NewInRight,
    InSync,
    LeftAhead,
    RightAhead,
    Divergent,
    NoCommonAncestor,
}

impl SyncStatus {
    pub const ALL: [SyncStatus; 7] = [
        Self::InSync,
        Self::LeftAhead,
        Self::RightAhead,
        Self::Divergent,
        Self::NoCommonAncestor,
        Self::NewInLeft,
        Self::NewInRight,
    ];

    /// `true` for every status other than `InSync`.
    pub fn is_drift(&self) -> bool {
        !matches!(self, Self::InSync)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewInLeft => write!(f, "new-in-left"),
            Self::NewInRight => write!(f, "new-in-right"),
            Self::InSync => write!(f, "in-sync"),
            Self::LeftAhead => write!(f, "left-ahead"),
            Self::RightAhead => write!(f, "right-ahead"),
            Self::Divergent => write!(f, "divergent"),
            Self::NoCommonAncestor => write!(f, "no-common-ancestor"),
        }
    }
}

/// Per-side half of a [`ComparisonResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideInfo {
    pub file: String,
    pub exists: bool,
    pub ancestor: Option<Commit>,
    /// Commits newer than `ancestor`, newest first.
    pub subsequent_commits: Vec<Commit>,
}

impl SideInfo {
    /// A side whose file is missing at head.
    pub fn missing(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            exists: false,
            ancestor: None,
            subsequent_commits: Vec::new(),
        }
    }

    /// A side whose file exists and is trivially its own ancestor.
    pub fn at_head(file: impl Into<String>) -> Self {
        let file = file.into();
        Self {
            ancestor: Some(Commit::working_copy(file.clone())),
            file,
            exists: true,
            subsequent_commits: Vec::new(),
        }
    }

    /// A side whose file exists but shares no content with the other side.
    pub fn unmatched(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            exists: true,
            ancestor: None,
            subsequent_commits: Vec::new(),
        }
    }
}

/// The classified outcome for one file pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub status: SyncStatus,
    pub left: SideInfo,
    pub right: SideInfo,
}

impl ComparisonResult {
    /// Number of left-side commits since the common ancestor.
    pub fn left_ahead(&self) -> usize {
        self.left.subsequent_commits.len()
    }

    /// Number of right-side commits since the common ancestor.
    pub fn right_ahead(&self) -> usize {
        self.right.subsequent_commits.len()
    }
}

/// Serialize a full report as pretty-printed JSON.
pub fn report_to_json(results: &[ComparisonResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}
