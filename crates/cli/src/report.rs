//! Human-readable rendering of comparison results.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use mirrorcheck_core::models::{Commit, ComparisonResult, SideInfo};
use mirrorcheck_core::{Repository, SyncStatus};

use crate::style;

/// Build the per-pair summary table.
pub fn results_table(results: &[ComparisonResult]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Status", "Left", "Right", "Ancestor", "Left +", "Right +"]);

    for r in results {
        table.add_row(vec![
            Cell::new(r.status.to_string()).fg(style::status_color(r.status)),
            Cell::new(&r.left.file),
            Cell::new(&r.right.file),
            Cell::new(ancestor_label(r)),
            Cell::new(r.left_ahead()),
            Cell::new(r.right_ahead()),
        ]);
    }
    table
}

/// `left-rev / right-rev`, or `—` when there is no shared revision.
fn ancestor_label(result: &ComparisonResult) -> String {
    match (&result.left.ancestor, &result.right.ancestor) {
        (Some(l), Some(r)) => format!("{} / {}", short_revision(&l.revision), short_revision(&r.revision)),
        (Some(c), None) | (None, Some(c)) => short_revision(&c.revision),
        (None, None) => "—".to_string(),
    }
}

/// Git hashes are cut to 10 characters; SVN revisions pass through.
pub fn short_revision(revision: &str) -> String {
    if revision.len() > 10 && revision.chars().all(|c| c.is_ascii_hexdigit()) {
        revision[..10].to_string()
    } else {
        revision.to_string()
    }
}

/// One line per status that occurred, e.g. `2 in-sync`.
pub fn summary_line(results: &[ComparisonResult]) -> String {
    let parts: Vec<String> = SyncStatus::ALL
        .iter()
        .filter_map(|status| {
            let count = results.iter().filter(|r| r.status == *status).count();
            (count > 0).then(|| format!("{} {}", count, status))
        })
        .collect();
    if parts.is_empty() {
        "no files compared".to_string()
    } else {
        parts.join(", ")
    }
}

/// Print the commits made on each side since the ancestor, with metadata
/// looked up from the owning repository.
pub fn print_subsequent_commits(results: &[ComparisonResult], left: &dyn Repository, right: &dyn Repository) {
    for r in results {
        if r.left.subsequent_commits.is_empty() && r.right.subsequent_commits.is_empty() {
            continue;
        }
        println!();
        println!(
            "{}",
            style::header(&format!("{} ⇄ {} ({})", r.left.file, r.right.file, r.status))
        );
        print_side("left", &r.left, left);
        print_side("right", &r.right, right);
    }
}

fn print_side(name: &str, side: &SideInfo, repo: &dyn Repository) {
    if side.subsequent_commits.is_empty() {
        return;
    }
    println!("  {} ({}):", name, repo.label());
    for commit in &side.subsequent_commits {
        println!("    {}", commit_line(commit, repo));
    }
}

fn commit_line(commit: &Commit, repo: &dyn Repository) -> String {
    let date = commit
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "----------".to_string());
    if commit.is_working_copy() {
        return format!(
            "{} {} {}",
            short_revision(&commit.revision),
            style::dim(&date),
            style::dim("(uncommitted changes)")
        );
    }
    match repo.meta_data_of_revision(&commit.revision) {
        Ok(meta) => format!(
            "{} {} {} {}",
            short_revision(&commit.revision),
            style::dim(&date),
            meta.author,
            meta.message.lines().next().unwrap_or("")
        ),
        Err(e) => format!(
            "{} {} {}",
            short_revision(&commit.revision),
            style::dim(&date),
            style::dim(&format!("(metadata unavailable: {})", e))
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorcheck_core::errors::RepoError;
    use mirrorcheck_core::models::RevisionMeta;

    fn result(status: SyncStatus, left: Option<&str>, right: Option<&str>) -> ComparisonResult {
        let side = |rev: Option<&str>| SideInfo {
            file: "f".into(),
            exists: true,
            ancestor: rev.map(|r| Commit::new(r, None, "f")),
            subsequent_commits: Vec::new(),
        };
        ComparisonResult {
            status,
            left: side(left),
            right: side(right),
        }
    }

    struct NoMeta(mirrorcheck_core::transform::TransformPipeline);

    impl Repository for NoMeta {
        fn label(&self) -> String {
            "none".into()
        }
        fn is_slow(&self) -> bool {
            false
        }
        fn is_ignored(&self, _path: &str) -> bool {
            false
        }
        fn read_file(&self, path: &str, _revision: Option<&str>) -> Result<String, RepoError> {
            Err(RepoError::FileNotFound {
                path: path.into(),
                revision: "-".into(),
            })
        }
        fn transforms(&self) -> &mirrorcheck_core::transform::TransformPipeline {
            &self.0
        }
        fn revisions_of_file<'a>(&'a self, _path: &str) -> mirrorcheck_core::repo::CommitIter<'a> {
            Box::new(std::iter::empty())
        }
        fn meta_data_of_revision(&self, revision: &str) -> Result<RevisionMeta, RepoError> {
            Err(RepoError::ParseError(format!("no entry for {}", revision)))
        }
    }

    #[test]
    fn test_commit_line_marks_uncommitted_changes() {
        let repo = NoMeta(Default::default());
        let line = commit_line(&Commit::working_copy("f"), &repo);
        assert!(line.contains("uncommitted changes"), "{line}");
        assert!(!line.contains("metadata unavailable"));

        let line = commit_line(&Commit::new("abc", None, "f"), &repo);
        assert!(line.contains("metadata unavailable"));
    }

    #[test]
    fn test_short_revision() {
        assert_eq!(short_revision("4f2a9c1e7b3d5a6f"), "4f2a9c1e7b");
        assert_eq!(short_revision("1234"), "1234");
        assert_eq!(short_revision("HEAD"), "HEAD");
    }

    #[test]
    fn test_ancestor_label() {
        let r = result(SyncStatus::LeftAhead, Some("abc"), Some("42"));
        assert_eq!(ancestor_label(&r), "abc / 42");
        let r = result(SyncStatus::NoCommonAncestor, None, None);
        assert_eq!(ancestor_label(&r), "—");
    }

    #[test]
    fn test_summary_line() {
        let results = vec![
            result(SyncStatus::InSync, None, None),
            result(SyncStatus::Divergent, None, None),
            result(SyncStatus::InSync, None, None),
        ];
        assert_eq!(summary_line(&results), "2 in-sync, 1 divergent");
        assert_eq!(summary_line(&[]), "no files compared");
    }

    #[test]
    fn test_results_table_has_row_per_result() {
        let results = vec![result(SyncStatus::InSync, Some("HEAD"), Some("HEAD"))];
        let rendered = results_table(&results).to_string();
        assert!(rendered.contains("in-sync"));
        assert!(rendered.contains("HEAD / HEAD"));
    }
}
