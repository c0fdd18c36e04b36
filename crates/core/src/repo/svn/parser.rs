//! Parsers for SVN XML output.

use tracing::{debug, warn};

use crate::errors::RepoError;

/// Location data from `svn info --xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvnInfo {
    pub url: String,
    pub root_url: String,
}

impl SvnInfo {
    /// Repository-absolute path of the checkout with a trailing slash,
    /// e.g. `/trunk/` for `https://host/repo/trunk` under `https://host/repo`.
    pub fn path_prefix(&self) -> String {
        let relative = self.url.strip_prefix(&self.root_url).unwrap_or("");
        format!("{}/", relative.trim_end_matches('/'))
    }

    /// `true` for anything other than a local `file://` repository.
    pub fn is_remote(&self) -> bool {
        !self.url.starts_with("file://")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvnLogEntry {
    pub revision: i64,
    pub author: String,
    pub date: String,
    pub message: String,
    pub changed_paths: Vec<SvnChangedPath>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvnChangedPath {
    pub path: String,
    pub copy_from_path: Option<String>,
}

pub fn parse_svn_info(xml: &str) -> Result<SvnInfo, RepoError> {
    debug!("parsing svn info XML ({} bytes)", xml.len());
    let url = extract_tag_content(xml, "url")
        .ok_or_else(|| RepoError::ParseError("missing <url> in svn info".into()))?;
    let root_url = extract_tag_content(xml, "root")
        .ok_or_else(|| RepoError::ParseError("missing <root> in svn info".into()))?;
    Ok(SvnInfo { url, root_url })
}

pub fn parse_svn_log(xml: &str) -> Vec<SvnLogEntry> {
    debug!("parsing svn log XML ({} bytes)", xml.len());
    let mut entries = Vec::new();
    for part in xml.split("<logentry").skip(1) {
        let entry_xml = match part.find("</logentry>") {
            Some(pos) => &part[..pos],
            None => part,
        };
        let revision = match extract_attr_from_str(entry_xml, "revision").and_then(|s| s.parse::<i64>().ok()) {
            Some(rev) => rev,
            None => {
                warn!("skipping SVN log entry with missing or unparseable revision attribute");
                continue;
            }
        };
        entries.push(SvnLogEntry {
            revision,
            author: extract_tag_content(entry_xml, "author").unwrap_or_default(),
            date: extract_tag_content(entry_xml, "date").unwrap_or_default(),
            message: extract_tag_content(entry_xml, "msg").unwrap_or_default(),
            changed_paths: parse_changed_paths(entry_xml),
        });
    }
    debug!(count = entries.len(), "parsed svn log entries");
    entries
}

fn extract_tag_content(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut search_from = 0;
    while let Some(rel_pos) = xml[search_from..].find(&open) {
        let start_pos = search_from + rel_pos;
        let after_open = &xml[start_pos + open.len()..];
        // The next char must end the tag name (`<url>` is not `<urlencoded>`).
        if let Some(ch) = after_open.chars().next() {
            if ch != '>' && !ch.is_ascii_whitespace() {
                search_from = start_pos + open.len();
                continue;
            }
        }
        let content_start = after_open.find('>')? + 1;
        let content = &after_open[content_start..];
        let end_pos = content.find(&close)?;
        return Some(xml_unescape(content[..end_pos].trim()));
    }
    None
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn extract_attr_from_str(s: &str, attr: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let pattern = format!(" {}={}", attr, quote);
        if let Some(pos) = s.find(&pattern) {
            let after = &s[pos + pattern.len()..];
            let end = after.find(quote)?;
            return Some(xml_unescape(&after[..end]));
        }
    }
    None
}

fn parse_changed_paths(entry_xml: &str) -> Vec<SvnChangedPath> {
    let Some(start) = entry_xml.find("<paths>") else {
        return Vec::new();
    };
    let rest = &entry_xml[start..];
    let Some(end) = rest.find("</paths>") else {
        return Vec::new();
    };

    let mut paths = Vec::new();
    for part in rest[..end].split("<path").skip(1) {
        // `<paths>` itself splits off an empty-named fragment.
        if part.starts_with('s') {
            continue;
        }
        let Some(close) = part.find("</path>") else {
            continue;
        };
        let fragment = &part[..close];
        let Some(tag_end) = fragment.find('>') else {
            continue;
        };
        let attrs = &fragment[..tag_end];
        paths.push(SvnChangedPath {
            path: xml_unescape(fragment[tag_end + 1..].trim()),
            copy_from_path: extract_attr_from_str(attrs, "copyfrom-path"),
        });
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_svn_info() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<info><entry kind="dir" path="." revision="1234">
<url>https://svn.example.com/repo/trunk</url>
<relative-url>^/trunk</relative-url>
<repository><root>https://svn.example.com/repo</root>
<uuid>a1b2c3d4</uuid></repository>
<commit revision="1234"></commit></entry></info>"#;
        let info = parse_svn_info(xml).unwrap();
        assert_eq!(info.url, "https://svn.example.com/repo/trunk");
        assert_eq!(info.root_url, "https://svn.example.com/repo");
        assert_eq!(info.path_prefix(), "/trunk/");
        assert!(info.is_remote());
    }

    #[test]
    fn test_path_prefix_at_repository_root() {
        let info = SvnInfo {
            url: "file:///srv/svn/repo".into(),
            root_url: "file:///srv/svn/repo".into(),
        };
        assert_eq!(info.path_prefix(), "/");
        assert!(!info.is_remote());
    }

    #[test]
    fn test_parse_svn_info_missing_root() {
        let err = parse_svn_info("<info><entry><url>x</url></entry></info>").unwrap_err();
        assert!(matches!(err, RepoError::ParseError(_)));
    }

    #[test]
    fn test_parse_svn_log_multiple_entries() {
        let xml = r#"<log>
<logentry revision="101"><author>bob</author><date>2025-01-11T10:00:00.000000Z</date>
<paths><path action="A" kind="file">/trunk/new.rs</path></paths><msg>add new</msg></logentry>
<logentry revision="100"><author>alice</author><date>2025-01-10T10:00:00.000000Z</date>
<paths><path action="M" kind="file">/trunk/main.rs</path></paths><msg>fix A</msg></logentry>
</log>"#;
        let entries = parse_svn_log(xml);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].revision, 101);
        assert_eq!(entries[0].author, "bob");
        assert_eq!(entries[1].changed_paths[0].path, "/trunk/main.rs");
        assert_eq!(entries[1].changed_paths[0].copy_from_path, None);
    }

    #[test]
    fn test_parse_svn_log_skips_invalid_revision() {
        let xml = r#"<log>
<logentry><author>alice</author><msg>no rev</msg></logentry>
<logentry revision="101"><author>bob</author><msg>good</msg></logentry>
</log>"#;
        let entries = parse_svn_log(xml);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].revision, 101);
    }

    #[test]
    fn test_parse_svn_log_quiet_has_no_message() {
        let xml = r#"<log><logentry revision="7"><author>carol</author><date>2025-01-10T00:00:00Z</date></logentry></log>"#;
        let entries = parse_svn_log(xml);
        assert_eq!(entries[0].message, "");
        assert!(entries[0].changed_paths.is_empty());
    }

    #[test]
    fn test_parse_svn_log_xml_entities() {
        let xml = r#"<log><logentry revision="50"><author>alice</author>
<paths><path action="M" kind="file">/trunk/foo &amp; bar.rs</path></paths>
<msg>fix &lt;bug&gt; &amp; improve</msg></logentry></log>"#;
        let entries = parse_svn_log(xml);
        assert_eq!(entries[0].message, "fix <bug> & improve");
        assert_eq!(entries[0].changed_paths[0].path, "/trunk/foo & bar.rs");
    }

    #[test]
    fn test_parse_svn_log_copy_from() {
        let xml = r#"<log><logentry revision="200"><author>alice</author>
<paths><path action="A" kind="file" copyfrom-path="/trunk/old.php" copyfrom-rev="199">/trunk/new.php</path></paths>
</logentry></log>"#;
        let entries = parse_svn_log(xml);
        let changed = &entries[0].changed_paths[0];
        assert_eq!(changed.copy_from_path.as_deref(), Some("/trunk/old.php"));
        assert_eq!(changed.path, "/trunk/new.php");
    }

    #[test]
    fn test_xml_unescape_double_escaped() {
        assert_eq!(xml_unescape("a &amp;lt; b"), "a &lt; b");
        assert_eq!(xml_unescape("it&apos;s"), "it's");
    }

    #[test]
    fn test_extract_tag_content_no_prefix_match() {
        let xml = r#"<urlencoded>wrong</urlencoded><url>right</url>"#;
        assert_eq!(extract_tag_content(xml, "url"), Some("right".to_string()));
    }
}
