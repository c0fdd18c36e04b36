//! Removal of comments tagged as mirror-specific.
//!
//! Given a tag such as `mirror-only`, comments containing `@mirror-only` are
//! dropped so annotations that only exist on one side never cause a
//! mismatch. How "a comment" is found depends on the file type:
//!
//! | Dialect | Extensions | Removed |
//! |---------|------------|---------|
//! | Tokens | `php` | the comment token, plus trailing indentation before it and one newline after it |
//! | Lines | `js`, `jsx`, `mjs`, `ts`, `tsx`, `css`, `scss` | a tagged line, or every line from `@start-<tag>` through `@end-<tag>` |
//!
//! Other files pass through unchanged.

use std::path::Path;

use tracing::debug;

use super::Transform;
use crate::errors::TransformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Tokens,
    Lines,
}

fn dialect_for(path: &str) -> Option<Dialect> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "php" => Some(Dialect::Tokens),
        "js" | "jsx" | "mjs" | "ts" | "tsx" | "css" | "scss" => Some(Dialect::Lines),
        _ => None,
    }
}

/// Strips comments carrying `@<tag>` (ASCII case-insensitive).
#[derive(Debug, Clone)]
pub struct RemoveMarkedComments {
    tag: String,
    start_tag: String,
    end_tag: String,
}

impl RemoveMarkedComments {
    pub fn new(tag: &str) -> Result<Self, TransformError> {
        if tag.is_empty() || tag.chars().any(char::is_whitespace) {
            return Err(TransformError::InvalidTag(tag.to_string()));
        }
        let tag = tag.to_ascii_lowercase();
        Ok(Self {
            start_tag: format!("@start-{}", tag),
            end_tag: format!("@end-{}", tag),
            tag: format!("@{}", tag),
        })
    }

    fn is_marked(&self, text: &str) -> bool {
        text.to_ascii_lowercase().contains(&self.tag)
    }

    fn strip_tokens(&self, contents: &str, path: &str) -> String {
        let mut output = String::with_capacity(contents.len());
        let mut whitespace = String::new();
        // Set after removing a comment that had its line to itself.
        let mut drop_newline = false;

        for token in tokenize_php(contents) {
            match token {
                Token::Whitespace(ws) => {
                    if drop_newline {
                        drop_newline = false;
                        whitespace.push_str(strip_one_newline(ws));
                    } else {
                        whitespace.push_str(ws);
                    }
                }
                Token::Comment(comment) if self.is_marked(comment) => {
                    debug!(tag = %self.tag, path, "removing marked comment");
                    let kept = whitespace.trim_end_matches([' ', '\t']).len();
                    whitespace.truncate(kept);
                    drop_newline = if whitespace.is_empty() {
                        output.is_empty() || output.ends_with(['\n', '\r'])
                    } else {
                        whitespace.ends_with(['\n', '\r'])
                    };
                }
                Token::Comment(text) | Token::Text(text) => {
                    output.push_str(&whitespace);
                    output.push_str(text);
                    whitespace.clear();
                    drop_newline = false;
                }
            }
        }

        output.push_str(&whitespace);
        output
    }

    fn strip_lines(&self, contents: &str, path: &str) -> String {
        let mut output = String::with_capacity(contents.len());
        let mut in_region = false;

        for line in contents.split_inclusive('\n') {
            let lower = line.to_ascii_lowercase();
            if in_region {
                if lower.contains(&self.end_tag) {
                    in_region = false;
                }
                continue;
            }
            if let Some(pos) = lower.find(&self.start_tag) {
                debug!(start = %self.start_tag, end = %self.end_tag, path, "removing marked region");
                in_region = !lower[pos..].contains(&self.end_tag);
                continue;
            }
            if lower.contains(&self.tag) {
                debug!(tag = %self.tag, path, "removing marked line");
                continue;
            }
            output.push_str(line);
        }

        output
    }
}

impl Transform for RemoveMarkedComments {
    fn name(&self) -> &str {
        "remove_marked_comments"
    }

    fn transform(&self, contents: &str, path: &str) -> String {
        match dialect_for(path) {
            Some(Dialect::Tokens) => self.strip_tokens(contents, path),
            Some(Dialect::Lines) => self.strip_lines(contents, path),
            None => contents.to_string(),
        }
    }
}

fn strip_one_newline(ws: &str) -> &str {
    ws.strip_prefix("\r\n")
        .or_else(|| ws.strip_prefix('\n'))
        .or_else(|| ws.strip_prefix('\r'))
        .unwrap_or(ws)
}

// ---------------------------------------------------------------------------
// PHP lexer
// ---------------------------------------------------------------------------

/// Just enough of PHP's lexical structure to find comments: everything that
/// is not whitespace or a comment inside `<?php ... ?>` is opaque text.
#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Whitespace(&'a str),
    Comment(&'a str),
}

fn is_php_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn flush_text<'a>(tokens: &mut Vec<Token<'a>>, src: &'a str, from: usize, to: usize) {
    if from < to {
        tokens.push(Token::Text(&src[from..to]));
    }
}

fn tokenize_php(src: &str) -> Vec<Token<'_>> {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut pending = 0;
    let mut i = 0;
    let mut in_php = false;

    while i < len {
        let rest = &bytes[i..];

        if !in_php {
            if rest.len() >= 5 && rest[..5].eq_ignore_ascii_case(b"<?php") {
                i += 5;
                in_php = true;
            } else if rest.starts_with(b"<?=") {
                i += 3;
                in_php = true;
            } else {
                i += 1;
            }
            continue;
        }

        let b = bytes[i];
        if is_php_whitespace(b) {
            let mut j = i;
            while j < len && is_php_whitespace(bytes[j]) {
                j += 1;
            }
            flush_text(&mut tokens, src, pending, i);
            tokens.push(Token::Whitespace(&src[i..j]));
            i = j;
            pending = j;
        } else if rest.starts_with(b"?>") {
            i += 2;
            if bytes[i..].starts_with(b"\r\n") {
                i += 2;
            } else if i < len && bytes[i] == b'\n' {
                i += 1;
            }
            in_php = false;
        } else if rest.starts_with(b"//") || (b == b'#' && !rest.starts_with(b"#[")) {
            let mut j = i;
            while j < len && bytes[j] != b'\n' && bytes[j] != b'\r' && !bytes[j..].starts_with(b"?>") {
                j += 1;
            }
            flush_text(&mut tokens, src, pending, i);
            tokens.push(Token::Comment(&src[i..j]));
            i = j;
            pending = j;
        } else if rest.starts_with(b"/*") {
            let j = src[i + 2..].find("*/").map_or(len, |pos| i + 2 + pos + 2);
            flush_text(&mut tokens, src, pending, i);
            tokens.push(Token::Comment(&src[i..j]));
            i = j;
            pending = j;
        } else if matches!(b, b'\'' | b'"' | b'`') {
            let mut j = i + 1;
            while j < len {
                if bytes[j] == b'\\' {
                    j += 2;
                } else if bytes[j] == b {
                    j += 1;
                    break;
                } else {
                    j += 1;
                }
            }
            i = j.min(len);
        } else if rest.starts_with(b"<<<") {
            i = skip_heredoc(src, i);
        } else {
            i += 1;
        }
    }

    flush_text(&mut tokens, src, pending, len);
    tokens
}

/// Returns the offset just past a heredoc/nowdoc starting at `start`, or
/// `start + 3` when no label follows `<<<`.
fn skip_heredoc(src: &str, start: usize) -> usize {
    let bytes = src.as_bytes();
    let mut k = start + 3;
    while k < bytes.len() && matches!(bytes[k], b' ' | b'\t') {
        k += 1;
    }
    if k < bytes.len() && matches!(bytes[k], b'\'' | b'"') {
        k += 1;
    }
    let label_start = k;
    while k < bytes.len() && is_ident_byte(bytes[k]) {
        k += 1;
    }
    if k == label_start {
        return start + 3;
    }
    let label = &src[label_start..k];

    let Some(first_newline) = src[k..].find('\n') else {
        return bytes.len();
    };
    let mut line_start = k + first_newline + 1;
    while line_start < bytes.len() {
        let line = &src[line_start..];
        let trimmed = line.trim_start_matches([' ', '\t']);
        let indent = line.len() - trimmed.len();
        if trimmed.starts_with(label) {
            let end = line_start + indent + label.len();
            if end >= bytes.len() || !is_ident_byte(bytes[end]) {
                return end;
            }
        }
        match line.find('\n') {
            Some(pos) => line_start += pos + 1,
            None => break,
        }
    }
    bytes.len()
}
