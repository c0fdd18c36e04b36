//! Ordered regular-expression substitutions.

use regex_lite::Regex;
use tracing::trace;

use super::Transform;
use crate::errors::TransformError;

type FileMatcher = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Rewrites known textual differences (version banners, absolute paths)
/// so they compare equal.
///
/// Each `(pattern, replacement)` pair is applied to the output of the
/// previous one. Replacements support `$1` / `${name}` expansion.
pub struct Substitute {
    substitutions: Vec<(Regex, String)>,
    matcher: Option<FileMatcher>,
}

impl Substitute {
    pub fn new(pairs: &[(String, String)]) -> Result<Self, TransformError> {
        let substitutions = pairs
            .iter()
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|re| (re, replacement.clone()))
                    .map_err(|e| TransformError::InvalidPattern {
                        pattern: pattern.clone(),
                        detail: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            substitutions,
            matcher: None,
        })
    }

    /// Only rewrite files for which `matcher` returns `true`.
    pub fn with_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.matcher = Some(Box::new(matcher));
        self
    }

    /// Only rewrite files matching at least one glob.
    pub fn with_globs(self, globs: Vec<String>) -> Self {
        self.with_matcher(move |path| globs.iter().any(|g| glob_match::glob_match(g, path)))
    }

    fn applies_to(&self, path: &str) -> bool {
        self.matcher.as_ref().map_or(true, |m| m(path))
    }
}

impl Transform for Substitute {
    fn name(&self) -> &str {
        "substitute"
    }

    fn transform(&self, contents: &str, path: &str) -> String {
        if !self.applies_to(path) {
            return contents.to_string();
        }
        let mut out = contents.to_string();
        for (re, replacement) in &self.substitutions {
            let replaced = re.replace_all(&out, replacement.as_str());
            if let std::borrow::Cow::Owned(s) = replaced {
                trace!(pattern = re.as_str(), path, "substitution applied");
                out = s;
            }
        }
        out
    }
}

impl std::fmt::Debug for Substitute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let patterns: Vec<&str> = self.substitutions.iter().map(|(re, _)| re.as_str()).collect();
        f.debug_struct("Substitute")
            .field("patterns", &patterns)
            .field("restricted", &self.matcher.is_some())
            .finish()
    }
}
