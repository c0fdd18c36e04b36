//! Content normalization applied to every fetched file body.
//!
//! A [`TransformPipeline`] is an ordered list of [`Transform`]s. Each
//! repository owns one and runs it inside every fetch, at head and at any
//! historical revision, so comparisons only ever see normalized content.

pub mod marked_comments;
pub mod substitute;

pub use marked_comments::RemoveMarkedComments;
pub use substitute::Substitute;

use tracing::debug;

use crate::config::TransformConfig;
use crate::errors::TransformError;

/// A deterministic content rewrite.
///
/// Implementations must be pure: the same `(contents, path)` always yields
/// the same output.
pub trait Transform: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn transform(&self, contents: &str, path: &str) -> String;
}

/// Ordered chain of transforms; each one's output feeds the next.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform. Registration order is application order.
    pub fn push(&mut self, transform: impl Transform + 'static) {
        self.transforms.push(Box::new(transform));
    }

    pub fn with(mut self, transform: impl Transform + 'static) -> Self {
        self.push(transform);
        self
    }

    /// Build a pipeline from configuration entries, failing on the first
    /// invalid one.
    pub fn from_config(entries: &[TransformConfig]) -> Result<Self, TransformError> {
        let mut pipeline = Self::new();
        for entry in entries {
            match entry {
                TransformConfig::RemoveMarkedComments { tag } => {
                    pipeline.push(RemoveMarkedComments::new(tag)?);
                }
                TransformConfig::Substitute { substitutions, files } => {
                    let pairs: Vec<(String, String)> = substitutions
                        .iter()
                        .map(|s| (s.pattern.clone(), s.replacement.clone()))
                        .collect();
                    let mut transform = Substitute::new(&pairs)?;
                    if !files.is_empty() {
                        transform = transform.with_globs(files.clone());
                    }
                    pipeline.push(transform);
                }
            }
        }
        debug!(transforms = ?pipeline.names(), "built transform pipeline");
        Ok(pipeline)
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Run every transform in registration order.
    pub fn apply(&self, contents: &str, path: &str) -> String {
        self.transforms
            .iter()
            .fold(contents.to_string(), |acc, t| t.transform(&acc, path))
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("transforms", &self.names())
            .finish()
    }
}

/// Strip trailing newlines before an equality check.
pub fn trim_trailing_newlines(contents: &str) -> &str {
    contents.trim_end_matches('\n')
}
