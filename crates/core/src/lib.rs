//! mirrorcheck core library.
//!
//! Compares the same logical file across two version-controlled trees (for
//! example a development repository and its distribution mirror), classifies
//! whether the copies are in sync, and when they are not, finds the most
//! recent revision pair with identical content and how far each side has
//! moved since.

pub mod comparator;
pub mod config;
pub mod errors;
pub mod exec;
pub mod models;
pub mod repo;
pub mod resolver;
pub mod transform;

// Re-exports for convenience.
pub use comparator::Comparator;
pub use config::AppConfig;
pub use errors::CoreError;
pub use models::{Commit, ComparisonResult, FilePair, SideInfo, SyncStatus};
pub use repo::{open_repository, Repository};
