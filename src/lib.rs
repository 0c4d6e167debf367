/*!
 * dirprune - maintenance tools for experiment directory trees
 *
 * Prunes stale checkpoint subdirectories, removes cache directories by
 * name, and archives-then-deletes files older than a cutoff. Every tool
 * is a dry run unless explicitly switched to execute mode.
 */

pub mod archive;
pub mod checkpoints;
pub mod config;
pub mod error;
pub mod named;
pub mod report;
pub mod types;
pub mod utils;
pub mod walker;


// Re-export main components for easier access
pub use archive::{ArchiveAndPurge, ArchiveFormat, ArchiveOutcome, TarFormat};
pub use checkpoints::CheckpointPruner;
pub use config::{ArchiveConfig, NameMatchConfig, PruneConfig};
pub use error::{PruneError, Result};
pub use named::NameMatchPruner;
pub use report::{ReportFormat, Reporter, RunSummary};
pub use types::{ArchiveStage, DirVisit, FileEntry, Manifest, Mode};
pub use walker::SafeWalker;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
