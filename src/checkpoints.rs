/*!
 * Pruning of experiment checkpoint directories
 *
 * Every directory named `checkpoints` found under the root keeps only its
 * newest immediate subdirectory (by modification time); all siblings are
 * removed. The walker never descends into a `checkpoints` directory.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, info};
use walkdir::WalkDir;

use crate::config::PruneConfig;
use crate::error::Result;
use crate::report::Reporter;
use crate::utils::remove_tree;
use crate::walker::SafeWalker;

/// Name of the directories whose children get pruned
pub const CHECKPOINTS_DIR: &str = "checkpoints";

/// An immediate subdirectory of a `checkpoints` directory
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub path: PathBuf,
    pub name: String,
    pub modified: SystemTime,
}

/// Keeps the newest checkpoint in every `checkpoints` directory
pub struct CheckpointPruner<'a> {
    config: PruneConfig,
    reporter: &'a Reporter,
}

impl<'a> CheckpointPruner<'a> {
    pub fn new(config: PruneConfig, reporter: &'a Reporter) -> Self {
        Self { config, reporter }
    }

    /// Walk the root and prune every `checkpoints` directory.
    ///
    /// Returns the number of directories deleted, or that would be deleted
    /// in dry-run mode. The first failed deletion aborts the run.
    pub fn run(&self) -> Result<usize> {
        let mut walker = SafeWalker::new(&self.config.root, self.config.follow_symlinks);
        let mut deleted = 0;

        while let Some(visit) = walker.next() {
            if !visit.has_dir(CHECKPOINTS_DIR) {
                continue;
            }
            walker.prune([CHECKPOINTS_DIR]);

            let ckpt_dir = visit.path.join(CHECKPOINTS_DIR);
            if !ckpt_dir.is_dir() {
                debug!("Not a directory, skipping: {}", ckpt_dir.display());
                continue;
            }

            deleted += self.prune_dir(&ckpt_dir)?;
        }

        Ok(deleted)
    }

    fn prune_dir(&self, ckpt_dir: &Path) -> Result<usize> {
        let checkpoints = list_checkpoints(ckpt_dir);
        let Some(keep) = newest(&checkpoints) else {
            return Ok(0);
        };
        if checkpoints.len() <= 1 {
            debug!("Nothing to prune in {}", ckpt_dir.display());
            return Ok(0);
        }

        self.reporter.checkpoint_dir(ckpt_dir);
        self.reporter.kept(&keep.path, keep.modified);

        let mut deleted = 0;
        for ckpt in checkpoints.iter().filter(|c| c.path != keep.path) {
            self.reporter
                .removal(self.config.mode, &ckpt.path, Some(ckpt.modified));
            if !self.config.mode.is_dry_run() {
                remove_tree(&ckpt.path)?;
                info!("Removed checkpoint {}", ckpt.path.display());
            }
            deleted += 1;
        }

        Ok(deleted)
    }
}

/// Immediate subdirectories of `dir` with their modification times.
///
/// Entries that vanish or cannot be stat'ed are left out.
pub fn list_checkpoints(dir: &Path) -> Vec<Checkpoint> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Cannot list entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter_map(|entry| {
            let meta = fs::metadata(entry.path()).ok()?;
            if !meta.is_dir() {
                return None;
            }
            Some(Checkpoint {
                path: entry.path().to_path_buf(),
                name: entry.file_name().to_string_lossy().into_owned(),
                modified: meta.modified().ok()?,
            })
        })
        .collect()
}

/// The checkpoint with the latest mtime; equal mtimes go to the largest name
pub fn newest(checkpoints: &[Checkpoint]) -> Option<&Checkpoint> {
    checkpoints.iter().max_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.name.cmp(&b.name))
    })
}
