/*!
 * Removal of directories by name
 */

use std::ffi::OsString;

use log::info;

use crate::config::NameMatchConfig;
use crate::error::Result;
use crate::report::Reporter;
use crate::utils::remove_tree;
use crate::walker::SafeWalker;

/// Directory name removed when none is given
pub const DEFAULT_TARGET_NAME: &str = "wandb";

/// Deletes every directory whose name equals the configured target
pub struct NameMatchPruner<'a> {
    config: NameMatchConfig,
    reporter: &'a Reporter,
}

impl<'a> NameMatchPruner<'a> {
    pub fn new(config: NameMatchConfig, reporter: &'a Reporter) -> Self {
        Self { config, reporter }
    }

    /// Walk the root and remove matching directories without entering them.
    ///
    /// Returns the number matched (dry run) or deleted (execute).
    pub fn run(&self) -> Result<usize> {
        let prune = &self.config.prune;
        let mut walker = SafeWalker::new(&prune.root, prune.follow_symlinks);
        let mut deleted = 0;

        while let Some(visit) = walker.next() {
            let matches: Vec<&OsString> = visit
                .dirs
                .iter()
                .filter(|d| d.as_os_str() == self.config.name.as_str())
                .collect();
            if matches.is_empty() {
                continue;
            }
            walker.prune(&matches);

            for name in matches {
                let target = visit.path.join(name);
                self.reporter.removal(prune.mode, &target, None);
                if !prune.mode.is_dry_run() {
                    remove_tree(&target)?;
                    info!("Removed {}", target.display());
                }
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}
