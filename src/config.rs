/*!
 * Configuration handling for dirprune
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Local, NaiveDateTime, TimeZone};
use clap::{Args as ClapArgs, Parser, Subcommand};
use clap_complete::Shell;

use crate::error::Result;
use crate::named::DEFAULT_TARGET_NAME;
use crate::types::Mode;
use crate::utils::is_within;
use crate::{bail, ensure};

/// Layout of the archive cutoff timestamp (local time)
pub const CUTOFF_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Command-line arguments for dirprune
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "dirprune",
    version = env!("CARGO_PKG_VERSION"),
    about = "Prune stale checkpoint and cache directories, and archive-then-delete old files",
    long_about = "Maintenance tools for experiment trees. Every tool is a dry run unless --execute is given."
)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Option<Command>,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Delete every subdirectory of each 'checkpoints' directory except the newest (by mtime)
    Checkpoints(PruneArgs),

    /// Recursively delete directories with a given name
    Named(NamedArgs),

    /// Archive (tar) and then delete files with mtime <= cutoff timestamp
    Archive(ArchiveArgs),
}

/// Arguments shared by the directory pruning tools
#[derive(ClapArgs, Debug, Clone)]
pub struct PruneArgs {
    /// Root directory to traverse
    pub root: PathBuf,

    /// Actually delete (default: dry-run)
    #[clap(long)]
    pub execute: bool,

    /// Follow directory symlinks (loop-protected)
    #[clap(long)]
    pub follow_symlinks: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct NamedArgs {
    #[clap(flatten)]
    pub prune: PruneArgs,

    /// Directory name to delete
    #[clap(long, default_value = DEFAULT_TARGET_NAME)]
    pub name: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ArchiveArgs {
    /// Target directory to scan
    pub directory: PathBuf,

    /// Cutoff timestamp, e.g. "2025-12-01 00:00:00"
    pub cutoff_timestamp: String,

    /// Path to output .tar file (must be outside target directory)
    pub archive_tar: PathBuf,

    /// Actually archive and delete (default: dry-run)
    #[clap(long)]
    pub execute: bool,

    /// Follow directory symlinks while collecting files (loop-protected)
    ///
    /// Files reached through a linked directory are archived and then deleted
    /// at their real location, even outside DIRECTORY. The destination
    /// archive and its temp files are always skipped.
    #[clap(long)]
    pub follow_symlinks: bool,
}

/// Validated configuration for a directory pruning tool
#[derive(Clone, Debug)]
pub struct PruneConfig {
    /// Absolute root directory
    pub root: PathBuf,

    pub mode: Mode,

    pub follow_symlinks: bool,
}

impl PruneConfig {
    /// Create configuration from command-line arguments
    pub fn from_args(args: PruneArgs) -> Result<Self> {
        let root = resolve_dir(&args.root)?;
        Ok(Self {
            root,
            mode: Mode::from_execute(args.execute),
            follow_symlinks: args.follow_symlinks,
        })
    }
}

/// Validated configuration for the name-match pruner
#[derive(Clone, Debug)]
pub struct NameMatchConfig {
    pub prune: PruneConfig,

    /// Directory name to remove
    pub name: String,
}

impl NameMatchConfig {
    pub fn from_args(args: NamedArgs) -> Result<Self> {
        ensure!(
            !args.name.is_empty()
                && !args.name.contains(|c| c == '/' || c == '\\')
                && args.name != "."
                && args.name != "..",
            InvalidArgument,
            "'{}' is not a plain directory name",
            args.name
        );

        Ok(Self {
            prune: PruneConfig::from_args(args.prune)?,
            name: args.name,
        })
    }
}

/// Validated configuration for the archive tool
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    /// Absolute target directory
    pub target_dir: PathBuf,

    /// Absolute destination archive path
    pub archive_path: PathBuf,

    /// Files modified at or before this instant are archived
    pub cutoff: SystemTime,

    /// Cutoff as the user typed it, for messages
    pub cutoff_label: String,

    pub mode: Mode,

    pub follow_symlinks: bool,
}

impl ArchiveConfig {
    /// Create configuration from command-line arguments.
    ///
    /// Every check here runs before the target directory is scanned.
    pub fn from_args(args: ArchiveArgs) -> Result<Self> {
        let target_dir = resolve_dir(&args.directory)?;

        let file_name = match args.archive_tar.file_name() {
            Some(name) => name.to_os_string(),
            None => bail!(
                InvalidArgument,
                "'{}' is not a file path",
                args.archive_tar.display()
            ),
        };
        let parent = match args.archive_tar.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure!(
            parent.is_dir(),
            PathNotFound,
            "Archive directory '{}' does not exist",
            parent.display()
        );
        let archive_path = fs::canonicalize(&parent)?.join(file_name);

        ensure!(
            !is_within(&archive_path, &target_dir),
            InvalidArgument,
            "archive must NOT be created inside the target directory (archive: {}, target: {})",
            archive_path.display(),
            target_dir.display()
        );

        let cutoff = parse_cutoff(&args.cutoff_timestamp)?;

        Ok(Self {
            target_dir,
            archive_path,
            cutoff,
            cutoff_label: args.cutoff_timestamp,
            mode: Mode::from_execute(args.execute),
            follow_symlinks: args.follow_symlinks,
        })
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` local timestamp.
///
/// Ambiguous local times (DST fold) resolve to the earlier instant;
/// times skipped by a DST gap are rejected.
pub fn parse_cutoff(ts: &str) -> Result<SystemTime> {
    let naive = match NaiveDateTime::parse_from_str(ts, CUTOFF_FORMAT) {
        Ok(naive) => naive,
        Err(_) => bail!(
            InvalidArgument,
            "Invalid cutoff timestamp '{}'. Expected 'YYYY-MM-DD HH:MM:SS'.",
            ts
        ),
    };

    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => Ok(local.into()),
        None => bail!(
            InvalidArgument,
            "Cutoff timestamp '{}' does not exist in the local time zone",
            ts
        ),
    }
}

fn resolve_dir(path: &Path) -> Result<PathBuf> {
    ensure!(
        path.is_dir(),
        InvalidArgument,
        "'{}' is not a directory",
        path.display()
    );
    Ok(fs::canonicalize(path)?)
}
