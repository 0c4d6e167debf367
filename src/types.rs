/*!
 * Core types and data structures shared by the dirprune tools
 */

use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Whether a tool only reports or actually mutates the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Report what would happen (default)
    #[default]
    DryRun,
    /// Perform deletions and archive writes
    Execute,
}

impl Mode {
    /// Build a mode from the `--execute` switch
    pub fn from_execute(execute: bool) -> Self {
        if execute {
            Self::Execute
        } else {
            Self::DryRun
        }
    }

    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }
}

/// Device + inode pair identifying a directory on disk
pub type DirIdentity = (u64, u64);

/// One directory visited by the walker
#[derive(Debug, Clone)]
pub struct DirVisit {
    /// Absolute path of the directory
    pub path: PathBuf,
    /// Names of child directories (symlinks to directories included)
    pub dirs: Vec<OsString>,
    /// Names of every other child entry
    pub files: Vec<OsString>,
    /// Device and inode of the directory
    pub identity: DirIdentity,
}

impl DirVisit {
    /// Whether a child directory with this name exists
    pub fn has_dir(&self, name: &str) -> bool {
        self.dirs.iter().any(|d| d == name)
    }
}

/// Directory identities seen during a single traversal
#[derive(Debug, Default)]
pub(crate) struct VisitedSet {
    seen: HashSet<DirIdentity>,
}

impl VisitedSet {
    /// Record an identity; returns false if it was already present
    pub(crate) fn insert(&mut self, identity: DirIdentity) -> bool {
        self.seen.insert(identity)
    }

    pub(crate) fn len(&self) -> usize {
        self.seen.len()
    }
}

/// A file found while scanning for archive candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Last modification time
    pub modified: SystemTime,
    /// Whether the entry is a regular file (not following symlinks)
    pub is_regular: bool,
}

/// Files selected for archiving, frozen before any mutation
#[derive(Debug, Clone)]
pub struct Manifest {
    root: PathBuf,
    entries: Vec<FileEntry>,
}

impl Manifest {
    /// Freeze a list of entries collected under `root`
    pub fn new(root: impl Into<PathBuf>, entries: Vec<FileEntry>) -> Self {
        Self {
            root: root.into(),
            entries,
        }
    }

    /// Directory every entry is relative to
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths of every entry, in collection order
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }
}

/// Stages of the archive-then-delete pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStage {
    Scanning,
    Collected,
    Archiving,
    Verifying,
    Publishing,
    Deleting,
    Done,
    Aborted,
}

impl ArchiveStage {
    /// True for stages in which no original file has been deleted yet
    pub fn is_before_publish(self) -> bool {
        matches!(
            self,
            Self::Scanning | Self::Collected | Self::Archiving | Self::Verifying | Self::Publishing
        )
    }
}

impl fmt::Display for ArchiveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scanning => "scanning",
            Self::Collected => "collected",
            Self::Archiving => "archiving",
            Self::Verifying => "verifying",
            Self::Publishing => "publishing",
            Self::Deleting => "deleting",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}
