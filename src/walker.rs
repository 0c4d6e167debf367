/*!
 * Loop-protected recursive directory traversal
 *
 * `SafeWalker` is a lazy, depth-first, parent-before-children iterator over
 * directories. After each visit the caller may name children that must not
 * be descended into; the walker applies that exclusion on the next step.
 */

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::types::{DirIdentity, DirVisit, VisitedSet};

/// A child directory of the most recent visit
#[derive(Debug)]
struct ChildDir {
    name: OsString,
    is_symlink: bool,
}

/// Children of the last yielded visit that are still waiting for descent
#[derive(Debug)]
struct Pending {
    parent: PathBuf,
    dirs: Vec<ChildDir>,
    pruned: HashSet<OsString>,
}

/// Recursive directory walker with optional symlink following
#[derive(Debug)]
pub struct SafeWalker {
    follow_symlinks: bool,
    stack: Vec<PathBuf>,
    visited: VisitedSet,
    pending: Option<Pending>,
}

impl SafeWalker {
    /// Start a traversal at `root`
    pub fn new(root: impl Into<PathBuf>, follow_symlinks: bool) -> Self {
        Self {
            follow_symlinks,
            stack: vec![root.into()],
            visited: VisitedSet::default(),
            pending: None,
        }
    }

    /// Skip descent into the named children of the most recent visit
    pub fn prune<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        if let Some(pending) = self.pending.as_mut() {
            pending
                .pruned
                .extend(names.into_iter().map(|n| n.as_ref().to_os_string()));
        }
    }

    /// Skip descent into every child of the most recent visit
    pub fn prune_all(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.dirs.clear();
        }
    }

    /// Number of distinct directories recorded for cycle detection
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Push the surviving children of the previous visit onto the stack
    fn descend_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        // Reverse so the first child by name is popped first
        for child in pending.dirs.into_iter().rev() {
            if pending.pruned.contains(&child.name) {
                continue;
            }
            if child.is_symlink && !self.follow_symlinks {
                continue;
            }
            self.stack.push(pending.parent.join(&child.name));
        }
    }
}

impl Iterator for SafeWalker {
    type Item = DirVisit;

    fn next(&mut self) -> Option<DirVisit> {
        self.descend_pending();

        while let Some(path) = self.stack.pop() {
            let meta = match metadata_for_path(&path, self.follow_symlinks) {
                Ok(meta) => meta,
                Err(e) => {
                    debug!("Skipping unreadable directory {}: {}", path.display(), e);
                    continue;
                }
            };

            let identity = dir_identity(&path, &meta);
            if self.follow_symlinks && !self.visited.insert(identity) {
                debug!("Directory already visited, not descending: {}", path.display());
                continue;
            }

            let (child_dirs, files) = list_children(&path);
            let dirs = child_dirs.iter().map(|c| c.name.clone()).collect();

            self.pending = Some(Pending {
                parent: path.clone(),
                dirs: child_dirs,
                pruned: HashSet::new(),
            });

            return Some(DirVisit {
                path,
                dirs,
                files,
                identity,
            });
        }

        None
    }
}

fn metadata_for_path(path: &Path, follow_symlinks: bool) -> io::Result<fs::Metadata> {
    if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}

#[cfg(unix)]
fn dir_identity(_path: &Path, meta: &fs::Metadata) -> DirIdentity {
    use std::os::unix::fs::MetadataExt;
    (meta.dev(), meta.ino())
}

#[cfg(not(unix))]
fn dir_identity(path: &Path, _meta: &fs::Metadata) -> DirIdentity {
    use std::hash::{DefaultHasher, Hash, Hasher};

    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    (0, hasher.finish())
}

/// List immediate children, split into directories and everything else.
///
/// A symlink counts as a directory when its target is one. An unreadable
/// directory simply has no children.
fn list_children(dir: &Path) -> (Vec<ChildDir>, Vec<OsString>) {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Cannot list entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let is_symlink = entry.path_is_symlink();
        let is_dir = if is_symlink {
            fs::metadata(entry.path()).map_or(false, |m| m.is_dir())
        } else {
            entry.file_type().is_dir()
        };

        if is_dir {
            dirs.push(ChildDir {
                name: entry.file_name().to_os_string(),
                is_symlink,
            });
        } else {
            files.push(entry.file_name().to_os_string());
        }
    }

    (dirs, files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn visited_paths(walker: SafeWalker, root: &Path) -> Vec<PathBuf> {
        walker
            .map(|v| v.path.strip_prefix(root).unwrap().to_path_buf())
            .collect()
    }

    #[test]
    fn walks_parent_before_children_in_name_order() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        File::create(root.join("a/file.txt")).unwrap();

        let paths = visited_paths(SafeWalker::new(root, false), root);
        assert_eq!(
            paths,
            vec![
                PathBuf::from(""),
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("b/inner"),
            ]
        );
    }

    #[test]
    fn splits_children_into_dirs_and_files() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("sub")).unwrap();
        File::create(root.join("one.txt")).unwrap();

        let visit = SafeWalker::new(root, false).next().unwrap();
        assert_eq!(visit.dirs, vec![OsString::from("sub")]);
        assert_eq!(visit.files, vec![OsString::from("one.txt")]);
        assert!(visit.has_dir("sub"));
    }

    #[test]
    fn prune_prevents_descent() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("keep/deep")).unwrap();
        fs::create_dir_all(root.join("skip/deep")).unwrap();

        let mut walker = SafeWalker::new(root, false);
        let mut seen = Vec::new();
        while let Some(visit) = walker.next() {
            if visit.has_dir("skip") {
                walker.prune(["skip"]);
            }
            seen.push(visit.path.strip_prefix(root).unwrap().to_path_buf());
        }

        assert!(seen.contains(&PathBuf::from("keep/deep")));
        assert!(!seen.iter().any(|p| p.starts_with("skip")));
    }

    #[test]
    fn prune_all_stops_at_current_level() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();

        let mut walker = SafeWalker::new(root, false);
        assert!(walker.next().is_some());
        walker.prune_all();
        assert!(walker.next().is_none());
    }

    #[test]
    fn missing_root_yields_nothing() {
        let temp = tempdir().unwrap();
        let mut walker = SafeWalker::new(temp.path().join("gone"), false);
        assert!(walker.next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn does_not_follow_symlinked_dirs_by_default() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let outside = tempdir().unwrap();
        fs::create_dir(outside.path().join("hidden")).unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

        let visits: Vec<DirVisit> = SafeWalker::new(root, false).collect();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].dirs, vec![OsString::from("link")]);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_terminates_and_visits_each_dir_once() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        std::os::unix::fs::symlink(root, root.join("a/b/back")).unwrap();
        std::os::unix::fs::symlink(root.join("a"), root.join("loop_a")).unwrap();

        let mut walker = SafeWalker::new(root, true);
        let mut identities = Vec::new();
        for visit in walker.by_ref() {
            identities.push(visit.identity);
        }

        // root, a, a/b are the only real directories
        assert_eq!(identities.len(), 3);
        let unique: HashSet<_> = identities.iter().collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(walker.visited_count(), 3);
    }
}
