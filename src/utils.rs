/*!
 * Filesystem helpers shared by the dirprune tools
 */

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PruneError, Result};

/// Remove a directory tree, or just the link when `path` is a symlink.
///
/// Errors are never ignored; the caller decides whether to abort.
pub fn remove_tree(path: &Path) -> Result<()> {
    let remove = |path: &Path| -> std::io::Result<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    };

    remove(path).map_err(|source| PruneError::Remove {
        path: path.to_path_buf(),
        source,
    })
}

/// True if `child` is `parent` or lies inside it, after resolving symlinks.
///
/// `child` need not exist; its nearest existing ancestor is resolved and the
/// remaining components are appended.
pub fn is_within(child: &Path, parent: &Path) -> bool {
    let Ok(parent) = fs::canonicalize(parent) else {
        return false;
    };
    resolve_lenient(child).starts_with(parent)
}

/// Canonicalize as much of `path` as exists
fn resolve_lenient(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();

    loop {
        if let Ok(resolved) = fs::canonicalize(&existing) {
            return rest
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn remove_tree_deletes_nested_dirs() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("victim");
        fs::create_dir_all(target.join("a/b")).unwrap();
        File::create(target.join("a/b/f.bin")).unwrap();

        remove_tree(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn remove_tree_reports_missing_path() {
        let temp = tempdir().unwrap();
        let err = remove_tree(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, PruneError::Remove { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn remove_tree_only_unlinks_symlinks() {
        let temp = tempdir().unwrap();
        let real = temp.path().join("real");
        fs::create_dir(&real).unwrap();
        File::create(real.join("keep.txt")).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        remove_tree(&link).unwrap();
        assert!(!link.exists());
        assert!(real.join("keep.txt").exists());
    }

    #[test]
    fn is_within_detects_nested_and_outside_paths() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("target");
        fs::create_dir(&target).unwrap();

        assert!(is_within(&target.join("out.tar"), &target));
        assert!(is_within(&target.join("new/dir/out.tar"), &target));
        assert!(is_within(&target, &target));
        assert!(!is_within(&temp.path().join("out.tar"), &target));
        assert!(!is_within(&temp.path().join("target2/out.tar"), &target));
    }

    #[cfg(unix)]
    #[test]
    fn is_within_resolves_symlinks() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("target");
        fs::create_dir(&target).unwrap();
        let alias = temp.path().join("alias");
        std::os::unix::fs::symlink(&target, &alias).unwrap();

        assert!(is_within(&alias.join("out.tar"), &target));
    }
}
