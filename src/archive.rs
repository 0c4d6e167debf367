/*!
 * Archive-then-delete of files older than a cutoff
 *
 * The pipeline is strictly sequential and fails closed:
 *
 * 1. collect every regular file with mtime <= cutoff into a frozen manifest
 * 2. write the manifest into a tar stream at a temp path next to the destination
 * 3. reopen the temp archive and check its member count
 * 4. atomically rename the temp archive onto the destination
 * 5. delete the originals listed in the manifest
 *
 * Nothing is deleted unless steps 2-4 succeed. A crash leaves either the
 * originals untouched or a complete, verified archive in place.
 */

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indicatif::ProgressBar;
use log::{debug, info, warn};

use crate::config::ArchiveConfig;
use crate::ensure;
use crate::error::{PruneError, Result, ResultExt};
use crate::report::Reporter;
use crate::types::{ArchiveStage, FileEntry, Manifest};
use crate::utils::is_within;
use crate::walker::SafeWalker;

/// Container format used to store the manifest
pub trait ArchiveFormat {
    /// Write every manifest entry into `out`, returning how many were written.
    ///
    /// Entries are named by their path relative to the manifest root.
    fn write(&self, out: &mut File, manifest: &Manifest, progress: &ProgressBar) -> Result<usize>;

    /// Count the members stored in the archive at `path`
    fn count_members(&self, path: &Path) -> Result<usize>;
}

/// Uncompressed tar container
#[derive(Debug, Clone, Copy, Default)]
pub struct TarFormat;

impl ArchiveFormat for TarFormat {
    fn write(&self, out: &mut File, manifest: &Manifest, progress: &ProgressBar) -> Result<usize> {
        let mut builder = tar::Builder::new(out);
        let mut written = 0;

        for entry in manifest.entries() {
            let rel = entry
                .path
                .strip_prefix(manifest.root())
                .at_stage(ArchiveStage::Archiving, || {
                    format!("{} is outside the target", entry.path.display())
                })?;
            builder
                .append_path_with_name(&entry.path, rel)
                .at_stage(ArchiveStage::Archiving, || {
                    format!("adding {}", entry.path.display())
                })?;
            written += 1;
            progress.inc(1);
        }

        builder
            .into_inner()
            .at_stage(ArchiveStage::Archiving, || "finishing tar stream")?;
        Ok(written)
    }

    fn count_members(&self, path: &Path) -> Result<usize> {
        let file = File::open(path).at_stage(ArchiveStage::Verifying, || {
            format!("opening {}", path.display())
        })?;
        let mut archive = tar::Archive::new(file);
        let entries = archive
            .entries()
            .at_stage(ArchiveStage::Verifying, || "reading tar header")?;

        let mut count = 0;
        for entry in entries {
            entry.at_stage(ArchiveStage::Verifying, || {
                format!("reading member {}", count + 1)
            })?;
            count += 1;
        }
        Ok(count)
    }
}

/// Result of a completed (or dry) run
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    /// Last stage reached: `Collected` for dry runs, otherwise `Done`
    pub stage: ArchiveStage,
    /// Files selected for archiving
    pub manifest: Manifest,
    /// Members verified in the published archive
    pub archived: usize,
    /// Originals deleted by this run
    pub deleted: usize,
    /// Originals that were already gone at delete time
    pub already_gone: usize,
    /// Published archive, if one was written
    pub archive: Option<PathBuf>,
}

impl ArchiveOutcome {
    fn stopped(stage: ArchiveStage, manifest: Manifest) -> Self {
        Self {
            stage,
            manifest,
            archived: 0,
            deleted: 0,
            already_gone: 0,
            archive: None,
        }
    }
}

/// Archive old files into a tar, verify it, publish it, then delete the originals
pub struct ArchiveAndPurge<'a, F = TarFormat> {
    config: ArchiveConfig,
    format: F,
    reporter: &'a Reporter,
    progress: ProgressBar,
    stage: ArchiveStage,
}

impl<'a> ArchiveAndPurge<'a, TarFormat> {
    pub fn new(config: ArchiveConfig, reporter: &'a Reporter) -> Self {
        Self {
            config,
            format: TarFormat,
            reporter,
            progress: ProgressBar::hidden(),
            stage: ArchiveStage::Scanning,
        }
    }
}

impl<'a, F: ArchiveFormat> ArchiveAndPurge<'a, F> {
    /// Use a different container writer
    pub fn with_format<G: ArchiveFormat>(self, format: G) -> ArchiveAndPurge<'a, G> {
        ArchiveAndPurge {
            config: self.config,
            format,
            reporter: self.reporter,
            progress: self.progress,
            stage: self.stage,
        }
    }

    /// Show archiving progress on the given bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Stage the pipeline is in (or stopped at)
    pub fn stage(&self) -> ArchiveStage {
        self.stage
    }

    /// Run the whole pipeline.
    ///
    /// On error the stage becomes `Aborted`; if the failure happened before
    /// publishing, no original file was deleted and the temp archive is gone.
    pub fn run(&mut self) -> Result<ArchiveOutcome> {
        match self.run_stages() {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Archive run aborted while {}: {}", self.stage, e);
                self.progress.finish_and_clear();
                self.enter(ArchiveStage::Aborted);
                Err(e)
            }
        }
    }

    fn enter(&mut self, stage: ArchiveStage) {
        debug!("Archive stage {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn run_stages(&mut self) -> Result<ArchiveOutcome> {
        let target = self.config.target_dir.clone();
        let archive_path = self.config.archive_path.clone();

        ensure!(
            !is_within(&archive_path, &target),
            InvalidArgument,
            "archive must NOT be created inside the target directory (archive: {}, target: {})",
            archive_path.display(),
            target.display()
        );

        self.enter(ArchiveStage::Scanning);
        let mut manifest = collect_files(&target, self.config.cutoff, self.config.follow_symlinks);
        if self.config.follow_symlinks {
            manifest = without_archive_outputs(manifest, &archive_path);
        }
        self.enter(ArchiveStage::Collected);

        if manifest.is_empty() {
            self.reporter
                .nothing_to_archive(&self.config.cutoff_label, &target);
            self.enter(ArchiveStage::Done);
            return Ok(ArchiveOutcome::stopped(ArchiveStage::Done, manifest));
        }

        self.reporter
            .manifest_found(&manifest, &self.config.cutoff_label);

        if self.config.mode.is_dry_run() {
            self.reporter.manifest_listing(&manifest, &archive_path);
            return Ok(ArchiveOutcome::stopped(ArchiveStage::Collected, manifest));
        }

        self.enter(ArchiveStage::Archiving);
        self.reporter.archiving_into(&archive_path);
        let (temp, written) = self.write_temp_archive(&manifest, &archive_path)?;

        self.enter(ArchiveStage::Verifying);
        let archived = self.verify(temp.path(), manifest.len(), written)?;

        self.enter(ArchiveStage::Publishing);
        temp.persist(&archive_path)
            .at_stage(ArchiveStage::Publishing, || {
                format!("moving archive into {}", archive_path.display())
            })?;
        info!("Published {} ({} files)", archive_path.display(), archived);
        self.reporter.archive_verified(archived);

        self.enter(ArchiveStage::Deleting);
        let (deleted, already_gone) = delete_files(&manifest)?;

        self.enter(ArchiveStage::Done);
        Ok(ArchiveOutcome {
            stage: ArchiveStage::Done,
            manifest,
            archived,
            deleted,
            already_gone,
            archive: Some(archive_path),
        })
    }

    /// Write the manifest to `<archive-name>.XXXXXX.tmp` beside the destination.
    ///
    /// The temp file is removed when the returned handle is dropped unpersisted.
    fn write_temp_archive(
        &self,
        manifest: &Manifest,
        archive_path: &Path,
    ) -> Result<(tempfile::NamedTempFile, usize)> {
        let (Some(parent), Some(name)) = (archive_path.parent(), archive_path.file_name()) else {
            return Err(PruneError::Archive {
                stage: ArchiveStage::Archiving,
                message: format!("invalid archive path {}", archive_path.display()),
            });
        };

        let prefix = format!("{}.", name.to_string_lossy());
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(parent)
            .at_stage(ArchiveStage::Archiving, || {
                format!("creating temp archive in {}", parent.display())
            })?;
        debug!("Writing temp archive {}", temp.path().display());

        self.progress.set_length(manifest.len() as u64);
        let written = self
            .format
            .write(temp.as_file_mut(), manifest, &self.progress)?;
        temp.as_file()
            .sync_all()
            .at_stage(ArchiveStage::Archiving, || "syncing temp archive")?;
        self.progress.finish_and_clear();

        Ok((temp, written))
    }

    fn verify(&self, path: &Path, expected: usize, written: usize) -> Result<usize> {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(PruneError::Archive {
                stage: ArchiveStage::Verifying,
                message: format!(
                    "archive {} was not created or is empty",
                    path.display()
                ),
            });
        }

        let found = self.format.count_members(path)?;
        if found != expected || found != written {
            return Err(PruneError::Verification {
                archive: path.to_path_buf(),
                expected,
                written,
                found,
            });
        }
        Ok(found)
    }
}

/// Collect every regular file under `root` with mtime <= `cutoff`.
///
/// Symlinked files are never selected. Files that cannot be stat'ed are
/// skipped.
pub fn collect_files(root: &Path, cutoff: SystemTime, follow_symlinks: bool) -> Manifest {
    let mut entries = Vec::new();

    for visit in SafeWalker::new(root, follow_symlinks) {
        for name in &visit.files {
            let Some(entry) = file_entry(&visit.path.join(name)) else {
                continue;
            };
            if entry.is_regular && entry.modified <= cutoff {
                entries.push(entry);
            }
        }
    }

    Manifest::new(root, entries)
}

/// Drop files that resolve to the destination archive or one of its temp files.
///
/// The destination is never inside the target, so such files can only be
/// reached through a followed directory symlink.
fn without_archive_outputs(manifest: Manifest, archive_path: &Path) -> Manifest {
    let (Some(parent), Some(name)) = (archive_path.parent(), archive_path.file_name()) else {
        return manifest;
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let Ok(parent) = fs::canonicalize(parent) else {
        return manifest;
    };
    let name = name.to_string_lossy();
    let temp_prefix = format!("{}.", name);

    let entries = manifest
        .entries()
        .iter()
        .filter(|entry| {
            let Ok(resolved) = fs::canonicalize(&entry.path) else {
                return true;
            };
            let is_output = resolved.parent() == Some(parent.as_path())
                && resolved.file_name().map_or(false, |f| {
                    let f = f.to_string_lossy();
                    f == name || (f.starts_with(&temp_prefix) && f.ends_with(".tmp"))
                });
            if is_output {
                warn!(
                    "Skipping {}: it resolves to the archive destination",
                    entry.path.display()
                );
            }
            !is_output
        })
        .cloned()
        .collect();

    Manifest::new(manifest.root(), entries)
}

/// Stat a file without following symlinks
pub fn file_entry(path: &Path) -> Option<FileEntry> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) => {
            debug!("Cannot stat {}: {}", path.display(), e);
            return None;
        }
    };

    Some(FileEntry {
        path: path.to_path_buf(),
        modified: meta.modified().ok()?,
        is_regular: meta.file_type().is_file(),
    })
}

/// Delete every manifest file; a file already gone counts as deleted.
///
/// Returns `(deleted, already_gone)`.
fn delete_files(manifest: &Manifest) -> Result<(usize, usize)> {
    let mut deleted = 0;
    let mut already_gone = 0;

    for path in manifest.paths() {
        match fs::remove_file(path) {
            Ok(()) => deleted += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Already gone: {}", path.display());
                already_gone += 1;
            }
            Err(source) => {
                return Err(PruneError::Remove {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    Ok((deleted, already_gone))
}
