/*!
 * Reporting functionality for dirprune
 *
 * Every tool reports each kept, deleted or would-delete path as a plain
 * line while it runs, then prints a summary table rendered with `tabled`.
 */

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::types::{Manifest, Mode};

/// Summary of one tool run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Tool name shown in the table
    pub tool: &'static str,
    /// Dry-run or execute
    pub mode: Mode,
    /// Directory the tool operated on
    pub root: PathBuf,
    /// Paths matched (deleted, or that would be deleted)
    pub matched: usize,
    /// Paths that had vanished before they could be deleted
    pub already_gone: usize,
    /// Published archive, if any
    pub archive: Option<PathBuf>,
    /// Wall time of the run
    pub duration: Duration,
}

/// Format of the report output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Lines plus a console summary table
    ConsoleTable,
    /// No output at all (library use and tests)
    Quiet,
}

/// Reporter for tool progress and results
pub struct Reporter {
    format: ReportFormat,
    #[cfg(test)]
    before_removal: Option<Box<dyn Fn(&Path)>>,
}

impl Reporter {
    /// Create a new reporter
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            #[cfg(test)]
            before_removal: None,
        }
    }

    /// Run `hook` on every path right after its removal is announced
    #[cfg(test)]
    pub(crate) fn before_removal(mut self, hook: impl Fn(&Path) + 'static) -> Self {
        self.before_removal = Some(Box::new(hook));
        self
    }

    /// Reporter that prints nothing
    pub fn quiet() -> Self {
        Self::new(ReportFormat::Quiet)
    }

    fn line(&self, text: impl AsRef<str>) {
        if self.format == ReportFormat::ConsoleTable {
            println!("{}", text.as_ref());
        }
    }

    /// A `checkpoints` directory is about to be pruned
    pub fn checkpoint_dir(&self, path: &Path) {
        self.line(format!("\nIn: {}", path.display()));
    }

    /// A directory is kept
    pub fn kept(&self, path: &Path, modified: SystemTime) {
        self.line(format!(
            "Keeping:  {}  (mtime={})",
            path.display(),
            format_mtime(modified)
        ));
    }

    /// A directory is deleted, or would be in dry-run mode
    pub fn removal(&self, mode: Mode, path: &Path, modified: Option<SystemTime>) {
        let verb = if mode.is_dry_run() {
            "Would delete:"
        } else {
            "Deleting:"
        };
        let line = match modified {
            Some(m) => format!("{} {}  (mtime={})", verb, path.display(), format_mtime(m)),
            None => format!("{} {}", verb, path.display()),
        };
        self.line(line);

        #[cfg(test)]
        if let Some(hook) = &self.before_removal {
            hook(path);
        }
    }

    /// Nothing matched the cutoff
    pub fn nothing_to_archive(&self, cutoff: &str, root: &Path) {
        self.line(format!(
            "No files older than '{}' found in '{}'. Nothing to do.",
            cutoff,
            root.display()
        ));
    }

    /// Manifest has been collected
    pub fn manifest_found(&self, manifest: &Manifest, cutoff: &str) {
        self.line(format!(
            "Found {} file(s) in '{}' with mtime <= '{}'",
            manifest.len(),
            manifest.root().display(),
            cutoff
        ));
    }

    /// Dry-run listing of everything that would be archived and deleted
    pub fn manifest_listing(&self, manifest: &Manifest, archive: &Path) {
        self.line(format!("[DRY-RUN] Would archive to: {}", archive.display()));
        self.line("[DRY-RUN] Files that would be archived and deleted:");
        for path in manifest.paths() {
            self.line(path.display().to_string());
        }
    }

    pub fn archiving_into(&self, archive: &Path) {
        self.line(format!("Archiving into: {}", archive.display()));
    }

    pub fn archive_verified(&self, count: usize) {
        self.line(format!(
            "Archive created and verified successfully ({} files). Now deleting the archived files...",
            count
        ));
    }

    /// Generate the summary table for a run
    pub fn generate_summary(&self, summary: &RunSummary) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: String,

            #[tabled(rename = "Value")]
            value: String,
        }

        let (mode, verb) = if summary.mode.is_dry_run() {
            ("dry run", "Would delete")
        } else {
            ("execute", "Deleted")
        };

        let mut rows = vec![
            SummaryRow {
                key: "Tool".to_string(),
                value: summary.tool.to_string(),
            },
            SummaryRow {
                key: "Mode".to_string(),
                value: mode.to_string(),
            },
            SummaryRow {
                key: "Root".to_string(),
                value: summary.root.display().to_string(),
            },
            SummaryRow {
                key: verb.to_string(),
                value: summary.matched.to_string(),
            },
        ];

        if summary.already_gone > 0 {
            rows.push(SummaryRow {
                key: "Already gone".to_string(),
                value: summary.already_gone.to_string(),
            });
        }

        if let Some(archive) = &summary.archive {
            rows.push(SummaryRow {
                key: "Archive".to_string(),
                value: archive.display().to_string(),
            });
        }

        rows.push(SummaryRow {
            key: "Process Time".to_string(),
            value: format!("{:.4?}", summary.duration),
        });

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    /// Print the closing line and summary table
    pub fn print_summary(&self, summary: &RunSummary) {
        if self.format == ReportFormat::Quiet {
            return;
        }

        let closing = if summary.mode.is_dry_run() {
            "Dry run complete."
        } else {
            "Done."
        };
        println!("\n{}\n{}", closing, self.generate_summary(summary));
    }
}

/// Render a modification time in local time
pub fn format_mtime(modified: SystemTime) -> String {
    let local: DateTime<Local> = modified.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(mode: Mode, archive: Option<PathBuf>) -> RunSummary {
        RunSummary {
            tool: "checkpoints",
            mode,
            root: PathBuf::from("/data/runs"),
            matched: 7,
            already_gone: 0,
            archive,
            duration: Duration::from_millis(12),
        }
    }

    #[test]
    fn dry_run_summary_says_would_delete() {
        let reporter = Reporter::quiet();
        let table = reporter.generate_summary(&summary(Mode::DryRun, None));
        assert!(table.contains("Would delete"));
        assert!(table.contains("dry run"));
        assert!(table.contains("/data/runs"));
        assert!(!table.contains("Archive"));
    }

    #[test]
    fn execute_summary_lists_archive() {
        let reporter = Reporter::quiet();
        let table = reporter.generate_summary(&summary(
            Mode::Execute,
            Some(PathBuf::from("/backups/old.tar")),
        ));
        assert!(table.contains("Deleted"));
        assert!(table.contains("/backups/old.tar"));
        assert!(table.contains('7'));
        assert!(!table.contains("Already gone"));
    }

    #[test]
    fn already_gone_files_get_their_own_row() {
        let reporter = Reporter::quiet();
        let mut run = summary(Mode::Execute, Some(PathBuf::from("/backups/old.tar")));
        run.matched = 5;
        run.already_gone = 2;
        let table = reporter.generate_summary(&run);

        let deleted = table.lines().find(|l| l.contains("Deleted")).unwrap();
        assert!(deleted.contains('5'));
        let gone = table.lines().find(|l| l.contains("Already gone")).unwrap();
        assert!(gone.contains('2'));
    }

    #[test]
    fn mtime_uses_fixed_layout() {
        let text = format_mtime(SystemTime::now());
        assert_eq!(text.len(), "2025-12-01 00:00:00".len());
    }
}
