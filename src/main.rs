/*!
 * Command-line interface for dirprune
 */

use std::io;
use std::process::ExitCode;
use std::time::Instant;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use indicatif::{ProgressBar, ProgressStyle};

use dirprune::archive::ArchiveAndPurge;
use dirprune::checkpoints::CheckpointPruner;
use dirprune::config::{ArchiveConfig, Args, Command, NameMatchConfig, PruneConfig};
use dirprune::error::Result;
use dirprune::named::NameMatchPruner;
use dirprune::report::{ReportFormat, Reporter, RunSummary};

fn main() -> ExitCode {
    let args = Args::parse();

    init_logger(args.verbose);

    if let Some(shell) = args.generate {
        generate(shell, &mut Args::command(), "dirprune", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let Some(command) = args.command else {
        let _ = Args::command().print_help();
        return ExitCode::from(2);
    };

    let reporter = Reporter::new(ReportFormat::ConsoleTable);
    match run(command, &reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_before_publish() {
                eprintln!("No files will be deleted.");
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Log to stderr; `-v` flags raise the default level, `RUST_LOG` overrides it
fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(command: Command, reporter: &Reporter) -> Result<()> {
    let start_time = Instant::now();

    let summary = match command {
        Command::Checkpoints(args) => {
            let config = PruneConfig::from_args(args)?;
            let deleted = CheckpointPruner::new(config.clone(), reporter).run()?;
            RunSummary {
                tool: "checkpoints",
                mode: config.mode,
                root: config.root,
                matched: deleted,
                already_gone: 0,
                archive: None,
                duration: start_time.elapsed(),
            }
        }
        Command::Named(args) => {
            let config = NameMatchConfig::from_args(args)?;
            let deleted = NameMatchPruner::new(config.clone(), reporter).run()?;
            RunSummary {
                tool: "named",
                mode: config.prune.mode,
                root: config.prune.root,
                matched: deleted,
                already_gone: 0,
                archive: None,
                duration: start_time.elapsed(),
            }
        }
        Command::Archive(args) => {
            let config = ArchiveConfig::from_args(args)?;

            let progress = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix:.bold.cyan} {wide_bar} {pos}/{len} ({percent}%) Elapsed: {elapsed_precise}")
            {
                progress.set_style(style);
            }
            progress.set_prefix("Archiving");

            let outcome = ArchiveAndPurge::new(config.clone(), reporter)
                .with_progress(progress)
                .run()?;
            RunSummary {
                tool: "archive",
                mode: config.mode,
                root: config.target_dir,
                matched: if config.mode.is_dry_run() {
                    outcome.manifest.len()
                } else {
                    outcome.deleted
                },
                already_gone: outcome.already_gone,
                archive: outcome.archive,
                duration: start_time.elapsed(),
            }
        }
    };

    reporter.print_summary(&summary);
    Ok(())
}
