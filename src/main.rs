use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use env_logger::Builder;
use log::{error, info, Level, LevelFilter};
use patchgrapher::config::EngineConfig;
use patchgrapher::graph::InMemoryGraphEngine;
use patchgrapher::orchestrator::IngestionOrchestrator;
use patchgrapher::scheduler::BatchScheduler;
use patchgrapher::stats;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Links security-patch hunks to Code Property Graph nodes.",
    long_about = "Applies one or many unified-diff patches against a code base with fuzzy, \
drift-tolerant matching, then connects each hunk to the affected CPG nodes."
)]
struct Args {
    /// Identifies the code base this run ingests against.
    project: String,

    /// A single `.patch` file, or a directory of them.
    patch_or_directory: PathBuf,

    /// Root of the code base the patches apply to.
    code_base_root: PathBuf,

    #[arg(short = 'n', long, help = "Describe what would be ingested, but don't write to the graph.")]
    dry_run: bool,

    #[arg(short = 'j', long, default_value_t = 8, help = "Maximum number of patches to ingest concurrently.")]
    jobs: usize,

    #[arg(long, help = "Truncate CPG file-path lookups to their last N characters.")]
    truncate_path_suffix: Option<usize>,

    /// Increase logging verbosity. Can be used multiple times (e.g., -v, -vv).
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        long_help = "Increase logging verbosity.\n-v for info, -vv for debug, -vvv for trace.\nBy default, only warnings and errors are shown."
    )]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| match record.level() {
            Level::Error => writeln!(buf, "{} {}", "error:".red().bold(), record.args()),
            Level::Warn => writeln!(buf, "{} {}", "warning:".yellow().bold(), record.args()),
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug => writeln!(buf, "{} {}", "debug:".blue().bold(), record.args()),
            Level::Trace => writeln!(buf, "{} {}", "trace:".cyan().bold(), record.args()),
        })
        .init();

    if !args.code_base_root.is_dir() {
        bail!("code base root '{}' not found or is not a directory.", args.code_base_root.display());
    }

    let patch_paths = collect_patch_paths(&args.patch_or_directory)
        .with_context(|| format!("failed to collect patch files from '{}'", args.patch_or_directory.display()))?;

    if patch_paths.is_empty() {
        println!("No patch files found at '{}'.", args.patch_or_directory.display());
        return Ok(());
    }

    println!();
    info!("Found {} patch file(s) to ingest for project '{}'.", patch_paths.len(), args.project);
    if args.dry_run {
        info!("Dry run: the graph engine will be exercised but nothing is meant to be persisted.");
    }

    let config = EngineConfig {
        concurrency: args.jobs,
        truncate_path_suffix: args.truncate_path_suffix,
        ..EngineConfig::default()
    };
    let engine = InMemoryGraphEngine::new();
    let orchestrator = IngestionOrchestrator::new(&engine, &config);
    let scheduler = BatchScheduler::new(&orchestrator, config.concurrency);

    let results = scheduler.run(&patch_paths, &args.code_base_root, &args.project, args.dry_run);

    let mut summaries = Vec::with_capacity(results.len());
    let mut fail_count = 0;
    for result in &results {
        match &result.outcome {
            Ok(outcome) => {
                info!(
                    "{} - connected {}/{} hunk(s)",
                    result.patch_path.display(),
                    outcome.summary.actual_hunks,
                    outcome.summary.original_hunks
                );
                summaries.push(outcome.summary);
            }
            Err(e) => {
                fail_count += 1;
                error!("--- FAILED to ingest {}: {}", result.patch_path.display(), e);
            }
        }
    }

    let project_stats = stats::summarize(&summaries);
    println!("\n--- Summary ---");
    println!("Imported patches:      {}", project_stats.imported_patches);
    println!("Active patches:        {} ({:.0}%)", project_stats.active_patches, project_stats.active_ratio() * 100.0);
    println!("Failed ingestions:     {}", fail_count);
    println!(
        "Hunks connected:       {}/{} ({:.0}%)",
        project_stats.hunks.actual_sum,
        project_stats.hunks.original_sum,
        project_stats.hunks.ratio() * 100.0
    );

    if fail_count > 0 && summaries.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

/// Resolves `input` to a sorted list of `.patch` files: itself if it's a
/// file, or every `.patch` entry directly inside it if it's a directory.
fn collect_patch_paths(input: &std::path::Path) -> std::io::Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(input)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("patch") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
