//! # fsarc CLI - incremental filesystem archiver
//!
//! Archive one or more directories into a chain of timestamped zip
//! snapshots, or restore any snapshot from such a chain.
//!
//! ```bash
//! # First (full) snapshot of /home/user into /backups
//! fsarc -a /backups /home/user
//!
//! # Later runs chain onto the latest snapshot; -b stores changed files
//! # as binary patches instead of full copies
//! fsarc -a /backups -b /home/user
//!
//! # Restore a snapshot somewhere else
//! fsarc -r /backups/fsarc_20240101-120000.zip -d /tmp/out
//! ```

use clap::{ArgGroup, Parser};
use colored::*;
use fsarc::{Config, BUILTIN_EXCLUDES};
use indicatif::{ProgressBar, ProgressStyle};
use humantime::format_duration;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::warn;

/// fsarc - timestamped snapshot archives chained by binary deltas
#[derive(Parser)]
#[command(name = "fsarc")]
#[command(version)]
#[command(about = "Incremental filesystem archiver - snapshot directories into chained zip deltas")]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["archive", "restore"])
))]
struct Cli {
    /// Archive mode: create the next snapshot in DIR from the input roots
    #[arg(short = 'a', long = "archive", value_name = "DIR")]
    archive: Option<PathBuf>,

    /// Restore mode: restore the snapshot FILE (chain is resolved in its
    /// directory)
    #[arg(short = 'r', long = "restore", value_name = "FILE")]
    restore: Option<PathBuf>,

    /// Redirect restore output into DIR
    #[arg(short = 'd', long = "restore-dir", value_name = "DIR", requires = "restore")]
    restore_dir: Option<PathBuf>,

    /// Zip deflate level (1..9); 0 selects the library default
    #[arg(
        long = "comp-level",
        value_name = "N",
        default_value_t = 0,
        value_parser = clap::value_parser!(u32).range(0..=9)
    )]
    comp_level: u32,

    /// Store entries without compression
    #[arg(long = "no-comp")]
    no_comp: bool,

    /// Pattern excluded from both compression and diffing (repeatable)
    #[arg(short = 'f', long = "comp-filter", value_name = "PAT")]
    comp_filter: Vec<String>,

    /// Emit a full snapshot even when predecessors exist (no chaining)
    #[arg(long = "force-new-arc")]
    force_new_arc: bool,

    /// Store changed files as bsdiff patches instead of full copies
    #[arg(short = 'b', long = "use-bsdiff")]
    use_bsdiff: bool,

    /// Scanner exclusion pattern (repeatable); `*` crosses `/`, `?` matches
    /// one or more non-`/` characters
    #[arg(short = 'x', long = "exclude", value_name = "PAT")]
    exclude: Vec<String>,

    /// Add the built-in exclusion patterns (caches, /tmp, /dev, /proc)
    #[arg(short = 'X', long = "builtin-excl")]
    builtin_excl: bool,

    /// Skip regular files larger than SZ (suffix k/m/g, powers of 1024)
    #[arg(long = "size-filter", value_name = "SZ", value_parser = fsarc::utils::parse_size)]
    size_filter: Option<u64>,

    /// Do not apply mode/ownership/timestamps on restore
    #[arg(long = "no-metadata")]
    no_metadata: bool,

    /// Classify and log, but create and modify nothing
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Input roots (archive mode)
    #[arg(value_name = "PATH")]
    inputs: Vec<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help/version are a success; everything else is an argument
            // error and must exit 1 without touching disk
            use clap::error::ErrorKind;
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> fsarc::Result<()> {
    let mut excludes = cli.exclude.clone();
    if cli.builtin_excl {
        excludes.extend(BUILTIN_EXCLUDES.iter().map(|s| s.to_string()));
    }
    let config = Config {
        comp_level: cli.comp_level,
        no_compression: cli.no_comp,
        comp_filter: cli.comp_filter.clone(),
        force_new: cli.force_new_arc,
        use_bsdiff: cli.use_bsdiff,
        excludes,
        size_filter: cli.size_filter,
        apply_metadata: !cli.no_metadata,
        dry_run: cli.dry_run,
    };

    let start = Instant::now();
    if let Some(dir) = &cli.archive {
        if cli.inputs.is_empty() {
            return Err(fsarc::ArchiveError::invalid_config(
                "archive mode needs at least one input root",
            ));
        }
        cmd_archive(&config, dir, &cli.inputs)?;
    } else if let Some(file) = &cli.restore {
        if !cli.inputs.is_empty() {
            warn!("ignoring positional arguments in restore mode");
        }
        cmd_restore(&config, file, cli.restore_dir.as_deref())?;
    }

    let elapsed = Duration::from_millis(start.elapsed().as_millis() as u64);
    println!(
        "{}",
        format!("Total time: {}", format_duration(elapsed)).dimmed()
    );
    Ok(())
}

fn cmd_archive(config: &Config, dir: &Path, roots: &[PathBuf]) -> fsarc::Result<()> {
    println!("{}", "Archiving...".blue().bold());

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.green/white} {percent}%")
            .unwrap(),
    );
    let stats = fsarc::create_snapshot(config, dir, roots, |fraction| {
        pb.set_position((fraction * 1000.0) as u64);
    })?;
    pb.finish_and_clear();

    match &stats.snapshot {
        Some(path) => println!(
            "{} Snapshot written: {}",
            "✓".green().bold(),
            path.display().to_string().cyan()
        ),
        None => println!("{} Dry run, nothing written", "✓".green().bold()),
    }
    println!(
        "  {} new, {} modified, {} unchanged, {} directories",
        stats.new_files.to_string().cyan(),
        stats.modified.to_string().cyan(),
        stats.unchanged.to_string().cyan(),
        stats.directories.to_string().cyan()
    );
    if stats.excluded > 0 || stats.oversize > 0 {
        println!(
            "  skipped: {} excluded, {} over size cutoff",
            stats.excluded, stats.oversize
        );
    }
    Ok(())
}

fn cmd_restore(config: &Config, file: &Path, restore_dir: Option<&Path>) -> fsarc::Result<()> {
    println!("{}", "Restoring...".blue().bold());
    let stats = fsarc::restore_snapshot(config, file, restore_dir)?;
    println!(
        "{} Restored {} files, {} directories ({})",
        "✓".green().bold(),
        stats.files.to_string().cyan(),
        stats.directories.to_string().cyan(),
        fsarc::utils::format_bytes(stats.bytes_written)
    );
    if stats.metadata_warnings > 0 {
        println!(
            "  {} metadata operations failed (see log)",
            stats.metadata_warnings.to_string().yellow()
        );
    }
    Ok(())
}
