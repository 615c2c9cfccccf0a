//! Command-line front end for the split/merge engine

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use filesplit_lib::{
    FileMerger, FileSplitter, MergeConfig, MergeSummary, SplitConfig, SplitMode, SplitOptions,
    SplitSummary, TerminateFlag, MANIFEST_FILE_NAME, SPLIT_DELIMITER,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Split large files into pieces and merge them back
#[derive(Debug, Parser)]
#[command(name = "filesplit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print the summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Split a file into numbered pieces plus a manifest
    Split(SplitArgs),
    /// Rebuild a file from its pieces and manifest
    Merge(MergeArgs),
}

#[derive(Debug, Args)]
struct SplitArgs {
    /// File to split
    source: PathBuf,

    /// Directory receiving the splits and the manifest
    output_dir: PathBuf,

    /// What the limit counts: `size` (bytes) or `linecount`
    #[arg(long, default_value = "size")]
    mode: SplitMode,

    /// Bytes or lines per split
    #[arg(long)]
    limit: u64,

    /// Only cut at line breaks
    #[arg(long)]
    newline: bool,

    /// Repeat the first line of the source in every split
    #[arg(long)]
    include_header: bool,

    /// Encoding to read the source with (raw bytes when omitted)
    #[arg(long)]
    encoding: Option<String>,

    /// Encoding to write the splits in (defaults to --encoding)
    #[arg(long)]
    split_encoding: Option<String>,

    /// Separator between the file stem and the split number
    #[arg(long, default_value = SPLIT_DELIMITER)]
    delimiter: String,

    /// Manifest file name
    #[arg(long, default_value = MANIFEST_FILE_NAME)]
    manifest: String,
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Directory holding the splits
    input_dir: PathBuf,

    /// Manifest to read (defaults to the manifest inside INPUT_DIR)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Merged file (defaults to a name derived from the first split)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Delete the splits and the manifest after a complete merge
    #[arg(long)]
    cleanup: bool,

    /// Separator the splits were named with
    #[arg(long, default_value = SPLIT_DELIMITER)]
    delimiter: String,

    /// Manifest file name looked up inside INPUT_DIR
    #[arg(long, default_value = MANIFEST_FILE_NAME)]
    manifest_name: String,
}

fn main() -> Result<()> {
    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("filesplit v{}", filesplit_lib::VERSION);

    match cli.command {
        Commands::Split(args) => {
            let summary = run_split(args)?;
            print_split(&summary, cli.json)
        }
        Commands::Merge(args) => {
            let summary = run_merge(args)?;
            print_merge(&summary, cli.json)
        }
    }
}

fn run_split(args: SplitArgs) -> Result<SplitSummary> {
    let config = SplitConfig {
        mode: args.mode,
        limit: args.limit,
        options: SplitOptions {
            newline_aligned: args.newline,
            include_header: args.include_header,
            read_encoding: args.encoding,
            write_encoding: args.split_encoding,
        },
        delimiter: args.delimiter,
        manifest_name: args.manifest,
    };
    let splitter = FileSplitter::with_config(config).context("Invalid split configuration")?;

    splitter
        .split_with(&args.source, &args.output_dir, &TerminateFlag::new(), |path, size| {
            info!("Produced {} ({} bytes)", path.display(), size);
        })
        .with_context(|| format!("Failed to split {}", args.source.display()))
}

fn run_merge(args: MergeArgs) -> Result<MergeSummary> {
    let config = MergeConfig {
        manifest_path: args.manifest,
        output_path: args.output,
        cleanup: args.cleanup,
        delimiter: args.delimiter,
        manifest_name: args.manifest_name,
    };
    let merger = FileMerger::with_config(config).context("Invalid merge configuration")?;

    merger
        .merge_with(&args.input_dir, &TerminateFlag::new(), |path, size| {
            info!("Merged into {} ({} bytes)", path.display(), size);
        })
        .with_context(|| format!("Failed to merge splits in {}", args.input_dir.display()))
}

fn print_split(summary: &SplitSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    for split in &summary.splits {
        println!("{}\t{}", split.filename, split.filesize);
    }
    println!(
        "{} splits, {} bytes, manifest {}{}",
        summary.splits.len(),
        summary.total_bytes(),
        summary.manifest_path.display(),
        if summary.terminated { " (terminated early)" } else { "" }
    );
    Ok(())
}

fn print_merge(summary: &MergeSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!(
        "{} ({} bytes) from {} splits{}",
        summary.output_path.display(),
        summary.size_bytes,
        summary.splits_merged,
        if summary.cleaned_up { ", splits removed" } else { "" }
    );
    Ok(())
}
