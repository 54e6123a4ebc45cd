use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wikishard::extract::{inspect, run_extraction, ExtractOptions};
use wikishard::registry::BudgetOverrides;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "wikishard")]
#[command(about = "Extract wiki dumps into sharded JSON records")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a dump into per-category JSON shards
    Extract(ExtractArgs),
    /// Print how one page is classified and parsed
    Inspect(InspectArgs),
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to the wiki dump file (.xml or .xml.bz2)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for generated files
    #[arg(short, long)]
    output: PathBuf,

    /// JSON file with `titles` and `keywords` to skip
    #[arg(long)]
    ignore_list: Option<PathBuf>,

    /// Limit number of pages to process (for testing)
    #[arg(long)]
    limit: Option<u64>,

    /// Dry run - don't write output files
    #[arg(long)]
    dry_run: bool,

    /// Remove the output directory before starting
    #[arg(long)]
    clean: bool,

    /// Byte budget of each shard file
    #[arg(long)]
    max_shard_bytes: Option<u64>,

    /// Records per shard file
    #[arg(long)]
    max_shard_items: Option<usize>,

    /// Shard files per category
    #[arg(long)]
    max_shard_files: Option<usize>,

    /// Abort when one record is larger than the byte budget
    #[arg(long)]
    fail_on_oversize: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Path to the wiki dump file (.xml or .xml.bz2)
    #[arg(short, long)]
    input: PathBuf,

    /// Page title to look up
    #[arg(short, long)]
    title: String,
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let options = ExtractOptions {
        input: args.input,
        output_dir: args.output,
        ignore_list: args.ignore_list,
        limit: args.limit,
        dry_run: args.dry_run,
        clean: args.clean,
        overrides: BudgetOverrides {
            max_bytes: args.max_shard_bytes,
            max_items: args.max_shard_items,
            max_files: args.max_shard_files,
            fail_on_oversize: args.fail_on_oversize,
        },
    };

    let start = Instant::now();
    let report = run_extraction(&options)?;
    let duration = start.elapsed();
    info!(duration_secs = duration.as_secs_f64(), "Extraction complete");

    let stats = &report.stats;
    println!();
    println!("=== Summary ===");
    println!("Extraction time:     {:.2}s", duration.as_secs_f64());
    println!();
    println!("Pages processed:     {}", stats.pages());
    println!("Pages skipped:       {}", stats.skipped());
    println!("Unclassified:        {}", stats.unclassified());
    println!("Primary records:     {}", stats.primaries());
    println!("Satellites attached: {}", stats.attached() + stats.claimed());
    println!("Satellites orphaned: {}", stats.orphans());
    println!("Records written:     {}", stats.records());
    println!("Shard files:         {}", stats.shards());

    if !report.summaries.is_empty() {
        println!();
        for summary in &report.summaries {
            println!(
                "{:<20} {:>7} records {:>4} files {:>12} bytes",
                summary.category,
                summary.total_items,
                summary.shards.len(),
                summary.total_bytes()
            );
        }
    }

    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let Some(inspection) = inspect(&args.input, &args.title)? else {
        anyhow::bail!("Page not found: {}", args.title);
    };
    let json = serde_json::to_string_pretty(&inspection)
        .with_context(|| format!("Failed to serialize page: {}", args.title))?;
    println!("{json}");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    let result = match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Inspect(args) => run_inspect(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
