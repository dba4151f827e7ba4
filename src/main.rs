//! cxdb - Main Entry Point
//!
//! Command-line inspector for counterexample database files.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cxdb::common::DEFAULT_DATABASE_FILE;
use cxdb::{CompressionStats, CounterexampleDatabase, CounterexampleEntry, DatabaseConfig};

#[derive(Parser)]
#[command(name = "cxdb")]
#[command(about = "Inspect and maintain property-test counterexample databases")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Database file path [default: the config file's path, else pbt_counterexamples.db]
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// JSON configuration file; --database overrides its path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show aggregate statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored counterexamples
    List {
        /// Only entries of this test
        #[arg(short, long)]
        test: Option<String>,
    },
    /// Show the latest counterexample of a test, decompressed
    Show {
        #[arg(short, long)]
        test: String,
    },
    /// Export every entry to a file
    Export { output: PathBuf },
    /// Append every entry of an export file
    Import { input: PathBuf },
    /// Remove entries
    Clear {
        /// Only entries of this test
        #[arg(short, long)]
        test: Option<String>,
    },
    /// Group entries by test and rewrite the file
    Vacuum,
    /// Apply retention and size limits now
    Prune,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "cxdb=debug" } else { "cxdb=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// --database wins over the config file, which wins over the default path
fn resolve_config(cli: &Cli) -> Result<DatabaseConfig> {
    let mut config = match &cli.config {
        Some(path) => DatabaseConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => DatabaseConfig::default(),
    };
    if let Some(database) = &cli.database {
        config.database_path = Some(database.clone());
    }
    if config.database_path.is_none() {
        config.database_path = Some(PathBuf::from(DEFAULT_DATABASE_FILE));
    }
    Ok(config)
}

fn open_database(cli: &Cli) -> Result<CounterexampleDatabase> {
    let config = resolve_config(cli)?;
    let path = config.database_path.clone().unwrap_or_default();
    CounterexampleDatabase::new(config).with_context(|| format!("opening {}", path.display()))
}

fn print_entry(entry: &CounterexampleEntry) {
    println!(
        "{}  {}::{}  {}  {} -> {} bytes ({:.1}% saved)",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        entry.test_name,
        entry.property_name,
        entry.compression_algorithm,
        entry.original_size,
        entry.compressed_size,
        entry.space_savings()
    );
    if !entry.error_message.is_empty() {
        println!("    error: {}", entry.error_message);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let database = open_database(cli)?;

    match &cli.command {
        Command::Stats { json } => {
            let stats = database.get_stats();
            if *json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }

            println!("Entries:            {}", stats.total_entries);
            println!("Original size:      {} bytes", stats.total_original_size);
            println!("Compressed size:    {} bytes", stats.total_compressed_size);
            println!("Compression ratio:  {:.3}", stats.average_compression_ratio);
            if let (Some(oldest), Some(newest)) = (stats.oldest_entry, stats.newest_entry) {
                println!("Oldest:             {}", oldest.to_rfc3339());
                println!("Newest:             {}", newest.to_rfc3339());
            }
            if !stats.entries_by_test.is_empty() {
                println!("By test:");
                for (test, count) in &stats.entries_by_test {
                    println!("  {:<30} {}", test, count);
                }
            }
            if !stats.entries_by_compression.is_empty() {
                println!("By compression:");
                for (algorithm, count) in &stats.entries_by_compression {
                    println!("  {:<30} {}", algorithm, count);
                }
            }
        }
        Command::List { test } => {
            let entries = match test {
                Some(test) => database.get_by_test(test),
                None => database.get_all(),
            };
            for entry in &entries {
                print_entry(entry);
            }
            println!("{} entries", entries.len());
        }
        Command::Show { test } => {
            let Some(entry) = database.get_latest(test) else {
                bail!("no counterexamples stored for test {}", test);
            };
            print_entry(&entry);
            for (key, value) in &entry.metadata {
                println!("    {}: {}", key, value);
            }
            match database.decompress(&entry) {
                Some(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => println!("{}", text),
                    Err(_) => println!("<{} bytes of binary data>", bytes.len()),
                },
                None => bail!(
                    "entry could not be decompressed with {}",
                    entry.compression_algorithm
                ),
            }
        }
        Command::Export { output } => {
            database
                .export_to_file(output)
                .with_context(|| format!("exporting to {}", output.display()))?;
            println!("Exported {} entries to {}", database.len(), output.display());
        }
        Command::Import { input } => {
            let imported = database
                .import_from_file(input)
                .with_context(|| format!("importing {}", input.display()))?;
            database.sync()?;
            println!("Imported {} entries", imported);
        }
        Command::Clear { test } => {
            let removed = match test {
                Some(test) => database.clear_test(test),
                None => database.clear(),
            };
            database.sync()?;
            println!("Removed {} entries", removed);
        }
        Command::Vacuum => {
            database.vacuum();
            database.sync()?;
            println!("Vacuumed {} entries", database.len());
        }
        Command::Prune => {
            let removed = database.run_maintenance();
            database.sync()?;
            println!("Pruned {} entries, {} remain", removed, database.len());
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("cxdb v{}", env!("CARGO_PKG_VERSION"));
    run(&cli)
}
