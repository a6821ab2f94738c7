//! CLI for the tidemark timestamp-to-txg store.
//!
//! Provides commands for creating, recording into, querying, and inspecting
//! tidemark store files.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use tidemark::config::{DAY_THRESHOLD_NS, MONTH_THRESHOLD_NS, NANOS_PER_SEC};
use tidemark::{Gating, RingBuffer, Rounding, Slab, Tier, TieredStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// tidemark — Fixed-size map from timestamps to transaction ids.
#[derive(Parser)]
#[command(name = "tidemark", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create an empty store file.
    Init {
        /// Path to the store file.
        store_path: PathBuf,

        /// Minimum spacing of day-tier samples, in seconds.
        #[arg(long, default_value_t = DAY_THRESHOLD_NS / NANOS_PER_SEC)]
        day_secs: i64,

        /// Minimum spacing of month-tier samples, in seconds.
        #[arg(long, default_value_t = MONTH_THRESHOLD_NS / NANOS_PER_SEC)]
        month_secs: i64,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Record a transaction id at a timestamp (creates the file if missing).
    Record {
        /// Path to the store file.
        store_path: PathBuf,

        /// Timestamp in nanoseconds.
        #[arg(allow_negative_numbers = true)]
        time_ns: i64,

        /// Transaction id.
        id: u64,
    },

    /// Look up the transaction id nearest a timestamp.
    Query {
        /// Path to the store file.
        store_path: PathBuf,

        /// Timestamp in nanoseconds.
        #[arg(allow_negative_numbers = true)]
        time_ns: i64,

        /// Which direction to snap to a recorded sample.
        #[arg(long, default_value = "floor")]
        rounding: RoundingArg,
    },

    /// Print every sample in all three tiers.
    Dump {
        /// Path to the store file.
        store_path: PathBuf,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Display capacity, thresholds, and tier usage.
    Info {
        /// Path to the store file.
        store_path: PathBuf,
    },

    /// Run an in-memory record/query microbenchmark.
    Bench {
        /// Number of samples to record.
        #[arg(long, default_value = "10000000")]
        points: u64,
    },
}

/// Query rounding mode.
#[derive(Clone, Copy, ValueEnum)]
enum RoundingArg {
    /// Newest sample at or before the timestamp.
    Floor,
    /// Oldest sample at or after the timestamp.
    Ceiling,
}

impl From<RoundingArg> for Rounding {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::Floor => Rounding::Floor,
            RoundingArg::Ceiling => Rounding::Ceiling,
        }
    }
}

/// Output format for dumps.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One `time: id` line per sample, grouped by tier.
    Text,
    /// JSON object with per-tier bookkeeping and samples.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            store_path,
            day_secs,
            month_secs,
            force,
        } => cmd_init(&store_path, day_secs, month_secs, force),
        Commands::Record {
            store_path,
            time_ns,
            id,
        } => cmd_record(&store_path, time_ns, id),
        Commands::Query {
            store_path,
            time_ns,
            rounding,
        } => cmd_query(&store_path, time_ns, rounding.into()),
        Commands::Dump { store_path, format } => cmd_dump(&store_path, &format),
        Commands::Info { store_path } => cmd_info(&store_path),
        Commands::Bench { points } => cmd_bench(points),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Opens a store file and decodes it.
fn load_store(store_path: &Path) -> Result<(Slab, TieredStore), Box<dyn std::error::Error>> {
    if !store_path.exists() {
        return Err(format!("No store found at '{}'", store_path.display()).into());
    }

    let slab = Slab::open(store_path)?;
    let store = slab.load()?;
    Ok((slab, store))
}

/// Implements `tidemark init <store_path>`.
fn cmd_init(
    store_path: &Path,
    day_secs: i64,
    month_secs: i64,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if store_path.exists() && !force {
        return Err(format!(
            "'{}' already exists (use --force to overwrite)",
            store_path.display()
        )
        .into());
    }

    let gating = Gating::from_secs(day_secs, month_secs)?;
    let store: TieredStore = TieredStore::with_gating(gating);
    let slab = Slab::create(store_path, &store)?;
    slab.sync()?;

    info!(path = %store_path.display(), day_secs, month_secs, "initialized store");
    println!(
        "Created {} (capacity {}, {} bytes)",
        store_path.display(),
        slab.capacity(),
        slab.file_size()
    );
    Ok(())
}

/// Implements `tidemark record <store_path> <time_ns> <id>`.
fn cmd_record(store_path: &Path, time_ns: i64, id: u64) -> Result<(), Box<dyn std::error::Error>> {
    let (mut slab, mut store) = if store_path.exists() {
        load_store(store_path)?
    } else {
        let store: TieredStore = TieredStore::new();
        (Slab::create(store_path, &store)?, store)
    };

    if let Some(newest) = store.minutes().tail_entry()
        && (time_ns < newest.time || id < newest.id)
    {
        debug!(
            time_ns,
            id,
            newest_time = newest.time,
            newest_id = newest.id,
            "sample is older than the newest recorded one"
        );
    }

    store.record(time_ns, id);
    slab.save(&store)?;
    slab.sync()?;

    debug!(
        time_ns,
        id,
        minutes = store.minutes().len(),
        days = store.days().len(),
        months = store.months().len(),
        "recorded sample"
    );
    Ok(())
}

/// Implements `tidemark query <store_path> <time_ns>`.
fn cmd_query(
    store_path: &Path,
    time_ns: i64,
    rounding: Rounding,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_slab, store) = load_store(store_path)?;

    let found = store.query_sample(time_ns, rounding);
    if let Some(sample) = found {
        debug!(time_ns, matched_time = sample.time, id = sample.id, "query matched");
    }
    println!("{}", found.map_or(0, |sample| sample.id));
    Ok(())
}

/// Implements `tidemark dump <store_path>`.
fn cmd_dump(store_path: &Path, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let (slab, store) = load_store(store_path)?;

    match format {
        OutputFormat::Text => print!("{store}"),
        OutputFormat::Json => {
            let tier_json = |ring: &RingBuffer| {
                serde_json::json!({
                    "head": ring.head(),
                    "tail": ring.tail(),
                    "length": ring.len(),
                    "samples": ring.iter().collect::<Vec<_>>(),
                })
            };

            let output = serde_json::json!({
                "capacity": slab.capacity(),
                "gating": store.gating(),
                "tiers": {
                    "minute": tier_json(store.minutes()),
                    "day": tier_json(store.days()),
                    "month": tier_json(store.months()),
                },
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `tidemark info <store_path>`.
fn cmd_info(store_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (slab, store) = load_store(store_path)?;
    let gating = store.gating();

    println!("Store: {}", store_path.display());
    println!("  Capacity: {} samples per tier", slab.capacity());
    println!(
        "  Gating: day={}, month={}",
        format_duration_ns(gating.day),
        format_duration_ns(gating.month)
    );
    println!();

    for tier in Tier::ALL {
        let ring = store.tier(tier);
        println!("  Tier {tier}: {}/{} samples", ring.len(), ring.capacity());
        if let (Some(oldest), Some(newest)) = (ring.entry(0), ring.tail_entry()) {
            println!("    Oldest: time={} id={}", oldest.time, oldest.id);
            println!("    Newest: time={} id={}", newest.time, newest.id);
            println!(
                "    Span: {}",
                format_duration_ns(newest.time.saturating_sub(oldest.time))
            );
        }
    }

    println!();
    println!(
        "Total disk usage: {} ({} bytes)",
        format_bytes(slab.file_size() as u64),
        slab.file_size()
    );
    Ok(())
}

/// Implements `tidemark bench`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)] // Benchmark stats are fine with f64 precision
fn cmd_bench(points: u64) -> Result<(), Box<dyn std::error::Error>> {
    if points == 0 {
        return Err("--points must be greater than zero".into());
    }

    println!("tidemark record/query benchmark");
    println!("  Points: {points}");
    println!();

    let mut store: TieredStore = TieredStore::new();
    // One sample per second keeps the day and month tiers active.
    let start = Instant::now();
    for id in 0..points {
        store.record(id as i64 * NANOS_PER_SEC, id);
    }
    let record_elapsed = start.elapsed();

    let newest = store.minutes().tail_time();
    let queries = points.min(1_000_000);
    let mut checksum = 0u64;
    let start = Instant::now();
    for i in 0..queries {
        let tv = newest - (i as i64 % 4096) * NANOS_PER_SEC;
        let rounding = if i % 2 == 0 { Rounding::Floor } else { Rounding::Ceiling };
        checksum = checksum.wrapping_add(store.query(tv, rounding));
    }
    let query_elapsed = start.elapsed();

    let ns_per_record = record_elapsed.as_nanos() as f64 / points as f64;
    let ns_per_query = query_elapsed.as_nanos() as f64 / queries as f64;

    println!("Results:");
    println!("  Records: {points} in {record_elapsed:.3?} ({ns_per_record:.1} ns/record)");
    println!("  Queries: {queries} in {query_elapsed:.3?} ({ns_per_query:.1} ns/query)");
    println!(
        "  Tiers: minute={} day={} month={}",
        store.minutes().len(),
        store.days().len(),
        store.months().len()
    );
    println!("  Checksum: {checksum}");

    Ok(())
}

/// Formats a nanosecond duration as a human-readable string.
fn format_duration_ns(ns: i64) -> String {
    let secs = ns / NANOS_PER_SEC;
    if ns % NANOS_PER_SEC != 0 {
        format!("{ns}ns")
    } else if secs >= 86400 && secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// Formats a byte count as a human-readable string.
#[allow(clippy::cast_precision_loss)] // Byte counts are display-only
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
