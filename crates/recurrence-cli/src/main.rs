//! recur - validate and expand recurring event records.
//!
//! Reads one source event as JSON (from a file or `-` for stdin) and runs
//! it through the recurrence engine. Output is JSON on stdout; logs go to
//! stderr.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use recurrence_engine::{
    extract, sequence, Actor, AllowAll, EngineConfig, EventRecord, FixedClock, MemoryStorage,
    OccurrenceSynchronizer, RecordSchema,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "recur")]
#[command(version, about = "Validate and expand recurring event records", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Reference "now" (RFC 3339) for the future-date guard; defaults to the system clock
    #[arg(long, global = true)]
    now: Option<String>,

    /// Clamp out-of-range values instead of rejecting them
    #[arg(long, global = true)]
    permissive: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a record's recurrence rule without expanding it
    Validate {
        /// Source event JSON file, or '-' for stdin
        input: PathBuf,
    },

    /// Print the occurrence intervals a record expands to
    Expand {
        /// Source event JSON file, or '-' for stdin
        input: PathBuf,
    },

    /// Run a full resync against an in-memory store and print the generated occurrences
    Sync {
        /// Source event JSON file, or '-' for stdin
        input: PathBuf,

        /// Record schema JSON describing copyable attribute slots
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Acting user id
        #[arg(long, default_value = "cli")]
        actor: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = load_config(cli.config.as_deref(), cli.permissive)?;
    let now = match &cli.now {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("parsing --now '{raw}'"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let output = match &cli.command {
        Commands::Validate { input } => {
            let record = read_record(input)?;
            let parsed = extract(&record, &config, now)
                .with_context(|| format!("event {} has an invalid recurrence rule", record.id))?;
            json!({
                "valid": true,
                "id": record.id,
                "config": parsed,
            })
        }
        Commands::Expand { input } => {
            let record = read_record(input)?;
            let parsed = extract(&record, &config, now)
                .with_context(|| format!("event {} has an invalid recurrence rule", record.id))?;
            let occurrences = sequence(&parsed);
            info!(source_id = %record.id, count = occurrences.len(), "expanded");
            serde_json::to_value(occurrences)?
        }
        Commands::Sync {
            input,
            schema,
            actor,
        } => {
            let record = read_record(input)?;
            let mut storage = MemoryStorage::new();
            if let Some(path) = schema {
                let schema: RecordSchema = serde_json::from_str(&read_input(path)?)
                    .with_context(|| format!("parsing schema {}", path.display()))?;
                storage = storage.with_schema(schema);
            }
            storage.put_event(record.clone());

            let mut sync = OccurrenceSynchronizer::new(storage, AllowAll, FixedClock(now), config);
            let report = sync.resync(&Actor::new(actor.as_str()), &record)?;
            let occurrences = sync.storage().occurrences_of(&record.id);
            json!({
                "report": report,
                "occurrences": occurrences,
            })
        }
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>, permissive: bool) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => serde_json::from_str::<EngineConfig>(&read_input(path)?)
            .with_context(|| format!("parsing config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if permissive {
        config.strict = false;
    }
    config.validate()?;
    Ok(config)
}

fn read_record(path: &Path) -> Result<EventRecord> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).with_context(|| format!("parsing event record {}", path.display()))
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}
