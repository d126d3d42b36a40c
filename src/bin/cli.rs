//! tablestore CLI
//!
//! Command-line interface for inspecting and editing a data directory.

use clap::{Parser, Subcommand};
use serde_json::Value;
use tablestore::{Config, Engine, Record, Snapshot};
use tracing_subscriber::{fmt, EnvFilter};

/// tablestore CLI
#[derive(Parser, Debug)]
#[command(name = "tablestore-cli")]
#[command(about = "CLI for the tablestore JSON table store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: String,

    /// Write debounce window in milliseconds
    #[arg(long, default_value = "100")]
    flush_delay_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List tables in the data directory
    Tables,

    /// Print every record of a table
    Get {
        /// The table to read
        table: String,
    },

    /// Replace a table with a JSON array of records
    Put {
        /// The table to replace
        table: String,

        /// Records as a JSON array, e.g. '[{"id":1}]'
        records: String,
    },

    /// Build a sorted index on a field
    Index {
        table: String,
        field: String,
    },

    /// Print records whose field lies in [min, max] (JSON values)
    Range {
        table: String,
        field: String,
        min: String,
        max: String,
    },

    /// Delete an index so range queries scan the table
    DropIndex {
        table: String,
        field: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,tablestore=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .flush_delay_ms(args.flush_delay_ms)
        .build();

    let engine = match Engine::connect(config).await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Failed to open data directory: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = run(&engine, args.command).await;

    // Close even on failure so queued writes reach disk
    let closed = engine.close().await;

    if let Err(e) = outcome.and(closed) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(engine: &Engine, command: Commands) -> tablestore::Result<()> {
    match command {
        Commands::Tables => {
            for table in engine.file_store().list_tables()? {
                println!("{}", table);
            }
        }
        Commands::Get { table } => {
            print_records(&engine.get(&table).await?)?;
        }
        Commands::Put { table, records } => {
            let records: Vec<Record> = parse_json(&records)?;
            let count = records.len();
            engine.put(&table, records).await?;
            println!("{} records written to '{}'", count, table);
        }
        Commands::Index { table, field } => {
            let info = engine.build_index(&table, &field).await?;
            println!("indexed {} records of '{}' by '{}'", info.len, info.table, info.field);
        }
        Commands::Range {
            table,
            field,
            min,
            max,
        } => {
            let min: Value = parse_json(&min)?;
            let max: Value = parse_json(&max)?;
            print_records(&engine.range_query(&table, &field, &min, &max).await?)?;
        }
        Commands::DropIndex { table, field } => {
            if engine.drop_index(&table, &field).await? {
                println!("index '{}.{}' dropped", table, field);
            } else {
                println!("no index '{}.{}'", table, field);
            }
        }
    }

    Ok(())
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> tablestore::Result<T> {
    serde_json::from_str(text)
        .map_err(|e| tablestore::StoreError::Serialization(format!("invalid JSON argument: {}", e)))
}

fn print_records(snapshot: &Snapshot) -> tablestore::Result<()> {
    let text = serde_json::to_string_pretty(snapshot)
        .map_err(|e| tablestore::StoreError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}
