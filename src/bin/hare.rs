//! HareDB CLI
//!
//! Inspect and edit a file-backed data directory from the shell.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use haredb::{Config, Datastore, Disk, HareError};
use tracing_subscriber::{fmt, EnvFilter};

/// HareDB CLI
#[derive(Parser, Debug)]
#[command(name = "hare")]
#[command(about = "Inspect and edit a HareDB data directory")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./hare_data")]
    data_dir: String,

    /// Table file extension
    #[arg(short, long, default_value = "json")]
    extension: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List tables
    Tables,

    /// Create an empty table
    Create {
        /// Table name
        table: String,
    },

    /// Remove a table and its file
    Drop {
        /// Table name
        table: String,
    },

    /// List live record ids
    Ids {
        /// Table name
        table: String,
    },

    /// Print a record's payload
    Get {
        /// Table name
        table: String,

        /// Record id
        id: u64,
    },

    /// Insert a record, or update it if the id exists
    Put {
        /// Table name
        table: String,

        /// Record id
        id: u64,

        /// Payload (stored verbatim)
        payload: String,
    },

    /// Delete a record
    Delete {
        /// Table name
        table: String,

        /// Record id
        id: u64,
    },

    /// Rewrite table files without tombstones
    Compact {
        /// Table name (omit with --all)
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        table: Option<String>,

        /// Compact every table
        #[arg(long)]
        all: bool,
    },

    /// Show record and tombstone counts for a table
    Stats {
        /// Table name
        table: String,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,haredb=info"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .extension(&args.extension)
        .build();

    let disk = match Disk::open(config) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", args.data_dir, e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&disk, args.command).and_then(|_| disk.close());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(disk: &Disk, command: Commands) -> haredb::Result<()> {
    match command {
        Commands::Tables => {
            for name in disk.table_names() {
                println!("{}", name);
            }
        }
        Commands::Create { table } => disk.create_table(&table)?,
        Commands::Drop { table } => disk.remove_table(&table)?,
        Commands::Ids { table } => {
            for id in disk.ids(&table)? {
                println!("{}", id);
            }
        }
        Commands::Get { table, id } => {
            let rec = disk.read_rec(&table, id)?;
            println!("{}", String::from_utf8_lossy(&rec));
        }
        Commands::Put { table, id, payload } => {
            match disk.insert_rec(&table, id, payload.as_bytes()) {
                Err(HareError::RecordExists { .. }) => {
                    disk.update_rec(&table, id, payload.as_bytes())?
                }
                other => other?,
            }
        }
        Commands::Delete { table, id } => disk.delete_rec(&table, id)?,
        Commands::Compact { table, .. } => {
            let results = match table {
                Some(table) => {
                    let stats = disk.compact(&table)?;
                    vec![(table, stats)]
                }
                None => disk.compact_all()?,
            };
            for (name, stats) in results {
                println!(
                    "{}: {} records, reclaimed {} bytes",
                    name,
                    stats.live_records,
                    stats.bytes_reclaimed()
                );
            }
        }
        Commands::Stats { table } => {
            let stats = disk.stats(&table)?;
            println!("records:         {}", stats.live_records);
            println!("tombstones:      {}", stats.tombstones);
            println!("tombstone bytes: {}", stats.tombstone_bytes);
            println!("file size:       {}", stats.file_size);
            println!("tombstone ratio: {:.1}%", stats.tombstone_ratio() * 100.0);
        }
    }

    Ok(())
}
