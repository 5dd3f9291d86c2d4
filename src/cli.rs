use std::path::PathBuf;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use log::info;

use crate::config::Config;
use crate::db::Database;
use crate::driver::{ConsoleProgress, Driver};
use crate::error::UnmigratorError;
use crate::formats::keys;
use crate::records::RecordId;
use crate::selector::Selector;
use crate::store::{RecordStore, SqliteStore};

#[derive(Parser)]
#[command(
    name = "pfunmigrate",
    version,
    about = "pfunmigrate: moves legacy post format side-car data back into record content"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Migrate every record that still needs it, one batch at a time
    Run {
        /// Database file (default: from config)
        #[arg(long = "db", short = 'd')]
        db: Option<PathBuf>,

        /// Records per batch (default: from config)
        #[arg(long = "batch-size", short = 'b', value_parser = clap::value_parser!(u64).range(1..))]
        batch_size: Option<u64>,

        /// Stop after this many batches; run again to continue
        #[arg(long = "max-batches", value_parser = clap::value_parser!(u64).range(1..))]
        max_batches: Option<u64>,

        /// Running count to continue numbering from
        #[arg(long = "processed", default_value_t = 0)]
        processed: u64,
    },

    /// Report how many records still need migration
    Status {
        /// Database file (default: from config)
        #[arg(long = "db", short = 'd')]
        db: Option<PathBuf>,
    },

    /// Show a record's format tag, completion marker and side-car values
    Inspect {
        /// Record id
        #[arg(long = "id", short = 'i')]
        id: RecordId,

        /// Database file (default: from config)
        #[arg(long = "db", short = 'd')]
        db: Option<PathBuf>,
    },
}

impl Cli {
    pub fn handle_command_line(project_dirs: &ProjectDirs) -> Result<(), UnmigratorError> {
        let args = Cli::parse();
        let config = Config::get()?;

        match args.command {
            Command::Run {
                db,
                batch_size,
                max_batches,
                processed,
            } => {
                let store = Self::open_store(config, project_dirs, db)?;
                let batch_size = match batch_size {
                    Some(size) => usize::try_from(size).map_err(|_| {
                        UnmigratorError::Error(format!("Batch size {} is too large", size))
                    })?,
                    None => config.migration.batch_size(),
                };
                Self::run(&store, batch_size, config.migration.image_size(), max_batches, processed)
            }
            Command::Status { db } => {
                let store = Self::open_store(config, project_dirs, db)?;
                Self::status(&store)
            }
            Command::Inspect { id, db } => {
                let store = Self::open_store(config, project_dirs, db)?;
                Self::inspect(&store, id)
            }
        }
    }

    fn open_store(
        config: &Config,
        project_dirs: &ProjectDirs,
        db: Option<PathBuf>,
    ) -> Result<SqliteStore, UnmigratorError> {
        let db_path = db.unwrap_or_else(|| config.database_path(project_dirs));
        let db = Database::open(&db_path)?;
        Ok(SqliteStore::new(db))
    }

    fn run(
        store: &SqliteStore,
        batch_size: usize,
        image_size: &str,
        max_batches: Option<u64>,
        processed: u64,
    ) -> Result<(), UnmigratorError> {
        let driver = Driver::new(store, store, batch_size, image_size, max_batches)?;

        let remaining = driver.selector().count_remaining()?;
        if remaining == 0 {
            if processed == 0 {
                println!("No records needing migration could be found. Looks like you're all good to go!");
            } else {
                println!("Finished processing {} records", processed);
            }
            return Ok(());
        }

        println!("{} records were found that need to be unmigrated.", remaining);
        info!(
            "Starting migration: {} eligible, batch size {}, image size '{}'",
            remaining, batch_size, image_size
        );

        let summary = driver.run(processed, &mut ConsoleProgress)?;

        if summary.completed {
            println!(
                "Finished processing {} records ({} changed)",
                summary.processed, summary.changed
            );
        } else {
            println!(
                "Stopped after {} batches ({} records processed). Run again with --processed {} to continue.",
                summary.batches, summary.processed, summary.processed
            );
        }

        Ok(())
    }

    fn status(store: &SqliteStore) -> Result<(), UnmigratorError> {
        let remaining = Selector::new(store).count_remaining()?;

        if remaining == 0 {
            println!("No records needing migration could be found. Looks like you're all good to go!");
        } else {
            println!("{} records were found that need to be unmigrated.", remaining);
        }

        Ok(())
    }

    fn inspect(store: &SqliteStore, record_id: RecordId) -> Result<(), UnmigratorError> {
        let Some(record) = store.get_record(record_id)? else {
            return Err(UnmigratorError::Error(format!("Record {} not found", record_id)));
        };

        let migrated = store.get_meta(record_id, keys::MIGRATED)?.is_some();

        println!("Record:   {}", record.record_id());
        println!("Title:    {}", record.title());
        println!("Format:   {}", record.format().as_str());
        println!("Migrated: {}", if migrated { "yes" } else { "no" });

        let meta = store.all_meta(record_id)?;
        if meta.is_empty() {
            println!("Side-car: (none)");
        } else {
            println!("Side-car:");
            for (key, value) in meta {
                println!("  {} = {}", key, value);
            }
        }

        Ok(())
    }
}
