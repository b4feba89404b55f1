//! roster-sync - applicant and position import/export tool
//!
//! Reconciles spreadsheet (CSV, xlsx, ods) and JSON files against the roster
//! database, reporting new, modified and unchanged records before anything is
//! written, and exports the database back to the same formats.

use anyhow::Result;
use clap::{Parser, Subcommand};
use roster_common::config::{
    config_file_path, load_toml_config, DatabasePathResolver, OmissionPolicy,
};
use roster_sync::commands::{describe_schemas, export_records, import_file, ImportOptions};
use roster_sync::formats::ExportFormat;
use roster_sync::{SchemaRegistry, SqliteRecordStore};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roster-sync", version, about = "Import and export roster records")]
struct Cli {
    /// Config file (default: ~/.config/roster/config.toml, or ROSTER_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides ROSTER_DATABASE and the config file)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Diff a file against the database and optionally write the changes
    Import {
        /// File to import (.csv, .xlsx, .xls, .ods, .json)
        file: PathBuf,

        /// Record type to import (default from config)
        #[arg(long)]
        schema: Option<String>,

        /// Write new and modified records after reporting them
        #[arg(long)]
        apply: bool,

        /// Reject the whole file if any row lacks a required field
        #[arg(long)]
        strict: bool,
    },
    /// Write the stored records to a file or stdout
    Export {
        /// Record type to export (default from config)
        #[arg(long)]
        schema: Option<String>,

        /// csv or json
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Output path (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the known record types and their columns
    Schemas,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = config_file_path(cli.config.as_deref());
    let config = load_toml_config(&config_path)?;

    // Log to stderr so exports on stdout stay clean
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting roster-sync {}", env!("CARGO_PKG_VERSION"));

    let registry = SchemaRegistry::builtin()?;

    if let Command::Schemas = cli.command {
        print!("{}", describe_schemas(&registry));
        return Ok(());
    }

    let db_path = DatabasePathResolver::new(cli.database.as_deref(), &config).resolve();
    info!("Database: {}", db_path.display());
    let pool = roster_common::db::init_database(&db_path).await?;
    let store = SqliteRecordStore::new(pool);

    match cli.command {
        Command::Import {
            file,
            schema,
            apply,
            strict,
        } => {
            let options = ImportOptions {
                schema: schema.unwrap_or_else(|| config.import.default_schema.clone()),
                apply,
                policy: if strict {
                    OmissionPolicy::Fatal
                } else {
                    config.import.omission_policy
                },
            };
            let outcome = import_file(&store, &registry, &file, &options).await?;
            print!("{}", outcome.report);
            if outcome.failed {
                std::process::exit(1);
            }
        }
        Command::Export {
            schema,
            format,
            output,
        } => {
            let schema = schema.unwrap_or_else(|| config.import.default_schema.clone());
            let bytes = export_records(&store, &registry, &schema, format).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)?;
                    info!("Wrote {} bytes to {}", bytes.len(), path.display());
                }
                None => std::io::stdout().write_all(&bytes)?,
            }
        }
        Command::Schemas => {}
    }

    Ok(())
}
