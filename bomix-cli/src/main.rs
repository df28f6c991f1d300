//! Command-line front end for the BOM series importer
//!
//! Stands in for the GUI shell: every command opens (or creates) a series
//! database, runs one manager operation, and closes the store on the way out.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;

use bomix_cli::manager::{BomManager, DuplicateBom, OverwriteConfirm};
use bomix_cli::session::{LogEntry, LogLevel};

#[derive(Parser)]
#[command(name = "bomix-cli", version, about = "Import spreadsheet BOM exports into per-series databases")]
struct Cli {
    /// Series database file (default: bomix/series.db under the platform data dir)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new series database
    Init {
        /// Series name
        #[arg(long)]
        name: String,
        /// Optional series note
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Open a database and print its series info
    Open,
    /// Import BOM workbooks (all common BOMs before any matrix BOM)
    Import {
        /// Workbook files to import
        files: Vec<PathBuf>,
    },
    /// Print import statistics
    Stats,
    /// List stored BOMs, newest first
    List,
    /// Print one BOM with all of its groups as JSON
    Show { id: i64 },
    /// Delete BOMs and their groups
    Delete { ids: Vec<i64> },
}

/// Duplicate-overwrite prompt on the terminal
struct PromptConfirm;

#[async_trait]
impl OverwriteConfirm for PromptConfirm {
    async fn confirm_overwrite(&self, duplicate: &DuplicateBom) -> Result<bool> {
        let prompt = format!(
            "A BOM with the same version already exists\n\
             \x20 project:     {}\n\
             \x20 version:     {}\n\
             \x20 phase:       {}\n\
             \x20 description: {}\n\
             \x20 created:     {}\n\
             \x20 updated:     {}\n\
             Overwriting discards the stored matrix selections. Overwrite?",
            duplicate.project,
            duplicate.version,
            duplicate.phase,
            duplicate.description.as_deref().unwrap_or("-"),
            duplicate.created_at.format("%Y-%m-%d %H:%M:%S"),
            duplicate.updated_at.format("%Y-%m-%d %H:%M:%S"),
        );
        // dialoguer blocks on stdin; keep it off the runtime threads
        tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .context("Overwrite prompt failed")
        })
        .await
        .context("Overwrite prompt task failed")?
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("bomix")
        .join("series.db")
}

fn print_entry(entry: &LogEntry) {
    match entry.level {
        LogLevel::Info => println!("{}  {}", "info".green(), entry.message),
        LogLevel::Warning => println!("{}  {}", "warn".yellow(), entry.message),
        LogLevel::Error => println!("{} {}", "error".red(), entry.message),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = cli.database.unwrap_or_else(default_database_path);

    let mut manager = BomManager::new(Box::new(PromptConfirm));
    let result = run(&mut manager, &path, cli.command).await;

    // Best-effort flush and compact; never block process exit on it
    if let Err(e) = manager.close_current_database().await {
        log::warn!("Failed to close database: {e:#}");
    }
    result
}

async fn run(manager: &mut BomManager, path: &std::path::Path, command: Command) -> Result<()> {
    match command {
        Command::Init { name, note } => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            manager.init_database(path, &name, &note).await?;
            println!("Initialized series '{}' at {}", name, path.display());
        }
        Command::Open => {
            let db = manager.open_database(path).await?;
            if let Some(series) = db.series_info().await? {
                println!("{}", serde_json::to_string_pretty(&series)?);
            }
        }
        Command::Import { files } => {
            manager.open_database(path).await?;
            let entries = manager.import_many(&files).await?;
            for entry in &entries {
                print_entry(entry);
            }
        }
        Command::Stats => {
            let db = manager.open_database(path).await?;
            let stats = db.get_statistics().await?;
            println!("projects: {}", stats.project_count);
            println!("phases:   {}", stats.phase_count);
            println!("BOMs:     {}", stats.bom_count);
        }
        Command::List => {
            let db = manager.open_database(path).await?;
            for bom in db.all_boms().await? {
                println!(
                    "{:>4}  {}  {}  {}  {}",
                    bom.id,
                    bom.project,
                    bom.phase,
                    bom.version,
                    bom.description.as_deref().unwrap_or("-"),
                );
            }
        }
        Command::Show { id } => {
            let db = manager.open_database(path).await?;
            match db.get_full_bom(id).await? {
                Some(full) => println!("{}", serde_json::to_string_pretty(&full)?),
                None => println!("No BOM with id {id}"),
            }
        }
        Command::Delete { ids } => {
            let db = manager.open_database(path).await?;
            let deleted = db.delete_boms(&ids).await?;
            println!("Deleted {deleted} BOMs");
        }
    }
    Ok(())
}
