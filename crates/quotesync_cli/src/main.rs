//! Command-line front end for the quote store.
//!
//! # Responsibility
//! - Resolve configuration, logging and storage for one process run.
//! - Map subcommands onto `quotesync_core` use-cases.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quotesync_core::db::open_db;
use quotesync_core::{
    default_config_path, init_logging, AppConfig, QuoteStore, SqliteKeyValueRepository,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "quotesync",
    version,
    about = "Local-first quote collection with remote sync"
)]
struct Cli {
    /// Config file (defaults to the platform data directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path override.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level override (trace|debug|info|warn|error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add one quote.
    Add { text: String, category: String },
    /// List quotes, optionally for one category (`all` for every category).
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// List categories in first-seen order.
    Categories,
    /// Show a random quote under the given or saved filter.
    Random {
        #[arg(long)]
        category: Option<String>,
    },
    /// Show the saved filter, or save a new one.
    Filter { category: Option<String> },
    /// Export all quotes as pretty-printed JSON.
    Export {
        /// Output file; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import quotes from a JSON array file.
    Import { file: PathBuf },
    /// Run one sync cycle against a JSON file remote.
    Sync {
        #[arg(long)]
        remote: Option<PathBuf>,
        /// Do not push the merged collection back.
        #[arg(long)]
        no_push: bool,
    },
    /// Sync periodically until Ctrl-C.
    Watch {
        #[arg(long)]
        remote: Option<PathBuf>,
        /// Seconds between cycles.
        #[arg(long)]
        interval: Option<u64>,
        #[arg(long)]
        no_push: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    if let Err(err) = init_logging(&config.log_level, &config.log_dir) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open database `{}`", config.db_path.display()))?;
    let loaded = QuoteStore::load(SqliteKeyValueRepository::new(conn));
    if let Some(err) = &loaded.storage_error {
        eprintln!("warning: stored quotes unavailable, using defaults: {err}");
    }
    let store = loaded.into_value();

    match cli.command {
        Command::Add { text, category } => commands::add(store, &text, &category),
        Command::List { category } => commands::list(&store, category.as_deref()),
        Command::Categories => commands::categories(&store),
        Command::Random { category } => commands::random(&store, category.as_deref()),
        Command::Filter { category } => commands::filter(&store, category.as_deref()),
        Command::Export { out } => commands::export(&store, out.as_deref()),
        Command::Import { file } => commands::import(store, &file),
        Command::Sync { remote, no_push } => {
            commands::sync_once(store, &config, remote, !no_push && config.push_on_sync)
        }
        Command::Watch {
            remote,
            interval,
            no_push,
        } => {
            let mut config = config;
            if let Some(secs) = interval {
                config.sync_interval_secs = secs;
                config.validate()?;
            }
            let push = !no_push && config.push_on_sync;
            commands::watch(store, &config, remote, push)
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = AppConfig::load(&path)?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}
