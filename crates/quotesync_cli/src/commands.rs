//! Subcommand handlers.

use anyhow::{bail, Context, Result};
use log::info;
use quotesync_core::{
    AppConfig, CategoryFilter, CycleOutcome, FileRemote, QuoteStore, SqliteKeyValueRepository,
    SyncEngine, SyncOptions, SyncScheduler,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Store = QuoteStore<SqliteKeyValueRepository>;

const EMPTY_PLACEHOLDER: &str = "No quotes available for this category. Add some!";

pub fn add(mut store: Store, text: &str, category: &str) -> Result<()> {
    let outcome = store.add(text, category)?;
    warn_unpersisted(outcome.storage_error.as_ref());
    println!(
        "Added \"{}\" - {}",
        outcome.value.text, outcome.value.category
    );
    Ok(())
}

pub fn list(store: &Store, category: Option<&str>) -> Result<()> {
    let filter = category.map_or(CategoryFilter::All, CategoryFilter::parse);
    let quotes = store.list(&filter);
    if quotes.is_empty() {
        println!("{EMPTY_PLACEHOLDER}");
        return Ok(());
    }
    for quote in quotes {
        println!("\"{}\" - {}", quote.text, quote.category);
    }
    Ok(())
}

pub fn categories(store: &Store) -> Result<()> {
    for category in store.categories() {
        println!("{category}");
    }
    Ok(())
}

pub fn random(store: &Store, category: Option<&str>) -> Result<()> {
    let filter = match category {
        Some(value) => {
            let filter = known_filter(store, value)?;
            warn_unpersisted(store.select_filter(&filter).err().as_ref());
            filter
        }
        None => store.saved_filter(),
    };

    match store.show_random(&filter) {
        Ok(quote) => println!("\"{}\"\n- {}", quote.text, quote.category),
        Err(_) => println!("{EMPTY_PLACEHOLDER}"),
    }
    match store.last_viewed() {
        Some(last) => println!("Last viewed: \"{}\" - {}", last.text, last.category),
        None => println!("No last viewed quote."),
    }
    Ok(())
}

pub fn filter(store: &Store, category: Option<&str>) -> Result<()> {
    let Some(value) = category else {
        println!("{}", store.saved_filter());
        return Ok(());
    };

    let filter = known_filter(store, value)?;
    store.select_filter(&filter)?;
    println!("Filter set to {filter}");
    Ok(())
}

pub fn export(store: &Store, out: Option<&Path>) -> Result<()> {
    let bytes = store.export_all().context("failed to encode quotes")?;
    match out {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("failed to write `{}`", path.display()))?;
            eprintln!("Quotes exported to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

pub fn import(mut store: Store, file: &Path) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read `{}`", file.display()))?;
    let outcome = store.import_json(&bytes)?;
    warn_unpersisted(outcome.storage_error.as_ref());
    let report = outcome.value;
    println!(
        "Imported {} quote(s); {} duplicate(s) ignored, {} invalid record(s) skipped.",
        report.added, report.duplicates, report.skipped
    );
    Ok(())
}

pub fn sync_once(
    store: Store,
    config: &AppConfig,
    remote: Option<PathBuf>,
    push: bool,
) -> Result<()> {
    let engine = build_engine(store, config, remote, push)?;
    print_outcome(&engine.run_cycle());
    Ok(())
}

pub fn watch(store: Store, config: &AppConfig, remote: Option<PathBuf>, push: bool) -> Result<()> {
    let engine = build_engine(store, config, remote, push)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    print_outcome(&engine.run_cycle());
    runtime.block_on(async {
        let scheduler = SyncScheduler::start(
            engine,
            config.sync_interval(),
            &tokio::runtime::Handle::current(),
            |outcome| print_outcome(&outcome),
        )?;
        println!(
            "Syncing every {}s; press Ctrl-C to stop.",
            scheduler.period().as_secs()
        );

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        info!("event=watch_stop module=cli status=ok");
        scheduler.shutdown().await;
        Ok::<(), anyhow::Error>(())
    })
}

/// Parses a filter argument, rejecting categories the store does not hold.
fn known_filter(store: &Store, value: &str) -> Result<CategoryFilter> {
    let filter = CategoryFilter::parse(value);
    if let CategoryFilter::Category(name) = &filter {
        if !store.categories().contains(name) {
            bail!("unknown category `{name}`");
        }
    }
    Ok(filter)
}

fn build_engine(
    store: Store,
    config: &AppConfig,
    remote: Option<PathBuf>,
    push: bool,
) -> Result<SyncEngine<SqliteKeyValueRepository>> {
    let Some(remote_path) = remote.or_else(|| config.remote_path.clone()) else {
        bail!("no remote configured; pass --remote or set `remote_path` in the config file");
    };
    Ok(SyncEngine::new(
        Arc::new(Mutex::new(store)),
        Arc::new(FileRemote::new(remote_path)),
        SyncOptions { push_merged: push },
    ))
}

fn print_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Completed(report) => println!("{}", report.summary()),
        CycleOutcome::Skipped => println!("Sync already in progress; skipped."),
    }
}

fn warn_unpersisted(err: Option<&quotesync_core::StorageError>) {
    if let Some(err) = err {
        eprintln!("warning: change kept in memory only: {err}");
    }
}
