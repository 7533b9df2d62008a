//! Core domain logic for quotesync.
//! This crate is the single source of truth for quote store and sync invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{default_config_path, AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::quote::{
    default_quotes, CategoryFilter, Quote, QuoteKey, QuoteValidationError, ALL_CATEGORIES,
};
pub use repo::kv_repo::{
    KeyValueRepository, MemoryKeyValueRepository, SqliteKeyValueRepository, StorageError,
    StorageResult,
};
pub use service::quote_store::{
    pick_random, pick_random_with, AddQuoteError, EmptyCollectionError, ImportReport, LastViewed,
    QuoteStore, StorageOutcome,
};
pub use service::transfer::{ImportError, QuoteDraft};
pub use sync::engine::{CycleOutcome, SyncEngine, SyncFailure, SyncOptions, SyncPhase, SyncReport};
pub use sync::file_remote::FileRemote;
pub use sync::memory_remote::MemoryRemote;
pub use sync::merge::{merge_remote_wins, MergeCounts, MergeResult};
pub use sync::remote::{RemoteQuoteEndpoint, TransportError, TransportResult, TransportStage};
pub use sync::scheduler::{SchedulerError, SyncScheduler};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
