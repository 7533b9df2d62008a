//! Sync cycle orchestration.
//!
//! # Responsibility
//! - Run one fetch → merge → persist → push cycle against a remote endpoint.
//! - Expose the current cycle phase and a summary for user notification.
//!
//! # Invariants
//! - At most one cycle is in flight per engine (and per clone of it); a
//!   cycle requested meanwhile is dropped and reported as `Skipped`.
//! - The store lock is held only for merge + persist, never across remote
//!   calls. Merge and replacement happen under one lock acquisition.
//! - A failed fetch leaves the store untouched and skips push.
//! - A failed persist keeps the merged in-memory state and skips push.

use crate::model::quote::Quote;
use crate::repo::kv_repo::{KeyValueRepository, StorageError};
use crate::service::quote_store::QuoteStore;
use crate::sync::merge::{merge_remote_wins, MergeCounts};
use crate::sync::remote::{RemoteQuoteEndpoint, TransportError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use uuid::Uuid;

/// Phase of the current sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Fetching,
    Merging,
    Persisting,
    Pushing,
}

impl SyncPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Persisting => "persisting",
            Self::Pushing => "pushing",
        }
    }
}

/// Step failure that ended a cycle early.
#[derive(Debug)]
pub enum SyncFailure {
    Fetch(TransportError),
    /// Store mutex was poisoned by a panicking holder.
    StoreUnavailable,
    Persist(StorageError),
    Push(TransportError),
}

impl SyncFailure {
    pub fn phase(&self) -> SyncPhase {
        match self {
            Self::Fetch(_) => SyncPhase::Fetching,
            Self::StoreUnavailable => SyncPhase::Merging,
            Self::Persist(_) => SyncPhase::Persisting,
            Self::Push(_) => SyncPhase::Pushing,
        }
    }
}

impl Display for SyncFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(err) | Self::Push(err) => write!(f, "{err}"),
            Self::StoreUnavailable => write!(f, "quote store is unavailable"),
            Self::Persist(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(err) | Self::Push(err) => Some(err),
            Self::StoreUnavailable => None,
            Self::Persist(err) => Some(err),
        }
    }
}

/// Summary of one completed (possibly failed) cycle.
#[derive(Debug)]
pub struct SyncReport {
    pub cycle_id: Uuid,
    pub counts: MergeCounts,
    /// Whether the merged collection was pushed to the remote.
    pub pushed: bool,
    pub failure: Option<SyncFailure>,
}

impl SyncReport {
    fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            counts: MergeCounts::default(),
            pushed: false,
            failure: None,
        }
    }

    fn failed(mut self, failure: SyncFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// One-line user-facing notification text.
    pub fn summary(&self) -> String {
        if let Some(failure) = &self.failure {
            return format!(
                "Sync failed while {}: {failure}",
                failure.phase().as_str()
            );
        }

        let counts = &self.counts;
        format!(
            "Sync complete: {} conflict(s) resolved with the server version, {} quote(s) added from server, {} local-only quote(s){}.",
            counts.conflicts,
            counts.added_from_remote,
            counts.local_only,
            if self.pushed { ", merged collection pushed" } else { "" }
        )
    }
}

/// Result of a cycle request.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(SyncReport),
    /// Another cycle was already in flight.
    Skipped,
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped => None,
        }
    }
}

/// Engine options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Push the merged collection back after a successful persist.
    pub push_merged: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { push_merged: true }
    }
}

/// Reconciles a shared quote store with one remote endpoint.
///
/// Cloning is cheap; clones share the store, the phase and the in-flight
/// guard, so periodic and manual triggers cannot overlap.
pub struct SyncEngine<R: KeyValueRepository> {
    store: Arc<Mutex<QuoteStore<R>>>,
    remote: Arc<dyn RemoteQuoteEndpoint>,
    options: SyncOptions,
    in_flight: Arc<AtomicBool>,
    phase: Arc<Mutex<SyncPhase>>,
}

impl<R: KeyValueRepository> Clone for SyncEngine<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            remote: Arc::clone(&self.remote),
            options: self.options.clone(),
            in_flight: Arc::clone(&self.in_flight),
            phase: Arc::clone(&self.phase),
        }
    }
}

impl<R: KeyValueRepository> SyncEngine<R> {
    pub fn new(
        store: Arc<Mutex<QuoteStore<R>>>,
        remote: Arc<dyn RemoteQuoteEndpoint>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            remote,
            options,
            in_flight: Arc::new(AtomicBool::new(false)),
            phase: Arc::new(Mutex::new(SyncPhase::Idle)),
        }
    }

    /// Shared handle to the synchronized store.
    pub fn store(&self) -> Arc<Mutex<QuoteStore<R>>> {
        Arc::clone(&self.store)
    }

    pub fn endpoint_id(&self) -> &str {
        self.remote.endpoint_id()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Runs one cycle unless another is in flight.
    pub fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            info!(
                "event=sync_cycle module=sync status=skipped reason=in_flight endpoint={}",
                self.remote.endpoint_id()
            );
            return CycleOutcome::Skipped;
        };

        let cycle_id = Uuid::new_v4();
        let started_at = Instant::now();
        info!(
            "event=sync_cycle module=sync status=start cycle_id={cycle_id} endpoint={}",
            self.remote.endpoint_id()
        );

        let report = self.run_steps(SyncReport::new(cycle_id));
        self.set_phase(SyncPhase::Idle);

        let counts = report.counts;
        match &report.failure {
            None => info!(
                "event=sync_cycle module=sync status=ok cycle_id={cycle_id} duration_ms={} conflicts={} added_from_remote={} local_only={} skipped_remote={} pushed={}",
                started_at.elapsed().as_millis(),
                counts.conflicts,
                counts.added_from_remote,
                counts.local_only,
                counts.skipped_remote,
                report.pushed
            ),
            Some(failure) => error!(
                "event=sync_cycle module=sync status=error cycle_id={cycle_id} duration_ms={} phase={} error={failure}",
                started_at.elapsed().as_millis(),
                failure.phase().as_str()
            ),
        }

        CycleOutcome::Completed(report)
    }

    fn run_steps(&self, mut report: SyncReport) -> SyncReport {
        self.set_phase(SyncPhase::Fetching);
        let remote_records = match self.remote.fetch() {
            Ok(records) => records,
            Err(err) => return report.failed(SyncFailure::Fetch(err)),
        };

        self.set_phase(SyncPhase::Merging);
        let merged = {
            let Ok(mut store) = self.store.lock() else {
                return report.failed(SyncFailure::StoreUnavailable);
            };
            let result = merge_remote_wins(&store.snapshot(), remote_records);
            report.counts = result.counts;

            self.set_phase(SyncPhase::Persisting);
            if result.counts.changed_local() {
                if let Err(err) = store.replace_all(result.quotes.clone()) {
                    return report.failed(SyncFailure::Persist(err));
                }
            }
            result.quotes
        };

        if self.options.push_merged {
            self.set_phase(SyncPhase::Pushing);
            match self.push(&merged) {
                Ok(()) => report.pushed = true,
                Err(err) => return report.failed(SyncFailure::Push(err)),
            }
        }

        report
    }

    fn push(&self, merged: &[Quote]) -> Result<(), TransportError> {
        self.remote.push(merged).inspect_err(|err| {
            warn!(
                "event=sync_push module=sync status=error endpoint={} retryable={} code={}",
                err.endpoint_id, err.retryable, err.code
            );
        })
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }
}

/// Holds the in-flight flag for the lifetime of a cycle, including unwinds.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
