//! In-process simulated remote server.
//!
//! Holds a snapshot behind a mutex, counts calls, and can be told to fail
//! the next fetch or push. Used by tests and offline demos.

use crate::model::quote::Quote;
use crate::service::transfer::QuoteDraft;
use crate::sync::remote::{RemoteQuoteEndpoint, TransportError, TransportResult, TransportStage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct MemoryRemote {
    endpoint_id: String,
    snapshot: Mutex<Vec<Quote>>,
    fail_fetch: AtomicBool,
    fail_push: AtomicBool,
    fetch_calls: AtomicUsize,
    push_calls: AtomicUsize,
}

impl MemoryRemote {
    pub fn new(endpoint_id: impl Into<String>, initial: Vec<Quote>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            snapshot: Mutex::new(initial),
            fail_fetch: AtomicBool::new(false),
            fail_push: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
            push_calls: AtomicUsize::new(0),
        }
    }

    /// Returns a copy of the current remote snapshot.
    pub fn snapshot(&self) -> Vec<Quote> {
        self.snapshot
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Replaces the remote snapshot out of band, as another client would.
    pub fn set_snapshot(&self, quotes: Vec<Quote>) {
        if let Ok(mut guard) = self.snapshot.lock() {
            *guard = quotes;
        }
    }

    /// Makes every fetch fail until reset.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Makes every push fail until reset.
    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    fn error(&self, stage: TransportStage, code: &str, message: &str) -> TransportError {
        TransportError::new(self.endpoint_id.as_str(), stage, code, message, true)
    }
}

impl RemoteQuoteEndpoint for MemoryRemote {
    fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    fn fetch(&self) -> TransportResult<Vec<QuoteDraft>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(self.error(TransportStage::Fetch, "unreachable", "simulated outage"));
        }
        self.snapshot
            .lock()
            .map(|guard| guard.iter().cloned().map(QuoteDraft::from).collect())
            .map_err(|_| self.error(TransportStage::Fetch, "poisoned", "snapshot lock poisoned"))
    }

    fn push(&self, quotes: &[Quote]) -> TransportResult<()> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(self.error(TransportStage::Push, "unreachable", "simulated outage"));
        }
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| self.error(TransportStage::Push, "poisoned", "snapshot lock poisoned"))?;
        *guard = quotes.to_vec();
        Ok(())
    }
}
