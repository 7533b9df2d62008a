use quotesync_core::db::open_db_in_memory;
use quotesync_core::{
    CategoryFilter, CycleOutcome, FileRemote, KeyValueRepository, MemoryKeyValueRepository,
    MemoryRemote, Quote, QuoteDraft, QuoteStore, RemoteQuoteEndpoint, SqliteKeyValueRepository,
    StorageError, StorageResult, SyncEngine, SyncFailure, SyncOptions, SyncPhase, SyncReport,
    TransportResult,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

fn quote(text: &str, category: &str) -> Quote {
    Quote::new(text, category).unwrap()
}

fn store_with(quotes: &[Quote]) -> Arc<Mutex<QuoteStore<SqliteKeyValueRepository>>> {
    let repo = SqliteKeyValueRepository::new(open_db_in_memory().unwrap());
    let mut store = QuoteStore::empty(repo);
    store.import_many(quotes.iter().cloned().map(Into::into));
    Arc::new(Mutex::new(store))
}

fn completed(outcome: CycleOutcome) -> SyncReport {
    match outcome {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::Skipped => panic!("cycle was unexpectedly skipped"),
    }
}

#[test]
fn remote_wins_on_text_identity_conflict() {
    let store = store_with(&[quote("A", "X")]);
    let remote = Arc::new(MemoryRemote::new("memory", vec![quote("A", "Y")]));
    let engine = SyncEngine::new(Arc::clone(&store), remote, SyncOptions::default());

    let report = completed(engine.run_cycle());
    assert!(report.is_success());
    assert_eq!(report.counts.conflicts, 1);
    assert_eq!(report.counts.added_from_remote, 0);
    assert_eq!(store.lock().unwrap().snapshot(), vec![quote("A", "Y")]);
}

#[test]
fn cycle_merges_both_directions_and_pushes_result() {
    let store = store_with(&[quote("local", "L"), quote("shared", "S")]);
    let remote = Arc::new(MemoryRemote::new(
        "memory",
        vec![quote("shared", "S"), quote("remote", "R")],
    ));
    let engine = SyncEngine::new(
        Arc::clone(&store),
        Arc::clone(&remote) as Arc<dyn RemoteQuoteEndpoint>,
        SyncOptions::default(),
    );

    let report = completed(engine.run_cycle());
    assert_eq!(report.counts.added_from_remote, 1);
    assert_eq!(report.counts.local_only, 1);
    assert!(report.pushed);

    let expected = vec![quote("local", "L"), quote("shared", "S"), quote("remote", "R")];
    assert_eq!(store.lock().unwrap().snapshot(), expected);
    assert_eq!(remote.snapshot(), expected);
}

#[test]
fn second_cycle_with_unchanged_remote_is_idempotent() {
    let store = store_with(&[quote("A", "X"), quote("B", "X")]);
    let remote = Arc::new(MemoryRemote::new(
        "memory",
        vec![quote("A", "Y"), quote("C", "Z")],
    ));
    let engine = SyncEngine::new(
        Arc::clone(&store),
        remote,
        SyncOptions { push_merged: false },
    );

    completed(engine.run_cycle());
    let after_first = store.lock().unwrap().snapshot();

    let second = completed(engine.run_cycle());
    assert_eq!(second.counts.conflicts, 0);
    assert_eq!(second.counts.added_from_remote, 0);
    assert_eq!(second.counts.local_only, 1);
    assert!(!second.pushed);
    assert_eq!(store.lock().unwrap().snapshot(), after_first);
}

#[test]
fn fetch_failure_leaves_store_untouched_and_skips_push() {
    let store = store_with(&[quote("A", "X")]);
    let remote = Arc::new(MemoryRemote::new("memory", vec![quote("B", "Y")]));
    remote.set_fail_fetch(true);
    let engine = SyncEngine::new(
        Arc::clone(&store),
        Arc::clone(&remote) as Arc<dyn RemoteQuoteEndpoint>,
        SyncOptions::default(),
    );

    let report = completed(engine.run_cycle());
    assert!(matches!(report.failure, Some(SyncFailure::Fetch(_))));
    assert!(!report.pushed);
    assert_eq!(remote.push_calls(), 0);
    assert_eq!(store.lock().unwrap().snapshot(), vec![quote("A", "X")]);
    assert_eq!(engine.phase(), SyncPhase::Idle);
    assert!(report.summary().starts_with("Sync failed while fetching"));
}

#[test]
fn push_failure_keeps_merged_local_state() {
    let store = store_with(&[quote("A", "X")]);
    let remote = Arc::new(MemoryRemote::new("memory", vec![quote("B", "Y")]));
    remote.set_fail_push(true);
    let engine = SyncEngine::new(
        Arc::clone(&store),
        Arc::clone(&remote) as Arc<dyn RemoteQuoteEndpoint>,
        SyncOptions::default(),
    );

    let report = completed(engine.run_cycle());
    assert!(matches!(report.failure, Some(SyncFailure::Push(_))));
    assert_eq!(report.counts.added_from_remote, 1);
    assert_eq!(store.lock().unwrap().len(), 2);
    assert_eq!(remote.snapshot(), vec![quote("B", "Y")]);
}

struct FailingWrites {
    inner: MemoryKeyValueRepository,
    fail: Arc<AtomicBool>,
}

impl KeyValueRepository for FailingWrites {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("quota exceeded".to_string()));
        }
        self.inner.put(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(key)
    }
}

#[test]
fn persist_failure_reports_and_skips_push() {
    let fail = Arc::new(AtomicBool::new(false));
    let mut store = QuoteStore::empty(FailingWrites {
        inner: MemoryKeyValueRepository::new(),
        fail: Arc::clone(&fail),
    });
    store.add("A", "X").unwrap();
    fail.store(true, Ordering::SeqCst);

    let store = Arc::new(Mutex::new(store));
    let remote = Arc::new(MemoryRemote::new("memory", vec![quote("A", "Y")]));
    let engine = SyncEngine::new(
        Arc::clone(&store),
        Arc::clone(&remote) as Arc<dyn RemoteQuoteEndpoint>,
        SyncOptions::default(),
    );

    let report = completed(engine.run_cycle());
    assert!(matches!(report.failure, Some(SyncFailure::Persist(_))));
    assert_eq!(remote.push_calls(), 0);
    assert_eq!(store.lock().unwrap().snapshot(), vec![quote("A", "Y")]);
}

/// Remote whose fetch parks until the test releases it.
struct GatedRemote {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl RemoteQuoteEndpoint for GatedRemote {
    fn endpoint_id(&self) -> &str {
        "gated"
    }

    fn fetch(&self) -> TransportResult<Vec<QuoteDraft>> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Ok(vec![quote("remote", "R").into()])
    }

    fn push(&self, _quotes: &[Quote]) -> TransportResult<()> {
        Ok(())
    }
}

#[test]
fn overlapping_cycle_is_skipped_while_one_is_in_flight() {
    let (entered_tx, entered_rx) = channel();
    let (release_tx, release_rx) = channel();
    let remote = Arc::new(GatedRemote {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let store = store_with(&[]);
    let engine = SyncEngine::new(Arc::clone(&store), remote, SyncOptions::default());

    let background = engine.clone();
    let running = thread::spawn(move || background.run_cycle());

    entered_rx.recv().unwrap();
    assert!(engine.is_in_flight());
    assert_eq!(engine.phase(), SyncPhase::Fetching);
    assert!(matches!(engine.run_cycle(), CycleOutcome::Skipped));

    release_tx.send(()).unwrap();
    let report = completed(running.join().unwrap());
    assert_eq!(report.counts.added_from_remote, 1);
    assert!(!engine.is_in_flight());
    assert_eq!(engine.phase(), SyncPhase::Idle);
}

#[test]
fn padded_remote_records_are_stored_trimmed() {
    let store = store_with(&[]);
    let padded = Quote {
        id: None,
        text: "  spaced  ".to_string(),
        category: " Life ".to_string(),
    };
    let remote = Arc::new(MemoryRemote::new("memory", vec![padded]));
    let engine = SyncEngine::new(Arc::clone(&store), remote, SyncOptions::default());

    let report = completed(engine.run_cycle());
    assert_eq!(report.counts.added_from_remote, 1);

    let store = store.lock().unwrap();
    assert_eq!(store.snapshot(), vec![quote("spaced", "Life")]);
    assert_eq!(store.list(&CategoryFilter::parse("Life")).len(), 1);
    assert_eq!(store.categories(), vec!["Life".to_string()]);
}

#[test]
fn file_remote_with_one_bad_element_still_merges_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remote.json");
    std::fs::write(
        &path,
        br#"[{"text":"good","category":"X"},{"text":"no category"}]"#,
    )
    .unwrap();

    let store = store_with(&[]);
    let engine = SyncEngine::new(
        Arc::clone(&store),
        Arc::new(FileRemote::new(&path)),
        SyncOptions::default(),
    );

    let report = completed(engine.run_cycle());
    assert!(report.is_success());
    assert_eq!(report.counts.skipped_remote, 1);
    assert_eq!(report.counts.added_from_remote, 1);
    assert_eq!(store.lock().unwrap().snapshot(), vec![quote("good", "X")]);

    let pushed: Vec<Quote> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(pushed, vec![quote("good", "X")]);
}
