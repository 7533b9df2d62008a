use quotesync_core::db::{open_db, open_db_in_memory};
use quotesync_core::service::quote_store::{
    LAST_FILTER_KEY, LAST_QUOTE_CATEGORY_KEY, LAST_QUOTE_TEXT_KEY, QUOTES_KEY,
};
use quotesync_core::{
    default_quotes, AddQuoteError, CategoryFilter, EmptyCollectionError, ImportError,
    KeyValueRepository, MemoryKeyValueRepository, Quote, QuoteDraft, QuoteStore,
    QuoteValidationError, SqliteKeyValueRepository, StorageError, StorageResult,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn sqlite_store() -> QuoteStore<SqliteKeyValueRepository> {
    let repo = SqliteKeyValueRepository::new(open_db_in_memory().unwrap());
    QuoteStore::load(repo).into_value()
}

fn empty_store() -> QuoteStore<MemoryKeyValueRepository> {
    QuoteStore::empty(MemoryKeyValueRepository::new())
}

/// Key-value repository whose writes can be switched to fail.
struct FlakyRepository {
    inner: MemoryKeyValueRepository,
    fail_writes: Arc<AtomicBool>,
}

impl KeyValueRepository for FlakyRepository {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk full".to_string()));
        }
        self.inner.put(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(key)
    }
}

#[test]
fn load_uses_default_set_when_storage_is_empty() {
    let store = sqlite_store();
    assert_eq!(store.snapshot(), default_quotes());
}

#[test]
fn stored_empty_array_loads_as_empty_store() {
    let repo = MemoryKeyValueRepository::new();
    repo.put(QUOTES_KEY, "[]").unwrap();
    let store = QuoteStore::load(repo).into_value();
    assert!(store.is_empty());
}

#[test]
fn corrupt_stored_collection_falls_back_to_defaults_and_reports() {
    let repo = MemoryKeyValueRepository::new();
    repo.put(QUOTES_KEY, "{not json").unwrap();
    let outcome = QuoteStore::load(repo);
    assert!(matches!(
        outcome.storage_error,
        Some(StorageError::InvalidData { .. })
    ));
    assert_eq!(outcome.value.snapshot(), default_quotes());
}

#[test]
fn load_drops_invalid_and_repeated_stored_records() {
    let repo = MemoryKeyValueRepository::new();
    repo.put(
        QUOTES_KEY,
        r#"[{"text":"a","category":"x"},{"text":" a ","category":"y"},{"text":"","category":"z"}]"#,
    )
    .unwrap();
    let store = QuoteStore::load(repo).into_value();
    assert_eq!(store.snapshot(), vec![Quote::new("a", "x").unwrap()]);
}

#[test]
fn add_grows_store_by_one_and_is_listed_under_all() {
    let mut store = sqlite_store();
    let before = store.len();

    let outcome = store.add("  Stay hungry.  ", " Work ").unwrap();
    assert!(outcome.is_persisted());
    assert_eq!(outcome.value, Quote::new("Stay hungry.", "Work").unwrap());

    assert_eq!(store.len(), before + 1);
    assert!(store
        .list(&CategoryFilter::All)
        .contains(&&Quote::new("Stay hungry.", "Work").unwrap()));
}

#[test]
fn add_with_blank_field_leaves_store_unchanged() {
    let mut store = sqlite_store();
    let before = store.snapshot();

    assert_eq!(
        store.add("   ", "Work").unwrap_err(),
        AddQuoteError::Validation(QuoteValidationError::EmptyText)
    );
    assert_eq!(
        store.add("text", "").unwrap_err(),
        AddQuoteError::Validation(QuoteValidationError::EmptyCategory)
    );
    assert_eq!(store.snapshot(), before);
}

#[test]
fn add_rejects_existing_identity() {
    let mut store = empty_store();
    store.add("same words", "A").unwrap();
    let err = store.add("same   words", "B").unwrap_err();
    assert!(matches!(err, AddQuoteError::Duplicate(_)));
    assert_eq!(store.len(), 1);
}

#[test]
fn mutations_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.sqlite3");

    {
        let repo = SqliteKeyValueRepository::new(open_db(&path).unwrap());
        let mut store = QuoteStore::empty(repo);
        store.add("persisted", "Life").unwrap();
        store
            .select_filter(&CategoryFilter::Category("Life".to_string()))
            .unwrap();
    }

    let repo = SqliteKeyValueRepository::new(open_db(&path).unwrap());
    let store = QuoteStore::load(repo).into_value();
    assert_eq!(store.snapshot(), vec![Quote::new("persisted", "Life").unwrap()]);
    assert_eq!(
        store.saved_filter(),
        CategoryFilter::Category("Life".to_string())
    );
}

#[test]
fn saved_filter_falls_back_to_all_for_unknown_category() {
    let repo = MemoryKeyValueRepository::new();
    repo.put(LAST_FILTER_KEY, "Vanished").unwrap();
    repo.put(QUOTES_KEY, r#"[{"text":"a","category":"Life"}]"#).unwrap();
    let store = QuoteStore::load(repo).into_value();
    assert_eq!(store.saved_filter(), CategoryFilter::All);
}

#[test]
fn list_returns_empty_for_unmatched_category() {
    let store = sqlite_store();
    assert!(store
        .list(&CategoryFilter::Category("Nope".to_string()))
        .is_empty());
}

#[test]
fn show_random_records_session_and_clears_it_when_empty() {
    let mut store = empty_store();
    store.add("only", "Life").unwrap();

    let shown = store.show_random(&CategoryFilter::All).unwrap();
    assert_eq!(shown.text, "only");
    let last = store.last_viewed().expect("last viewed should be recorded");
    assert_eq!(last.text, "only");
    assert_eq!(last.category, "Life");

    let err = store
        .show_random(&CategoryFilter::Category("Work".to_string()))
        .unwrap_err();
    assert_eq!(err, EmptyCollectionError);
    assert!(store.last_viewed().is_none());
}

#[test]
fn session_state_does_not_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.sqlite3");

    {
        let repo = SqliteKeyValueRepository::new(open_db(&path).unwrap());
        let mut store = QuoteStore::empty(repo);
        store.add("only", "Life").unwrap();
        store.show_random(&CategoryFilter::All).unwrap();
        assert!(store.last_viewed().is_some());
    }

    let conn = open_db(&path).unwrap();
    let session_rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM kv_entries WHERE key IN (?1, ?2);",
            [LAST_QUOTE_TEXT_KEY, LAST_QUOTE_CATEGORY_KEY],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(session_rows, 0);

    let reopened = QuoteStore::load(SqliteKeyValueRepository::new(conn)).into_value();
    assert!(reopened.last_viewed().is_none());
}

#[test]
fn export_then_import_into_empty_store_round_trips() {
    let mut source = empty_store();
    source.add("first", "A").unwrap();
    source.add("second", "B").unwrap();
    source.import_many(vec![QuoteDraft::from(
        Quote::new("third", "A").unwrap().with_id("remote-3"),
    )]);

    let exported = source.export_all().unwrap();

    let mut target = empty_store();
    let report = target.import_json(&exported).unwrap().into_value();
    assert_eq!(report.added, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(target.snapshot(), source.snapshot());
}

#[test]
fn import_with_one_valid_and_one_invalid_record_reports_one_skip() {
    let mut store = sqlite_store();
    let before = store.len();

    let report = store
        .import_json(br#"[{"text":"new one","category":"Fresh"},{"text":"","category":"Fresh"}]"#)
        .unwrap()
        .into_value();

    assert_eq!(report.added, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.len(), before + 1);
}

#[test]
fn import_ignores_duplicates_within_batch_and_against_store() {
    let mut store = empty_store();
    store.add("kept", "A").unwrap();

    let report = store
        .import_many(vec![
            QuoteDraft::from(Quote::new("kept", "B").unwrap()),
            QuoteDraft::from(Quote::new("new", "B").unwrap()),
            QuoteDraft::from(Quote::new("new", "C").unwrap()),
        ])
        .into_value();

    assert_eq!(report.added, 1);
    assert_eq!(report.duplicates, 2);
    assert_eq!(
        store.snapshot(),
        vec![Quote::new("kept", "A").unwrap(), Quote::new("new", "B").unwrap()]
    );
}

#[test]
fn import_of_non_array_document_leaves_store_unchanged() {
    let mut store = sqlite_store();
    let before = store.snapshot();
    let err = store
        .import_json(br#"{"text":"a","category":"b"}"#)
        .unwrap_err();
    assert!(matches!(err, ImportError::NotAnArray));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn storage_failure_keeps_in_memory_change_and_reports() {
    let fail_writes = Arc::new(AtomicBool::new(true));
    let repo = FlakyRepository {
        inner: MemoryKeyValueRepository::new(),
        fail_writes: Arc::clone(&fail_writes),
    };
    let mut store = QuoteStore::empty(repo);

    let outcome = store.add("kept in memory", "Life").unwrap();
    assert!(!outcome.is_persisted());
    assert!(matches!(
        outcome.storage_error,
        Some(StorageError::Unavailable(_))
    ));
    assert_eq!(store.len(), 1);

    fail_writes.store(false, Ordering::SeqCst);
    let outcome = store.add("second", "Life").unwrap();
    assert!(outcome.is_persisted());
}
