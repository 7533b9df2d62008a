//! Quote store use-case service.
//!
//! # Responsibility
//! - Own the ordered quote collection for the running instance.
//! - Mirror the full collection into durable storage after every mutation.
//! - Track the last selected filter (durable) and last shown quote (session).
//!
//! # Invariants
//! - No two stored quotes share a `QuoteKey`.
//! - Every stored quote passes `Quote::validate()`.
//! - A failed durable write never rolls back the in-memory change; the
//!   failure is returned in `StorageOutcome::storage_error`.

use crate::model::quote::{default_quotes, CategoryFilter, Quote, QuoteKey, QuoteValidationError};
use crate::repo::kv_repo::{
    KeyValueRepository, MemoryKeyValueRepository, StorageError, StorageResult,
};
use crate::service::transfer::{decode_import, encode_export, ImportError, QuoteDraft};
use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Durable key holding the JSON-encoded collection.
pub const QUOTES_KEY: &str = "quotes";
/// Durable key holding the last selected category filter.
pub const LAST_FILTER_KEY: &str = "lastFilter";
/// Session key holding the last shown quote text.
pub const LAST_QUOTE_TEXT_KEY: &str = "lastQuoteText";
/// Session key holding the last shown quote category.
pub const LAST_QUOTE_CATEGORY_KEY: &str = "lastQuoteCategory";

/// Result of an operation whose in-memory effect always applies but whose
/// storage side may have failed.
#[derive(Debug)]
pub struct StorageOutcome<T> {
    pub value: T,
    pub storage_error: Option<StorageError>,
}

impl<T> StorageOutcome<T> {
    fn new(value: T, storage_error: Option<StorageError>) -> Self {
        Self {
            value,
            storage_error,
        }
    }

    /// Returns whether the storage side completed.
    pub fn is_persisted(&self) -> bool {
        self.storage_error.is_none()
    }

    /// Drops the storage status and keeps the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Error for `QuoteStore::add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddQuoteError {
    Validation(QuoteValidationError),
    /// A quote with the same identity already exists.
    Duplicate(QuoteKey),
}

impl Display for AddQuoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Duplicate(_) => write!(f, "quote already exists"),
        }
    }
}

impl Error for AddQuoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Duplicate(_) => None,
        }
    }
}

impl From<QuoteValidationError> for AddQuoteError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

/// No quote is available for the requested selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyCollectionError;

impl Display for EmptyCollectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "no quotes available for this category")
    }
}

impl Error for EmptyCollectionError {}

/// Counters produced by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records appended to the store.
    pub added: usize,
    /// Valid records whose identity already existed.
    pub duplicates: usize,
    /// Records dropped by validation.
    pub skipped: usize,
}

/// Last quote shown in this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastViewed {
    pub text: String,
    pub category: String,
}

/// Picks one element uniformly at random.
pub fn pick_random<T>(items: &[T]) -> Result<&T, EmptyCollectionError> {
    pick_random_with(items, &mut rand::thread_rng())
}

/// Picks one element uniformly at random using the provided generator.
pub fn pick_random_with<'a, T, G: Rng + ?Sized>(
    items: &'a [T],
    rng: &mut G,
) -> Result<&'a T, EmptyCollectionError> {
    items.choose(rng).ok_or(EmptyCollectionError)
}

/// Authoritative local quote collection.
pub struct QuoteStore<R: KeyValueRepository> {
    durable: R,
    session: MemoryKeyValueRepository,
    quotes: Vec<Quote>,
}

impl<R: KeyValueRepository> QuoteStore<R> {
    /// Loads the collection from durable storage.
    ///
    /// Falls back to the built-in default set when the key is absent. When
    /// the stored value cannot be read or decoded, the defaults are used in
    /// memory and the failure is returned alongside the store. Invalid or
    /// repeated stored records are dropped.
    pub fn load(durable: R) -> StorageOutcome<Self> {
        let (quotes, storage_error) = match durable.get(QUOTES_KEY) {
            Ok(Some(raw)) => match decode_stored(&raw) {
                Ok(stored) => {
                    let mut quotes = Vec::with_capacity(stored.len());
                    let report = merge_unique(
                        &mut quotes,
                        stored.into_iter().map(QuoteDraft::from),
                    );
                    if report.duplicates > 0 || report.skipped > 0 {
                        warn!(
                            "event=store_load module=store status=repaired dropped_duplicates={} dropped_invalid={}",
                            report.duplicates, report.skipped
                        );
                    }
                    (quotes, None)
                }
                Err(err) => (default_quotes(), Some(err)),
            },
            Ok(None) => {
                debug!("event=store_load module=store status=ok source=defaults");
                (default_quotes(), None)
            }
            Err(err) => (default_quotes(), Some(err)),
        };

        match &storage_error {
            Some(err) => error!(
                "event=store_load module=store status=error fallback=defaults error={err}"
            ),
            None => info!(
                "event=store_load module=store status=ok total={}",
                quotes.len()
            ),
        }

        StorageOutcome::new(
            Self {
                durable,
                session: MemoryKeyValueRepository::new(),
                quotes,
            },
            storage_error,
        )
    }

    /// Creates an empty store without touching durable storage.
    pub fn empty(durable: R) -> Self {
        Self {
            durable,
            session: MemoryKeyValueRepository::new(),
            quotes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Appends one quote and persists the full collection.
    ///
    /// # Errors
    /// - `Validation` when text or category is blank after trimming.
    /// - `Duplicate` when a quote with the same identity exists.
    pub fn add(
        &mut self,
        text: &str,
        category: &str,
    ) -> Result<StorageOutcome<Quote>, AddQuoteError> {
        let quote = match Quote::new(text, category) {
            Ok(quote) => quote,
            Err(err) => {
                warn!("event=quote_add module=store status=rejected reason={err}");
                return Err(err.into());
            }
        };
        let key = quote.key();
        if self.quotes.iter().any(|existing| existing.key() == key) {
            warn!("event=quote_add module=store status=rejected reason=duplicate");
            return Err(AddQuoteError::Duplicate(key));
        }

        self.quotes.push(quote.clone());
        let storage_error = self.persist().err();
        info!(
            "event=quote_add module=store status=ok total={} persisted={}",
            self.quotes.len(),
            storage_error.is_none()
        );
        Ok(StorageOutcome::new(quote, storage_error))
    }

    /// Lists quotes matching `filter` in store order.
    pub fn list(&self, filter: &CategoryFilter) -> Vec<&Quote> {
        self.quotes
            .iter()
            .filter(|quote| quote.matches(filter))
            .collect()
    }

    /// Returns unique categories in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.quotes
            .iter()
            .filter(|quote| seen.insert(quote.category.as_str()))
            .map(|quote| quote.category.clone())
            .collect()
    }

    /// Picks a random quote under `filter` and records it in the session.
    ///
    /// When nothing matches, the session record is cleared and
    /// `EmptyCollectionError` is returned for the caller's placeholder.
    pub fn show_random(&self, filter: &CategoryFilter) -> Result<Quote, EmptyCollectionError> {
        let candidates = self.list(filter);
        match pick_random(&candidates) {
            Ok(quote) => {
                let quote = (*quote).clone();
                let recorded = self
                    .session
                    .put(LAST_QUOTE_TEXT_KEY, &quote.text)
                    .and_then(|()| self.session.put(LAST_QUOTE_CATEGORY_KEY, &quote.category));
                if let Err(err) = recorded {
                    warn!("event=session_write module=store status=error error={err}");
                }
                Ok(quote)
            }
            Err(err) => {
                let cleared = self
                    .session
                    .remove(LAST_QUOTE_TEXT_KEY)
                    .and_then(|()| self.session.remove(LAST_QUOTE_CATEGORY_KEY));
                if let Err(err) = cleared {
                    warn!("event=session_write module=store status=error error={err}");
                }
                debug!(
                    "event=quote_show module=store status=empty filter_all={}",
                    *filter == CategoryFilter::All
                );
                Err(err)
            }
        }
    }

    /// Returns the last quote shown in this session, if any.
    pub fn last_viewed(&self) -> Option<LastViewed> {
        let text = self.session.get(LAST_QUOTE_TEXT_KEY).ok()??;
        let category = self.session.get(LAST_QUOTE_CATEGORY_KEY).ok()??;
        Some(LastViewed { text, category })
    }

    /// Persists the selected filter.
    pub fn select_filter(&self, filter: &CategoryFilter) -> StorageResult<()> {
        self.durable
            .put(LAST_FILTER_KEY, filter.as_str())
            .inspect_err(|err| {
                error!("event=filter_save module=store status=error error={err}");
            })
    }

    /// Restores the persisted filter.
    ///
    /// Returns `All` when nothing was saved, storage fails, or the saved
    /// category no longer exists in the collection.
    pub fn saved_filter(&self) -> CategoryFilter {
        let saved = match self.durable.get(LAST_FILTER_KEY) {
            Ok(Some(value)) => CategoryFilter::parse(&value),
            Ok(None) => return CategoryFilter::All,
            Err(err) => {
                warn!("event=filter_load module=store status=error error={err}");
                return CategoryFilter::All;
            }
        };

        match &saved {
            CategoryFilter::Category(category)
                if !self.quotes.iter().any(|quote| quote.category == *category) =>
            {
                CategoryFilter::All
            }
            _ => saved,
        }
    }

    /// Validates and merges candidates by identity.
    ///
    /// Invalid candidates are counted as skipped, identity collisions as
    /// duplicates; neither is an error. Persists only when something was
    /// added.
    pub fn import_many(
        &mut self,
        records: impl IntoIterator<Item = QuoteDraft>,
    ) -> StorageOutcome<ImportReport> {
        let report = merge_unique(&mut self.quotes, records);
        let storage_error = if report.added > 0 {
            self.persist().err()
        } else {
            None
        };

        info!(
            "event=quote_import module=store status=ok added={} duplicates={} skipped={} total={} persisted={}",
            report.added,
            report.duplicates,
            report.skipped,
            self.quotes.len(),
            storage_error.is_none()
        );
        StorageOutcome::new(report, storage_error)
    }

    /// Parses a JSON import document and merges its elements.
    ///
    /// # Errors
    /// - `ImportError` when the document is not a JSON array; the store is
    ///   unchanged.
    pub fn import_json(
        &mut self,
        bytes: &[u8],
    ) -> Result<StorageOutcome<ImportReport>, ImportError> {
        let drafts = decode_import(bytes).inspect_err(|err| {
            warn!("event=quote_import module=store status=rejected error={err}");
        })?;
        Ok(self.import_many(drafts))
    }

    /// Serializes the full ordered collection as pretty-printed JSON.
    pub fn export_all(&self) -> Result<Vec<u8>, serde_json::Error> {
        encode_export(&self.quotes)
    }

    /// Returns an owned copy of the ordered collection.
    pub fn snapshot(&self) -> Vec<Quote> {
        self.quotes.clone()
    }

    /// Replaces the whole collection in one assignment, then persists it.
    ///
    /// The in-memory replacement stands even when persistence fails.
    pub(crate) fn replace_all(&mut self, quotes: Vec<Quote>) -> StorageResult<()> {
        self.quotes = quotes;
        self.persist()
    }

    fn persist(&self) -> StorageResult<()> {
        let encoded = serde_json::to_string(&self.quotes).map_err(StorageError::Encode)?;
        self.durable
            .put(QUOTES_KEY, &encoded)
            .inspect_err(|err| {
                error!(
                    "event=store_persist module=store status=error total={} error={err}",
                    self.quotes.len()
                );
            })
    }
}

fn decode_stored(raw: &str) -> StorageResult<Vec<Quote>> {
    serde_json::from_str(raw).map_err(|err| StorageError::InvalidData {
        key: QUOTES_KEY.to_string(),
        message: err.to_string(),
    })
}

/// Appends every valid candidate whose identity is not yet in `target`.
fn merge_unique(
    target: &mut Vec<Quote>,
    records: impl IntoIterator<Item = QuoteDraft>,
) -> ImportReport {
    let mut seen: HashSet<QuoteKey> = target.iter().map(Quote::key).collect();
    let mut report = ImportReport::default();

    for draft in records {
        let Some(quote) = draft.into_quote() else {
            report.skipped += 1;
            continue;
        };
        if seen.insert(quote.key()) {
            target.push(quote);
            report.added += 1;
        } else {
            report.duplicates += 1;
        }
    }

    report
}
