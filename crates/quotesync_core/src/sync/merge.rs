//! Remote-wins collection merge.
//!
//! # Responsibility
//! - Reconcile a local collection with a remote snapshot by `QuoteKey`.
//! - Normalize remote records through the same validation as local adds.
//!
//! # Invariants
//! - Remote precedence: a matched remote record that differs in any field
//!   replaces the local record in place.
//! - Local order is preserved; remote-only records are appended in remote
//!   order.
//! - The output never contains two records with the same key, provided the
//!   local input did not.
//! - Remote text and category are trimmed before comparison and storage.

use crate::model::quote::{Quote, QuoteKey};
use crate::service::transfer::QuoteDraft;
use std::collections::{HashMap, HashSet};

/// Counters reported by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    /// Matched records overwritten by the remote version.
    pub conflicts: usize,
    /// Remote records with no local match, appended.
    pub added_from_remote: usize,
    /// Local records with no remote match, kept (push candidates).
    pub local_only: usize,
    /// Remote records dropped because they fail validation or repeat a key.
    pub skipped_remote: usize,
}

impl MergeCounts {
    /// Whether the merge changed the local collection.
    pub fn changed_local(&self) -> bool {
        self.conflicts > 0 || self.added_from_remote > 0
    }
}

/// Merged collection plus counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub quotes: Vec<Quote>,
    pub counts: MergeCounts,
}

/// Merges `remote` into `local` with remote precedence.
///
/// Remote drafts that do not form a valid quote are counted as skipped.
pub fn merge_remote_wins<I>(local: &[Quote], remote: I) -> MergeResult
where
    I: IntoIterator<Item = QuoteDraft>,
{
    let mut merged = local.to_vec();
    let index: HashMap<QuoteKey, usize> = merged
        .iter()
        .enumerate()
        .map(|(position, quote)| (quote.key(), position))
        .collect();

    let mut counts = MergeCounts::default();
    let mut matched: HashSet<QuoteKey> = HashSet::new();
    let mut appended: HashSet<QuoteKey> = HashSet::new();

    for draft in remote {
        let Some(remote_quote) = draft.into_quote() else {
            counts.skipped_remote += 1;
            continue;
        };
        let key = remote_quote.key();

        match index.get(&key) {
            Some(&position) => {
                if !matched.insert(key) {
                    counts.skipped_remote += 1;
                    continue;
                }
                if merged[position] != remote_quote {
                    merged[position] = remote_quote;
                    counts.conflicts += 1;
                }
            }
            None => {
                if !appended.insert(key) {
                    counts.skipped_remote += 1;
                    continue;
                }
                merged.push(remote_quote);
                counts.added_from_remote += 1;
            }
        }
    }

    counts.local_only = local
        .iter()
        .filter(|quote| !matched.contains(&quote.key()))
        .count();

    MergeResult {
        quotes: merged,
        counts,
    }
}
