//! Remote collection capability consumed by the sync engine.
//!
//! # Responsibility
//! - Define the opaque fetch/push contract for a remote quote collection.
//! - Define the transport error envelope reported in sync summaries.
//!
//! # Invariants
//! - `fetch` returns a full snapshot; `push` replaces the remote snapshot
//!   wholesale. No partial or versioned updates exist.

use crate::model::quote::Quote;
use crate::service::transfer::QuoteDraft;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TransportResult<T> = Result<T, TransportError>;

/// Sync step in which a transport failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    Fetch,
    Push,
}

impl TransportStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Push => "push",
        }
    }
}

/// Transport failure envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub endpoint_id: String,
    pub stage: TransportStage,
    /// Stable machine-readable code, e.g. `io_error`.
    pub code: String,
    pub message: String,
    /// Whether the next cycle may reasonably succeed without intervention.
    pub retryable: bool,
}

impl TransportError {
    pub fn new(
        endpoint_id: impl Into<String>,
        stage: TransportStage,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            stage,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed on `{}` ({}): {}",
            self.stage.as_str(),
            self.endpoint_id,
            self.code,
            self.message
        )
    }
}

impl Error for TransportError {}

/// Opaque remote quote collection.
pub trait RemoteQuoteEndpoint: Send + Sync {
    /// Stable id used in logs and error envelopes.
    fn endpoint_id(&self) -> &str;

    /// Fetches the full remote snapshot as unvalidated records.
    ///
    /// Malformed elements come back as drafts that fail validation, so one
    /// bad record does not fail the whole fetch.
    fn fetch(&self) -> TransportResult<Vec<QuoteDraft>>;

    /// Replaces the remote snapshot with `quotes`.
    fn push(&self, quotes: &[Quote]) -> TransportResult<()>;
}
