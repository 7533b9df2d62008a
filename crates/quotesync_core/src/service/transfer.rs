//! JSON export/import codec.
//!
//! # Responsibility
//! - Encode the full collection as pretty-printed UTF-8 JSON.
//! - Decode an import document into per-element candidates, tolerating
//!   malformed elements so they can be counted as skipped.
//!
//! # Invariants
//! - Export order equals store order.
//! - A document that is not a JSON array is rejected as a whole.

use crate::model::quote::Quote;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Whole-document import failure. The store is left untouched.
#[derive(Debug)]
pub enum ImportError {
    /// Input is not valid UTF-8 JSON.
    Parse(serde_json::Error),
    /// Top-level JSON value is not an array.
    NotAnArray,
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "import document is not valid JSON: {err}"),
            Self::NotAnArray => write!(
                f,
                "import document must be an array of quote objects with `text` and `category`"
            ),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::NotAnArray => None,
        }
    }
}

/// One import element before validation.
///
/// Fields are optional so a missing field surfaces as a validation skip
/// instead of a document-level parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QuoteDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl QuoteDraft {
    /// Validates into a stored-shape quote, or `None` when invalid.
    pub fn into_quote(self) -> Option<Quote> {
        let quote = Quote::new(self.text?, self.category?).ok()?;
        Some(match self.id {
            Some(id) => quote.with_id(id),
            None => quote,
        })
    }
}

impl From<Quote> for QuoteDraft {
    fn from(value: Quote) -> Self {
        Self {
            id: value.id,
            text: Some(value.text),
            category: Some(value.category),
        }
    }
}

/// Encodes quotes as a pretty-printed JSON array (two-space indent).
pub fn encode_export(quotes: &[Quote]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(quotes)
}

/// Decodes an import document into drafts.
///
/// Elements that are not objects with string fields become empty drafts,
/// which later fail validation and are reported as skipped.
pub fn decode_import(bytes: &[u8]) -> Result<Vec<QuoteDraft>, ImportError> {
    let document: Value = serde_json::from_slice(bytes).map_err(ImportError::Parse)?;
    let Value::Array(elements) = document else {
        return Err(ImportError::NotAnArray);
    };

    Ok(elements
        .into_iter()
        .map(|element| serde_json::from_value::<QuoteDraft>(element).unwrap_or_default())
        .collect())
}
