//! Quote domain model.
//!
//! # Responsibility
//! - Define the canonical quote record shared by store, transfer and sync.
//! - Define the identity key used for deduplication and conflict detection.
//!
//! # Invariants
//! - `text` and `category` are non-empty after trimming for every stored quote.
//! - Two quotes are "the same quote" iff their `QuoteKey` values are equal.
//! - `id` is carried for remote fidelity only and never participates in identity.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Sentinel filter value that selects every category.
pub const ALL_CATEGORIES: &str = "all";

/// Canonical quote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Opaque identifier assigned by a remote side, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Quote body, stored trimmed.
    pub text: String,
    /// Category label, stored trimmed.
    pub category: String,
}

impl Quote {
    /// Builds a validated quote from raw user input.
    ///
    /// Both fields are trimmed before validation and storage.
    pub fn new(
        text: impl AsRef<str>,
        category: impl AsRef<str>,
    ) -> Result<Self, QuoteValidationError> {
        let quote = Self {
            id: None,
            text: text.as_ref().trim().to_string(),
            category: category.as_ref().trim().to_string(),
        };
        quote.validate()?;
        Ok(quote)
    }

    /// Attaches an opaque remote identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Checks the non-empty field invariants.
    pub fn validate(&self) -> Result<(), QuoteValidationError> {
        if self.text.trim().is_empty() {
            return Err(QuoteValidationError::EmptyText);
        }
        if self.category.trim().is_empty() {
            return Err(QuoteValidationError::EmptyCategory);
        }
        Ok(())
    }

    /// Returns the identity key of this quote.
    pub fn key(&self) -> QuoteKey {
        QuoteKey::from_text(&self.text)
    }

    /// Returns whether this quote falls under `filter`.
    pub fn matches(&self, filter: &CategoryFilter) -> bool {
        match filter {
            CategoryFilter::All => true,
            CategoryFilter::Category(category) => self.category == *category,
        }
    }
}

/// Identity of a quote: its text with surrounding whitespace removed and
/// internal whitespace runs collapsed to one space. Case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuoteKey(String);

impl QuoteKey {
    pub fn from_text(text: &str) -> Self {
        Self(WHITESPACE_RE.replace_all(text.trim(), " ").into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for QuoteKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validation error for quote field invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteValidationError {
    EmptyText,
    EmptyCategory,
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "quote text must not be empty"),
            Self::EmptyCategory => write!(f, "quote category must not be empty"),
        }
    }
}

impl Error for QuoteValidationError {}

/// Category selection used by list/random operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    /// Every quote, persisted as the `all` sentinel.
    #[default]
    All,
    /// Quotes whose category equals this value exactly.
    Category(String),
}

impl CategoryFilter {
    /// Parses a persisted or user-provided filter value.
    ///
    /// Blank input and the `all` sentinel both map to `All`.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == ALL_CATEGORIES {
            Self::All
        } else {
            Self::Category(trimmed.to_string())
        }
    }

    /// Stable string form used for persistence.
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_CATEGORIES,
            Self::Category(category) => category.as_str(),
        }
    }
}

impl Display for CategoryFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in collection used when durable storage holds no quotes yet.
pub fn default_quotes() -> Vec<Quote> {
    const DEFAULTS: &[(&str, &str)] = &[
        (
            "The only way to do great work is to love what you do.",
            "Work",
        ),
        (
            "Strive not to be a success, but rather to be of value.",
            "Inspiration",
        ),
        (
            "The mind is everything. What you think you become.",
            "Mindfulness",
        ),
        (
            "The future belongs to those who believe in the beauty of their dreams.",
            "Dreams",
        ),
        (
            "It is during our darkest moments that we must focus to see the light.",
            "Inspiration",
        ),
        (
            "The greatest glory in living lies not in never falling, but in rising every time we fall.",
            "Life",
        ),
        (
            "The way to get started is to quit talking and begin doing.",
            "Action",
        ),
        (
            "If you look at what you have in life, you'll always have more. If you look at what you don't have in life, you'll never have enough.",
            "Gratitude",
        ),
    ];

    DEFAULTS
        .iter()
        .map(|(text, category)| Quote {
            id: None,
            text: (*text).to_string(),
            category: (*category).to_string(),
        })
        .collect()
}
