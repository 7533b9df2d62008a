//! Domain model for the quote collection.
//!
//! # Responsibility
//! - Define canonical data structures used by store and sync logic.
//!
//! # Invariants
//! - Identity is content-based (`QuoteKey`), never positional.

pub mod quote;
