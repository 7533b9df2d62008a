//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the key-value storage contract consumed by the quote store.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories store opaque strings; encoding belongs to the service layer.

pub mod kv_repo;
