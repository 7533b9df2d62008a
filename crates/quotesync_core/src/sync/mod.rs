//! Remote synchronization for the quote store.
//!
//! # Responsibility
//! - Define the remote collection capability and its implementations.
//! - Merge remote snapshots into the store with remote precedence.
//! - Drive cycles manually or on a cancellable schedule.

pub mod engine;
pub mod file_remote;
pub mod memory_remote;
pub mod merge;
pub mod remote;
pub mod scheduler;
