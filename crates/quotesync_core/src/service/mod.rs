//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate key-value repository calls into quote store operations.
//! - Keep CLI callers decoupled from storage and encoding details.

pub mod quote_store;
pub mod transfer;
