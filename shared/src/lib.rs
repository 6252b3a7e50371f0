//! Shared types and models for the stall ledger
//!
//! This crate contains the ledger's domain types, shared between the
//! persistence/repository crate, the browser bindings (via WASM), and any
//! presentation layer that renders ledger views.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
