//! Domain models for the stall ledger

mod inventory;
mod sale;
mod snapshot;
mod stats;

pub use inventory::*;
pub use sale::*;
pub use snapshot::*;
pub use stats::*;
