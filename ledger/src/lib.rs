//! Offline ledger for a single itinerant fruit vendor
//!
//! [`services::LedgerService`] owns the inventory lots, sale records and rest
//! days and keeps every lot's remaining stock consistent with its sales.
//! [`store::LedgerStore`] persists the whole snapshot to redundant slots of a
//! key-value backend and recovers from whichever slot survived.

pub mod clock;
pub mod config;
pub mod error;
pub mod services;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{ErrorResponse, LedgerError, LedgerResult};
pub use services::{Committed, LedgerService, ReportingService};
pub use store::{
    FileStorage, KeyValueStorage, LedgerStore, LoadReport, MemoryStorage, SaveReport, SlotLayout,
    StorageSlot,
};
