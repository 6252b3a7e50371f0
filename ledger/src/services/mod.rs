//! Ledger operations and derived views

pub mod ledger;
pub mod reporting;

pub use ledger::{Committed, LedgerService};
pub use reporting::ReportingService;
