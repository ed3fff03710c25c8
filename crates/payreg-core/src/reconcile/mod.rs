//! Registry reconciliation: matching and merging, payment schedule, ledger
//! numbering.

pub mod ledger;
pub mod merge;
pub mod schedule;

pub use ledger::{allocate_ledger_numbers, LedgerAllocation, LedgerNumber};
pub use merge::{backfill_invoice_numbers, merge, FieldPolicy, FillField, MergeStats};
pub use schedule::{compute_control_dates, SupplierTerms};
