//! Core library for payment registry reconciliation.
//!
//! This crate provides:
//! - Field extraction from Russian invoice text (number, date, supplier, amount)
//! - Normalization of bank statement and task-tracker exports
//! - Merge of source rows into the registry under per-source field policies
//! - Payment control dates and ledger number allocation
//! - CSV/Excel I/O with atomic write-back

pub mod context;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod pdf;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod table;

pub use context::{ParseFailure, RunContext};
pub use error::{PayregError, Result};
pub use extract::{ExtractionResult, InvoiceParser, InvoiceTextParser};
pub use models::config::PayregConfig;
pub use models::record::{ExternalRecord, ExtractedInvoice, RegistryRecord, SourceKind};
pub use models::status::PaymentStatus;
pub use pdf::{DocumentReader, PdfExtractor, PdfProcessor};
pub use pipeline::{
    bank_statement_status, pdf_invoices_status, task_tracker_status, Pipeline, RunReport,
};
pub use reconcile::{FieldPolicy, MergeStats};
pub use registry::{Registry, RegistryColumn};
