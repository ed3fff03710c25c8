//! Invoice field extraction from document text.
//!
//! Extraction never fails: a field that no strategy can find is reported as
//! missing and left empty.

mod parser;
pub mod rules;

pub use parser::{ExtractionResult, InvoiceParser, InvoiceTextParser};
pub use rules::FieldExtractor;
