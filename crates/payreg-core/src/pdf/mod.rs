//! PDF text extraction.
//!
//! Only documents with an embedded text layer are supported. Scanned
//! invoices come back with little or no text and end up with missing fields.

mod extractor;

pub use extractor::PdfExtractor;

use std::path::Path;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract text from the entire PDF.
    fn extract_text(&self) -> Result<String>;
}

/// Turns a document on disk into plain text.
///
/// The pipeline depends on this seam rather than on [`PdfExtractor`] so
/// that other readers can be plugged in.
pub trait DocumentReader {
    fn read_text(&self, path: &Path) -> Result<String>;
}
