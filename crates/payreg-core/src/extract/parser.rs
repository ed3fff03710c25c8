//! Invoice parser built on the rule cascades.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::models::record::ExtractedInvoice;

use super::rules::{extract_amount, extract_date, extract_invoice_number, extract_supplier};

/// Result of invoice extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    /// Extracted invoice data.
    pub invoice: ExtractedInvoice,
    /// Fields no strategy could find.
    pub missing_fields: Vec<&'static str>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl ExtractionResult {
    /// Whether every field was found.
    pub fn is_complete(&self) -> bool {
        self.missing_fields.is_empty()
    }
}

/// Trait for invoice parsing.
pub trait InvoiceParser {
    /// Parse invoice fields from the full document text.
    fn parse(&self, text: &str) -> ExtractionResult;
}

/// Rule-based parser for Russian invoices.
#[derive(Debug, Clone, Default)]
pub struct InvoiceTextParser;

impl InvoiceTextParser {
    pub fn new() -> Self {
        Self
    }
}

impl InvoiceParser for InvoiceTextParser {
    fn parse(&self, text: &str) -> ExtractionResult {
        let start = Instant::now();

        info!("Parsing invoice from {} characters of text", text.len());

        let invoice = ExtractedInvoice {
            invoice_number: extract_invoice_number(text),
            invoice_date: extract_date(text),
            supplier: extract_supplier(text),
            amount: extract_amount(text),
        };

        let missing_fields = invoice.missing_fields();
        for field in &missing_fields {
            debug!(field, "field not found");
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            invoice_number = invoice.invoice_number.as_deref().unwrap_or(""),
            missing = missing_fields.len(),
            "Invoice parsed in {}ms",
            processing_time_ms
        );

        ExtractionResult {
            invoice,
            missing_fields,
            processing_time_ms,
        }
    }
}
