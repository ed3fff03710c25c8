//! Per-run state: parse failures, warnings and the tracing span.

use serde::Serialize;
use tracing::{info_span, warn, Span};

use crate::error::FieldParseError;
use crate::models::record::SourceKind;

/// A cell that could not be parsed; the field was treated as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    /// Table (file) the cell belongs to.
    pub table: String,
    /// One-based sheet row number.
    pub row: usize,
    pub field: &'static str,
    pub value: String,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} row {}: cannot parse {} from '{}'",
            self.table, self.row, self.field, self.value
        )
    }
}

/// State owned by a single reconciliation run.
#[derive(Debug)]
pub struct RunContext {
    span: Span,
    parse_failures: Vec<ParseFailure>,
    warnings: Vec<String>,
    duplicates_dropped: usize,
}

impl RunContext {
    pub fn new(source: SourceKind) -> Self {
        Self {
            span: info_span!("run", source = %source),
            parse_failures: Vec::new(),
            warnings: Vec::new(),
            duplicates_dropped: 0,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Record a cell that failed to parse.
    pub fn record_parse_failure(&mut self, table: &str, row: usize, error: FieldParseError) {
        let failure = ParseFailure {
            table: table.to_string(),
            row,
            field: error.field,
            value: error.value,
        };
        warn!("{failure}");
        self.parse_failures.push(failure);
    }

    /// Record a non-fatal problem worth reporting to the user.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    pub fn add_duplicates_dropped(&mut self, count: usize) {
        self.duplicates_dropped += count;
    }

    pub fn parse_failures(&self) -> &[ParseFailure] {
        &self.parse_failures
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    /// Consume the context, returning what it collected.
    pub fn finish(self) -> (Vec<ParseFailure>, Vec<String>, usize) {
        (self.parse_failures, self.warnings, self.duplicates_dropped)
    }
}
