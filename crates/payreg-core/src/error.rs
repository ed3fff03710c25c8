//! Error types for the payreg-core library.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::record::SourceKind;

/// Main error type for the payreg library.
#[derive(Error, Debug)]
pub enum PayregError {
    /// An expected input file is missing from the working directory.
    #[error("{kind} file not found in {}", .dir.display())]
    SourceNotFound { kind: SourceKind, dir: PathBuf },

    /// A required column is absent or the layout does not match.
    #[error("schema violation: {0}")]
    Schema(#[from] SchemaError),

    /// Writing the registry back failed; the file keeps its prior content.
    #[error("failed to write {}: {reason}", .path.display())]
    Persistence { path: PathBuf, reason: String },

    /// Spreadsheet read error.
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Layout problems that abort a run before the registry is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Required column is missing.
    #[error("{table}: missing column '{column}'")]
    MissingColumn { table: String, column: String },

    /// The configured header row lies past the end of the sheet.
    #[error("{table}: header row {row} is beyond the last row ({rows} rows)")]
    HeaderOutOfRange { table: String, row: usize, rows: usize },
}

impl SchemaError {
    pub fn missing(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Errors from the spreadsheet reader/writer.
#[derive(Error, Debug)]
pub enum TableError {
    /// Failed to open or parse the workbook.
    #[error("failed to open {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    /// The workbook has no worksheets.
    #[error("{} contains no sheets", .0.display())]
    NoSheets(PathBuf),

    /// File extension is not a supported table format.
    #[error("unsupported table format: {0}")]
    UnsupportedFormat(String),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The workbook package could not be read or written.
    #[error("XLSX package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Malformed workbook XML.
    #[error("XLSX markup error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// I/O error while reading the document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single cell failed to parse. Recovered locally: the field becomes null.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse {field} from '{value}'")]
pub struct FieldParseError {
    pub field: &'static str,
    pub value: String,
}

impl FieldParseError {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}

/// Result type for the payreg library.
pub type Result<T> = std::result::Result<T, PayregError>;
