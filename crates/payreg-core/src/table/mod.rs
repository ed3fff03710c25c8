//! Tabular I/O: typed cells, CSV and Excel codecs, atomic write-back and
//! source discovery.

mod cell;
pub mod csv;
pub mod discover;
mod sheet;
mod sheet_xml;
pub mod xlsx;

pub use cell::{Cell, DATE_FORMAT};
pub(crate) use cell::excel_serial_to_date;
pub use discover::{find_source, list_pdfs};
pub use sheet::{Sheet, SheetFormat, Table};

use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::TableError;

/// Read the first worksheet of a CSV or Excel file.
pub fn read_sheet(path: &Path) -> Result<Sheet, TableError> {
    let format = SheetFormat::from_path(path)?;
    let sheet = match format {
        SheetFormat::Csv { .. } => csv::import(path)?,
        _ => xlsx::import(path, format)?,
    };
    debug!(path = %path.display(), rows = sheet.rows.len(), "sheet loaded");
    Ok(sheet)
}

/// Replace `path` with `sheet`.
///
/// The sheet is written to a temporary file in the same directory and then
/// renamed over the target, so a failed write leaves the original intact.
/// Workbooks are edited in place: only changed cells of the first worksheet
/// are rewritten.
pub fn write_sheet_atomic(path: &Path, sheet: &Sheet) -> Result<(), TableError> {
    if !sheet.format.is_writable() {
        return Err(TableError::UnsupportedFormat(format!(
            "{:?} cannot be written",
            sheet.format
        )));
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;

    match sheet.format {
        SheetFormat::Csv { delimiter } => csv::export(sheet, temp.as_file_mut(), delimiter)?,
        _ => xlsx::update(path, sheet, temp.as_file_mut())?,
    }

    temp.persist(path).map_err(|e| TableError::Io(e.error))?;
    info!(path = %path.display(), rows = sheet.rows.len(), "sheet written");
    Ok(())
}
