//! In-memory sheet and header-aware table view.

use std::path::Path;

use crate::error::{SchemaError, TableError};

use super::cell::Cell;

/// On-disk format of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv { delimiter: u8 },
    Xlsx,
    Xlsm,
    Xls,
}

impl SheetFormat {
    /// Format implied by the file extension.
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(Self::Csv { delimiter: b',' }),
            "xlsx" => Ok(Self::Xlsx),
            "xlsm" => Ok(Self::Xlsm),
            "xls" => Ok(Self::Xls),
            _ => Err(TableError::UnsupportedFormat(ext)),
        }
    }

    /// Whether a sheet in this format can be written back.
    pub fn is_writable(self) -> bool {
        matches!(self, Self::Csv { .. } | Self::Xlsx)
    }
}

/// All rows of one worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub rows: Vec<Vec<Cell>>,
    pub format: SheetFormat,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<Cell>>, format: SheetFormat) -> Self {
        Self { rows, format }
    }
}

/// A sheet split at its header row.
///
/// Rows above the header are kept verbatim so that writing the table back
/// reproduces the original layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Name used in error messages, usually the file name.
    pub name: String,
    pub preamble: Vec<Vec<Cell>>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub format: SheetFormat,
}

const EMPTY: &Cell = &Cell::Empty;

impl Table {
    /// Split `sheet` at the zero-based `header_row`.
    pub fn from_sheet(
        name: impl Into<String>,
        sheet: Sheet,
        header_row: usize,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let Sheet { mut rows, format } = sheet;

        if header_row >= rows.len() {
            return Err(SchemaError::HeaderOutOfRange {
                table: name,
                row: header_row,
                rows: rows.len(),
            });
        }

        let mut data = rows.split_off(header_row);
        let header = data.remove(0);
        let columns = header
            .iter()
            .map(|cell| cell.as_text().unwrap_or_default())
            .collect();

        while data.last().is_some_and(|row| row.iter().all(Cell::is_empty)) {
            data.pop();
        }

        Ok(Self {
            name,
            preamble: rows,
            columns,
            rows: data,
            format,
        })
    }

    /// Reassemble preamble, header and data rows.
    pub fn into_sheet(self) -> Sheet {
        let mut rows = self.preamble;
        rows.push(self.columns.into_iter().map(Cell::text).collect());
        rows.extend(self.rows);
        Sheet::new(rows, self.format)
    }

    /// Position of a column, matched on trimmed, case-insensitive name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.columns
            .iter()
            .position(|c| c.trim().to_lowercase() == wanted)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn require_column(&self, name: &str) -> Result<usize, SchemaError> {
        self.column_index(name)
            .ok_or_else(|| SchemaError::missing(&self.name, name))
    }

    /// Append a column unless it already exists; returns its position.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.columns.push(name.to_string());
                self.columns.len() - 1
            }
        }
    }

    /// Cell at `(row, col)`; short rows read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(EMPTY)
    }

    /// One-based sheet row number of data row `row`, for messages.
    pub fn sheet_row_number(&self, row: usize) -> usize {
        self.preamble.len() + 2 + row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::text(*v)).collect()
    }

    fn sample() -> Sheet {
        Sheet::new(
            vec![
                text_row(&["Реестр АХЧ"]),
                vec![],
                text_row(&["№ счета", "Сумма"]),
                text_row(&["12", "100"]),
                text_row(&["", ""]),
            ],
            SheetFormat::Csv { delimiter: b';' },
        )
    }

    #[test]
    fn test_split_at_header() {
        let table = Table::from_sheet("r.csv", sample(), 2).unwrap();
        assert_eq!(table.preamble.len(), 2);
        assert_eq!(table.columns, vec!["№ счета", "Сумма"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.column_index(" сумма "), Some(1));
        assert_eq!(table.cell(0, 5), &Cell::Empty);
        assert_eq!(table.sheet_row_number(0), 4);
    }

    #[test]
    fn test_header_out_of_range() {
        let err = Table::from_sheet("r.csv", sample(), 9).unwrap_err();
        assert!(matches!(err, SchemaError::HeaderOutOfRange { rows: 5, .. }));
    }

    #[test]
    fn test_missing_column() {
        let table = Table::from_sheet("r.csv", sample(), 2).unwrap();
        let err = table.require_column("Статус оплаты").unwrap_err();
        assert_eq!(err, SchemaError::missing("r.csv", "Статус оплаты"));
    }

    #[test]
    fn test_round_trip_keeps_layout() {
        let mut table = Table::from_sheet("r.csv", sample(), 2).unwrap();
        assert_eq!(table.ensure_column("Контроль оплаты"), 2);
        assert_eq!(table.ensure_column("контроль оплаты"), 2);

        let sheet = table.into_sheet();
        assert_eq!(sheet.rows[0], text_row(&["Реестр АХЧ"]));
        assert_eq!(sheet.rows[2].len(), 3);
        assert_eq!(sheet.rows.len(), 4);
    }
}
