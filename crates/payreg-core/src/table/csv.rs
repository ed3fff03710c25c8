//! CSV import/export.

use std::io::Write;
use std::path::Path;

use crate::error::TableError;

use super::cell::Cell;
use super::sheet::{Sheet, SheetFormat};

pub fn import(path: &Path) -> Result<Sheet, TableError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, delimiter)
}

/// Detect the most likely field delimiter from the first lines.
///
/// Each candidate is scored by how many lines share the first line's field
/// count, weighted by that count.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b';', b'\t', b','];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&target) = counts.iter().max() else {
            continue;
        };
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read a file as UTF-8, falling back to Windows-1251 for legacy exports.
pub fn read_file_as_utf8(path: &Path) -> Result<String, TableError> {
    let bytes = std::fs::read(path)?;

    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1251.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(content
        .strip_prefix('\u{feff}')
        .map(str::to_string)
        .unwrap_or(content))
}

fn import_from_string(content: &str, delimiter: u8) -> Result<Sheet, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(Cell::text).collect());
    }

    Ok(Sheet::new(rows, SheetFormat::Csv { delimiter }))
}

/// Write `sheet` as CSV to `writer`.
pub fn export<W: Write>(sheet: &Sheet, writer: W, delimiter: u8) -> Result<(), TableError> {
    // Preamble rows are shorter than data rows
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(writer);

    for row in &sheet.rows {
        if row.is_empty() {
            writer.write_record([""])?;
        } else {
            writer.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
    }
    writer.flush()?;
    Ok(())
}
