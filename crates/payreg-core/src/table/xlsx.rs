//! Excel import (calamine) and in-place XLSX update (zip + quick-xml).

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::TableError;

use super::cell::Cell;
use super::sheet::{Sheet, SheetFormat};
use super::sheet_xml;

/// Read the first worksheet of an Excel workbook.
///
/// Rows and columns before the used range are padded with empty cells so
/// that row indices match the sheet's own numbering.
pub fn import(path: &Path, format: SheetFormat) -> Result<Sheet, TableError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| TableError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| TableError::NoSheets(path.to_path_buf()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| TableError::Open {
            path: path.to_path_buf(),
            reason: format!("failed to read sheet '{sheet_name}': {e}"),
        })?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row as usize];

    for row in range.rows() {
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(row.iter().map(convert));
        rows.push(cells);
    }

    Ok(Sheet::new(rows, format))
}

fn convert(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.as_str()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
        Data::DateTime(dt) => Cell::from_excel_serial(dt.as_f64()),
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::text(s.as_str())),
        Data::DurationIso(s) => Cell::text(s.as_str()),
    }
}

/// Rewrite the first worksheet of the workbook at `path` so that it holds
/// `sheet`, writing the resulting package to `out`.
///
/// Only cells whose value differs from the stored workbook are touched.
/// Other worksheets, styles and merged ranges are copied as they are.
pub fn update<W: Write + Seek>(path: &Path, sheet: &Sheet, out: W) -> Result<(), TableError> {
    let before = import(path, SheetFormat::Xlsx)?;
    let changes = sheet_xml::diff(&before, sheet);

    let mut archive = ZipArchive::new(File::open(path)?)?;
    let part = first_worksheet_part(&mut archive)?
        .ok_or_else(|| TableError::NoSheets(path.to_path_buf()))?;
    let patched = sheet_xml::patch(&read_part(&mut archive, &part)?, &before, &changes)?;
    debug!(
        part = %part,
        rows = changes.len(),
        cells = changes.values().map(|cells| cells.len()).sum::<usize>(),
        "worksheet patched"
    );

    let mut writer = ZipWriter::new(out);
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.name() == part {
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(part.as_str(), options)?;
            writer.write_all(&patched)?;
        } else {
            writer.raw_copy_file(entry)?;
        }
    }
    writer.finish()?;
    Ok(())
}

/// Package path of the first worksheet in workbook order.
fn first_worksheet_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Option<String>, TableError> {
    let workbook = read_part(archive, "xl/workbook.xml")?;
    let rels = read_part(archive, "xl/_rels/workbook.xml.rels")?;

    let Some(rid) = first_element_attr(&workbook, b"sheet", b"id", None)? else {
        return Ok(None);
    };
    let target = first_element_attr(&rels, b"Relationship", b"Target", Some(&rid))?;
    Ok(target.map(|target| match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }))
}

/// Attribute `key` of the first `element`, optionally the one whose `Id`
/// equals `id`. Attribute keys match on their local name.
fn first_element_attr(
    xml: &str,
    element: &[u8],
    key: &[u8],
    id: Option<&str>,
) -> Result<Option<String>, TableError> {
    let mut reader = XmlReader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Eof => return Ok(None),
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == element => {
                if id.is_some() && sheet_xml::attr(&e, b"Id").as_deref() != id {
                    continue;
                }
                let value = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == key)
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                if value.is_some() {
                    return Ok(value);
                }
            }
            _ => {}
        }
    }
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, TableError> {
    let mut part = archive.by_name(name)?;
    let mut content = String::new();
    part.read_to_string(&mut content)?;
    Ok(content)
}
