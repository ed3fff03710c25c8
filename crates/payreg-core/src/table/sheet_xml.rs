//! Cell-level edits of a worksheet XML part.
//!
//! Only `<c>` elements whose value changed are rewritten. The rest of the
//! part (merged ranges, column widths, row attributes, untouched cells) is
//! copied through event by event.

use std::collections::{BTreeMap, HashMap};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::TableError;

use super::cell::{date_to_excel_serial, Cell, DATE_FORMAT};
use super::sheet::Sheet;

/// Changed cells keyed by zero-based row, then zero-based column.
pub(crate) type CellChanges = BTreeMap<u32, BTreeMap<u32, Cell>>;

static EMPTY: Cell = Cell::Empty;

/// Cells whose value differs between `before` and `after`.
pub(crate) fn diff(before: &Sheet, after: &Sheet) -> CellChanges {
    let mut changes = CellChanges::new();
    let height = before.rows.len().max(after.rows.len());

    for row in 0..height {
        let old = before.rows.get(row).map(Vec::as_slice).unwrap_or_default();
        let new = after.rows.get(row).map(Vec::as_slice).unwrap_or_default();
        for col in 0..old.len().max(new.len()) {
            let old_cell = old.get(col).unwrap_or(&EMPTY);
            let new_cell = new.get(col).unwrap_or(&EMPTY);
            if old_cell.is_empty() && new_cell.is_empty() {
                continue;
            }
            if old_cell != new_cell {
                changes
                    .entry(row as u32)
                    .or_default()
                    .insert(col as u32, new_cell.clone());
            }
        }
    }
    changes
}

/// Apply `changes` to the worksheet XML `xml`.
///
/// `before` is the sheet as currently stored; it decides which existing
/// cell styles may be borrowed for new number and date cells.
pub(crate) fn patch(
    xml: &str,
    before: &Sheet,
    changes: &CellChanges,
) -> Result<Vec<u8>, TableError> {
    let mut patcher = Patcher {
        before,
        styles: collect_styles(xml)?,
        extent: extent(changes),
        pending: changes.clone(),
        writer: Writer::new(Vec::new()),
    };
    patcher.run(xml)?;
    Ok(patcher.writer.into_inner())
}

enum RowItem {
    Cell { col: u32, events: Vec<Event<'static>> },
    Other(Event<'static>),
}

struct Patcher<'a> {
    before: &'a Sheet,
    styles: HashMap<(u32, u32), String>,
    extent: Option<(u32, u32)>,
    pending: CellChanges,
    writer: Writer<Vec<u8>>,
}

impl Patcher<'_> {
    fn run(&mut self, xml: &str) -> Result<(), TableError> {
        let mut reader = Reader::from_str(xml);
        let mut in_data = false;
        let mut next_row = 0;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                    self.write_dimension(e)?;
                }
                Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                    in_data = true;
                    self.writer.write_event(Event::Start(e))?;
                }
                Event::End(e) if e.local_name().as_ref() == b"sheetData" => {
                    self.flush_rows(u32::MAX)?;
                    in_data = false;
                    self.writer.write_event(Event::End(e))?;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                    if self.pending.is_empty() {
                        self.writer.write_event(Event::Empty(e))?;
                    } else {
                        let end = BytesEnd::new(element_name(&e));
                        self.writer.write_event(Event::Start(e))?;
                        self.flush_rows(u32::MAX)?;
                        self.writer.write_event(Event::End(end))?;
                    }
                }
                Event::Start(e) if in_data && e.local_name().as_ref() == b"row" => {
                    let row = row_index(&e, next_row);
                    next_row = row + 1;
                    self.flush_rows(row)?;
                    let items = read_row(&mut reader)?;
                    self.write_row(e.into_owned(), Some(items), row)?;
                }
                Event::Empty(e) if in_data && e.local_name().as_ref() == b"row" => {
                    let row = row_index(&e, next_row);
                    next_row = row + 1;
                    self.flush_rows(row)?;
                    self.write_row(e.into_owned(), None, row)?;
                }
                event => self.writer.write_event(event)?,
            }
        }
        Ok(())
    }

    /// Write an existing row, splicing in its changed cells. `items` is
    /// `None` for a self-closing `<row/>`.
    fn write_row(
        &mut self,
        start: BytesStart<'static>,
        items: Option<Vec<RowItem>>,
        row: u32,
    ) -> Result<(), TableError> {
        let end = BytesEnd::new(element_name(&start));
        let Some(changes) = self.pending.remove(&row) else {
            match items {
                None => self.writer.write_event(Event::Empty(start))?,
                Some(items) => {
                    self.writer.write_event(Event::Start(start))?;
                    for item in items {
                        match item {
                            RowItem::Cell { events, .. } => self.write_events(events)?,
                            RowItem::Other(event) => self.writer.write_event(event)?,
                        }
                    }
                    self.writer.write_event(Event::End(end))?;
                }
            }
            return Ok(());
        };

        self.writer.write_event(Event::Start(start))?;
        let mut changes = changes.into_iter().peekable();
        for item in items.unwrap_or_default() {
            match item {
                RowItem::Cell { col, events } => {
                    while let Some((new_col, cell)) = changes.next_if(|(c, _)| *c < col) {
                        self.write_cell(row, new_col, &cell)?;
                    }
                    match changes.next_if(|(c, _)| *c == col) {
                        Some((_, cell)) => self.write_cell(row, col, &cell)?,
                        None => self.write_events(events)?,
                    }
                }
                RowItem::Other(event) => self.writer.write_event(event)?,
            }
        }
        for (col, cell) in changes {
            self.write_cell(row, col, &cell)?;
        }
        self.writer.write_event(Event::End(end))?;
        Ok(())
    }

    /// Emit pending rows that have no `<row>` element yet, up to `limit`.
    fn flush_rows(&mut self, limit: u32) -> Result<(), TableError> {
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() >= limit {
                break;
            }
            let (row, cells) = entry.remove_entry();
            if cells.values().all(Cell::is_empty) {
                continue;
            }

            let mut start = BytesStart::new("row");
            start.push_attribute(("r", (row + 1).to_string().as_str()));
            self.writer.write_event(Event::Start(start))?;
            for (col, cell) in cells {
                self.write_cell(row, col, &cell)?;
            }
            self.writer.write_event(Event::End(BytesEnd::new("row")))?;
        }
        Ok(())
    }

    fn write_cell(&mut self, row: u32, col: u32, cell: &Cell) -> Result<(), TableError> {
        let reference = cell_ref(row, col);
        let own_style = self.styles.get(&(row, col)).cloned();

        match cell {
            Cell::Empty => {
                // Keep the cell's formatting, drop its value
                if let Some(style) = own_style {
                    let start = cell_start(&reference, Some(&style), None);
                    self.writer.write_event(Event::Empty(start))?;
                }
            }
            Cell::Text(text) => self.write_inline(&reference, own_style.as_deref(), text)?,
            Cell::Number(n) => {
                let style = own_style.or_else(|| {
                    self.template_style(row, col, |c| matches!(c, Cell::Number(_)))
                });
                self.write_number(&reference, style.as_deref(), *n)?;
            }
            Cell::Date(date) => {
                let is_date = |c: &Cell| matches!(c, Cell::Date(_));
                let style = own_style
                    .clone()
                    .filter(|_| is_date(self.before_cell(row, col)))
                    .or_else(|| self.template_style(row, col, is_date));
                match (style, date_to_excel_serial(*date)) {
                    (Some(style), Some(serial)) => {
                        self.write_number(&reference, Some(&style), serial)?;
                    }
                    _ => {
                        let text = date.format(DATE_FORMAT).to_string();
                        self.write_inline(&reference, own_style.as_deref(), &text)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_number(
        &mut self,
        reference: &str,
        style: Option<&str>,
        value: f64,
    ) -> Result<(), TableError> {
        self.writer
            .write_event(Event::Start(cell_start(reference, style, None)))?;
        self.writer.write_event(Event::Start(BytesStart::new("v")))?;
        self.writer
            .write_event(Event::Text(BytesText::new(&value.to_string())))?;
        self.writer.write_event(Event::End(BytesEnd::new("v")))?;
        self.writer.write_event(Event::End(BytesEnd::new("c")))?;
        Ok(())
    }

    fn write_inline(
        &mut self,
        reference: &str,
        style: Option<&str>,
        text: &str,
    ) -> Result<(), TableError> {
        let mut t = BytesStart::new("t");
        t.push_attribute(("xml:space", "preserve"));

        self.writer
            .write_event(Event::Start(cell_start(reference, style, Some("inlineStr"))))?;
        self.writer.write_event(Event::Start(BytesStart::new("is")))?;
        self.writer.write_event(Event::Start(t))?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.writer.write_event(Event::End(BytesEnd::new("t")))?;
        self.writer.write_event(Event::End(BytesEnd::new("is")))?;
        self.writer.write_event(Event::End(BytesEnd::new("c")))?;
        Ok(())
    }

    fn write_events(&mut self, events: Vec<Event<'static>>) -> Result<(), TableError> {
        for event in events {
            self.writer.write_event(event)?;
        }
        Ok(())
    }

    fn write_dimension(&mut self, e: BytesStart<'_>) -> Result<(), TableError> {
        let widened = attr(&e, b"ref").and_then(|range| widen_range(&range, self.extent));
        match widened {
            Some(range) => {
                let mut dimension = BytesStart::new(element_name(&e));
                dimension.push_attribute(("ref", range.as_str()));
                self.writer.write_event(Event::Empty(dimension))?;
            }
            None => self.writer.write_event(Event::Empty(e))?,
        }
        Ok(())
    }

    fn before_cell(&self, row: u32, col: u32) -> &Cell {
        self.before
            .rows
            .get(row as usize)
            .and_then(|cells| cells.get(col as usize))
            .unwrap_or(&EMPTY)
    }

    /// Style of the nearest cell in the same column whose stored value
    /// satisfies `wanted`, looking upwards first.
    fn template_style(
        &self,
        row: u32,
        col: u32,
        wanted: impl Fn(&Cell) -> bool,
    ) -> Option<String> {
        let height = self.before.rows.len() as u32;
        (0..row)
            .rev()
            .chain(row + 1..height)
            .filter(|r| wanted(self.before_cell(*r, col)))
            .find_map(|r| self.styles.get(&(r, col)).cloned())
    }
}

/// Collect the body of a `<row>` up to its end tag.
fn read_row(reader: &mut Reader<&[u8]>) -> Result<Vec<RowItem>, TableError> {
    let mut items = Vec::new();
    let mut next_col = 0;

    loop {
        match reader.read_event()? {
            Event::End(e) if e.local_name().as_ref() == b"row" => break,
            Event::Eof => break,
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let col = cell_column(&e, next_col);
                next_col = col + 1;
                items.push(RowItem::Cell {
                    col,
                    events: vec![Event::Empty(e.into_owned())],
                });
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let col = cell_column(&e, next_col);
                next_col = col + 1;
                let mut events = vec![Event::Start(e.into_owned())];
                loop {
                    let event = reader.read_event()?;
                    if matches!(event, Event::Eof) {
                        break;
                    }
                    let closes =
                        matches!(&event, Event::End(end) if end.local_name().as_ref() == b"c");
                    events.push(event.into_owned());
                    if closes {
                        break;
                    }
                }
                items.push(RowItem::Cell { col, events });
            }
            event => items.push(RowItem::Other(event.into_owned())),
        }
    }
    Ok(items)
}

/// `s` attributes of every cell, keyed by zero-based (row, column).
fn collect_styles(xml: &str) -> Result<HashMap<(u32, u32), String>, TableError> {
    let mut styles = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let (mut row, mut next_row, mut next_col) = (0, 0, 0);

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                row = row_index(&e, next_row);
                next_row = row + 1;
                next_col = 0;
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let col = cell_column(&e, next_col);
                next_col = col + 1;
                if let Some(style) = attr(&e, b"s") {
                    styles.insert((row, col), style);
                }
            }
            _ => {}
        }
    }
    Ok(styles)
}

/// Bottom-right corner of the non-empty changes.
fn extent(changes: &CellChanges) -> Option<(u32, u32)> {
    changes
        .iter()
        .flat_map(|(row, cells)| {
            cells
                .iter()
                .filter(|(_, cell)| !cell.is_empty())
                .map(move |(col, _)| (*row, *col))
        })
        .reduce(|(r1, c1), (r2, c2)| (r1.max(r2), c1.max(c2)))
}

/// Grow a `dimension` range such as `A1:K7` to cover `extent`.
fn widen_range(range: &str, extent: Option<(u32, u32)>) -> Option<String> {
    let (row, col) = extent?;
    let (start, end) = range.split_once(':').unwrap_or((range, range));
    parse_ref(start)?;
    let (end_row, end_col) = parse_ref(end)?;
    if row <= end_row && col <= end_col {
        return None;
    }
    Some(format!("{start}:{}", cell_ref(row.max(end_row), col.max(end_col))))
}

pub(crate) fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn row_index(e: &BytesStart<'_>, fallback: u32) -> u32 {
    attr(e, b"r")
        .and_then(|r| r.parse::<u32>().ok())
        .and_then(|r| r.checked_sub(1))
        .unwrap_or(fallback)
}

fn cell_column(e: &BytesStart<'_>, fallback: u32) -> u32 {
    attr(e, b"r")
        .and_then(|r| parse_ref(&r))
        .map(|(_, col)| col)
        .unwrap_or(fallback)
}

fn cell_start(reference: &str, style: Option<&str>, kind: Option<&str>) -> BytesStart<'static> {
    let mut start = BytesStart::new("c");
    start.push_attribute(("r", reference));
    if let Some(style) = style {
        start.push_attribute(("s", style));
    }
    if let Some(kind) = kind {
        start.push_attribute(("t", kind));
    }
    start
}

/// Parse an `A1` reference into zero-based (row, column).
fn parse_ref(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1));
    let row: u32 = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

fn cell_ref(row: u32, col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        letters.push(char::from(b'A' + ((n - 1) % 26) as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect::<String>() + &(row + 1).to_string()
}
