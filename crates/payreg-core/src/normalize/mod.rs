//! Source normalization: raw source tables to [`ExternalRecord`]s.
//!
//! Both sides of every join go through the same functions here, so that an
//! invoice number typed as `00123` in one file and read back as the float
//! `123.0` from another still produce the same key.

pub mod bank;
pub mod text;
pub mod tracker;

pub use bank::normalize_bank_statement;
pub use text::StopWordStripper;
pub use tracker::{normalize_task_tracker, task_ref_from_link};

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::context::RunContext;
use crate::error::FieldParseError;
use crate::extract::rules::parse_amount;
use crate::models::record::ExternalRecord;
use crate::table::{Cell, Table};

/// Currency suffixes tolerated after an amount.
const CURRENCY_SUFFIXES: &[&str] = &["руб.", "руб", "р.", "₽", "rub"];

/// Date layouts accepted in text cells, tried in order.
const DATE_LAYOUTS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y", "%d.%m.%y"];

/// Canonical invoice number for joining. `None` when empty.
///
/// Trims whitespace, drops a spreadsheet float suffix (`"123.0"`), and strips
/// leading zeros; an all-zero number collapses to `"0"`.
pub fn normalize_invoice_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(integer) = integral_text(trimmed) {
        return Some(integer);
    }

    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() {
        Some("0".to_string())
    } else {
        Some(stripped.to_string())
    }
}

/// Round to 2 decimal places, ties to even.
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Identifier text: `"42"` and `"42.0"` become `"42"`, other text is kept
/// as-is, blank is `None`.
pub fn coerce_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(integral_text(trimmed).unwrap_or_else(|| trimmed.to_string()))
}

/// `digits[.0…]` as an integer string without leading zeros.
fn integral_text(s: &str) -> Option<String> {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (s, None),
    };
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.chars().all(|c| c == '0') {
            return None;
        }
    }

    let digits = int_part.trim_start_matches('0');
    Some(if digits.is_empty() { "0" } else { digits }.to_string())
}

/// Parse an amount cell, rounded to 2 places.
pub fn parse_amount_cell(
    cell: &Cell,
    field: &'static str,
) -> Result<Option<Decimal>, FieldParseError> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(n) => Decimal::from_f64(*n)
            .map(|d| Some(round_amount(d)))
            .ok_or_else(|| FieldParseError::new(field, cell.to_string())),
        Cell::Date(_) => Err(FieldParseError::new(field, cell.to_string())),
        Cell::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            parse_amount_text(trimmed)
                .map(|d| Some(round_amount(d)))
                .ok_or_else(|| FieldParseError::new(field, trimmed))
        }
    }
}

fn parse_amount_text(text: &str) -> Option<Decimal> {
    let lower = text.to_lowercase();
    let mut body = lower.trim();
    for suffix in CURRENCY_SUFFIXES {
        if let Some(rest) = body.strip_suffix(suffix) {
            body = rest.trim_end();
            break;
        }
    }

    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, body),
    };
    let valid = body.chars().any(|c| c.is_ascii_digit())
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | ' ' | '\u{00a0}' | '\u{202f}'));
    if !valid {
        return None;
    }

    let amount = parse_amount(body)?;
    Some(if negative { -amount } else { amount })
}

/// Parse a date cell: a real date, an Excel serial, or `DD.MM.YYYY` text.
pub fn parse_date_cell(
    cell: &Cell,
    field: &'static str,
) -> Result<Option<NaiveDate>, FieldParseError> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Date(d) => Ok(Some(*d)),
        Cell::Number(n) => crate::table::excel_serial_to_date(*n)
            .map(Some)
            .ok_or_else(|| FieldParseError::new(field, cell.to_string())),
        Cell::Text(s) => {
            // "10.01.2024 0:00:00" carries a time part
            let Some(token) = s.split_whitespace().next() else {
                return Ok(None);
            };
            DATE_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(token, layout).ok())
                .map(Some)
                .ok_or_else(|| FieldParseError::new(field, s.trim()))
        }
    }
}

/// Identifier cell (`task_ref`, `finance_invoice_ref`).
pub fn identifier_cell(cell: &Cell) -> Option<String> {
    coerce_identifier(&cell.as_text()?)
}

/// Parse cell `(row, col)` with `parser`, recording a failure in `ctx`.
pub(crate) fn parse_field<T>(
    table: &Table,
    row: usize,
    col: Option<usize>,
    field: &'static str,
    ctx: &mut RunContext,
    parser: fn(&Cell, &'static str) -> Result<Option<T>, FieldParseError>,
) -> Option<T> {
    let col = col?;
    match parser(table.cell(row, col), field) {
        Ok(value) => value,
        Err(err) => {
            ctx.record_parse_failure(&table.name, table.sheet_row_number(row), err);
            None
        }
    }
}

/// Drop later records whose `(invoice_number, amount)` key was already seen.
///
/// Records without a key are kept; they never join anyway.
pub fn dedup(records: Vec<ExternalRecord>, ctx: &mut RunContext) -> Vec<ExternalRecord> {
    let before = records.len();
    let mut seen = HashSet::new();
    let unique: Vec<ExternalRecord> = records
        .into_iter()
        .filter(|record| match record.key() {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect();

    let dropped = before - unique.len();
    if dropped > 0 {
        debug!(dropped, "duplicate source rows dropped");
        ctx.add_duplicates_dropped(dropped);
    }
    unique
}
