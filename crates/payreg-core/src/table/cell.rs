//! Typed spreadsheet cell.

use std::fmt;

use chrono::{Days, NaiveDate};

/// Date format used for date cells written as text.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// A single cell value as read from CSV or Excel.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    /// Text cell; blank input becomes [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed display text, `None` for blank cells.
    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }

    /// Convert an Excel 1900-system date serial.
    pub fn from_excel_serial(serial: f64) -> Self {
        match excel_serial_to_date(serial) {
            Some(date) => Self::Date(date),
            None => Self::Number(serial),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => {
                // Integers without decimals
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

/// Day 0 of the 1900 date system, shifted for the 1900 leap-year bug.
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

pub(crate) fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    excel_epoch()?.checked_add_days(Days::new(serial.floor() as u64))
}

pub(crate) fn date_to_excel_serial(date: NaiveDate) -> Option<f64> {
    Some(date.signed_duration_since(excel_epoch()?).num_days() as f64)
}
