//! Rule-based field extractors for Russian invoices and payment memos.
//!
//! Every field is an ordered [`Cascade`] of pure strategies. Strategies are
//! tried in priority order and the first one that yields a value wins, so each
//! heuristic can be tested on its own and the fallback order stays explicit.

pub mod amounts;
pub mod dates;
pub mod invoice_number;
pub mod patterns;
pub mod supplier;

pub use amounts::{extract_amount, parse_amount, AMOUNT};
pub use dates::{extract_date, russian_month_to_number, INVOICE_DATE};
pub use invoice_number::{extract_invoice_number, INVOICE_NUMBER};
pub use supplier::{extract_supplier, SUPPLIER};

use tracing::trace;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;
}

/// A single extraction heuristic.
pub type Strategy<T> = fn(&str) -> Option<T>;

/// Ordered list of named strategies for one field.
pub struct Cascade<T: 'static> {
    field: &'static str,
    strategies: &'static [(&'static str, Strategy<T>)],
}

impl<T: 'static> Cascade<T> {
    pub const fn new(
        field: &'static str,
        strategies: &'static [(&'static str, Strategy<T>)],
    ) -> Self {
        Self { field, strategies }
    }

    /// Name of the extracted field.
    pub fn field(&self) -> &'static str {
        self.field
    }
}

impl<T: 'static> FieldExtractor for Cascade<T> {
    type Output = T;

    fn extract(&self, text: &str) -> Option<T> {
        for (name, strategy) in self.strategies {
            if let Some(value) = strategy(text) {
                trace!(field = self.field, strategy = name, "strategy matched");
                return Some(value);
            }
        }
        None
    }
}
