//! Payment control dates from supplier payment terms.

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeDelta};
use tracing::{info, warn};

use crate::models::config::ScheduleConfig;
use crate::registry::{Registry, RegistryColumn};

/// Lower-cased supplier name to payment term in days.
#[derive(Debug, Clone, Default)]
pub struct SupplierTerms {
    terms: BTreeMap<String, i64>,
}

impl SupplierTerms {
    pub fn new(terms: &BTreeMap<String, i64>) -> Self {
        Self {
            terms: terms
                .iter()
                .map(|(name, days)| (normalize_supplier(name), *days))
                .collect(),
        }
    }

    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(&config.supplier_terms)
    }

    /// Term for `supplier`; unknown or missing suppliers pay on the invoice date.
    pub fn offset_days(&self, supplier: Option<&str>) -> i64 {
        supplier
            .and_then(|s| self.terms.get(&normalize_supplier(s)))
            .copied()
            .unwrap_or(0)
    }

    /// Control date for an invoice issued on `invoice_date`.
    pub fn control_date(
        &self,
        invoice_date: NaiveDate,
        supplier: Option<&str>,
    ) -> Option<NaiveDate> {
        let days = self.offset_days(supplier);
        TimeDelta::try_days(days).and_then(|delta| invoice_date.checked_add_signed(delta))
    }
}

fn normalize_supplier(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Set `payment_control_date` on every record that has an invoice date.
///
/// Records without an invoice date keep their current control date. Returns
/// the number of control dates that changed.
pub fn compute_control_dates(registry: &mut Registry, terms: &SupplierTerms) -> usize {
    registry.ensure_column(RegistryColumn::PaymentControlDate);

    let mut updated = 0;
    for record in registry.records_mut() {
        let Some(invoice_date) = record.invoice_date else {
            continue;
        };
        let Some(control) = terms.control_date(invoice_date, record.supplier.as_deref()) else {
            warn!(
                invoice = %record.invoice_number,
                "payment term out of range, control date left unchanged"
            );
            continue;
        };
        if record.payment_control_date != Some(control) {
            record.payment_control_date = Some(control);
            updated += 1;
        }
    }

    info!("Updated {} payment control dates", updated);
    updated
}
