//! Left join of the registry against normalized source records.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::SchemaError;
use crate::models::record::{ExternalRecord, RegistryRecord};
use crate::normalize::StopWordStripper;
use crate::registry::{Registry, RegistryColumn};

/// Registry fields that are only ever filled, never replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillField {
    ObjectRef,
    FinanceInvoiceRef,
    LineItems,
    TaskRef,
}

impl FillField {
    pub fn column(self) -> RegistryColumn {
        match self {
            Self::ObjectRef => RegistryColumn::ObjectRef,
            Self::FinanceInvoiceRef => RegistryColumn::FinanceInvoiceRef,
            Self::LineItems => RegistryColumn::LineItems,
            Self::TaskRef => RegistryColumn::TaskRef,
        }
    }

    fn target(self, record: &mut RegistryRecord) -> &mut Option<String> {
        match self {
            Self::ObjectRef => &mut record.object_ref,
            Self::FinanceInvoiceRef => &mut record.finance_invoice_ref,
            Self::LineItems => &mut record.line_items,
            Self::TaskRef => &mut record.task_ref,
        }
    }

    fn source(self, record: &ExternalRecord) -> Option<&str> {
        match self {
            Self::ObjectRef => record.object_ref.as_deref(),
            Self::FinanceInvoiceRef => record.finance_invoice_ref.as_deref(),
            Self::LineItems => record.line_items.as_deref(),
            Self::TaskRef => record.task_ref.as_deref(),
        }
    }
}

/// Which registry fields a source may touch.
#[derive(Debug, Clone)]
pub struct FieldPolicy {
    /// Copy the source status onto non-terminal rows.
    pub update_status: bool,
    /// Fill empty invoice numbers by `(task_ref, amount)` before joining.
    pub backfill_invoice_numbers: bool,
    /// Fill-only fields, applied in order.
    pub fill: Vec<FillField>,
    /// Cleanup applied to line items before they are written.
    pub line_item_filter: Option<StopWordStripper>,
}

impl FieldPolicy {
    /// Status only.
    pub fn bank_statement() -> Self {
        Self {
            update_status: true,
            backfill_invoice_numbers: false,
            fill: Vec::new(),
            line_item_filter: None,
        }
    }

    /// Backfill, status and every fill-only field.
    pub fn task_tracker(line_item_filter: StopWordStripper) -> Self {
        Self {
            update_status: true,
            backfill_invoice_numbers: true,
            fill: vec![
                FillField::ObjectRef,
                FillField::FinanceInvoiceRef,
                FillField::LineItems,
                FillField::TaskRef,
            ],
            line_item_filter: Some(line_item_filter),
        }
    }

    /// Registry columns this policy reads or writes.
    pub fn required_columns(&self) -> Vec<RegistryColumn> {
        let mut columns = vec![RegistryColumn::InvoiceNumber, RegistryColumn::Amount];
        if self.update_status {
            columns.push(RegistryColumn::PaymentStatus);
        }
        if self.backfill_invoice_numbers {
            columns.push(RegistryColumn::TaskRef);
        }
        for field in &self.fill {
            let column = field.column();
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }
}

/// Counters for one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Registry rows that found a source row.
    pub matched: usize,
    pub statuses_updated: usize,
    /// Differing source statuses ignored because the row is final.
    pub terminal_kept: usize,
    pub invoice_numbers_backfilled: usize,
    pub object_refs_filled: usize,
    pub finance_invoice_refs_filled: usize,
    pub line_items_filled: usize,
    pub task_refs_filled: usize,
}

impl MergeStats {
    pub fn fields_filled(&self) -> usize {
        self.object_refs_filled
            + self.finance_invoice_refs_filled
            + self.line_items_filled
            + self.task_refs_filled
    }

    /// Every registry cell this merge changed.
    pub fn total_changes(&self) -> usize {
        self.statuses_updated + self.invoice_numbers_backfilled + self.fields_filled()
    }

    fn count_fill(&mut self, field: FillField) {
        match field {
            FillField::ObjectRef => self.object_refs_filled += 1,
            FillField::FinanceInvoiceRef => self.finance_invoice_refs_filled += 1,
            FillField::LineItems => self.line_items_filled += 1,
            FillField::TaskRef => self.task_refs_filled += 1,
        }
    }
}

/// Merge `external` into `registry` under `policy`.
///
/// Fails before touching any row when the registry lacks a column the
/// policy needs.
pub fn merge(
    registry: &mut Registry,
    external: &[ExternalRecord],
    policy: &FieldPolicy,
) -> Result<MergeStats, SchemaError> {
    for column in policy.required_columns() {
        registry.require_column(column)?;
    }

    let mut stats = MergeStats::default();
    if policy.backfill_invoice_numbers {
        stats.invoice_numbers_backfilled = backfill_invoice_numbers(registry, external);
    }

    let index = index_by(external, ExternalRecord::key);
    for record in registry.records_mut() {
        let Some(source) = record.key().and_then(|key| index.get(&key).copied()) else {
            continue;
        };
        stats.matched += 1;

        if policy.update_status {
            apply_status(record, source, &mut stats);
        }
        for &field in &policy.fill {
            if fill(record, source, field, policy.line_item_filter.as_ref()) {
                stats.count_fill(field);
            }
        }
    }

    info!(
        matched = stats.matched,
        statuses_updated = stats.statuses_updated,
        terminal_kept = stats.terminal_kept,
        fields_filled = stats.fields_filled(),
        "Merged {} source rows into {} registry rows",
        external.len(),
        registry.len()
    );
    Ok(stats)
}

/// Fill empty registry invoice numbers from source rows with the same
/// `(task_ref, amount)`. Returns the number of rows filled.
pub fn backfill_invoice_numbers(registry: &mut Registry, external: &[ExternalRecord]) -> usize {
    let index = index_by(external, ExternalRecord::task_key);
    let mut filled = 0;

    for record in registry.records_mut() {
        if !record.invoice_number.trim().is_empty() {
            continue;
        }
        let Some(source) = record.task_key().and_then(|key| index.get(&key).copied()) else {
            continue;
        };
        if let Some(number) = source.invoice_number.as_deref().filter(|n| !n.trim().is_empty()) {
            debug!(task_ref = ?record.task_ref, number, "invoice number backfilled");
            record.invoice_number = number.to_string();
            filled += 1;
        }
    }

    if filled > 0 {
        info!("Filled {} invoice numbers from task references", filled);
    }
    filled
}

/// First source record per key.
fn index_by<K: Ord>(
    external: &[ExternalRecord],
    key: impl Fn(&ExternalRecord) -> Option<K>,
) -> BTreeMap<K, &ExternalRecord> {
    let mut index = BTreeMap::new();
    for record in external {
        if let Some(k) = key(record) {
            index.entry(k).or_insert(record);
        }
    }
    index
}

fn apply_status(record: &mut RegistryRecord, source: &ExternalRecord, stats: &mut MergeStats) {
    let Some(hint) = source.status_hint.as_ref() else {
        return;
    };
    if record.payment_status.as_ref() == Some(hint) {
        return;
    }
    if record.has_terminal_status() {
        stats.terminal_kept += 1;
        return;
    }
    record.payment_status = Some(hint.clone());
    stats.statuses_updated += 1;
}

fn fill(
    record: &mut RegistryRecord,
    source: &ExternalRecord,
    field: FillField,
    line_item_filter: Option<&StopWordStripper>,
) -> bool {
    let target = field.target(record);
    if target.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        return false;
    }

    let Some(raw) = field.source(source) else {
        return false;
    };
    let value = match (field, line_item_filter) {
        (FillField::LineItems, Some(filter)) => filter.strip(raw),
        _ => Some(raw.trim().to_string()).filter(|v| !v.is_empty()),
    };

    match value {
        Some(value) => {
            *target = Some(value);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::models::record::SourceKind;
    use crate::models::status::PaymentStatus;
    use crate::table::{Cell, Sheet, SheetFormat, Table};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn row(number: &str, amount: &str, status: Option<PaymentStatus>) -> RegistryRecord {
        RegistryRecord {
            invoice_number: number.to_string(),
            amount: Some(dec(amount)),
            payment_status: status,
            ..RegistryRecord::default()
        }
    }

    fn source(number: &str, amount: &str, status: PaymentStatus) -> ExternalRecord {
        ExternalRecord {
            invoice_number: Some(number.to_string()),
            amount: Some(dec(amount)),
            status_hint: Some(status),
            ..ExternalRecord::default()
        }
    }

    fn tracker_policy() -> FieldPolicy {
        FieldPolicy::task_tracker(StopWordStripper::new(&["счет", "ахч"]).unwrap())
    }

    #[test]
    fn test_status_join_on_composite_key() {
        let mut registry = Registry::from_records(
            "r",
            vec![row("123", "450.00", Some(PaymentStatus::Draft))],
        );
        let external = vec![source("123", "450.0", PaymentStatus::Approved)];

        let stats = merge(&mut registry, &external, &FieldPolicy::bank_statement()).unwrap();

        assert_eq!(stats.matched, 1);
        assert_eq!(stats.statuses_updated, 1);
        assert_eq!(
            registry.record(0).unwrap().payment_status,
            Some(PaymentStatus::Approved)
        );
    }

    #[test]
    fn test_amount_must_match() {
        let mut registry = Registry::from_records("r", vec![row("123", "450.00", None)]);
        let external = vec![source("123", "450.01", PaymentStatus::Approved)];

        let stats = merge(&mut registry, &external, &FieldPolicy::bank_statement()).unwrap();
        assert_eq!(stats.matched, 0);
        assert_eq!(registry.record(0).unwrap().payment_status, None);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut registry = Registry::from_records(
            "r",
            vec![
                row("1", "10", Some(PaymentStatus::Draft)),
                row("2", "20", None),
            ],
        );
        let external = vec![
            source("1", "10", PaymentStatus::SentToFinance),
            source("2", "20", PaymentStatus::Paid),
        ];
        let policy = FieldPolicy::bank_statement();

        merge(&mut registry, &external, &policy).unwrap();
        let after_first: Vec<RegistryRecord> = registry.records().cloned().collect();
        let second = merge(&mut registry, &external, &policy).unwrap();

        assert_eq!(second.total_changes(), 0);
        assert_eq!(registry.records().cloned().collect::<Vec<_>>(), after_first);
    }

    #[test]
    fn test_terminal_status_is_kept() {
        let mut registry = Registry::from_records(
            "r",
            vec![
                row("1", "10", Some(PaymentStatus::Paid)),
                row("2", "20", Some(PaymentStatus::Prepared)),
            ],
        );
        let external = vec![
            source("1", "10", PaymentStatus::Approved),
            source("2", "20", PaymentStatus::Draft),
        ];

        let stats = merge(&mut registry, &external, &FieldPolicy::bank_statement()).unwrap();

        assert_eq!(stats.statuses_updated, 0);
        assert_eq!(stats.terminal_kept, 2);
        assert_eq!(registry.record(0).unwrap().payment_status, Some(PaymentStatus::Paid));
        assert_eq!(registry.record(1).unwrap().payment_status, Some(PaymentStatus::Prepared));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let mut registry = Registry::from_records("r", vec![row("5", "1", None)]);
        let external = vec![
            source("5", "1", PaymentStatus::Approved),
            source("005", "1.00", PaymentStatus::Paid),
        ];

        merge(&mut registry, &external, &FieldPolicy::bank_statement()).unwrap();
        assert_eq!(
            registry.record(0).unwrap().payment_status,
            Some(PaymentStatus::Approved)
        );
    }

    #[test]
    fn test_fill_only_never_replaces() {
        let mut existing = row("9", "100", None);
        existing.object_ref = Some("Офис".to_string());
        existing.line_items = Some("  ".to_string());
        let mut registry = Registry::from_records("r", vec![existing]);

        let external = vec![ExternalRecord {
            object_ref: Some("Склад".to_string()),
            line_items: Some("Счет АХЧ Бумага  А4".to_string()),
            finance_invoice_ref: Some("318".to_string()),
            task_ref: Some("4521".to_string()),
            ..source("9", "100", PaymentStatus::Approved)
        }];

        let stats = merge(&mut registry, &external, &tracker_policy()).unwrap();
        let record = registry.record(0).unwrap();

        assert_eq!(record.object_ref.as_deref(), Some("Офис"));
        assert_eq!(record.line_items.as_deref(), Some("бумага а4"));
        assert_eq!(record.finance_invoice_ref.as_deref(), Some("318"));
        assert_eq!(record.task_ref.as_deref(), Some("4521"));
        assert_eq!(stats.object_refs_filled, 0);
        assert_eq!(stats.fields_filled(), 3);
    }

    #[test]
    fn test_stop_words_only_line_items_are_absent() {
        let mut registry = Registry::from_records("r", vec![row("9", "100", None)]);
        let external = vec![ExternalRecord {
            line_items: Some("Счет АХЧ".to_string()),
            ..source("9", "100", PaymentStatus::Approved)
        }];

        merge(&mut registry, &external, &tracker_policy()).unwrap();
        assert_eq!(registry.record(0).unwrap().line_items, None);
    }

    #[test]
    fn test_backfill_then_join() {
        let mut pending = row("", "1500", Some(PaymentStatus::Draft));
        pending.task_ref = Some("4521".to_string());
        let mut registry = Registry::from_records("r", vec![pending]);

        let external = vec![ExternalRecord {
            task_ref: Some("4521".to_string()),
            ..source("45", "1500.00", PaymentStatus::Approved)
        }];

        let stats = merge(&mut registry, &external, &tracker_policy()).unwrap();
        let record = registry.record(0).unwrap();

        assert_eq!(stats.invoice_numbers_backfilled, 1);
        assert_eq!(record.invoice_number, "45");
        assert_eq!(record.payment_status, Some(PaymentStatus::Approved));
    }

    #[test]
    fn test_missing_policy_column_aborts_without_changes() {
        let header = ["№ счета", "Сумма", "Статус оплаты"];
        let sheet = Sheet::new(
            vec![
                header.iter().map(|h| Cell::text(*h)).collect(),
                vec![Cell::text("1"), Cell::Number(10.0), Cell::text("Черновик")],
            ],
            SheetFormat::Xlsx,
        );
        let table = Table::from_sheet("r.xlsx", sheet, 0).unwrap();
        let mut ctx = RunContext::new(SourceKind::TaskTracker);
        let mut registry = Registry::from_table(table, &mut ctx).unwrap();
        let external = vec![source("1", "10", PaymentStatus::Approved)];

        let err = merge(&mut registry, &external, &tracker_policy()).unwrap_err();

        assert_eq!(err, SchemaError::missing("r.xlsx", "№ задачи Битрикс"));
        assert_eq!(registry.record(0).unwrap().payment_status, Some(PaymentStatus::Draft));
    }
}
