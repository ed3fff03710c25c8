//! The canonical registry table.
//!
//! Each row keeps its raw cells next to the typed [`RegistryRecord`]. On
//! write-back only fields whose typed value changed since loading are
//! re-rendered; every other cell, including unknown columns and values that
//! failed to parse, is written back exactly as read.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::info;

use crate::context::RunContext;
use crate::error::SchemaError;
use crate::models::record::RegistryRecord;
use crate::models::status::PaymentStatus;
use crate::normalize::{identifier_cell, parse_amount_cell, parse_date_cell, parse_field};
use crate::table::{Cell, Table};

/// Registry columns the reconciliation reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryColumn {
    InvoiceNumber,
    InvoiceDate,
    Supplier,
    Amount,
    PaymentStatus,
    PaymentControlDate,
    TaskRef,
    FinanceInvoiceRef,
    ObjectRef,
    LineItems,
    LedgerNumber,
}

impl RegistryColumn {
    pub const ALL: [Self; 11] = [
        Self::InvoiceNumber,
        Self::InvoiceDate,
        Self::Supplier,
        Self::Amount,
        Self::PaymentStatus,
        Self::PaymentControlDate,
        Self::TaskRef,
        Self::FinanceInvoiceRef,
        Self::ObjectRef,
        Self::LineItems,
        Self::LedgerNumber,
    ];

    /// Columns without which a registry cannot be loaded.
    pub const REQUIRED: [Self; 2] = [Self::InvoiceNumber, Self::Amount];

    /// Header text in the registry file.
    pub fn header(self) -> &'static str {
        match self {
            Self::InvoiceNumber => "№ счета",
            Self::InvoiceDate => "Дата счета",
            Self::Supplier => "Поставщик",
            Self::Amount => "Сумма",
            Self::PaymentStatus => "Статус оплаты",
            Self::PaymentControlDate => "Контроль оплаты",
            Self::TaskRef => "№ задачи Битрикс",
            Self::FinanceInvoiceRef => "ID_Счет_Bitrix",
            Self::ObjectRef => "Объект",
            Self::LineItems => "ТМЦ",
            Self::LedgerNumber => "№ синей накладной",
        }
    }

    /// Whether `record` and `other` differ in this column.
    fn differs(self, record: &RegistryRecord, other: &RegistryRecord) -> bool {
        match self {
            Self::InvoiceNumber => record.invoice_number != other.invoice_number,
            Self::InvoiceDate => record.invoice_date != other.invoice_date,
            Self::Supplier => record.supplier != other.supplier,
            Self::Amount => record.amount != other.amount,
            Self::PaymentStatus => record.payment_status != other.payment_status,
            Self::PaymentControlDate => record.payment_control_date != other.payment_control_date,
            Self::TaskRef => record.task_ref != other.task_ref,
            Self::FinanceInvoiceRef => record.finance_invoice_ref != other.finance_invoice_ref,
            Self::ObjectRef => record.object_ref != other.object_ref,
            Self::LineItems => record.line_items != other.line_items,
            Self::LedgerNumber => record.ledger_number != other.ledger_number,
        }
    }

    /// Cell holding this column's value of `record`.
    fn render(self, record: &RegistryRecord) -> Cell {
        match self {
            Self::InvoiceNumber => Cell::text(record.invoice_number.as_str()),
            Self::InvoiceDate => record.invoice_date.map(Cell::Date).unwrap_or_default(),
            Self::Supplier => text_or_empty(&record.supplier),
            Self::Amount => record.amount.map(amount_cell).unwrap_or_default(),
            Self::PaymentStatus => record
                .payment_status
                .as_ref()
                .map(|s| Cell::text(s.label()))
                .unwrap_or_default(),
            Self::PaymentControlDate => record
                .payment_control_date
                .map(Cell::Date)
                .unwrap_or_default(),
            Self::TaskRef => identifier_render(&record.task_ref),
            Self::FinanceInvoiceRef => identifier_render(&record.finance_invoice_ref),
            Self::ObjectRef => text_or_empty(&record.object_ref),
            Self::LineItems => text_or_empty(&record.line_items),
            Self::LedgerNumber => text_or_empty(&record.ledger_number),
        }
    }
}

impl fmt::Display for RegistryColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

fn text_or_empty(value: &Option<String>) -> Cell {
    value.as_deref().map(Cell::text).unwrap_or_default()
}

fn amount_cell(amount: Decimal) -> Cell {
    match amount.to_f64() {
        Some(n) => Cell::Number(n),
        None => Cell::Text(amount.to_string()),
    }
}

/// Purely numeric identifiers are written as numbers so spreadsheet lookups
/// keep matching.
fn identifier_render(value: &Option<String>) -> Cell {
    match value.as_deref() {
        None => Cell::Empty,
        Some(id) if id.len() <= 15 && id.chars().all(|c| c.is_ascii_digit()) => id
            .parse::<u64>()
            .map(|n| Cell::Number(n as f64))
            .unwrap_or_else(|_| Cell::text(id)),
        Some(id) => Cell::text(id),
    }
}

#[derive(Debug, Clone)]
struct RegistryRow {
    record: RegistryRecord,
    /// Typed values as loaded; default for inserted rows.
    loaded: RegistryRecord,
    cells: Vec<Cell>,
    inserted: bool,
}

/// The registry: typed records plus the table layout they were read from.
#[derive(Debug, Clone)]
pub struct Registry {
    table: Table,
    rows: Vec<RegistryRow>,
}

impl Registry {
    /// Parse a registry table. Cells that fail to parse are recorded in `ctx`
    /// and read as empty.
    pub fn from_table(mut table: Table, ctx: &mut RunContext) -> Result<Self, SchemaError> {
        for column in RegistryColumn::REQUIRED {
            table.require_column(column.header())?;
        }

        let col = |c: RegistryColumn| table.column_index(c.header());
        let text =
            |row: usize, c: RegistryColumn| col(c).and_then(|i| table.cell(row, i).as_text());
        let identifier = |row: usize, c: RegistryColumn| {
            col(c).and_then(|i| identifier_cell(table.cell(row, i)))
        };

        let mut rows = Vec::with_capacity(table.rows.len());
        for row in 0..table.rows.len() {
            let record = RegistryRecord {
                invoice_number: text(row, RegistryColumn::InvoiceNumber).unwrap_or_default(),
                invoice_date: parse_field(
                    &table,
                    row,
                    col(RegistryColumn::InvoiceDate),
                    "invoice_date",
                    ctx,
                    parse_date_cell,
                ),
                supplier: text(row, RegistryColumn::Supplier),
                amount: parse_field(
                    &table,
                    row,
                    col(RegistryColumn::Amount),
                    "amount",
                    ctx,
                    parse_amount_cell,
                ),
                payment_status: text(row, RegistryColumn::PaymentStatus)
                    .and_then(|s| PaymentStatus::parse(&s)),
                payment_control_date: parse_field(
                    &table,
                    row,
                    col(RegistryColumn::PaymentControlDate),
                    "payment_control_date",
                    ctx,
                    parse_date_cell,
                ),
                task_ref: identifier(row, RegistryColumn::TaskRef),
                finance_invoice_ref: identifier(row, RegistryColumn::FinanceInvoiceRef),
                object_ref: text(row, RegistryColumn::ObjectRef),
                line_items: text(row, RegistryColumn::LineItems),
                ledger_number: text(row, RegistryColumn::LedgerNumber),
            };
            rows.push(RegistryRow {
                loaded: record.clone(),
                record,
                cells: Vec::new(),
                inserted: false,
            });
        }

        for (row, cells) in rows.iter_mut().zip(std::mem::take(&mut table.rows)) {
            row.cells = cells;
        }

        info!("Loaded {} records from registry {}", rows.len(), table.name);
        Ok(Self { table, rows })
    }

    /// Registry with the standard header and the given records.
    pub fn from_records(name: impl Into<String>, records: Vec<RegistryRecord>) -> Self {
        let table = Table {
            name: name.into(),
            preamble: Vec::new(),
            columns: RegistryColumn::ALL
                .iter()
                .map(|c| c.header().to_string())
                .collect(),
            rows: Vec::new(),
            format: crate::table::SheetFormat::Xlsx,
        };
        let rows = records
            .into_iter()
            .map(|record| RegistryRow {
                loaded: record.clone(),
                record,
                cells: Vec::new(),
                inserted: false,
            })
            .collect();
        Self { table, rows }
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: RegistryColumn) -> bool {
        self.table.has_column(column.header())
    }

    pub fn require_column(&self, column: RegistryColumn) -> Result<(), SchemaError> {
        self.table.require_column(column.header()).map(|_| ())
    }

    /// Add `column` to the header if it is missing.
    pub fn ensure_column(&mut self, column: RegistryColumn) {
        self.table.ensure_column(column.header());
    }

    pub fn records(&self) -> impl Iterator<Item = &RegistryRecord> {
        self.rows.iter().map(|r| &r.record)
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut RegistryRecord> {
        self.rows.iter_mut().map(|r| &mut r.record)
    }

    pub fn record(&self, index: usize) -> Option<&RegistryRecord> {
        self.rows.get(index).map(|r| &r.record)
    }

    /// Append a new row.
    pub fn push(&mut self, record: RegistryRecord) {
        self.rows.push(RegistryRow {
            record,
            loaded: RegistryRecord::default(),
            cells: Vec::new(),
            inserted: true,
        });
    }

    /// Records added with [`Registry::push`] during this run.
    pub fn inserted_mut(&mut self) -> impl Iterator<Item = &mut RegistryRecord> {
        self.rows
            .iter_mut()
            .filter(|r| r.inserted)
            .map(|r| &mut r.record)
    }

    pub fn inserted_count(&self) -> usize {
        self.rows.iter().filter(|r| r.inserted).count()
    }

    /// Render back into a table with the original layout.
    ///
    /// Columns that received values but are absent from the header are
    /// appended to it.
    pub fn into_table(self) -> Table {
        let Self { mut table, rows } = self;

        for column in RegistryColumn::ALL {
            if !table.has_column(column.header())
                && rows.iter().any(|r| column.differs(&r.record, &r.loaded))
            {
                table.ensure_column(column.header());
            }
        }

        let positions: Vec<(RegistryColumn, usize)> = RegistryColumn::ALL
            .iter()
            .filter_map(|&c| table.column_index(c.header()).map(|i| (c, i)))
            .collect();
        let width = table.columns.len();

        table.rows = rows
            .into_iter()
            .map(|row| {
                let mut cells = row.cells;
                if cells.len() < width {
                    cells.resize(width, Cell::Empty);
                }
                for &(column, idx) in &positions {
                    if column.differs(&row.record, &row.loaded) {
                        cells[idx] = column.render(&row.record);
                    }
                }
                cells
            })
            .collect();

        table
    }
}
