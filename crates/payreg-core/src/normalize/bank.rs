//! Bank statement export.

use tracing::info;

use crate::context::RunContext;
use crate::error::SchemaError;
use crate::extract::rules::extract_invoice_number;
use crate::models::record::ExternalRecord;
use crate::models::status::PaymentStatus;
use crate::table::{Cell, Table};

use super::{dedup, normalize_invoice_number, parse_amount_cell, parse_field};

/// Payment memo column.
pub const MEMO: &str = "Информация";
pub const AMOUNT: &str = "Сумма";
/// Payment state column.
pub const STATUS: &str = "Состояние";

/// Project bank statement rows onto the registry vocabulary.
///
/// The invoice number is recovered from the free-text memo.
pub fn normalize_bank_statement(
    table: &Table,
    ctx: &mut RunContext,
) -> Result<Vec<ExternalRecord>, SchemaError> {
    let memo_col = table.require_column(MEMO)?;
    let amount_col = table.require_column(AMOUNT)?;
    let status_col = table.require_column(STATUS)?;

    let mut records = Vec::with_capacity(table.rows.len());
    for (row, cells) in table.rows.iter().enumerate() {
        if cells.iter().all(Cell::is_empty) {
            continue;
        }

        let invoice_number = table
            .cell(row, memo_col)
            .as_text()
            .and_then(|memo| extract_invoice_number(&memo))
            .and_then(|number| normalize_invoice_number(&number));

        records.push(ExternalRecord {
            invoice_number,
            amount: parse_field(table, row, Some(amount_col), "amount", ctx, parse_amount_cell),
            status_hint: table
                .cell(row, status_col)
                .as_text()
                .and_then(|s| PaymentStatus::parse(&s)),
            ..ExternalRecord::default()
        });
    }

    let with_number = records.iter().filter(|r| r.invoice_number.is_some()).count();
    info!(
        "Loaded {} bank statement rows, {} with an invoice number",
        records.len(),
        with_number
    );

    Ok(dedup(records, ctx))
}
