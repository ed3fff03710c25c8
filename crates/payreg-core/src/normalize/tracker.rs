//! Task-tracker invoice export.
//!
//! The first three columns are read by position (tracker-internal invoice
//! id, purchased goods, payee); their headers vary between exports.

use std::collections::BTreeMap;

use tracing::info;

use crate::context::RunContext;
use crate::error::SchemaError;
use crate::extract::rules::patterns::TASK_LINK;
use crate::models::config::TrackerLayout;
use crate::models::record::ExternalRecord;
use crate::models::status::PaymentStatus;
use crate::table::{Cell, Table};

use super::{
    coerce_identifier, dedup, identifier_cell, normalize_invoice_number, parse_amount_cell,
    parse_date_cell, parse_field,
};

pub const OBJECT: &str = "Объект";
pub const INVOICE_NUMBER: &str = "Номер счета";
pub const AMOUNT: &str = "Сумма";
pub const INVOICE_DATE: &str = "Дата счета";
pub const STATUS: &str = "Статус Счета";
pub const TASK_LINK_COLUMN: &str = "Ссылка на задачу";

const ID_POSITION: usize = 0;
const LINE_ITEMS_POSITION: usize = 1;
const RECEIVER_POSITION: usize = 2;

/// Task id from a task link ending in `/view/{id}/`.
pub fn task_ref_from_link(link: &str) -> Option<String> {
    let caps = TASK_LINK.captures(link.trim())?;
    coerce_identifier(&caps[1])
}

/// Apply the legacy label remap, then parse the status.
fn remap_status(label: &str, remap: &BTreeMap<String, String>) -> Option<PaymentStatus> {
    let trimmed = label.trim();
    let mapped = remap
        .iter()
        .find(|(from, _)| from.trim().to_lowercase() == trimmed.to_lowercase())
        .map(|(_, to)| to.as_str())
        .unwrap_or(trimmed);
    PaymentStatus::parse(mapped)
}

/// Project task-tracker rows onto the registry vocabulary.
pub fn normalize_task_tracker(
    table: &Table,
    layout: &TrackerLayout,
    ctx: &mut RunContext,
) -> Result<Vec<ExternalRecord>, SchemaError> {
    if table.columns.len() <= RECEIVER_POSITION {
        return Err(SchemaError::missing(
            &table.name,
            format!("column {}", RECEIVER_POSITION + 1),
        ));
    }
    let object_col = table.require_column(OBJECT)?;
    let number_col = table.require_column(INVOICE_NUMBER)?;
    let amount_col = table.require_column(AMOUNT)?;
    let status_col = table.require_column(STATUS)?;
    let link_col = table.require_column(TASK_LINK_COLUMN)?;
    let date_col = table.column_index(INVOICE_DATE);

    let mut records = Vec::with_capacity(table.rows.len());
    for (row, cells) in table.rows.iter().enumerate() {
        if cells.iter().all(Cell::is_empty) {
            continue;
        }

        records.push(ExternalRecord {
            invoice_number: table
                .cell(row, number_col)
                .as_text()
                .and_then(|n| normalize_invoice_number(&n)),
            amount: parse_field(table, row, Some(amount_col), "amount", ctx, parse_amount_cell),
            status_hint: table
                .cell(row, status_col)
                .as_text()
                .and_then(|s| remap_status(&s, &layout.status_remap)),
            task_ref: table
                .cell(row, link_col)
                .as_text()
                .and_then(|link| task_ref_from_link(&link)),
            finance_invoice_ref: identifier_cell(table.cell(row, ID_POSITION)),
            object_ref: table.cell(row, object_col).as_text(),
            line_items: table.cell(row, LINE_ITEMS_POSITION).as_text(),
            supplier: table.cell(row, RECEIVER_POSITION).as_text(),
            invoice_date: parse_field(table, row, date_col, "invoice_date", ctx, parse_date_cell),
        });
    }

    let with_task = records.iter().filter(|r| r.task_ref.is_some()).count();
    info!(
        "Loaded {} task tracker rows, {} task ids extracted from links",
        records.len(),
        with_task
    );

    Ok(dedup(records, ctx))
}
