//! Sequential ledger numbers (`Ю-10`) for newly inserted rows.

use tracing::{info, warn};

use crate::extract::rules::patterns::{LEDGER_PREFIX, LEDGER_SUFFIX};
use crate::registry::{Registry, RegistryColumn};

/// Prefix and numeric suffix of a ledger number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerNumber {
    pub prefix: Option<String>,
    pub suffix: u64,
}

impl LedgerNumber {
    /// Parse `"Ю-10"`; the prefix is the last upper-case letter run, the
    /// suffix the first digit run.
    pub fn parse(raw: &str) -> Option<Self> {
        let suffix = LEDGER_SUFFIX
            .captures(raw)
            .and_then(|caps| caps[1].parse().ok())?;
        let prefix = LEDGER_PREFIX
            .find_iter(raw)
            .last()
            .map(|m| m.as_str().to_string());
        Some(Self { prefix, suffix })
    }
}

/// Outcome of one allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerAllocation {
    pub prefix: String,
    /// Numbers assigned, in row order.
    pub assigned: Vec<String>,
    /// Distinct prefixes found when the registry mixes several.
    pub mixed_prefixes: Vec<String>,
}

/// Assign `prefix-(max+1)`, `prefix-(max+2)`, … to inserted rows without a
/// ledger number.
///
/// The prefix is the one shared by existing numbers, `default_prefix` when
/// there are none, or the prefix of the highest number when they disagree.
/// Existing numbers are never changed.
pub fn allocate_ledger_numbers(registry: &mut Registry, default_prefix: &str) -> LedgerAllocation {
    let existing: Vec<LedgerNumber> = registry
        .records()
        .filter_map(|r| r.ledger_number.as_deref())
        .filter_map(LedgerNumber::parse)
        .collect();

    let mut prefixes: Vec<String> = existing.iter().filter_map(|n| n.prefix.clone()).collect();
    prefixes.sort();
    prefixes.dedup();

    let highest = existing.iter().max_by_key(|n| n.suffix);
    let max_suffix = highest.map(|n| n.suffix).unwrap_or(0);

    let prefix = match prefixes.len() {
        0 => default_prefix.to_string(),
        1 => prefixes[0].clone(),
        _ => {
            let chosen = highest
                .and_then(|n| n.prefix.clone())
                .unwrap_or_else(|| default_prefix.to_string());
            warn!(
                prefixes = ?prefixes,
                chosen = %chosen,
                "registry mixes ledger prefixes"
            );
            chosen
        }
    };
    let mixed_prefixes = if prefixes.len() > 1 { prefixes } else { Vec::new() };

    let mut next = max_suffix + 1;
    let mut assigned = Vec::new();
    for record in registry.inserted_mut() {
        let has_number = record
            .ledger_number
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        if has_number {
            continue;
        }
        let number = format!("{prefix}-{next}");
        record.ledger_number = Some(number.clone());
        assigned.push(number);
        next += 1;
    }

    if !assigned.is_empty() {
        registry.ensure_column(RegistryColumn::LedgerNumber);
        info!("Assigned {} ledger numbers starting at {}", assigned.len(), assigned[0]);
    }

    LedgerAllocation {
        prefix,
        assigned,
        mixed_prefixes,
    }
}
