//! Configuration structures for the reconciliation pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Main configuration for the payreg pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PayregConfig {
    /// Registry file layout.
    pub registry: RegistryLayout,

    /// Bank statement export layout.
    pub bank_statement: SourceLayout,

    /// Task-tracker export layout.
    pub task_tracker: TrackerLayout,

    /// Payment schedule configuration.
    pub schedule: ScheduleConfig,

    /// Merge configuration.
    pub merge: MergeConfig,
}

/// Where the registry lives and how it is laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryLayout {
    /// Case-insensitive file name marker.
    pub marker: String,

    /// Zero-based row index of the header row.
    pub header_row: usize,

    /// Ledger number prefix used when the registry has no numbered rows yet.
    pub default_ledger_prefix: String,
}

impl Default for RegistryLayout {
    fn default() -> Self {
        Self {
            marker: "ахч".to_string(),
            header_row: 3,
            default_ledger_prefix: "Ю".to_string(),
        }
    }
}

/// File name marker and header position of a tabular source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLayout {
    /// Case-insensitive file name marker.
    pub marker: String,

    /// Zero-based row index of the header row.
    pub header_row: usize,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            marker: "платежн".to_string(),
            header_row: 4,
        }
    }
}

/// Task-tracker export layout and status vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerLayout {
    /// Case-insensitive file name marker.
    pub marker: String,

    /// Zero-based row index of the header row.
    pub header_row: usize,

    /// Legacy tracker status label -> registry status label.
    pub status_remap: BTreeMap<String, String>,
}

impl Default for TrackerLayout {
    fn default() -> Self {
        let status_remap = [
            ("Оплачен", "Отправлен в 1С"),
            ("Передан в оплату", "Утверждена"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            marker: "bitrix".to_string(),
            header_row: 0,
            status_remap,
        }
    }
}

/// Supplier payment terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Lower-cased supplier name -> days between invoice and payment control.
    pub supplier_terms: BTreeMap<String, i64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let supplier_terms = [
            ("ип шайдулин", 30),
            ("технология 21век", 0),
            ("корексмаркет", 28),
            ("регион-снабжение", 28),
            ("курышев", 25),
            ("упаковочные материалы", 30),
            ("ип павлов е.в.", 0),
        ]
        .into_iter()
        .map(|(name, days)| (name.to_string(), days))
        .collect();

        Self { supplier_terms }
    }
}

/// Merge behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Words removed from line-item text before it is written to the registry.
    pub line_item_stop_words: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            line_item_stop_words: ["счет", "счёт", "счета", "расходы", "расходов", "ахч"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl PayregConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
