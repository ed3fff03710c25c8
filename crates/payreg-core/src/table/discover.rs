//! Locating input files in a working directory.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PayregError, Result};
use crate::models::record::SourceKind;

/// Extensions recognized as tabular sources.
pub const TABLE_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "csv"];

/// First tabular file (in name order) whose name contains `marker`,
/// compared case-insensitively.
pub fn find_source(dir: &Path, marker: &str, kind: SourceKind) -> Result<PathBuf> {
    let marker = marker.to_lowercase();
    let found = files_with_extensions(dir, TABLE_EXTENSIONS)?
        .into_iter()
        .find(|path| file_name_lower(path).contains(&marker));

    match found {
        Some(path) => {
            debug!(kind = %kind, path = %path.display(), "source found");
            Ok(path)
        }
        None => Err(PayregError::SourceNotFound {
            kind,
            dir: dir.to_path_buf(),
        }),
    }
}

/// All PDF files in `dir`, sorted by name.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    files_with_extensions(dir, &["pdf"])
}

fn files_with_extensions(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        // Office lock files
        if file_name_lower(&path).starts_with("~$") {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if extensions.contains(&ext.as_str()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
