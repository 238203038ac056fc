// Import module - bank statements, terminal settlements and POS sales

pub mod sales;
pub mod statement;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::db;
use crate::error::ImportError;

pub use sales::{SalesImportOptions, SpreadsheetLayout};
pub use statement::StatementFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Ok,
    Error,
}

/// Outcome of importing one file; failures never abort a batch
#[derive(Debug, Clone, Serialize)]
pub struct FileImportStatus {
    pub file: String,
    pub status: ImportStatus,
    pub rows: usize,
    pub skipped: usize,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub message: String,
}

impl FileImportStatus {
    fn imported(file: &str, rows: usize, skipped: usize, dates: &[NaiveDate]) -> Self {
        Self {
            file: file.to_string(),
            status: ImportStatus::Ok,
            rows,
            skipped,
            min_date: dates.iter().min().copied(),
            max_date: dates.iter().max().copied(),
            message: format!("{} rows imported", rows),
        }
    }

    fn failed(file: &str, error: &ImportError) -> Self {
        Self {
            file: file.to_string(),
            status: ImportStatus::Error,
            rows: 0,
            skipped: 0,
            min_date: None,
            max_date: None,
            message: error.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ImportStatus::Ok
    }
}

/// File name used as `source_file` on imported rows
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Rows parsed from one file
struct Parsed<T> {
    rows: Vec<T>,
    skipped: usize,
}

/// Parse, then persist all rows in one transaction.
///
/// Any store error rolls the whole file back and is reported in the status.
fn import_with<T>(
    conn: &mut Connection,
    path: &Path,
    parse: impl FnOnce(&Path, &str) -> Result<Parsed<T>, ImportError>,
    date_of: impl Fn(&T) -> NaiveDate,
    store: impl Fn(&Connection, &T) -> Result<()>,
) -> FileImportStatus {
    let file = file_label(path);

    let parsed = match parse(path, &file) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("{}: {}", file, e);
            return FileImportStatus::failed(&file, &e);
        }
    };

    let persist = |conn: &mut Connection| -> Result<()> {
        let tx = conn.transaction()?;
        {
            let tx_conn: &Connection = &tx;
            for row in &parsed.rows {
                store(tx_conn, row)?;
            }
        }
        tx.commit()?;
        Ok(())
    };

    if let Err(e) = persist(conn) {
        let error = ImportError::Store(format!("{:#}", e));
        warn!("{}: {}", file, error);
        return FileImportStatus::failed(&file, &error);
    }

    let dates: Vec<NaiveDate> = parsed.rows.iter().map(date_of).collect();
    info!(
        "{}: imported {} rows ({} skipped)",
        file,
        parsed.rows.len(),
        parsed.skipped
    );
    FileImportStatus::imported(&file, parsed.rows.len(), parsed.skipped, &dates)
}

/// Import one bank statement export
pub fn import_bank_file(
    conn: &mut Connection,
    path: &Path,
    format: &StatementFormat,
) -> FileImportStatus {
    import_with(
        conn,
        path,
        |path, file| {
            let bytes = std::fs::read(path)?;
            let parsed = statement::bank::parse_bank_statement(&bytes, file, format)?;
            Ok(Parsed {
                rows: parsed.rows,
                skipped: parsed.skipped,
            })
        },
        |tx| tx.transaction_date,
        db::upsert_bank_transaction,
    )
}

/// Import one card terminal settlement statement
pub fn import_terminal_file(
    conn: &mut Connection,
    path: &Path,
    format: &StatementFormat,
) -> FileImportStatus {
    import_with(
        conn,
        path,
        |path, file| {
            let bytes = std::fs::read(path)?;
            let parsed = statement::terminal::parse_terminal_statement(&bytes, file, format)?;
            Ok(Parsed {
                rows: parsed.rows,
                skipped: parsed.skipped,
            })
        },
        |m| m.movement_date,
        db::upsert_terminal_movement,
    )
}

/// Import one sales file (spreadsheet, PDF or extracted text)
pub fn import_sales_file(
    conn: &mut Connection,
    path: &Path,
    options: &SalesImportOptions,
) -> FileImportStatus {
    import_with(
        conn,
        path,
        |path, _| {
            let rows = sales::parse_sales_file(path, options)?;
            Ok(Parsed { rows, skipped: 0 })
        },
        |sale| sale.sale_date,
        db::upsert_sale,
    )
}

/// Import every `.csv` in a folder, one status per file
pub fn import_bank_folder(
    conn: &mut Connection,
    dir: &Path,
    format: &StatementFormat,
) -> Result<Vec<FileImportStatus>> {
    let files = list_importable_files(dir, &["csv"], None)?;
    info!("Found {} statement files in {:?}", files.len(), dir);
    Ok(files
        .iter()
        .map(|path| import_bank_file(conn, path, format))
        .collect())
}

/// Import every sales file in a folder, one status per file
pub fn import_sales_folder(
    conn: &mut Connection,
    dir: &Path,
    options: &SalesImportOptions,
) -> Result<Vec<FileImportStatus>> {
    let files = list_importable_files(
        dir,
        &["xlsx", "xlsm", "xls", "ods", "pdf", "txt"],
        options.file_prefix.as_deref(),
    )?;
    info!("Found {} sales files in {:?}", files.len(), dir);
    Ok(files
        .iter()
        .map(|path| import_sales_file(conn, path, options))
        .collect())
}

/// Files in `dir` with one of `extensions`, optionally name-prefixed,
/// skipping Office lock files, sorted by name
pub fn list_importable_files(
    dir: &Path,
    extensions: &[&str],
    prefix: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read folder {:?}", dir))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let name = file_label(&path);
        if name.starts_with("~$") {
            continue;
        }
        if let Some(prefix) = prefix {
            if !name.starts_with(prefix) {
                continue;
            }
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if extensions.contains(&extension.as_str()) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_list_importable_files_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "Vendas Janeiro.xlsx",
            "~$Vendas Janeiro.xlsx",
            "Outro.xlsx",
            "Vendas.pdf",
            "Vendas notas.docx",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("Vendas dir.xlsx")).unwrap();

        let files =
            list_importable_files(dir.path(), &["xlsx", "pdf"], Some("Vendas")).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_label(p)).collect();
        assert_eq!(names, vec!["Vendas Janeiro.xlsx", "Vendas.pdf"]);

        let all = list_importable_files(dir.path(), &["xlsx"], None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_missing_folder_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_importable_files(&dir.path().join("nope"), &["csv"], None).is_err());
    }

    #[test]
    fn test_failed_status_message() {
        let status = FileImportStatus::failed("a.csv", &ImportError::HeaderNotFound);
        assert!(!status.is_ok());
        assert_eq!(status.message, "no transaction table found");
        assert_eq!(status.rows, 0);
    }
}
