use anyhow::{anyhow, Result};
use std::path::Path;

use super::AppContext;
use crate::cli::formatters::{format_import_statuses, to_json};
use crate::cli::ImportCommands;
use crate::importers::{self, FileImportStatus, SalesImportOptions, SpreadsheetLayout, StatementFormat};

pub fn dispatch_import(action: ImportCommands, ctx: &AppContext) -> Result<()> {
    let mut conn = ctx.connect()?;

    let statuses = match action {
        ImportCommands::Bank { path, format } => {
            let format = StatementFormat::by_name(&format)
                .ok_or_else(|| anyhow!("Unknown statement format '{}' (expected cgd)", format))?;
            tracing::info!("Importing bank statements from: {}", path.display());
            if path.is_dir() {
                importers::import_bank_folder(&mut conn, &path, &format)?
            } else {
                vec![importers::import_bank_file(&mut conn, &path, &format)]
            }
        }

        ImportCommands::Terminal { path } => {
            let format = StatementFormat::terminal_settlement();
            tracing::info!("Importing terminal settlements from: {}", path.display());
            if path.is_dir() {
                importers::list_importable_files(&path, &["csv"], None)?
                    .iter()
                    .map(|file| importers::import_terminal_file(&mut conn, file, &format))
                    .collect()
            } else {
                vec![importers::import_terminal_file(&mut conn, &path, &format)]
            }
        }

        ImportCommands::Sales {
            path,
            layout,
            prefix,
            all_files,
        } => {
            let layout = SpreadsheetLayout::by_name(&layout).ok_or_else(|| {
                anyhow!(
                    "Unknown sales layout '{}' (expected per-method or daily-detail)",
                    layout
                )
            })?;
            let file_prefix = if all_files {
                None
            } else {
                prefix.or_else(|| ctx.config.import.sales_prefix.clone())
            };
            let options = SalesImportOptions {
                layout,
                file_prefix,
            };
            tracing::info!("Importing sales from: {}", path.display());
            import_sales_path(&mut conn, &path, &options)?
        }
    };

    print_statuses(&statuses, ctx.json);
    Ok(())
}

fn import_sales_path(
    conn: &mut rusqlite::Connection,
    path: &Path,
    options: &SalesImportOptions,
) -> Result<Vec<FileImportStatus>> {
    if path.is_dir() {
        importers::import_sales_folder(conn, path, options)
    } else {
        Ok(vec![importers::import_sales_file(conn, path, options)])
    }
}

fn print_statuses(statuses: &[FileImportStatus], json_output: bool) {
    if json_output {
        println!("{}", to_json(&statuses));
    } else {
        print!("{}", format_import_statuses(statuses));
    }
}
