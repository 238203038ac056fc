//! POS sales exports: spreadsheets and paginated text reports
//!
//! Spreadsheet layouts are data ([`SpreadsheetLayout`]); the text shape is a
//! fixed line pattern `<idx> <dd-mm-yyyy> <method> <amount>€` as printed by the
//! POS "sales by day" report (PDF, or text already extracted from it).

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{debug, info};

use super::file_label;
use crate::db::{SaleKeyPolicy, SaleRecord};
use crate::error::ImportError;
use crate::utils::{parse_date, parse_locale_amount, round_money, DateOrder};

/// One of two mutually exclusive amount columns
#[derive(Debug, Clone)]
pub struct AmountCandidate {
    pub amount_col: usize,
    /// The candidate applies only when this cell is blank
    pub indicator_col: usize,
    /// Payment method recorded for amounts taken from this column
    pub method: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AmountSource {
    Single(usize),
    Exclusive {
        first: AmountCandidate,
        second: AmountCandidate,
    },
}

/// Column layout of a sales spreadsheet (zero-based columns, first sheet)
#[derive(Debug, Clone)]
pub struct SpreadsheetLayout {
    pub header_rows: usize,
    pub date_col: usize,
    pub method_col: Option<usize>,
    pub amount: AmountSource,
    /// Blank date cells inherit the last date seen above them
    pub propagate_date: bool,
    pub key_policy: SaleKeyPolicy,
}

impl SpreadsheetLayout {
    /// "Vendas" export: B = date, C = payment method, D = amount
    pub fn per_method() -> Self {
        Self {
            header_rows: 1,
            date_col: 1,
            method_col: Some(2),
            amount: AmountSource::Single(3),
            propagate_date: false,
            key_policy: SaleKeyPolicy::DateAndMethod,
        }
    }

    /// Daily detail export: a date row followed by undated detail rows, the
    /// amount in B or D depending on which of C/E is blank
    pub fn daily_detail() -> Self {
        Self {
            header_rows: 1,
            date_col: 0,
            method_col: None,
            amount: AmountSource::Exclusive {
                first: AmountCandidate {
                    amount_col: 1,
                    indicator_col: 2,
                    method: None,
                },
                second: AmountCandidate {
                    amount_col: 3,
                    indicator_col: 4,
                    method: None,
                },
            },
            propagate_date: true,
            key_policy: SaleKeyPolicy::DateFileAmount,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "per-method" | "per_method" | "vendas" => Some(Self::per_method()),
            "daily-detail" | "daily_detail" | "daily" => Some(Self::daily_detail()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SalesImportOptions {
    pub layout: SpreadsheetLayout,
    /// Folder imports only pick up files whose name starts with this
    pub file_prefix: Option<String>,
}

impl Default for SalesImportOptions {
    fn default() -> Self {
        Self {
            layout: SpreadsheetLayout::per_method(),
            file_prefix: None,
        }
    }
}

/// Extract sales from a file, dispatching on its extension
pub fn parse_sales_file(
    path: &Path,
    options: &SalesImportOptions,
) -> Result<Vec<SaleRecord>, ImportError> {
    let source_file = file_label(path);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    info!("Parsing sales file: {:?} (type: {})", path, extension);

    let sales = match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => {
            let rows = read_first_sheet(path)?;
            parse_sales_rows(&rows, &options.layout, &source_file)
        }
        "pdf" => {
            let text = pdf_extract::extract_text(path)
                .map_err(|e| ImportError::Unreadable(e.to_string()))?;
            parse_sales_text(&text, &source_file)?
        }
        "txt" => {
            let bytes = std::fs::read(path)?;
            parse_sales_text(&String::from_utf8_lossy(&bytes), &source_file)?
        }
        other => return Err(ImportError::UnsupportedFormat(other.to_string())),
    };

    if sales.is_empty() {
        return Err(ImportError::NoValidRows);
    }
    Ok(sales)
}

fn read_first_sheet(path: &Path) -> Result<Vec<Vec<Data>>, ImportError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ImportError::Unreadable(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Unreadable("workbook has no sheets".to_string()))?
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    // Rows are re-based to column A so layout columns stay absolute
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Data>> = (0..start_row).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells = vec![Data::Empty; start_col as usize];
        cells.extend(row.iter().cloned());
        rows.push(cells);
    }
    Ok(rows)
}

fn is_blank(cell: Option<&Data>) -> bool {
    match cell {
        None | Some(Data::Empty) => true,
        Some(Data::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => {
            let days_since_epoch = dt.as_f64().floor() as i64;
            NaiveDate::from_ymd_opt(1899, 12, 30)?
                .checked_add_signed(chrono::Duration::days(days_since_epoch))
        }
        Data::DateTimeIso(s) => parse_date(s, DateOrder::YearFirst),
        Data::String(s) => parse_date(s, DateOrder::DayFirst),
        _ => None,
    }
}

fn cell_amount(cell: &Data) -> Option<Decimal> {
    match cell {
        Data::Int(i) => Some(Decimal::from(*i)),
        Data::Float(f) => Decimal::try_from(*f).ok(),
        Data::String(s) => parse_locale_amount(s),
        _ => None,
    }
}

fn cell_text(cell: Option<&Data>) -> Option<String> {
    let text = cell?.to_string();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Pick the amount (and method label) for a row under the exclusivity rule
fn pick_amount(row: &[Data], source: &AmountSource) -> Option<(Decimal, Option<String>)> {
    match source {
        AmountSource::Single(col) => row.get(*col).and_then(cell_amount).map(|a| (a, None)),
        AmountSource::Exclusive { first, second } => [first, second].into_iter().find_map(|c| {
            if !is_blank(row.get(c.indicator_col)) {
                return None;
            }
            row.get(c.amount_col)
                .and_then(cell_amount)
                .map(|a| (a, c.method.clone()))
        }),
    }
}

/// Apply a layout to spreadsheet rows
pub fn parse_sales_rows(
    rows: &[Vec<Data>],
    layout: &SpreadsheetLayout,
    source_file: &str,
) -> Vec<SaleRecord> {
    let mut sales = Vec::new();
    let mut current_date: Option<NaiveDate> = None;

    for (idx, row) in rows.iter().enumerate().skip(layout.header_rows) {
        let date_cell = row.get(layout.date_col);
        let date = if is_blank(date_cell) {
            if layout.propagate_date {
                current_date
            } else {
                None
            }
        } else {
            current_date = date_cell.and_then(cell_date);
            current_date
        };

        let Some(sale_date) = date else {
            debug!("{}: row {} has no date", source_file, idx + 1);
            continue;
        };

        let column_method = match layout.method_col {
            Some(col) => match cell_text(row.get(col)) {
                Some(method) => Some(method),
                None => continue,
            },
            None => None,
        };

        let Some((amount, candidate_method)) = pick_amount(row, &layout.amount) else {
            continue;
        };
        if amount <= Decimal::ZERO {
            continue;
        }

        let amount = round_money(amount);
        let payment_method = column_method.or(candidate_method);
        let natural_key = layout.key_policy.natural_key(
            sale_date,
            payment_method.as_deref(),
            source_file,
            amount,
        );

        sales.push(SaleRecord {
            id: None,
            sale_date,
            payment_method,
            amount,
            source_file: source_file.to_string(),
            natural_key,
        });
    }

    sales
}

/// Parse text lines of the POS "sales by day" report
pub fn parse_sales_text(text: &str, source_file: &str) -> Result<Vec<SaleRecord>, ImportError> {
    let line_regex = Regex::new(r"^\s*\d+\s+(\d{2}-\d{2}-\d{4})\s+(.+?)\s+([\d\s.,]+)€")
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    let mut sales = Vec::new();
    for line in text.lines() {
        let Some(caps) = line_regex.captures(line) else {
            continue;
        };

        let Some(sale_date) = parse_date(&caps[1], DateOrder::DayFirst) else {
            continue;
        };
        let method = caps[2].trim().to_string();

        // Comma is the decimal separator here; dots and spaces only group thousands
        let compact: String = caps[3]
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .collect();
        let Some(amount) = parse_locale_amount(&compact) else {
            continue;
        };
        if amount <= Decimal::ZERO {
            continue;
        }

        let amount = round_money(amount);
        let natural_key =
            SaleKeyPolicy::DateAndMethod.natural_key(sale_date, Some(&method), source_file, amount);
        sales.push(SaleRecord {
            id: None,
            sale_date,
            payment_method: Some(method),
            amount,
            source_file: source_file.to_string(),
            natural_key,
        });
    }

    Ok(sales)
}
