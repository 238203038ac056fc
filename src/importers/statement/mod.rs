//! Semicolon-delimited statement exports (bank current accounts, card terminals)
//!
//! Both kinds of export bury the transaction table under a free-text preamble.
//! A [`StatementFormat`] describes how to find the table and what its columns
//! are called; [`read_table`] turns the located lines into records addressed
//! by canonical [`Field`]s, so each importer only deals with row semantics.

pub mod bank;
pub mod locator;
pub mod terminal;

use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use tracing::debug;

use crate::error::ImportError;
use crate::utils::{normalize_text, DateOrder};

pub use locator::{decode_export, find_header_row};

/// Canonical columns a statement can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    ValueDate,
    Description,
    Amount,
    Balance,
    DebitCredit,
    TerminalId,
    Fee,
    NetAmount,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::ValueDate => "value_date",
            Field::Description => "description",
            Field::Amount => "amount",
            Field::Balance => "balance",
            Field::DebitCredit => "debit_credit",
            Field::TerminalId => "terminal_id",
            Field::Fee => "fee",
            Field::NetAmount => "net_amount",
        }
    }
}

/// Identifies the header line of the transaction table.
///
/// Tokens are compared against the normalized line (see
/// [`normalize_text`]). An empty `any_of` list is always satisfied.
#[derive(Debug, Clone)]
pub struct HeaderRule {
    pub required: Vec<String>,
    pub any_of: Vec<String>,
}

impl HeaderRule {
    pub fn new(required: &[&str], any_of: &[&str]) -> Self {
        Self {
            required: required.iter().map(|s| s.to_string()).collect(),
            any_of: any_of.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn matches(&self, normalized_line: &str) -> bool {
        self.required.iter().all(|t| normalized_line.contains(t.as_str()))
            && (self.any_of.is_empty()
                || self.any_of.iter().any(|t| normalized_line.contains(t.as_str())))
    }
}

/// Descriptor for one export layout
#[derive(Debug, Clone)]
pub struct StatementFormat {
    pub name: String,
    pub header: HeaderRule,
    /// Normalized header names per field, tried in order. `*x*` matches any
    /// header containing `x`.
    pub aliases: Vec<(Field, Vec<String>)>,
    pub required_fields: Vec<Field>,
    pub date_order: DateOrder,
    /// Re-sign credits from the running balance when a balance column exists
    pub infer_sign: bool,
    /// Undo spreadsheet quoting (`=""000123""`, `771",15`) before parsing
    pub repair_quotes: bool,
}

impl StatementFormat {
    fn with_alias(mut self, field: Field, names: &[&str]) -> Self {
        self.aliases
            .push((field, names.iter().map(|s| s.to_string()).collect()));
        self
    }

    /// Caixa Geral de Depósitos current-account CSV
    pub fn cgd_current_account() -> Self {
        Self {
            name: "cgd".to_string(),
            header: HeaderRule::new(&["data", "montante"], &["descricao", "mov"]),
            aliases: Vec::new(),
            required_fields: vec![Field::Date, Field::Amount],
            date_order: DateOrder::DayFirst,
            infer_sign: true,
            repair_quotes: false,
        }
        .with_alias(Field::Date, &["datamov", "datamovimento", "data"])
        .with_alias(Field::ValueDate, &["datavalor"])
        .with_alias(Field::Description, &["descricao", "descritivo"])
        .with_alias(Field::Amount, &["montante"])
        .with_alias(
            Field::Balance,
            &["saldocontabilisticoaposmovimento", "saldocontabilistico", "saldo"],
        )
        .with_alias(Field::DebitCredit, &["dc"])
    }

    /// Card terminal (TPA) settlement statement
    pub fn terminal_settlement() -> Self {
        Self {
            name: "tpa".to_string(),
            header: HeaderRule::new(&["data", "montante", "tpa"], &[]),
            aliases: Vec::new(),
            required_fields: vec![Field::Date, Field::Amount, Field::TerminalId],
            date_order: DateOrder::DayFirst,
            infer_sign: false,
            repair_quotes: true,
        }
        .with_alias(Field::Date, &["data"])
        .with_alias(Field::TerminalId, &["*tpa*"])
        .with_alias(Field::Amount, &["montante"])
        .with_alias(Field::DebitCredit, &["dc"])
        .with_alias(Field::Fee, &["tsc"])
        .with_alias(Field::NetAmount, &["montliquido"])
    }

    /// Presets selectable by name
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "cgd" => Some(Self::cgd_current_account()),
            "tpa" | "terminal" => Some(Self::terminal_settlement()),
            _ => None,
        }
    }
}

fn alias_matches(header: &str, alias: &str) -> bool {
    match alias.strip_prefix('*').and_then(|a| a.strip_suffix('*')) {
        Some(inner) => header.contains(inner),
        None => header == alias,
    }
}

/// Located table with its columns resolved to fields
#[derive(Debug)]
pub struct StatementTable {
    columns: HashMap<Field, usize>,
    records: Vec<StringRecord>,
}

impl StatementTable {
    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn records(&self) -> &[StringRecord] {
        &self.records
    }

    /// Trimmed cell for `field`; `None` when the column or the value is missing
    pub fn get<'r>(&self, record: &'r StringRecord, field: Field) -> Option<&'r str> {
        let idx = *self.columns.get(&field)?;
        record.get(idx).map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Parse the lines from the header onwards as a `;` table
pub fn read_table(lines: &[String], format: &StatementFormat) -> Result<StatementTable, ImportError> {
    let text = if format.repair_quotes {
        let repair =
            terminal::LineRepair::new().map_err(|e| ImportError::Unreadable(e.to_string()))?;
        lines
            .iter()
            .map(|l| repair.apply(l))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        lines.join("\n")
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Unreadable(e.to_string()))?
        .clone();
    let normalized: Vec<String> = headers.iter().map(normalize_text).collect();
    debug!("{} headers: {:?}", format.name, normalized);

    let mut columns = HashMap::new();
    for (field, names) in &format.aliases {
        let found = names.iter().find_map(|alias| {
            normalized
                .iter()
                .position(|h| !h.is_empty() && alias_matches(h, alias))
        });
        if let Some(idx) = found {
            columns.insert(*field, idx);
        }
    }

    let missing: Vec<&str> = format
        .required_fields
        .iter()
        .filter(|f| !columns.contains_key(f))
        .map(|f| f.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing.join(", ")));
    }

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => debug!("Skipping malformed line {}: {}", idx + 2, e),
        }
    }

    Ok(StatementTable { columns, records })
}
