//! Card terminal (TPA) settlement statements
//!
//! These exports come out of a spreadsheet and keep its quoting: terminal
//! numbers as `=""0000992577""` formulas and amounts split by a stray quote
//! (`771",15`). Lines are repaired before the table is parsed.

use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use super::{decode_export, find_header_row, read_table, Field, StatementFormat};
use crate::db::TerminalMovement;
use crate::error::ImportError;
use crate::utils::{parse_date, parse_locale_amount};

/// Undoes spreadsheet quoting on raw lines
pub struct LineRepair {
    formula_number: Regex,
    split_decimal: Regex,
}

impl LineRepair {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            formula_number: Regex::new(r#"="+(\d+)"*"#)?,
            split_decimal: Regex::new(r#"(\d+)",(\d{1,3})"#)?,
        })
    }

    pub fn apply(&self, line: &str) -> String {
        let line = self.formula_number.replace_all(line, "$1");
        let line = self.split_decimal.replace_all(&line, "$1.$2");
        let line = line.replace('"', "");
        line.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn clean_terminal_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

#[derive(Debug)]
pub struct ParsedSettlement {
    pub rows: Vec<TerminalMovement>,
    pub skipped: usize,
}

pub fn parse_terminal_statement(
    bytes: &[u8],
    source_file: &str,
    format: &StatementFormat,
) -> Result<ParsedSettlement, ImportError> {
    let lines = decode_export(bytes);
    let header = find_header_row(&lines, &format.header).ok_or(ImportError::HeaderNotFound)?;
    let table = read_table(&lines[header..], format)?;

    let optional_amount = |record: &csv::StringRecord, field: Field| -> Option<Decimal> {
        table
            .has(field)
            .then(|| table.get(record, field).and_then(parse_locale_amount))
            .map(|v| v.unwrap_or(Decimal::ZERO))
    };

    let mut rows = Vec::new();
    let mut skipped = 0;

    for record in table.records() {
        let date = table
            .get(record, Field::Date)
            .and_then(|s| parse_date(s, format.date_order));
        let amount = table.get(record, Field::Amount).and_then(parse_locale_amount);
        let terminal_id = table.get(record, Field::TerminalId).and_then(clean_terminal_id);

        let (Some(movement_date), Some(amount), Some(terminal_id)) = (date, amount, terminal_id)
        else {
            skipped += 1;
            continue;
        };

        rows.push(TerminalMovement {
            id: None,
            movement_date,
            terminal_id,
            amount,
            debit_credit: table
                .get(record, Field::DebitCredit)
                .map(|s| s.to_uppercase()),
            fee: optional_amount(record, Field::Fee),
            net_amount: optional_amount(record, Field::NetAmount),
            source_file: source_file.to_string(),
        });
    }

    debug!("{}: {} settlement rows, {} skipped", source_file, rows.len(), skipped);

    if rows.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    Ok(ParsedSettlement { rows, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn repair_line(line: &str) -> String {
        LineRepair::new().unwrap().apply(line)
    }

    #[test]
    fn test_repair_formula_number() {
        assert_eq!(repair_line(r#"01-02-2025;=""0000992577"";C"#), "01-02-2025;0000992577;C");
        assert_eq!(repair_line(r#"="123""#), "123");
    }

    #[test]
    fn test_repair_split_decimal() {
        assert_eq!(repair_line(r#"01-02-2025;"771",15;C"#), "01-02-2025;771.15;C");
    }

    #[test]
    fn test_repair_collapses_whitespace() {
        assert_eq!(repair_line("  a \t ;  b  "), "a ; b");
    }

    #[test]
    fn test_parse_terminal_statement() {
        let text = "Movimentos TPA\n\
                    Data;N TPA;Montante;D/C;TSC;Mont. Liquido\n\
                    03-02-2025;=\"\"0000992577\"\";\"771\",15;C;\"3\",86;\"767\",29\n\
                    04-02-2025;=\"\"0000992577\"\";120,00;C;;\n\
                    Total;;891,15;;;\n";
        let parsed = parse_terminal_statement(
            text.as_bytes(),
            "tpa.csv",
            &StatementFormat::terminal_settlement(),
        )
        .unwrap();

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.skipped, 1);

        let first = &parsed.rows[0];
        assert_eq!(first.terminal_id, "0000992577");
        assert_eq!(first.amount, dec!(771.15));
        assert_eq!(first.debit_credit.as_deref(), Some("C"));
        assert_eq!(first.fee, Some(dec!(3.86)));
        assert_eq!(first.net_amount, Some(dec!(767.29)));

        // Present but blank fee columns default to zero
        assert_eq!(parsed.rows[1].fee, Some(Decimal::ZERO));
    }

    #[test]
    fn test_terminal_header_required() {
        let err = parse_terminal_statement(
            b"Data;Montante\n01-01-2025;1,00\n",
            "x.csv",
            &StatementFormat::terminal_settlement(),
        )
        .unwrap_err();
        assert!(matches!(err, ImportError::HeaderNotFound));
    }
}
