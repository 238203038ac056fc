//! Bank current-account statements into [`BankTransaction`]s

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use super::{decode_export, find_header_row, read_table, Field, StatementFormat};
use crate::db::BankTransaction;
use crate::error::ImportError;
use crate::utils::{amounts_match, parse_date, parse_locale_amount};

/// Rows that survived parsing, plus how many were dropped
#[derive(Debug)]
pub struct ParsedStatement {
    pub rows: Vec<BankTransaction>,
    pub skipped: usize,
}

struct DraftRow {
    date: NaiveDate,
    value_date: Option<NaiveDate>,
    description: String,
    amount: Decimal,
    balance: Option<Decimal>,
}

/// Parse a raw statement export.
///
/// File-level problems (no table, missing columns, nothing usable) are
/// errors; rows with an unparseable date or amount are skipped.
pub fn parse_bank_statement(
    bytes: &[u8],
    source_file: &str,
    format: &StatementFormat,
) -> Result<ParsedStatement, ImportError> {
    let lines = decode_export(bytes);
    let header = find_header_row(&lines, &format.header).ok_or(ImportError::HeaderNotFound)?;
    let table = read_table(&lines[header..], format)?;

    let mut drafts = Vec::new();
    let mut skipped = 0;

    for (idx, record) in table.records().iter().enumerate() {
        let date = table
            .get(record, Field::Date)
            .and_then(|s| parse_date(s, format.date_order));
        let amount = table.get(record, Field::Amount).and_then(parse_locale_amount);

        let (Some(date), Some(mut amount)) = (date, amount) else {
            debug!("{}: skipping line {} (no date/amount)", source_file, header + idx + 2);
            skipped += 1;
            continue;
        };

        let is_debit_marked = table
            .get(record, Field::DebitCredit)
            .map(|dc| dc.eq_ignore_ascii_case("d"))
            .unwrap_or(false);
        if is_debit_marked && amount > Decimal::ZERO {
            amount = -amount;
        }

        drafts.push(DraftRow {
            date,
            value_date: table
                .get(record, Field::ValueDate)
                .and_then(|s| parse_date(s, format.date_order)),
            description: table
                .get(record, Field::Description)
                .unwrap_or_default()
                .to_string(),
            amount,
            balance: table.get(record, Field::Balance).and_then(parse_locale_amount),
        });
    }

    if drafts.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    if format.infer_sign && table.has(Field::Balance) {
        let pairs: Vec<(Decimal, Option<Decimal>)> =
            drafts.iter().map(|d| (d.amount, d.balance)).collect();
        for (draft, signed) in drafts.iter_mut().zip(infer_signs(&pairs)) {
            draft.amount = signed;
        }
    }

    let rows = drafts
        .into_iter()
        .map(|d| BankTransaction::new(d.date, d.value_date, &d.description, d.amount, source_file))
        .collect();

    Ok(ParsedStatement { rows, skipped })
}

/// Recover debit signs from the running balance.
///
/// Exports that print every amount as positive still carry the balance after
/// each movement. A positive amount whose balance delta equals `-amount` is a
/// debit. Anything inconclusive keeps its sign. Rows are taken in file order
/// and the balance cursor advances on every row, known or not.
pub fn infer_signs(rows: &[(Decimal, Option<Decimal>)]) -> Vec<Decimal> {
    let mut previous: Option<Decimal> = None;
    let mut signed = Vec::with_capacity(rows.len());

    for &(amount, balance) in rows {
        let value = if amount < Decimal::ZERO {
            amount
        } else {
            match (previous, balance) {
                (Some(prev), Some(current)) => {
                    let delta = current - prev;
                    if amounts_match(delta, amount) {
                        amount
                    } else if amounts_match(delta, -amount) {
                        -amount
                    } else {
                        debug!(
                            "Ambiguous sign: amount {} vs balance delta {}",
                            amount, delta
                        );
                        amount
                    }
                }
                _ => amount,
            }
        };
        signed.push(value);
        previous = balance;
    }

    signed
}
