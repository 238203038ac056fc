//! Same-day, same-amount matching of sales against bank credits.
//!
//! Pairing is first-fit in insertion order: with several equal sales and
//! credits on one date the pairs may not be the true ones, only their count
//! is reliable.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::db::{self, BankTransaction, SaleRecord};
use crate::utils::amounts_match;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedPair {
    pub date: NaiveDate,
    pub sale_id: Option<i64>,
    pub credit_id: Option<i64>,
    pub sale_amount: Decimal,
    pub credit_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedSale {
    pub sale_id: Option<i64>,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedCredit {
    pub credit_id: Option<i64>,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
}

/// Credit repeating the exact (date, amount) of an earlier one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateCredit {
    pub credit_id: Option<i64>,
    pub first_credit_id: Option<i64>,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectMatchReport {
    pub matched: Vec<MatchedPair>,
    pub unmatched_sales: Vec<UnmatchedSale>,
    pub unmatched_credits: Vec<UnmatchedCredit>,
    pub duplicates: Vec<DuplicateCredit>,
}

impl DirectMatchReport {
    pub fn is_clean(&self) -> bool {
        self.unmatched_sales.is_empty()
            && self.unmatched_credits.is_empty()
            && self.duplicates.is_empty()
    }
}

/// Match already-loaded sales and credits, both in insertion order
pub fn match_records(sales: &[SaleRecord], credits: &[BankTransaction]) -> DirectMatchReport {
    let mut credits_by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (idx, credit) in credits.iter().enumerate() {
        credits_by_date
            .entry(credit.transaction_date)
            .or_default()
            .push(idx);
    }

    let mut claimed = vec![false; credits.len()];
    let mut report = DirectMatchReport::default();

    for sale in sales {
        let candidate = credits_by_date
            .get(&sale.sale_date)
            .and_then(|indices| {
                indices
                    .iter()
                    .copied()
                    .find(|&i| !claimed[i] && amounts_match(sale.amount, credits[i].amount))
            });

        match candidate {
            Some(i) => {
                claimed[i] = true;
                report.matched.push(MatchedPair {
                    date: sale.sale_date,
                    sale_id: sale.id,
                    credit_id: credits[i].id,
                    sale_amount: sale.amount,
                    credit_amount: credits[i].amount,
                });
            }
            None => report.unmatched_sales.push(UnmatchedSale {
                sale_id: sale.id,
                date: sale.sale_date,
                amount: sale.amount,
                payment_method: sale.payment_method.clone(),
            }),
        }
    }

    let mut first_seen: HashMap<(NaiveDate, Decimal), Option<i64>> = HashMap::new();
    for (idx, credit) in credits.iter().enumerate() {
        if !claimed[idx] {
            report.unmatched_credits.push(UnmatchedCredit {
                credit_id: credit.id,
                date: credit.transaction_date,
                amount: credit.amount,
                description: credit.description.clone(),
            });
        }

        match first_seen.get(&(credit.transaction_date, credit.amount)) {
            Some(first) => report.duplicates.push(DuplicateCredit {
                credit_id: credit.id,
                first_credit_id: *first,
                date: credit.transaction_date,
                amount: credit.amount,
                description: credit.description.clone(),
            }),
            None => {
                first_seen.insert((credit.transaction_date, credit.amount), credit.id);
            }
        }
    }

    report
}

/// Load sales and credits (optionally bounded, inclusive) and match them
pub fn match_sales_to_credits(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<DirectMatchReport> {
    let tx = conn.unchecked_transaction()?;
    let sales = db::get_sales_in_range(&tx, from, to)?;
    let credits = db::get_credits_in_range(&tx, from, to)?;
    tx.commit()?;

    let report = match_records(&sales, &credits);
    info!(
        "Direct match: {} matched, {} unmatched sales, {} unmatched credits, {} duplicates",
        report.matched.len(),
        report.unmatched_sales.len(),
        report.unmatched_credits.len(),
        report.duplicates.len()
    );
    Ok(report)
}
