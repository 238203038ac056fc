use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::classify::UNCLASSIFIED;
use crate::db::{self, BankTransaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub count: usize,
    /// Sum of the (negative) debit amounts
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub categories: Vec<CategoryTotal>,
    pub total: Decimal,
}

/// Group debits by applied category, largest spend first.
/// Debits without a classification fall into [`UNCLASSIFIED`].
pub fn summarize_categories(rows: &[(BankTransaction, Option<String>)]) -> Vec<CategoryTotal> {
    let mut buckets: HashMap<&str, (usize, Decimal)> = HashMap::new();
    for (tx, category) in rows {
        let key = category.as_deref().unwrap_or(UNCLASSIFIED);
        let bucket = buckets.entry(key).or_insert((0, Decimal::ZERO));
        bucket.0 += 1;
        bucket.1 += tx.amount;
    }

    let mut totals: Vec<CategoryTotal> = buckets
        .into_iter()
        .map(|(category, (count, total))| CategoryTotal {
            category: category.to_string(),
            count,
            total,
        })
        .collect();

    totals.sort_by(|a, b| a.total.cmp(&b.total).then_with(|| a.category.cmp(&b.category)));
    totals
}

pub fn category_totals(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<CategoryReport> {
    let rows = db::get_debits_with_category(conn, from, to)?;
    let categories = summarize_categories(&rows);
    let total = categories
        .iter()
        .fold(Decimal::ZERO, |acc, c| acc + c.total);

    Ok(CategoryReport {
        from,
        to,
        categories,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn debit(desc: &str, amount: Decimal) -> BankTransaction {
        BankTransaction::new(
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            None,
            desc,
            amount,
            "a.csv",
        )
    }

    #[test]
    fn test_unclassified_bucket_and_order() {
        let rows = vec![
            (debit("EDP", dec!(-50)), Some("Electricity".to_string())),
            (debit("EDP 2", dec!(-25)), Some("Electricity".to_string())),
            (debit("LEVANTAMENTO", dec!(-100)), None),
            (debit("REPSOL", dec!(-30)), Some("Fuel".to_string())),
        ];

        let totals = summarize_categories(&rows);
        let names: Vec<&str> = totals.iter().map(|t| t.category.as_str()).collect();
        assert_eq!(names, vec![UNCLASSIFIED, "Electricity", "Fuel"]);
        assert_eq!(totals[1].count, 2);
        assert_eq!(totals[1].total, dec!(-75));
    }

    #[test]
    fn test_empty() {
        assert!(summarize_categories(&[]).is_empty());
    }
}
