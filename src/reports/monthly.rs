use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::{self, BankTransaction, SaleRecord};

/// Sales against bank credits for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub sales: Decimal,
    pub credits: Decimal,
    /// credits - sales, oriented like the cycle differences: negative means
    /// sales that never reached the bank
    pub difference: Decimal,
}

impl MonthlySummary {
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

pub fn summarize_months(sales: &[SaleRecord], credits: &[BankTransaction]) -> Vec<MonthlySummary> {
    let mut months: BTreeMap<(i32, u32), (Decimal, Decimal)> = BTreeMap::new();

    for sale in sales {
        let key = (sale.sale_date.year(), sale.sale_date.month());
        months.entry(key).or_insert((Decimal::ZERO, Decimal::ZERO)).0 += sale.amount;
    }
    for credit in credits {
        let key = (credit.transaction_date.year(), credit.transaction_date.month());
        months.entry(key).or_insert((Decimal::ZERO, Decimal::ZERO)).1 += credit.amount;
    }

    months
        .into_iter()
        .map(|((year, month), (sales, credits))| MonthlySummary {
            year,
            month,
            sales,
            credits,
            difference: credits - sales,
        })
        .collect()
}

pub fn monthly_summary(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<MonthlySummary>> {
    let tx = conn.unchecked_transaction()?;
    let sales = db::get_sales_in_range(&tx, from, to)?;
    let credits = db::get_credits_in_range(&tx, from, to)?;
    tx.commit()?;

    Ok(summarize_months(&sales, &credits))
}
