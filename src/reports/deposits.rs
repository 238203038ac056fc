//! Drill-down into the cycle closed by one cash deposit

use anyhow::{bail, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{self, SaleRecord};
use crate::reconcile::cycle::{CycleSettings, CycleStart, MethodKind};

#[derive(Debug, Clone, Serialize)]
pub struct DepositDrilldown {
    pub deposit_date: NaiveDate,
    pub deposit: Decimal,
    pub opened_on: CycleStart,
    /// Cash sales from the previous deposit day up to the day before this one
    pub cash_sales: Vec<SaleRecord>,
    pub cash_total: Decimal,
    pub difference: Decimal,
}

/// Cash sales and deposit amount for the cycle closed on `deposit_date`
pub fn deposit_drilldown(
    conn: &Connection,
    deposit_date: NaiveDate,
    settings: &CycleSettings,
) -> Result<DepositDrilldown> {
    let tx = conn.unchecked_transaction()?;

    let deposit: Decimal = db::get_credits_in_range(&tx, Some(deposit_date), Some(deposit_date))?
        .iter()
        .filter(|c| settings.is_deposit(&c.description))
        .map(|c| c.amount)
        .sum();
    if deposit <= Decimal::ZERO {
        bail!("No deposit posted on {}", deposit_date);
    }

    let opened_on = db::get_credits_before(&tx, deposit_date)?
        .into_iter()
        .find(|c| settings.is_deposit(&c.description))
        .map(|c| CycleStart::Deposit(c.transaction_date))
        .unwrap_or(CycleStart::StartOfHistory);

    let cash_sales: Vec<SaleRecord> = match deposit_date.pred_opt() {
        Some(last_day) => db::get_sales_in_range(&tx, opened_on.as_date(), Some(last_day))?
            .into_iter()
            .filter(|s| settings.method_kind(s.payment_method.as_deref()) == MethodKind::Cash)
            .collect(),
        None => Vec::new(),
    };
    tx.commit()?;

    let cash_total: Decimal = cash_sales.iter().map(|s| s.amount).sum();

    Ok(DepositDrilldown {
        deposit_date,
        deposit,
        opened_on,
        cash_sales,
        cash_total,
        difference: deposit - cash_total,
    })
}
