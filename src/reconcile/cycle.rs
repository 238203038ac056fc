//! Cash-deposit-cycle reconciliation
//!
//! Card sales settle through the terminal and show up as "TPA" credits about
//! a posting later. Cash is banked in occasional "DEPOSITO" credits, so it
//! cannot be compared day by day: cash sales accumulate until a deposit
//! closes the cycle, and the deposit is compared against the accumulated
//! total. Cash taken on the deposit day itself belongs to the next cycle.
//!
//! The engine is a fold over one [`DayInput`] per calendar day carrying an
//! explicit [`CycleState`]; loading from the store is separate
//! ([`load_cycle_inputs`]) so the fold can be tested without a database.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::ReconcileSection;
use crate::db;
use crate::utils::{contains_phrase, normalize_words};

/// How a payment method counts for reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Card,
    Cash,
    Other,
}

/// Markers and method keywords, stored as normalized word sequences
#[derive(Debug, Clone)]
pub struct CycleSettings {
    deposit_marker: Vec<String>,
    card_settlement_marker: Vec<String>,
    cash_keywords: Vec<Vec<String>>,
    card_keywords: Vec<Vec<String>>,
}

impl CycleSettings {
    pub fn new(
        deposit_marker: &str,
        card_settlement_marker: &str,
        cash_keywords: &[String],
        card_keywords: &[String],
    ) -> Self {
        let normalize_all = |words: &[String]| -> Vec<Vec<String>> {
            words
                .iter()
                .map(|w| normalize_words(w))
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            deposit_marker: normalize_words(deposit_marker),
            card_settlement_marker: normalize_words(card_settlement_marker),
            cash_keywords: normalize_all(cash_keywords),
            card_keywords: normalize_all(card_keywords),
        }
    }

    pub fn from_config(section: &ReconcileSection) -> Self {
        Self::new(
            &section.deposit_marker,
            &section.card_settlement_marker,
            &section.cash_keywords,
            &section.card_keywords,
        )
    }

    pub fn method_kind(&self, method: Option<&str>) -> MethodKind {
        let Some(method) = method.map(normalize_words) else {
            return MethodKind::Other;
        };
        if self.cash_keywords.iter().any(|k| contains_phrase(&method, k)) {
            MethodKind::Cash
        } else if self.card_keywords.iter().any(|k| contains_phrase(&method, k)) {
            MethodKind::Card
        } else {
            MethodKind::Other
        }
    }

    pub fn is_deposit(&self, description: &str) -> bool {
        contains_phrase(&normalize_words(description), &self.deposit_marker)
    }

    pub fn is_card_settlement(&self, description: &str) -> bool {
        contains_phrase(&normalize_words(description), &self.card_settlement_marker)
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self::from_config(&ReconcileSection::default())
    }
}

/// Where the cycle in progress at the start of the window was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "date")]
pub enum CycleStart {
    StartOfHistory,
    Deposit(NaiveDate),
}

impl CycleStart {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CycleStart::StartOfHistory => None,
            CycleStart::Deposit(d) => Some(*d),
        }
    }
}

impl std::fmt::Display for CycleStart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleStart::StartOfHistory => write!(f, "start of history"),
            CycleStart::Deposit(d) => write!(f, "{}", d),
        }
    }
}

/// Per-day totals fed to the fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayInput {
    pub date: NaiveDate,
    pub card_sales: Decimal,
    pub cash_sales: Decimal,
    pub pos: Decimal,
    pub deposit: Decimal,
}

impl DayInput {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            card_sales: Decimal::ZERO,
            cash_sales: Decimal::ZERO,
            pos: Decimal::ZERO,
            deposit: Decimal::ZERO,
        }
    }
}

/// Everything the fold needs for one window
#[derive(Debug, Clone)]
pub struct CycleInputs {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Unbanked cash carried into the window
    pub preload: Decimal,
    pub opened: CycleStart,
    /// One entry per calendar day, ascending, no gaps
    pub days: Vec<DayInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleState {
    pub cash_accumulator: Decimal,
    pub card_balance: Decimal,
    pub cash_balance: Decimal,
    pub cycle_opened_on: CycleStart,
    /// The first deposit in the window has been annotated
    pub annotated: bool,
}

impl CycleState {
    pub fn opening(preload: Decimal, opened: CycleStart) -> Self {
        Self {
            cash_accumulator: preload,
            card_balance: Decimal::ZERO,
            cash_balance: Decimal::ZERO,
            cycle_opened_on: opened,
            annotated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleDay {
    pub date: NaiveDate,
    pub card_sales: Decimal,
    pub cash_sales: Decimal,
    pub pos: Decimal,
    pub deposit: Decimal,
    pub card_diff: Decimal,
    /// Only defined on deposit days
    pub cash_diff: Option<Decimal>,
    pub total_diff: Decimal,
    pub card_balance: Decimal,
    pub cash_balance: Decimal,
    /// Accumulated cash the deposit is compared against
    pub pre_deposit_cash: Option<Decimal>,
    /// Set on the first deposit day of the window
    pub preloaded_from: Option<CycleStart>,
}

/// Interval between two deposits, `[opened_on, closed_on)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationCycle {
    pub opened_on: CycleStart,
    pub closed_on: NaiveDate,
    pub cash_sales: Decimal,
    pub deposit: Decimal,
    pub difference: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleTotals {
    pub card_sales: Decimal,
    pub cash_sales: Decimal,
    pub pos: Decimal,
    pub deposits: Decimal,
    pub card_diff: Decimal,
    pub cash_diff: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<CycleDay>,
    pub cycles: Vec<ReconciliationCycle>,
    /// Cash sold since the last deposit and not yet banked
    pub open_cycle_cash: Decimal,
    pub totals: CycleTotals,
}

/// Advance the state by one day
pub fn step(
    mut state: CycleState,
    input: &DayInput,
) -> (CycleState, CycleDay, Option<ReconciliationCycle>) {
    let card_diff = input.pos - input.card_sales;
    state.card_balance += card_diff;

    let mut closed = None;
    let mut pre_deposit_cash = None;
    let mut preloaded_from = None;

    let cash_diff = if input.deposit > Decimal::ZERO {
        let accumulated = state.cash_accumulator;
        let diff = input.deposit - accumulated;
        state.cash_balance += diff;
        pre_deposit_cash = Some(accumulated);

        if !state.annotated {
            preloaded_from = Some(state.cycle_opened_on);
            state.annotated = true;
        }

        closed = Some(ReconciliationCycle {
            opened_on: state.cycle_opened_on,
            closed_on: input.date,
            cash_sales: accumulated,
            deposit: input.deposit,
            difference: diff,
        });

        state.cycle_opened_on = CycleStart::Deposit(input.date);
        state.cash_accumulator = Decimal::ZERO;
        Some(diff)
    } else {
        None
    };

    // After the deposit: today's cash goes into the next cycle
    state.cash_accumulator += input.cash_sales;

    let day = CycleDay {
        date: input.date,
        card_sales: input.card_sales,
        cash_sales: input.cash_sales,
        pos: input.pos,
        deposit: input.deposit,
        card_diff,
        cash_diff,
        total_diff: card_diff + cash_diff.unwrap_or(Decimal::ZERO),
        card_balance: state.card_balance,
        cash_balance: state.cash_balance,
        pre_deposit_cash,
        preloaded_from,
    };

    (state, day, closed)
}

/// Run the fold over a loaded window
pub fn fold_days(inputs: &CycleInputs) -> CycleReport {
    let initial = CycleState::opening(inputs.preload, inputs.opened);
    let mut days = Vec::with_capacity(inputs.days.len());
    let mut cycles = Vec::new();
    let mut totals = CycleTotals::default();

    let final_state = inputs.days.iter().fold(initial, |state, input| {
        let (next, day, closed) = step(state, input);

        totals.card_sales += day.card_sales;
        totals.cash_sales += day.cash_sales;
        totals.pos += day.pos;
        totals.deposits += day.deposit;
        totals.card_diff += day.card_diff;
        totals.cash_diff += day.cash_diff.unwrap_or(Decimal::ZERO);

        days.push(day);
        cycles.extend(closed);
        next
    });

    CycleReport {
        from: inputs.from,
        to: inputs.to,
        days,
        cycles,
        open_cycle_cash: final_state.cash_accumulator,
        totals,
    }
}

/// Read sales and credits for `[from, to]` plus the carried-in cash.
///
/// All reads happen inside one transaction so the window sees a consistent
/// snapshot of the store.
pub fn load_cycle_inputs(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    settings: &CycleSettings,
) -> Result<CycleInputs> {
    if from > to {
        bail!("Invalid range: {} is after {}", from, to);
    }

    let tx = conn.unchecked_transaction()?;

    let opened = db::get_credits_before(&tx, from)?
        .into_iter()
        .find(|c| settings.is_deposit(&c.description))
        .map(|c| CycleStart::Deposit(c.transaction_date))
        .unwrap_or(CycleStart::StartOfHistory);

    let before_from = from.pred_opt();
    let preload = match before_from {
        Some(last_day) => db::get_sales_in_range(&tx, opened.as_date(), Some(last_day))?
            .iter()
            .filter(|s| settings.method_kind(s.payment_method.as_deref()) == MethodKind::Cash)
            .map(|s| s.amount)
            .sum(),
        None => Decimal::ZERO,
    };

    let mut by_day: BTreeMap<NaiveDate, DayInput> = from
        .iter_days()
        .take_while(|d| *d <= to)
        .map(|d| (d, DayInput::empty(d)))
        .collect();

    for sale in db::get_sales_in_range(&tx, Some(from), Some(to))? {
        let Some(day) = by_day.get_mut(&sale.sale_date) else {
            continue;
        };
        match settings.method_kind(sale.payment_method.as_deref()) {
            MethodKind::Card => day.card_sales += sale.amount,
            MethodKind::Cash => day.cash_sales += sale.amount,
            MethodKind::Other => {
                debug!(
                    "Sale {} on {} has an unrecognized method {:?}",
                    sale.natural_key, sale.sale_date, sale.payment_method
                );
            }
        }
    }

    for credit in db::get_credits_in_range(&tx, Some(from), Some(to))? {
        let Some(day) = by_day.get_mut(&credit.transaction_date) else {
            continue;
        };
        if settings.is_deposit(&credit.description) {
            day.deposit += credit.amount;
        } else if settings.is_card_settlement(&credit.description) {
            day.pos += credit.amount;
        }
    }

    tx.commit()?;

    Ok(CycleInputs {
        from,
        to,
        preload,
        opened,
        days: by_day.into_values().collect(),
    })
}

/// Reconcile every day in `[from, to]`
pub fn reconcile_range(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    settings: &CycleSettings,
) -> Result<CycleReport> {
    let inputs = load_cycle_inputs(conn, from, to, settings)
        .with_context(|| format!("Failed to load reconciliation inputs for {}..{}", from, to))?;

    info!(
        "Reconciling {} days from {} (carried cash {} since {})",
        inputs.days.len(),
        from,
        inputs.preload,
        inputs.opened
    );

    Ok(fold_days(&inputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn day(d: u32, card: Decimal, cash: Decimal, pos: Decimal, deposit: Decimal) -> DayInput {
        DayInput {
            date: date(2025, 1, d),
            card_sales: card,
            cash_sales: cash,
            pos,
            deposit,
        }
    }

    fn inputs(days: Vec<DayInput>, preload: Decimal, opened: CycleStart) -> CycleInputs {
        CycleInputs {
            from: days[0].date,
            to: days[days.len() - 1].date,
            preload,
            opened,
            days,
        }
    }

    #[test]
    fn test_deposit_closes_cycle_with_zero_difference() {
        let report = fold_days(&inputs(
            vec![
                day(1, dec!(0), dec!(100.00), dec!(0), dec!(0)),
                day(2, dec!(0), dec!(50.00), dec!(0), dec!(0)),
                day(3, dec!(0), dec!(0), dec!(0), dec!(150.00)),
            ],
            Decimal::ZERO,
            CycleStart::StartOfHistory,
        ));

        assert_eq!(report.days[0].cash_diff, None);
        assert_eq!(report.days[1].cash_diff, None);
        assert_eq!(report.days[2].cash_diff, Some(dec!(0.00)));
        assert_eq!(report.days[2].pre_deposit_cash, Some(dec!(150.00)));
        assert_eq!(report.open_cycle_cash, Decimal::ZERO);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].opened_on, CycleStart::StartOfHistory);
        assert_eq!(report.cycles[0].closed_on, date(2025, 1, 3));
    }

    #[test]
    fn test_deposit_day_cash_goes_to_next_cycle() {
        let report = fold_days(&inputs(
            vec![
                day(1, dec!(0), dec!(100), dec!(0), dec!(0)),
                day(2, dec!(0), dec!(40), dec!(0), dec!(90)),
                day(3, dec!(0), dec!(0), dec!(0), dec!(40)),
            ],
            Decimal::ZERO,
            CycleStart::StartOfHistory,
        ));

        assert_eq!(report.days[1].cash_diff, Some(dec!(-10)));
        assert_eq!(report.days[2].cash_diff, Some(dec!(0)));
        assert_eq!(report.days[2].cash_balance, dec!(-10));
        assert_eq!(report.cycles[1].opened_on, CycleStart::Deposit(date(2025, 1, 2)));
        assert_eq!(report.cycles[1].cash_sales, dec!(40));
    }

    #[test]
    fn test_card_diff_and_running_balance() {
        let report = fold_days(&inputs(
            vec![
                day(1, dec!(80), dec!(0), dec!(0), dec!(0)),
                day(2, dec!(20), dec!(0), dec!(80), dec!(0)),
                day(3, dec!(0), dec!(0), dec!(15), dec!(0)),
            ],
            Decimal::ZERO,
            CycleStart::StartOfHistory,
        ));

        let diffs: Vec<Decimal> = report.days.iter().map(|d| d.card_diff).collect();
        assert_eq!(diffs, vec![dec!(-80), dec!(60), dec!(15)]);
        assert_eq!(report.days[2].card_balance, dec!(-5));
        assert_eq!(report.days[1].total_diff, dec!(60));
        assert_eq!(report.totals.card_diff, dec!(-5));
    }

    #[test]
    fn test_preload_counts_against_first_deposit() {
        let report = fold_days(&inputs(
            vec![
                day(10, dec!(0), dec!(30), dec!(0), dec!(0)),
                day(11, dec!(0), dec!(0), dec!(0), dec!(100)),
                day(12, dec!(0), dec!(5), dec!(0), dec!(5)),
            ],
            dec!(70),
            CycleStart::Deposit(date(2025, 1, 6)),
        ));

        assert_eq!(report.days[1].cash_diff, Some(dec!(0)));
        assert_eq!(
            report.days[1].preloaded_from,
            Some(CycleStart::Deposit(date(2025, 1, 6)))
        );
        // Only the first deposit in the window is annotated
        assert_eq!(report.days[2].preloaded_from, None);
        assert_eq!(report.open_cycle_cash, dec!(5));
    }

    #[test]
    fn test_closed_cycle_invariant() {
        let report = fold_days(&inputs(
            vec![
                day(1, dec!(0), dec!(12.5), dec!(0), dec!(0)),
                day(2, dec!(0), dec!(7.5), dec!(0), dec!(25)),
                day(3, dec!(0), dec!(3), dec!(0), dec!(0)),
                day(4, dec!(0), dec!(4), dec!(0), dec!(0)),
                day(5, dec!(0), dec!(0), dec!(0), dec!(7)),
            ],
            Decimal::ZERO,
            CycleStart::StartOfHistory,
        ));

        for cycle in &report.cycles {
            assert_eq!(cycle.difference, cycle.deposit - cycle.cash_sales);
        }
        assert_eq!(report.cycles[0].cash_sales, dec!(12.5));
        assert_eq!(report.cycles[1].cash_sales, dec!(7.5) + dec!(3) + dec!(4));
        assert_eq!(report.totals.cash_diff, dec!(12.5) + dec!(-7.5));
    }

    #[test]
    fn test_method_kind_and_markers() {
        let settings = CycleSettings::default();
        assert_eq!(settings.method_kind(Some("Numerário")), MethodKind::Cash);
        assert_eq!(settings.method_kind(Some("Dinheiro")), MethodKind::Cash);
        assert_eq!(settings.method_kind(Some("Multibanco")), MethodKind::Card);
        assert_eq!(settings.method_kind(Some("Cartão Crédito")), MethodKind::Card);
        assert_eq!(settings.method_kind(Some("Transferência")), MethodKind::Other);
        assert_eq!(settings.method_kind(None), MethodKind::Other);

        assert!(settings.is_deposit("DEPOSITO"));
        assert!(settings.is_deposit(" Depósito numerário "));
        assert!(settings.is_card_settlement("TPA 0000992577"));
        assert!(!settings.is_card_settlement("TRF SDT"));
    }

    #[test]
    fn test_markers_match_whole_words() {
        let settings = CycleSettings::default();
        assert!(!settings.is_card_settlement("TRF SDT PAGAMENTO CLIENTE"));
        assert!(!settings.is_card_settlement("ESTPAR LDA"));
        assert!(settings.is_card_settlement("TPA0000992577"));
        assert!(!settings.is_deposit("TRF DEPOSITOS PRAZO"));
        assert!(settings.is_deposit("DEP. DEPOSITO 123"));
        assert_eq!(settings.method_kind(Some("Cashback")), MethodKind::Other);
        assert_eq!(settings.method_kind(Some("Cartão-Crédito")), MethodKind::Card);
    }

    #[test]
    fn test_cycle_start_display() {
        assert_eq!(CycleStart::StartOfHistory.to_string(), "start of history");
        assert_eq!(CycleStart::Deposit(date(2025, 1, 6)).to_string(), "2025-01-06");
    }
}
