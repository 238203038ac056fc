//! Output formatting module for CLI display
//!
//! Reports are computed elsewhere; this module only turns them into tables
//! or JSON.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

use crate::classify::{ClassifyOutcome, RuleSet};
use crate::importers::FileImportStatus;
use crate::reconcile::cycle::CycleReport;
use crate::reconcile::direct::DirectMatchReport;
use crate::reports::{CategoryReport, DepositDrilldown, MonthlySummary};
use crate::utils::{format_currency, format_decimal_pt};

/// Pretty JSON for any report
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn signed(value: Decimal) -> String {
    let text = format_decimal_pt(value);
    if value > Decimal::ZERO {
        text.green().to_string()
    } else if value < Decimal::ZERO {
        text.red().to_string()
    } else {
        text
    }
}

fn optional_signed(value: Option<Decimal>) -> String {
    value.map(signed).unwrap_or_else(|| "-".to_string())
}

pub fn format_import_statuses(statuses: &[FileImportStatus]) -> String {
    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "File")]
        file: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Rows")]
        rows: usize,
        #[tabled(rename = "Skipped")]
        skipped: usize,
        #[tabled(rename = "From")]
        from: String,
        #[tabled(rename = "To")]
        to: String,
        #[tabled(rename = "Message")]
        message: String,
    }

    if statuses.is_empty() {
        return format!("{} No importable files found\n", "ℹ".blue().bold());
    }

    let rows: Vec<StatusRow> = statuses
        .iter()
        .map(|s| StatusRow {
            file: s.file.clone(),
            status: if s.is_ok() {
                "ok".green().to_string()
            } else {
                "error".red().to_string()
            },
            rows: s.rows,
            skipped: s.skipped,
            from: s.min_date.map(|d| d.to_string()).unwrap_or_default(),
            to: s.max_date.map(|d| d.to_string()).unwrap_or_default(),
            message: s.message.clone(),
        })
        .collect();

    let ok = statuses.iter().filter(|s| s.is_ok()).count();
    let total_rows: usize = statuses.iter().map(|s| s.rows).sum();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();

    format!(
        "{}\n\n{} {} of {} files imported, {} rows\n",
        table,
        if ok == statuses.len() {
            "✓".green().bold()
        } else {
            "⚠".yellow().bold()
        },
        ok,
        statuses.len(),
        total_rows
    )
}

pub fn format_classify_outcome(outcome: &ClassifyOutcome) -> String {
    let mut output = format!(
        "{} Classified {} of {} pending debits\n",
        "✓".green().bold(),
        outcome.classified.to_string().green(),
        outcome.examined
    );
    if outcome.unmatched > 0 {
        output.push_str(&format!(
            "  {} debits matched no rule (add one with: {} rules add <pattern> <category>)\n",
            outcome.unmatched.to_string().yellow(),
            "conciliador".bold()
        ));
    }
    output
}

pub fn format_rules(rules: &RuleSet) -> String {
    #[derive(Tabled)]
    struct RuleRow {
        #[tabled(rename = "Id")]
        id: i64,
        #[tabled(rename = "Pattern")]
        pattern: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Priority")]
        priority: String,
    }

    if rules.is_empty() {
        return format!(
            "{} No rules defined\nSeed the defaults with: {} init\n",
            "ℹ".blue().bold(),
            "conciliador".bold()
        );
    }

    let rows: Vec<RuleRow> = rules
        .iter()
        .map(|r| RuleRow {
            id: r.id,
            pattern: r.pattern.clone(),
            category: r.category.clone(),
            priority: r.priority.map(|p| p.to_string()).unwrap_or_default(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Daily reconciliation table; quiet days are hidden unless `all_days`
pub fn format_cycle_report(report: &CycleReport, all_days: bool) -> String {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Card sales")]
        card_sales: String,
        #[tabled(rename = "TPA")]
        pos: String,
        #[tabled(rename = "Card diff")]
        card_diff: String,
        #[tabled(rename = "Cash sales")]
        cash_sales: String,
        #[tabled(rename = "Deposit")]
        deposit: String,
        #[tabled(rename = "Cash diff")]
        cash_diff: String,
        #[tabled(rename = "Card bal.")]
        card_balance: String,
        #[tabled(rename = "Cash bal.")]
        cash_balance: String,
    }

    let mut output = format!(
        "\n{} Reconciliation {} to {}\n\n",
        "📊".cyan().bold(),
        report.from,
        report.to
    );

    let rows: Vec<DayRow> = report
        .days
        .iter()
        .filter(|d| {
            all_days
                || !(d.card_sales.is_zero()
                    && d.cash_sales.is_zero()
                    && d.pos.is_zero()
                    && d.deposit.is_zero())
        })
        .map(|d| DayRow {
            date: d.date.format("%d/%m/%Y").to_string(),
            card_sales: format_decimal_pt(d.card_sales),
            pos: format_decimal_pt(d.pos),
            card_diff: signed(d.card_diff),
            cash_sales: format_decimal_pt(d.cash_sales),
            deposit: format_decimal_pt(d.deposit),
            cash_diff: optional_signed(d.cash_diff),
            card_balance: signed(d.card_balance),
            cash_balance: signed(d.cash_balance),
        })
        .collect();

    if rows.is_empty() {
        output.push_str(&format!("{} No sales or postings in range\n", "ℹ".blue().bold()));
    } else {
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
            .to_string();
        output.push_str(&table);
        output.push('\n');
    }

    if let Some(day) = report.days.iter().find(|d| d.preloaded_from.is_some()) {
        if let (Some(start), Some(cash)) = (day.preloaded_from, day.pre_deposit_cash) {
            output.push_str(&format!(
                "\nFirst deposit on {} covers {} of cash sold since {}\n",
                day.date,
                format_currency(cash),
                start
            ));
        }
    }

    let totals = &report.totals;
    output.push_str(&format!("\n{} Totals", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "\n{:<22} {}",
        "Card sales:".bold(),
        format_currency(totals.card_sales)
    ));
    output.push_str(&format!(
        "\n{:<22} {}",
        "Card settlements:".bold(),
        format_currency(totals.pos)
    ));
    output.push_str(&format!("\n{:<22} {}", "Card difference:".bold(), signed(totals.card_diff)));
    output.push_str(&format!(
        "\n{:<22} {}",
        "Cash sales:".bold(),
        format_currency(totals.cash_sales)
    ));
    output.push_str(&format!(
        "\n{:<22} {}",
        "Deposits:".bold(),
        format_currency(totals.deposits)
    ));
    output.push_str(&format!("\n{:<22} {}", "Cash difference:".bold(), signed(totals.cash_diff)));
    output.push_str(&format!(
        "\n{:<22} {}\n",
        "Cash not yet banked:".bold(),
        format_currency(report.open_cycle_cash)
    ));

    output
}

pub fn format_direct_report(report: &DirectMatchReport) -> String {
    #[derive(Tabled)]
    struct FindingRow {
        #[tabled(rename = "Finding")]
        kind: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Detail")]
        detail: String,
    }

    let mut rows = Vec::new();
    for s in &report.unmatched_sales {
        rows.push(FindingRow {
            kind: "unmatched sale".yellow().to_string(),
            date: s.date.to_string(),
            amount: format_decimal_pt(s.amount),
            detail: s.payment_method.clone().unwrap_or_default(),
        });
    }
    for c in &report.unmatched_credits {
        rows.push(FindingRow {
            kind: "unmatched credit".yellow().to_string(),
            date: c.date.to_string(),
            amount: format_decimal_pt(c.amount),
            detail: c.description.clone(),
        });
    }
    for d in &report.duplicates {
        rows.push(FindingRow {
            kind: "duplicate credit".red().to_string(),
            date: d.date.to_string(),
            amount: format_decimal_pt(d.amount),
            detail: d.description.clone(),
        });
    }

    let mut output = format!(
        "\n{} {} sales matched to bank credits\n",
        "✓".green().bold(),
        report.matched.len()
    );

    if rows.is_empty() {
        output.push_str(&format!("{} No anomalies\n", "✓".green().bold()));
    } else {
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
            .to_string();
        output.push('\n');
        output.push_str(&table);
        output.push('\n');
    }
    output
}

pub fn format_category_report(report: &CategoryReport) -> String {
    #[derive(Tabled)]
    struct CategoryRow {
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Debits")]
        count: usize,
        #[tabled(rename = "Total")]
        total: String,
    }

    if report.categories.is_empty() {
        return format!("{} No debits in range\n", "ℹ".blue().bold());
    }

    let rows: Vec<CategoryRow> = report
        .categories
        .iter()
        .map(|c| CategoryRow {
            category: c.category.clone(),
            count: c.count,
            total: format_decimal_pt(c.total),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();

    format!(
        "{}\n{:<12} {}\n",
        table,
        "Total:".bold(),
        format_currency(report.total)
    )
}

pub fn format_monthly(months: &[MonthlySummary]) -> String {
    #[derive(Tabled)]
    struct MonthRow {
        #[tabled(rename = "Month")]
        month: String,
        #[tabled(rename = "Sales")]
        sales: String,
        #[tabled(rename = "Bank credits")]
        credits: String,
        #[tabled(rename = "Difference")]
        difference: String,
    }

    if months.is_empty() {
        return format!("{} No sales or credits in range\n", "ℹ".blue().bold());
    }

    let rows: Vec<MonthRow> = months
        .iter()
        .map(|m| MonthRow {
            month: m.label(),
            sales: format_decimal_pt(m.sales),
            credits: format_decimal_pt(m.credits),
            difference: signed(m.difference),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string()
}

pub fn format_deposit_drilldown(drill: &DepositDrilldown) -> String {
    #[derive(Tabled)]
    struct SaleRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Method")]
        method: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "File")]
        file: String,
    }

    let mut output = format!(
        "\n{} Deposit of {} on {} (cycle opened {})\n\n",
        "💶".cyan().bold(),
        format_currency(drill.deposit),
        drill.deposit_date,
        drill.opened_on
    );

    if drill.cash_sales.is_empty() {
        output.push_str(&format!("{} No cash sales in this cycle\n", "ℹ".blue().bold()));
    } else {
        let rows: Vec<SaleRow> = drill
            .cash_sales
            .iter()
            .map(|s| SaleRow {
                date: s.sale_date.format("%d/%m/%Y").to_string(),
                method: s.payment_method.clone().unwrap_or_default(),
                amount: format_decimal_pt(s.amount),
                file: s.source_file.clone(),
            })
            .collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
            .to_string();
        output.push_str(&table);
        output.push('\n');
    }

    output.push_str(&format!(
        "\n{:<14} {}\n{:<14} {}\n",
        "Cash sales:".bold(),
        format_currency(drill.cash_total),
        "Difference:".bold(),
        signed(drill.difference)
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importers::ImportStatus;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_messages() {
        colored::control::set_override(false);
        assert!(format_import_statuses(&[]).contains("No importable files"));
        assert!(format_monthly(&[]).contains("No sales or credits"));
        assert!(format_direct_report(&DirectMatchReport::default()).contains("No anomalies"));
    }

    #[test]
    fn test_import_status_table() {
        colored::control::set_override(false);
        let statuses = vec![FileImportStatus {
            file: "extrato.csv".to_string(),
            status: ImportStatus::Ok,
            rows: 12,
            skipped: 1,
            min_date: NaiveDate::from_ymd_opt(2025, 1, 2),
            max_date: NaiveDate::from_ymd_opt(2025, 1, 31),
            message: "12 rows imported".to_string(),
        }];
        let out = format_import_statuses(&statuses);
        assert!(out.contains("extrato.csv"));
        assert!(out.contains("2025-01-31"));
        assert!(out.contains("1 of 1 files imported, 12 rows"));
    }

    #[test]
    fn test_finding_and_drilldown_tables() {
        use crate::db::SaleRecord;
        use crate::reconcile::cycle::CycleStart;
        use crate::reconcile::direct::UnmatchedSale;

        colored::control::set_override(false);
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();

        let report = DirectMatchReport {
            unmatched_sales: vec![UnmatchedSale {
                sale_id: Some(1),
                date: day,
                amount: dec!(1250.40),
                payment_method: Some("Multibanco".to_string()),
            }],
            ..DirectMatchReport::default()
        };
        let out = format_direct_report(&report);
        assert!(out.contains("unmatched sale"));
        assert!(out.contains("1.250,40"));

        let drill = DepositDrilldown {
            deposit_date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            deposit: dec!(150),
            opened_on: CycleStart::StartOfHistory,
            cash_sales: vec![SaleRecord {
                id: Some(1),
                sale_date: day,
                payment_method: Some("Numerário".to_string()),
                amount: dec!(150),
                source_file: "Vendas.xlsx".to_string(),
                natural_key: "2025-01-02|numerário".to_string(),
            }],
            cash_total: dec!(150),
            difference: dec!(0),
        };
        let out = format_deposit_drilldown(&drill);
        assert!(out.contains("02/01/2025"));
        assert!(out.contains("Vendas.xlsx"));
        assert!(out.contains("start of history"));
    }

    #[test]
    fn test_signed_plain_when_uncolored() {
        colored::control::set_override(false);
        assert_eq!(signed(dec!(-1234.5)), "-1.234,50");
        assert_eq!(optional_signed(None), "-");
    }

    #[test]
    fn test_json_output() {
        let json = to_json(&ClassifyOutcome {
            examined: 3,
            classified: 2,
            unmatched: 1,
        });
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["classified"], 2);
    }
}
