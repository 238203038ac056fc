use anyhow::Result;

use super::AppContext;
use crate::cli::formatters::{
    format_category_report, format_deposit_drilldown, format_monthly, to_json,
};
use crate::cli::ReportCommands;
use crate::reconcile::CycleSettings;
use crate::reports;

pub fn dispatch_report(action: ReportCommands, ctx: &AppContext) -> Result<()> {
    let conn = ctx.connect()?;

    match action {
        ReportCommands::Categories { from, to } => {
            let report = reports::category_totals(&conn, from, to)?;
            if ctx.json {
                println!("{}", to_json(&report));
            } else {
                print!("{}", format_category_report(&report));
            }
        }

        ReportCommands::Monthly { from, to } => {
            let months = reports::monthly_summary(&conn, from, to)?;
            if ctx.json {
                println!("{}", to_json(&months));
            } else {
                println!("{}", format_monthly(&months));
            }
        }

        ReportCommands::Deposit { date } => {
            let settings = CycleSettings::from_config(&ctx.config.reconcile);
            let drill = reports::deposit_drilldown(&conn, date, &settings)?;
            if ctx.json {
                println!("{}", to_json(&drill));
            } else {
                print!("{}", format_deposit_drilldown(&drill));
            }
        }
    }

    Ok(())
}
