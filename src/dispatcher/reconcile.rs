use anyhow::Result;

use super::AppContext;
use crate::cli::formatters::{format_cycle_report, format_direct_report, to_json};
use crate::cli::ReconcileCommands;
use crate::reconcile::{self, CycleSettings};

pub fn dispatch_reconcile(action: ReconcileCommands, ctx: &AppContext) -> Result<()> {
    let conn = ctx.connect()?;

    match action {
        ReconcileCommands::Cycle { from, to, all_days } => {
            let settings = CycleSettings::from_config(&ctx.config.reconcile);
            let report = reconcile::reconcile_range(&conn, from, to, &settings)?;
            if ctx.json {
                println!("{}", to_json(&report));
            } else {
                print!("{}", format_cycle_report(&report, all_days));
            }
        }

        ReconcileCommands::Direct { from, to } => {
            let report = reconcile::match_sales_to_credits(&conn, from, to)?;
            if ctx.json {
                println!("{}", to_json(&report));
            } else {
                print!("{}", format_direct_report(&report));
            }
        }
    }

    Ok(())
}
