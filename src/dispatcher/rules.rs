use anyhow::Result;
use colored::Colorize;

use super::AppContext;
use crate::classify::{self, RuleSet};
use crate::cli::formatters::{format_rules, to_json};
use crate::cli::RulesCommands;
use crate::db;

pub fn dispatch_rules(action: RulesCommands, ctx: &AppContext) -> Result<()> {
    let conn = ctx.connect()?;

    match action {
        RulesCommands::List => {
            let rules = RuleSet::new(db::list_rules(&conn)?);
            if ctx.json {
                let ordered: Vec<_> = rules.iter().collect();
                println!("{}", to_json(&ordered));
            } else {
                println!("{}", format_rules(&rules));
            }
        }

        RulesCommands::Add {
            pattern,
            category,
            priority,
        } => {
            let id = db::upsert_rule(&conn, &pattern, &category, priority)?;
            if ctx.json {
                println!("{}", to_json(&serde_json::json!({ "id": id })));
            } else {
                println!(
                    "{} Rule {} saved: '{}' → {}",
                    "✓".green().bold(),
                    id,
                    pattern.trim(),
                    category
                );
            }
        }

        RulesCommands::Remove { id } => {
            let removed = db::delete_rule(&conn, id)?;
            if ctx.json {
                println!("{}", to_json(&serde_json::json!({ "removed": removed })));
            } else if removed {
                println!("{} Rule {} removed", "✓".green().bold(), id);
            } else {
                println!("{} No rule with id {}", "ℹ".blue().bold(), id);
            }
        }

        RulesCommands::Clear { category } => {
            let cleared = classify::clear_classifications(&conn, category.as_deref())?;
            if ctx.json {
                println!("{}", to_json(&serde_json::json!({ "cleared": cleared })));
            } else {
                println!(
                    "{} Cleared {} classifications; run {} classify to re-evaluate",
                    "✓".green().bold(),
                    cleared,
                    "conciliador".bold()
                );
            }
        }
    }

    Ok(())
}
