//! Command dispatcher that routes parsed clap commands to their handlers.
//!
//! Every handler opens the store through [`AppContext::connect`], does its
//! work through the library modules, and prints either a table or JSON.

mod imports;
mod reconcile;
mod reports;
mod rules;

use anyhow::{Context, Result};
use colored::Colorize;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::cli::formatters::{format_classify_outcome, to_json};
use crate::classify::{self, DEFAULT_RULES};
use crate::config::{self, Config};
use crate::db;

/// Settings shared by every command
pub struct AppContext {
    pub config: Config,
    pub db_path: Option<PathBuf>,
    pub json: bool,
}

impl AppContext {
    /// Resolve config and database location from the command line
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = config::load_config(cli.config.as_deref())?;
        let db_path = cli.db.clone().or_else(|| config.database.clone());
        Ok(Self {
            config,
            db_path,
            json: cli.json,
        })
    }

    /// Open the store, creating the schema when needed
    pub fn connect(&self) -> Result<Connection> {
        db::init_database(self.db_path.clone()).context("Failed to open the database")
    }
}

/// Route a parsed command to its handler
pub fn dispatch_command(command: Commands, ctx: &AppContext) -> Result<()> {
    match command {
        Commands::Init => dispatch_init(ctx),
        Commands::Import { action } => imports::dispatch_import(action, ctx),
        Commands::Classify => dispatch_classify(ctx),
        Commands::Rules { action } => rules::dispatch_rules(action, ctx),
        Commands::Reconcile { action } => reconcile::dispatch_reconcile(action, ctx),
        Commands::Report { action } => reports::dispatch_report(action, ctx),
    }
}

fn dispatch_init(ctx: &AppContext) -> Result<()> {
    let mut conn = ctx.connect()?;

    let seeded = db::seed_rules(&mut conn, DEFAULT_RULES)?;
    let extra: Vec<(&str, &str, Option<i32>)> = ctx
        .config
        .rules
        .iter()
        .map(|r| (r.pattern.as_str(), r.category.as_str(), r.priority))
        .collect();
    let configured = db::seed_rules(&mut conn, &extra)?;
    let total_rules = db::count_rows(&conn, "classification_rules")?;
    info!(
        "Seeded {} default and {} configured rules",
        seeded, configured
    );

    if ctx.json {
        println!(
            "{}",
            to_json(&serde_json::json!({
                "default_rules": seeded,
                "configured_rules": configured,
                "total_rules": total_rules,
            }))
        );
    } else {
        println!(
            "{} Database ready ({} classification rules)",
            "✓".green().bold(),
            total_rules
        );
    }
    Ok(())
}

fn dispatch_classify(ctx: &AppContext) -> Result<()> {
    let mut conn = ctx.connect()?;
    let outcome = classify::classify_pending(&mut conn)?;

    if ctx.json {
        println!("{}", to_json(&outcome));
    } else {
        print!("{}", format_classify_outcome(&outcome));
    }
    Ok(())
}
