use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::{parse_date, DateOrder};

pub mod formatters;

#[derive(Parser)]
#[command(name = "conciliador")]
#[command(
    version,
    about = "Bank statement import, expense classification and sales reconciliation"
)]
#[command(
    long_about = "Import CGD bank statements, card terminal settlements and POS sales exports, classify expenses by rule, and reconcile sales against bank credits under a cash-deposit-cycle model."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Config file (defaults to <config dir>/conciliador/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and seed the default classification rules
    Init,

    /// Import statement or sales files (a file or a whole folder)
    Import {
        #[command(subcommand)]
        action: ImportCommands,
    },

    /// Classify every debit that has no category yet
    Classify,

    /// Classification rule management
    Rules {
        #[command(subcommand)]
        action: RulesCommands,
    },

    /// Reconcile sales against bank credits
    Reconcile {
        #[command(subcommand)]
        action: ReconcileCommands,
    },

    /// Summary reports
    Report {
        #[command(subcommand)]
        action: ReportCommands,
    },
}

#[derive(Subcommand)]
pub enum ImportCommands {
    /// Bank current-account CSV export(s)
    Bank {
        /// File or folder (folders import every .csv)
        path: PathBuf,

        /// Statement format preset
        #[arg(long, default_value = "cgd")]
        format: String,
    },

    /// POS sales spreadsheets, PDFs or extracted text
    Sales {
        /// File or folder
        path: PathBuf,

        /// Spreadsheet layout: per-method or daily-detail
        #[arg(long, default_value = "per-method")]
        layout: String,

        /// Only import folder files starting with this prefix (overrides config)
        #[arg(long)]
        prefix: Option<String>,

        /// Import every sales file in the folder regardless of prefix
        #[arg(long, conflicts_with = "prefix")]
        all_files: bool,
    },

    /// Card terminal (TPA) settlement statement(s)
    Terminal {
        /// File or folder (folders import every .csv)
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List classification rules in precedence order
    List,

    /// Add a rule, or update the category/priority of an existing pattern
    Add {
        /// Text matched case-insensitively inside debit descriptions
        pattern: String,

        /// Category assigned on match
        category: String,

        /// Lower numbers win over higher ones and over rules without priority
        #[arg(short, long)]
        priority: Option<i32>,
    },

    /// Delete a rule by id
    Remove { id: i64 },

    /// Drop applied classifications so the next `classify` re-evaluates them
    Clear {
        /// Only clear this category
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReconcileCommands {
    /// Daily card/cash differences with deposit cycles
    Cycle {
        /// First day (YYYY-MM-DD or DD-MM-YYYY)
        #[arg(long, value_parser = parse_cli_date)]
        from: NaiveDate,

        /// Last day, inclusive
        #[arg(long, value_parser = parse_cli_date)]
        to: NaiveDate,

        /// Show every day, not only days with activity
        #[arg(long)]
        all_days: bool,
    },

    /// Same-day amount matching of sales against credits
    Direct {
        #[arg(long, value_parser = parse_cli_date)]
        from: Option<NaiveDate>,

        #[arg(long, value_parser = parse_cli_date)]
        to: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Debit totals per category, including unclassified debits
    Categories {
        #[arg(long, value_parser = parse_cli_date)]
        from: Option<NaiveDate>,

        #[arg(long, value_parser = parse_cli_date)]
        to: Option<NaiveDate>,
    },

    /// Sales against bank credits per month
    Monthly {
        #[arg(long, value_parser = parse_cli_date)]
        from: Option<NaiveDate>,

        #[arg(long, value_parser = parse_cli_date)]
        to: Option<NaiveDate>,
    },

    /// Cash sales covered by the deposit posted on a date
    Deposit {
        #[arg(value_parser = parse_cli_date)]
        date: NaiveDate,
    },
}

/// Accept ISO dates as well as the day-first form used in the statements
pub fn parse_cli_date(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw, DateOrder::DayFirst)
        .ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD or DD-MM-YYYY", raw))
}
