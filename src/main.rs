use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use conciliador::cli::Cli;
use conciliador::dispatcher::{dispatch_command, AppContext};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color || cli.json {
        colored::control::set_override(false);
    }

    let ctx = AppContext::from_cli(&cli)?;
    dispatch_command(cli.command, &ctx)
}
