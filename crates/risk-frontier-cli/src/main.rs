mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::dashboard::DashboardArgs;
use commands::questionnaire::RiskAversionArgs;

/// Risk-aversion questionnaire and efficient-frontier dashboard
#[derive(Parser)]
#[command(
    name = "frontier",
    version,
    about = "Risk-aversion questionnaire and efficient-frontier dashboard",
    long_about = "Scores a six-lottery risk-aversion questionnaire and places the \
                  resulting investor on the capital market line: minimum-volatility \
                  portfolio, efficient frontier sweep, tangency portfolio and the \
                  leverage-bounded max-utility allocation, all in decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log filter for stderr (e.g. "debug", "risk_frontier_core=trace"); falls back to RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the six lotteries with their answer ranges
    Lotteries,
    /// Score questionnaire answers into a risk-aversion coefficient
    RiskAversion(RiskAversionArgs),
    /// Derive the frontier, tangency portfolio, CML and max-utility allocation
    Dashboard(DashboardArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(level: Option<&str>) {
    let filter = level
        .and_then(|l| EnvFilter::try_new(l).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Lotteries => commands::questionnaire::run_lotteries(),
        Commands::RiskAversion(args) => commands::questionnaire::run_risk_aversion(args),
        Commands::Dashboard(args) => commands::dashboard::run_dashboard(args),
        Commands::Version => {
            println!("frontier {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
