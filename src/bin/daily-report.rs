//! Optrix Daily Report
//!
//! Fetches the B3 options dataset for one business day, ranks the largest
//! average tickets, renders the report and emails it. Exits 0 on success,
//! 1 on failure and 130 when interrupted.

use chrono::{Local, NaiveDate};
use clap::Parser;
use dotenvy::dotenv;
use optrix::calendar::BusinessCalendar;
use optrix::config::{get_config_path, get_environment, Settings};
use optrix::core::bootstrap::prepare_directories;
use optrix::core::runtime::ReportRuntime;
use optrix::jobs::context::{JobContext, RunContext, RunFlags};
use optrix::logging::{self, LoggingOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Debug, Parser)]
#[command(
    name = "daily-report",
    about = "Daily report of large B3 options trades",
    after_help = "Examples:\n  daily-report                       # last business day\n  \
                  daily-report --date 2024-01-10     # specific date\n  \
                  daily-report --date 2024-01-10 --force\n  \
                  daily-report --no-email --debug"
)]
struct Cli {
    /// Business date to process (YYYY-MM-DD); defaults to the last business day
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<String>,

    /// Fetch the dataset again even if it already exists
    #[arg(long)]
    force: bool,

    /// Render the report without sending it
    #[arg(long)]
    no_email: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Shorten retry waits (diagnostics only)
    #[arg(long)]
    fast_retry: bool,

    /// Settings file (defaults to $OPTRIX_CONFIG or config/settings.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env if present
    dotenv().ok();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(get_config_path);
    let settings = match Settings::load(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };

    if let Err(e) = prepare_directories(&settings.paths) {
        eprintln!("Error: {}", e);
        return ExitCode::from(1);
    }

    let _log_guard = match logging::init_logging(&LoggingOptions {
        logs_dir: settings.paths.logs_dir.clone(),
        verbose: cli.debug,
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    info!(environment = %get_environment(), config = %config_path.display(), "Configuration loaded");
    debug!("Debug logging enabled");

    let date = match resolve_date(cli.date.as_deref(), &settings) {
        Ok(date) => date,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    let flags = RunFlags {
        force: cli.force,
        no_email: cli.no_email,
        fast_retry: cli.fast_retry,
        verbose: cli.debug,
    };

    let job = JobContext::production(&settings, flags);
    let ctx = RunContext::new(date, Arc::new(settings), flags);
    let outcome = ReportRuntime::new(job).run(&ctx).await;

    ExitCode::from(outcome.exit_code)
}

fn resolve_date(requested: Option<&str>, settings: &Settings) -> Result<NaiveDate, String> {
    match requested {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                format!("Invalid date format: {}. Use YYYY-MM-DD (e.g. 2024-01-10)", raw)
            })?;
            info!(date = %date, "Date given with --date: {}", date);
            Ok(date)
        }
        None => {
            let calendar = BusinessCalendar::new(settings.calendar.holidays.iter().copied());
            calendar
                .last_business_day(Local::now().date_naive())
                .map_err(|e| e.to_string())
        }
    }
}
