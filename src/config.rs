use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::template::Locale;

/// ldesign-tester — coverage gates, test-run history and a trend dashboard.
#[derive(Parser, Debug, Clone)]
#[command(name = "ldesign-tester", version)]
pub struct CliArgs {
    /// SQLite file holding the run history
    #[arg(long = "db", global = true, default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// JSON settings file (thresholds, dashboard defaults)
    #[arg(short = 's', long = "settings", global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the history dashboard until Ctrl+C
    Serve {
        #[arg(long, default_value = DEFAULT_DASHBOARD_HOST)]
        host: String,

        /// Dashboard HTTP port (defaults to the settings file, then 3000)
        #[arg(short = 'p', long)]
        port: Option<u16>,
    },

    /// Check a coverage summary against thresholds; exits 1 on failure
    Coverage {
        /// Istanbul-style coverage-summary.json
        #[arg(short = 'r', long = "report")]
        report: PathBuf,

        /// Minimum percentage applied to every global metric (0-100)
        #[arg(short = 't', long = "threshold", value_parser = parse_threshold)]
        threshold: Option<f64>,
    },

    /// Record a run from a JSON array of test results
    Record {
        #[arg(long = "results")]
        results: PathBuf,

        /// Coverage summary to snapshot with the run
        #[arg(long = "coverage")]
        coverage: Option<PathBuf>,
    },

    /// Print the most recent runs
    History {
        #[arg(short = 'l', long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Print aggregate statistics and the recent trend
    Stats,

    /// Delete all recorded runs
    Clear,

    /// Render an HTML report for a JSON array of test results
    Report {
        #[arg(long = "results")]
        results: PathBuf,

        #[arg(short = 'o', long = "output", default_value = "test-report.html")]
        output: PathBuf,

        #[arg(long, default_value = "en_US")]
        locale: Locale,
    },
}

/// Same range rule as thresholds in the settings file.
fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("threshold must be between 0 and 100, got {}", raw));
    }
    Ok(value)
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DASHBOARD_HOST.to_string(),
            port: DEFAULT_DASHBOARD_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl DashboardConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Dashboard constants
pub const DEFAULT_DASHBOARD_HOST: &str = "127.0.0.1";
pub const DEFAULT_DASHBOARD_PORT: u16 = 3000;
pub const DASHBOARD_POLL_INTERVAL_SECS: u64 = 30;

// History constants
pub const DEFAULT_DB_PATH: &str = "test-history.db";
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_FAILED_TESTS_LIMIT: usize = 20;
pub const DEFAULT_COVERAGE_HISTORY_LIMIT: usize = 30;

// Coverage constants
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 80.0;
