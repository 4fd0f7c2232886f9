use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use ldesign_tester::config::{CliArgs, Command, DashboardConfig, DEFAULT_DB_PATH};
use ldesign_tester::coverage::thresholds::check_thresholds;
use ldesign_tester::coverage::{parser, report, MetricThresholds};
use ldesign_tester::dashboard::DashboardServer;
use ldesign_tester::history::db::HistoryStore;
use ldesign_tester::history::{stats, TestResult};
use ldesign_tester::settings::{load_settings, TesterSettings};
use ldesign_tester::template::RenderOptions;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ldesign_tester=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => TesterSettings::default(),
    };
    let db_path = resolve_db_path(&args.db_path, &settings);

    match args.command {
        Command::Serve { host, port } => {
            let port = port
                .or_else(|| settings.dashboard.as_ref().and_then(|d| d.port))
                .unwrap_or(DashboardConfig::default().port);
            serve(DashboardConfig {
                host,
                port,
                db_path,
            })
            .await?;
        }
        Command::Coverage {
            report: report_path,
            threshold,
        } => {
            let coverage = parser::parse_file(&report_path)?;
            println!("{}", report::render_console_report(&coverage));

            let mut thresholds = settings.effective_thresholds();
            if let Some(min) = threshold {
                thresholds.global = Some(MetricThresholds::uniform(min));
            }
            let outcome = check_thresholds(&coverage, &thresholds);
            if !outcome.passed {
                for failure in &outcome.failures {
                    eprintln!("✗ {}", failure);
                }
                return Ok(ExitCode::from(1));
            }
            println!("✓ Coverage thresholds met");
        }
        Command::Record { results, coverage } => {
            let results = read_results(&results)?;
            let coverage = coverage.map(|p| parser::parse_file(&p)).transpose()?;
            let store = HistoryStore::open(&db_path)?;
            let run_id = store.save_run(&results, coverage.as_ref())?;
            let run = store
                .get_run(run_id)?
                .with_context(|| format!("run {} missing after save", run_id))?;
            println!(
                "✓ Recorded run #{}: {}/{} passed ({:.2}%)",
                run.id, run.passed_tests, run.total_tests, run.pass_rate
            );
            store.close()?;
        }
        Command::History { limit } => {
            let store = HistoryStore::open(&db_path)?;
            let runs = store.get_history(limit)?;
            if runs.is_empty() {
                println!("No test runs recorded");
            }
            for run in runs {
                let when = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(run.timestamp)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| run.timestamp.to_string());
                println!(
                    "#{:<5} {}  {:>4}/{:<4} passed  {:>6.2}%  {:.0}ms",
                    run.id, when, run.passed_tests, run.total_tests, run.pass_rate, run.duration
                );
            }
            store.close()?;
        }
        Command::Stats => {
            let store = HistoryStore::open(&db_path)?;
            let statistics = stats::get_statistics(&store)?;
            println!("{}", serde_json::to_string_pretty(&statistics)?);
            store.close()?;
        }
        Command::Clear => {
            let store = HistoryStore::open(&db_path)?;
            store.clear()?;
            println!("✓ Test history cleared");
            store.close()?;
        }
        Command::Report {
            results,
            output,
            locale,
        } => {
            let results = read_results(&results)?;
            let html =
                report::render_test_report_html(&results, &RenderOptions::with_locale(locale))?;
            std::fs::write(&output, html)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("✓ Report written to {}", output.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// An explicit `--db` wins; the settings file only replaces the default.
fn resolve_db_path(cli: &Path, settings: &TesterSettings) -> PathBuf {
    if cli != Path::new(DEFAULT_DB_PATH) {
        return cli.to_path_buf();
    }
    settings
        .dashboard
        .as_ref()
        .and_then(|d| d.db_path.clone())
        .unwrap_or_else(|| cli.to_path_buf())
}

fn read_results(path: &Path) -> anyhow::Result<Vec<TestResult>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let results = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of test results", path.display()))?;
    Ok(results)
}

async fn serve(config: DashboardConfig) -> anyhow::Result<()> {
    let server = DashboardServer::open(config)?;
    let addr = server.start().await?;
    println!("Dashboard running at http://{}", addr);

    shutdown_signal().await;
    info!("Dashboard shutting down");
    if let Err(e) = server.stop().await {
        error!("Dashboard shutdown failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
