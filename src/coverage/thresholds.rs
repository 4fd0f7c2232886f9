use serde::Serialize;
use tracing::warn;

use super::{percentage, CoverageData, CoverageThresholds, Metric, MetricThresholds};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdReport {
    pub passed: bool,
    pub failures: Vec<String>,
}

/// One failure line, or `None` when the metric passes or cannot be judged.
///
/// A metric with nothing to cover (`total == 0`) always passes, and a value
/// exactly at the threshold passes.
fn check_metric(metric: Metric, covered: u64, total: u64, min: Option<f64>) -> Option<String> {
    let min = min?;
    if total == 0 {
        return None;
    }
    let pct = percentage(covered, total);
    if pct < min {
        Some(format!(
            "{} coverage {:.2}% is below threshold {}%",
            metric.label(),
            pct,
            min
        ))
    } else {
        None
    }
}

fn check_scope<F>(thresholds: &MetricThresholds, counts: F) -> Vec<String>
where
    F: Fn(Metric) -> (u64, u64),
{
    Metric::ALL
        .iter()
        .filter_map(|&metric| {
            let (covered, total) = counts(metric);
            check_metric(metric, covered, total, thresholds.get(metric))
        })
        .collect()
}

/// Compare coverage against configured minimums.
///
/// Global thresholds are checked against the aggregate counters. Thresholds
/// keyed by file path are checked against that file's breakdown when the
/// report has one; their failure lines carry a `"<path>: "` prefix.
pub fn check_thresholds(coverage: &CoverageData, thresholds: &CoverageThresholds) -> ThresholdReport {
    let mut failures = match &thresholds.global {
        Some(global) => check_scope(global, |m| coverage.counts(m)),
        None => Vec::new(),
    };

    if let Some(files) = &coverage.files {
        for (path, file_thresholds) in &thresholds.files {
            let Some(file) = files.get(path) else {
                continue;
            };
            let file_failures = check_scope(file_thresholds, |m| {
                let mc = file.metric(m);
                (mc.covered, mc.total)
            });
            failures.extend(file_failures.into_iter().map(|f| format!("{path}: {f}")));
        }
    }

    for failure in &failures {
        warn!("{}", failure);
    }

    ThresholdReport {
        passed: failures.is_empty(),
        failures,
    }
}
