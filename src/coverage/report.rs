use chrono::{TimeZone, Utc};
use serde::Serialize;

use super::{CoverageData, Metric};
use crate::error::Result;
use crate::history::{RunSummary, TestResult};
use crate::template::{self, Locale, RenderOptions};

/// Fixed-width box summary of the four aggregate metrics for terminals.
pub fn render_console_report(coverage: &CoverageData) -> String {
    let title = "Coverage Report";
    let rows: Vec<String> = Metric::ALL
        .iter()
        .map(|&metric| {
            let (covered, total) = coverage.counts(metric);
            format!(
                " {:<11}: {:>6.2}% ({}/{})",
                metric.label(),
                coverage.percentage(metric),
                covered,
                total
            )
        })
        .collect();

    let width = rows
        .iter()
        .map(|r| r.chars().count())
        .chain(std::iter::once(title.len() + 2))
        .max()
        .unwrap_or(0)
        + 2;

    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(format!("┌{}┐", "─".repeat(width)));
    out.push(format!("│{:^width$}│", title, width = width));
    out.push(format!("├{}┤", "─".repeat(width)));
    for row in rows {
        out.push(format!("│{:<width$}│", row, width = width));
    }
    out.push(format!("└{}┘", "─".repeat(width)));
    out.join("\n")
}

#[derive(Serialize)]
struct ReportLabels {
    lang: &'static str,
    title: &'static str,
    total: &'static str,
    passed: &'static str,
    failed: &'static str,
    pass_rate: &'static str,
    duration: &'static str,
    details: &'static str,
    time: &'static str,
}

fn labels(locale: Locale) -> ReportLabels {
    match locale {
        Locale::EnUs => ReportLabels {
            lang: "en",
            title: "Test Report",
            total: "Total",
            passed: "Passed",
            failed: "Failed",
            pass_rate: "Pass rate",
            duration: "Total duration",
            details: "Test details",
            time: "Time",
        },
        Locale::ZhCn => ReportLabels {
            lang: "zh-CN",
            title: "测试报告",
            total: "总测试数",
            passed: "通过",
            failed: "失败",
            pass_rate: "通过率",
            duration: "总耗时",
            details: "测试详情",
            time: "时间",
        },
    }
}

#[derive(Serialize)]
struct ReportRow {
    name: String,
    passed: bool,
    duration: String,
    time: String,
    error: Option<String>,
}

#[derive(Serialize)]
struct ReportContext {
    labels: ReportLabels,
    total: i64,
    passed: i64,
    failed: i64,
    pass_rate: String,
    duration: String,
    results: Vec<ReportRow>,
}

const TEST_REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ labels.lang }}">
<head>
  <meta charset="UTF-8">
  <title>{{ labels.title }}</title>
  <style>
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; padding: 20px; background: #f5f5f5; }
    .container { max-width: 1200px; margin: 0 auto; background: white; padding: 30px; border-radius: 8px; }
    .summary { display: grid; grid-template-columns: repeat(4, 1fr); gap: 20px; margin-bottom: 30px; }
    .stat { padding: 20px; border-radius: 6px; text-align: center; }
    .stat-value { font-size: 32px; font-weight: bold; }
    .test-item { padding: 15px; margin-bottom: 10px; border-radius: 6px; border-left: 4px solid; }
    .test-item.passed { background: #f1f8f4; border-color: #4caf50; }
    .test-item.failed { background: #fef5f5; border-color: #f44336; }
    .test-meta { font-size: 12px; color: #666; }
    .test-error { margin-top: 10px; padding: 10px; background: #fff; font-family: monospace; color: #d32f2f; }
  </style>
</head>
<body>
  <div class="container">
    <h1>{{ labels.title }}</h1>
    <div class="summary">
      <div class="stat"><div class="stat-value">{{ total }}</div><div>{{ labels.total }}</div></div>
      <div class="stat"><div class="stat-value">{{ passed }}</div><div>{{ labels.passed }}</div></div>
      <div class="stat"><div class="stat-value">{{ failed }}</div><div>{{ labels.failed }}</div></div>
      <div class="stat"><div class="stat-value">{{ pass_rate }}%</div><div>{{ labels.pass_rate }}</div></div>
    </div>
    <div><strong>{{ labels.duration }}:</strong> {{ duration }}ms</div>
    <h2>{{ labels.details }}</h2>
    {% for r in results %}
    <div class="test-item {% if r.passed %}passed{% else %}failed{% endif %}">
      <div class="test-name">{% if r.passed %}&#10004;{% else %}&#10008;{% endif %} {{ r.name }}</div>
      <div class="test-meta">{{ r.duration }}ms | {{ labels.time }}: {{ r.time }}</div>
      {% if r.error %}<div class="test-error">{{ r.error }}</div>{% endif %}
    </div>
    {% endfor %}
  </div>
</body>
</html>
"#;

fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Standalone HTML page summarizing one batch of results. All
/// caller-supplied text (names, error messages) is HTML-escaped.
pub fn render_test_report_html(results: &[TestResult], options: &RenderOptions) -> Result<String> {
    let summary = RunSummary::from_results(results);
    let context = ReportContext {
        labels: labels(options.locale),
        total: summary.total_tests,
        passed: summary.passed_tests,
        failed: summary.failed_tests,
        pass_rate: format!("{:.2}", summary.pass_rate),
        duration: format!("{:.2}", summary.duration),
        results: results
            .iter()
            .map(|r| ReportRow {
                name: r.name.clone(),
                passed: r.passed,
                duration: format!("{:.2}", r.duration),
                time: format_timestamp(r.timestamp),
                error: r.error.clone(),
            })
            .collect(),
    };
    template::render_with(TEST_REPORT_TEMPLATE, &context, options, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_report_lists_all_metrics() {
        let coverage = CoverageData {
            total_lines: 100,
            covered_lines: 79,
            total_branches: 0,
            covered_branches: 0,
            total_functions: 3,
            covered_functions: 2,
            total_statements: 8,
            covered_statements: 8,
            files: None,
        };
        let report = render_console_report(&coverage);
        assert!(report.contains("Lines      :  79.00% (79/100)"));
        assert!(report.contains("Branches   :   0.00% (0/0)"));
        assert!(report.contains("Functions  :  66.67% (2/3)"));
        assert!(report.contains("Statements : 100.00% (8/8)"));

        let widths: Vec<usize> = report.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "box is ragged: {widths:?}");
    }

    #[test]
    fn test_html_report_summary_and_escaping() {
        let results = vec![
            TestResult::pass("renders", 10.0, 0),
            TestResult::fail("clicks", "expected <button> & got none", 5.5, 0),
        ];
        let html = render_test_report_html(&results, &RenderOptions::default()).unwrap();
        assert!(html.contains("<title>Test Report</title>"));
        assert!(html.contains("50.00%"));
        assert!(html.contains("15.50ms"));
        assert!(html.contains("expected &lt;button&gt; &amp; got none"));
        assert!(!html.contains("<button>"));
        assert!(html.contains("1970-01-01 00:00:00 UTC"));
    }

    #[test]
    fn test_html_report_uses_locale_labels() {
        let results = vec![TestResult::pass("a", 1.0, 0)];
        let html =
            render_test_report_html(&results, &RenderOptions::with_locale(Locale::ZhCn)).unwrap();
        assert!(html.contains("<title>测试报告</title>"));
        assert!(html.contains("lang=\"zh-CN\""));
    }

    #[test]
    fn test_html_report_empty_batch() {
        let html = render_test_report_html(&[], &RenderOptions::default()).unwrap();
        assert!(html.contains("0.00%"));
    }
}
