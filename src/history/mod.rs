pub mod db;
pub mod stats;

use serde::{Deserialize, Serialize};

use crate::coverage::CoverageData;

// ============================================================================
// Data model
// ============================================================================

/// Outcome of one test, as reported by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds.
    pub duration: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl TestResult {
    pub fn pass(name: impl Into<String>, duration: f64, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            duration,
            timestamp,
        }
    }

    pub fn fail(
        name: impl Into<String>,
        error: impl Into<String>,
        duration: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            duration,
            timestamp,
        }
    }
}

/// A persisted batch of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    pub id: i64,
    pub timestamp: i64,
    pub total_tests: i64,
    pub passed_tests: i64,
    pub failed_tests: i64,
    pub pass_rate: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageData>,
}

/// Counters derived from a result batch before it is written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub total_tests: i64,
    pub passed_tests: i64,
    pub failed_tests: i64,
    pub pass_rate: f64,
    pub duration: f64,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let total_tests = results.len() as i64;
        let passed_tests = results.iter().filter(|r| r.passed).count() as i64;
        let failed_tests = total_tests - passed_tests;
        let pass_rate = if total_tests > 0 {
            passed_tests as f64 / total_tests as f64 * 100.0
        } else {
            0.0
        };
        let duration = results.iter().map(|r| r.duration).sum();
        Self {
            total_tests,
            passed_tests,
            failed_tests,
            pass_rate,
            duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    pub total_runs: i64,
    pub average_pass_rate: f64,
    pub total_tests: i64,
    pub recent_trend: Trend,
}

/// Coverage percentages recorded alongside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageHistoryPoint {
    pub run_id: i64,
    pub lines_percentage: f64,
    pub branches_percentage: f64,
    pub functions_percentage: f64,
    pub statements_percentage: f64,
    pub timestamp: i64,
}

/// A failing result with the time of the run it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTest {
    pub run_id: i64,
    pub run_timestamp: i64,
    #[serde(flatten)]
    pub result: TestResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_and_rate() {
        let results = vec![
            TestResult::pass("a", 10.0, 1),
            TestResult::pass("b", 20.0, 2),
            TestResult::fail("c", "boom", 5.0, 3),
        ];
        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total_tests, 3);
        assert_eq!(summary.passed_tests, 2);
        assert_eq!(summary.failed_tests, 1);
        assert_eq!(summary.duration, 35.0);
        assert!((summary.pass_rate - 66.67).abs() < 0.01);
    }

    #[test]
    fn test_summary_of_empty_batch() {
        let summary = RunSummary::from_results(&[]);
        assert_eq!(summary.total_tests, 0);
        assert_eq!(summary.pass_rate, 0.0);
        assert_eq!(summary.duration, 0.0);
    }

    #[test]
    fn test_result_json_shape() {
        let json = serde_json::to_value(TestResult::pass("ok", 1.5, 7)).unwrap();
        assert_eq!(json["name"], "ok");
        assert_eq!(json["passed"], true);
        assert!(json.get("error").is_none());

        let parsed: TestResult = serde_json::from_str(
            r#"{"name":"x","passed":false,"error":"bad","duration":3,"timestamp":9}"#,
        )
        .unwrap();
        assert_eq!(parsed.error.as_deref(), Some("bad"));
        assert_eq!(parsed.duration, 3.0);
    }

    #[test]
    fn test_trend_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Trend::Up).unwrap(), "\"up\"");
        assert_eq!(serde_json::to_string(&Trend::Stable).unwrap(), "\"stable\"");
    }
}
