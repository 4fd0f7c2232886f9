//! Istanbul-style coverage summary normalization.
//!
//! Upstream report shapes vary between tools and versions, so every field
//! is optional and falls back to zero. Parsing a well-formed JSON value
//! never fails.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use super::{CoverageData, FileCoverage, MetricCoverage};
use crate::error::{Result, TesterError};

/// Key holding the aggregate entry in a summary report.
pub const TOTAL_KEY: &str = "total";

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct RawMetric {
    #[serde(deserialize_with = "lenient_count")]
    pub total: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub covered: u64,
}

impl RawMetric {
    /// Clamp so `covered <= total` holds downstream.
    fn normalized(self, metric: &str, path: &str) -> (u64, u64) {
        if self.covered > self.total {
            warn!(
                "{}: {} covered count {} exceeds total {}, clamping",
                path, metric, self.covered, self.total
            );
            (self.total, self.total)
        } else {
            (self.covered, self.total)
        }
    }
}

/// One entry of the report: four metric blocks and, for statement-level
/// reports, a hit map keyed by statement index.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFileEntry {
    #[serde(deserialize_with = "lenient_metric")]
    pub lines: RawMetric,
    #[serde(deserialize_with = "lenient_metric")]
    pub branches: RawMetric,
    #[serde(deserialize_with = "lenient_metric")]
    pub functions: RawMetric,
    #[serde(deserialize_with = "lenient_metric")]
    pub statements: RawMetric,
    #[serde(deserialize_with = "lenient_hits")]
    pub s: BTreeMap<String, Option<u64>>,
}

impl RawFileEntry {
    fn from_value(path: &str, value: &Value) -> Self {
        match RawFileEntry::deserialize(value) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring malformed coverage entry for {}: {}", path, e);
                RawFileEntry::default()
            }
        }
    }

    fn uncovered_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self
            .s
            .iter()
            .filter(|(_, hits)| **hits == Some(0))
            .filter_map(|(key, _)| key.trim().parse::<u32>().ok())
            .collect();
        lines.sort_unstable();
        lines
    }
}

/// A metric block that is not an object (`null`, `"Unknown"`, ...) counts as
/// zero on its own and leaves sibling metrics intact.
fn lenient_metric<'de, D>(deserializer: D) -> std::result::Result<RawMetric, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        debug!("Treating non-object coverage metric {} as empty", value);
        return Ok(RawMetric::default());
    }
    Ok(RawMetric::deserialize(&value).unwrap_or_default())
}

/// Accept integers, floats and numeric strings; anything else is 0.
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(count_of(&value).unwrap_or(0))
}

fn lenient_hits<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let map = match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| {
                let hits = count_of(&v);
                (k, hits)
            })
            .collect(),
        _ => BTreeMap::new(),
    };
    Ok(map)
}

fn count_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn file_coverage(path: &str, entry: &RawFileEntry) -> FileCoverage {
    let metric = |raw: RawMetric, name: &str| {
        let (covered, total) = raw.normalized(name, path);
        MetricCoverage::new(covered, total)
    };
    FileCoverage {
        path: path.to_string(),
        lines: metric(entry.lines, "lines"),
        branches: metric(entry.branches, "branches"),
        functions: metric(entry.functions, "functions"),
        statements: metric(entry.statements, "statements"),
        uncovered_lines: entry.uncovered_lines(),
    }
}

/// Normalize a raw report into aggregate counters plus per-file breakdown.
///
/// Aggregate counters come only from the `total` entry; a report without
/// one yields zero aggregates. Non-object input yields an empty result.
pub fn parse(report: &Value) -> CoverageData {
    let Some(entries) = report.as_object() else {
        warn!("Coverage report is not a JSON object, treating as empty");
        return CoverageData {
            files: Some(BTreeMap::new()),
            ..Default::default()
        };
    };

    let totals = entries
        .get(TOTAL_KEY)
        .map(|v| RawFileEntry::from_value(TOTAL_KEY, v))
        .unwrap_or_default();

    let (covered_lines, total_lines) = totals.lines.normalized("lines", TOTAL_KEY);
    let (covered_branches, total_branches) = totals.branches.normalized("branches", TOTAL_KEY);
    let (covered_functions, total_functions) =
        totals.functions.normalized("functions", TOTAL_KEY);
    let (covered_statements, total_statements) =
        totals.statements.normalized("statements", TOTAL_KEY);

    let files: BTreeMap<String, FileCoverage> = entries
        .iter()
        .filter(|(path, _)| path.as_str() != TOTAL_KEY)
        .map(|(path, value)| {
            let entry = RawFileEntry::from_value(path, value);
            (path.clone(), file_coverage(path, &entry))
        })
        .collect();

    debug!("Parsed coverage report with {} file entries", files.len());

    CoverageData {
        total_lines,
        covered_lines,
        total_branches,
        covered_branches,
        total_functions,
        covered_functions,
        total_statements,
        covered_statements,
        files: Some(files),
    }
}

/// Parse report text. Only invalid JSON syntax is an error.
pub fn parse_str(json: &str) -> Result<CoverageData> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| TesterError::Validation(format!("coverage report is not valid JSON: {e}")))?;
    Ok(parse(&value))
}

pub fn parse_file(path: &Path) -> Result<CoverageData> {
    let content = std::fs::read_to_string(path).map_err(|e| TesterError::file(path, e))?;
    parse_str(&content)
}
