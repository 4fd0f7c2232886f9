pub mod parser;
pub mod report;
pub mod thresholds;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Data model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Lines,
    Branches,
    Functions,
    Statements,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Lines,
        Metric::Branches,
        Metric::Functions,
        Metric::Statements,
    ];

    /// Capitalized name used in human-readable output.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Lines => "Lines",
            Metric::Branches => "Branches",
            Metric::Functions => "Functions",
            Metric::Statements => "Statements",
        }
    }
}

/// `covered / total * 100`, or 0 when there is nothing to cover.
pub fn percentage(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

/// Aggregate coverage counters plus an optional per-file breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageData {
    pub total_lines: u64,
    pub covered_lines: u64,
    pub total_branches: u64,
    pub covered_branches: u64,
    pub total_functions: u64,
    pub covered_functions: u64,
    pub total_statements: u64,
    pub covered_statements: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, FileCoverage>>,
}

impl CoverageData {
    /// `(covered, total)` for one metric.
    pub fn counts(&self, metric: Metric) -> (u64, u64) {
        match metric {
            Metric::Lines => (self.covered_lines, self.total_lines),
            Metric::Branches => (self.covered_branches, self.total_branches),
            Metric::Functions => (self.covered_functions, self.total_functions),
            Metric::Statements => (self.covered_statements, self.total_statements),
        }
    }

    pub fn percentage(&self, metric: Metric) -> f64 {
        let (covered, total) = self.counts(metric);
        percentage(covered, total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricCoverage {
    pub total: u64,
    pub covered: u64,
    pub percentage: f64,
}

impl MetricCoverage {
    pub fn new(covered: u64, total: u64) -> Self {
        Self {
            total,
            covered,
            percentage: percentage(covered, total),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    pub path: String,
    pub lines: MetricCoverage,
    pub branches: MetricCoverage,
    pub functions: MetricCoverage,
    pub statements: MetricCoverage,
    #[serde(default)]
    pub uncovered_lines: Vec<u32>,
}

impl FileCoverage {
    pub fn metric(&self, metric: Metric) -> &MetricCoverage {
        match metric {
            Metric::Lines => &self.lines,
            Metric::Branches => &self.branches,
            Metric::Functions => &self.functions,
            Metric::Statements => &self.statements,
        }
    }
}

/// Minimum percentages per metric. Unset metrics are not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statements: Option<f64>,
}

impl MetricThresholds {
    pub fn uniform(min: f64) -> Self {
        Self {
            lines: Some(min),
            branches: Some(min),
            functions: Some(min),
            statements: Some(min),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Lines => self.lines,
            Metric::Branches => self.branches,
            Metric::Functions => self.functions,
            Metric::Statements => self.statements,
        }
    }
}

/// `{"global": {...}, "src/a.ts": {...}}` — global plus per-file overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<MetricThresholds>,
    #[serde(flatten)]
    pub files: BTreeMap<String, MetricThresholds>,
}

impl CoverageThresholds {
    pub fn global(min: MetricThresholds) -> Self {
        Self {
            global: Some(min),
            files: BTreeMap::new(),
        }
    }

    /// Every configured value with a label, for range validation.
    pub fn configured(&self) -> Vec<(String, Metric, f64)> {
        let scopes = self
            .global
            .iter()
            .map(|t| ("global".to_string(), t))
            .chain(self.files.iter().map(|(path, t)| (path.clone(), t)));

        let mut out = Vec::new();
        for (scope, thresholds) in scopes {
            for metric in Metric::ALL {
                if let Some(value) = thresholds.get(metric) {
                    out.push((scope.clone(), metric, value));
                }
            }
        }
        out
    }
}
