use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::config::{DEFAULT_FAILED_TESTS_LIMIT, DEFAULT_HISTORY_LIMIT};
use crate::error::TesterError;
use crate::history::{FailedTest, TestResult, TestRun};
use crate::state::SharedState;

/// `?limit=N`. Kept as text so a bad value gets the JSON error body
/// instead of the extractor's plain-text rejection.
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

impl LimitQuery {
    /// A missing or blank limit means `default`.
    pub fn limit_or(&self, default: usize) -> Result<usize, TesterError> {
        match self.limit.as_deref().map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                TesterError::Validation(format!(
                    "limit must be a non-negative integer, got '{}'",
                    raw
                ))
            }),
        }
    }
}

/// Ids are integers; anything else cannot name a run.
fn parse_run_id(raw: &str) -> Result<i64, TesterError> {
    raw.parse::<i64>()
        .map_err(|_| TesterError::RunNotFound(raw.to_string()))
}

/// GET /api/test-runs?limit=N — most recent runs, newest first.
pub async fn list_runs(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<TestRun>>, TesterError> {
    let limit = query.limit_or(DEFAULT_HISTORY_LIMIT)?;
    Ok(Json(state.store.get_history(limit)?))
}

/// GET /api/test-runs/{id}
pub async fn get_run(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TestRun>, TesterError> {
    let run_id = parse_run_id(&id)?;
    state
        .store
        .get_run(run_id)?
        .map(Json)
        .ok_or(TesterError::RunNotFound(id))
}

/// GET /api/test-runs/{id}/results — chronological results of one run.
pub async fn run_results(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TestResult>>, TesterError> {
    let Ok(run_id) = id.parse::<i64>() else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(state.store.get_results_for_run(run_id)?))
}

/// GET /api/failed-tests?limit=N
pub async fn failed_tests(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<FailedTest>>, TesterError> {
    let limit = query.limit_or(DEFAULT_FAILED_TESTS_LIMIT)?;
    Ok(Json(state.store.get_failed_tests(limit)?))
}
