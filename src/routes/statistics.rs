use axum::extract::{Query, State};
use axum::Json;

use super::test_runs::LimitQuery;
use crate::config::DEFAULT_COVERAGE_HISTORY_LIMIT;
use crate::error::TesterError;
use crate::history::{stats, CoverageHistoryPoint, RunStatistics};
use crate::state::SharedState;

/// GET /api/statistics — computed on every call, never cached.
pub async fn statistics(
    State(state): State<SharedState>,
) -> Result<Json<RunStatistics>, TesterError> {
    Ok(Json(stats::get_statistics(&state.store)?))
}

/// GET /api/coverage-history?limit=N
pub async fn coverage_history(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<CoverageHistoryPoint>>, TesterError> {
    let limit = query.limit_or(DEFAULT_COVERAGE_HISTORY_LIMIT)?;
    Ok(Json(state.store.get_coverage_history(limit)?))
}
