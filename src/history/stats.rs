use rusqlite::params;

use super::db::HistoryStore;
use super::{RunStatistics, Trend};
use crate::error::Result;

/// Direction of change between the two most recent pass rates.
///
/// `recent` is ordered newest first; only its first two entries matter.
pub fn compute_trend(recent: &[f64]) -> Trend {
    match recent {
        [latest, previous, ..] if latest > previous => Trend::Up,
        [latest, previous, ..] if latest < previous => Trend::Down,
        _ => Trend::Stable,
    }
}

/// Summary over every persisted run. Always read fresh from the store.
pub fn get_statistics(store: &HistoryStore) -> Result<RunStatistics> {
    store.with_conn("get_statistics", None, |conn| {
        let (total_runs, average_pass_rate, total_tests): (i64, f64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(AVG(pass_rate), 0.0), COALESCE(SUM(total_tests), 0)
             FROM test_runs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT pass_rate FROM test_runs ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let recent = stmt
            .query_map(params![2], |row| row.get::<_, f64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(RunStatistics {
            total_runs,
            average_pass_rate,
            total_tests,
            recent_trend: compute_trend(&recent),
        })
    })
}
