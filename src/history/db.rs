use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{CoverageHistoryPoint, FailedTest, RunSummary, TestResult, TestRun};
use crate::coverage::{CoverageData, Metric};
use crate::error::{Result, TesterError};

const RUN_COLUMNS: &str =
    "id, timestamp, total_tests, passed_tests, failed_tests, pass_rate, duration, coverage_data";

/// Append-only history of test runs backed by one SQLite file.
///
/// The connection is owned exclusively by this value; sharing one database
/// file between several stores is not supported.
pub struct HistoryStore {
    conn: Mutex<Option<Connection>>,
    db_path: PathBuf,
}

/// Row shape before the coverage blob is decoded.
struct RunRow {
    run: TestRun,
    coverage_json: Option<String>,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RunRow {
            run: TestRun {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                total_tests: row.get(2)?,
                passed_tests: row.get(3)?,
                failed_tests: row.get(4)?,
                pass_rate: row.get(5)?,
                duration: row.get(6)?,
                coverage: None,
            },
            coverage_json: row.get(7)?,
        })
    }

    fn decode(self) -> Result<TestRun> {
        let RunRow {
            mut run,
            coverage_json,
        } = self;
        if let Some(json) = coverage_json {
            let coverage: CoverageData =
                serde_json::from_str(&json).map_err(|source| TesterError::CorruptRecord {
                    run_id: run.id,
                    source,
                })?;
            run.coverage = Some(coverage);
        }
        Ok(run)
    }
}

impl HistoryStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TesterError::file(parent, e))?;
        }
        let conn = Connection::open(db_path).map_err(|source| TesterError::Store {
            op: "open",
            run_id: None,
            path: db_path.to_path_buf(),
            source,
        })?;
        Self::init(conn, db_path.to_path_buf())
    }

    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| TesterError::Store {
            op: "open",
            run_id: None,
            path: path.clone(),
            source,
        })?;
        Self::init(conn, path)
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Some(conn)),
            db_path,
        };
        store.with_conn("init_schema", None, |conn| {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
            init_schema(conn)
        })?;
        info!("Opened test history store at {:?}", store.db_path);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panic while holding the lock cannot leave SQLite half-written
        // (transactions roll back on drop), so the guard is safe to reuse.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_error(&self, op: &'static str, run_id: Option<i64>, source: rusqlite::Error) -> TesterError {
        TesterError::Store {
            op,
            run_id,
            path: self.db_path.clone(),
            source,
        }
    }

    /// Run `f` against the open connection, attaching `op`/`run_id` to any
    /// SQLite failure.
    pub(crate) fn with_conn<T, F>(&self, op: &'static str, run_id: Option<i64>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T>,
    {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(TesterError::StoreClosed { op })?;
        f(conn).map_err(|source| self.store_error(op, run_id, source))
    }

    // ========================================================================
    // Runs
    // ========================================================================

    /// Persist a batch of results as one run and return its id.
    ///
    /// The run row, every result row and the coverage history row are
    /// written in a single transaction: on failure none of them is visible.
    pub fn save_run(&self, results: &[TestResult], coverage: Option<&CoverageData>) -> Result<i64> {
        let summary = RunSummary::from_results(results);
        let timestamp = Utc::now().timestamp_millis();
        let coverage_json = coverage
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| TesterError::Validation(format!("coverage snapshot not serializable: {e}")))?;

        let mut guard = self.lock();
        let conn = guard
            .as_mut()
            .ok_or(TesterError::StoreClosed { op: "save_run" })?;

        let mut assigned = None;
        let outcome = write_run(
            conn,
            &summary,
            timestamp,
            coverage_json.as_deref(),
            coverage,
            results,
            &mut assigned,
        );

        match outcome {
            Ok(run_id) => {
                info!(
                    "Saved test run {} ({}/{} passed, {:.2}%)",
                    run_id, summary.passed_tests, summary.total_tests, summary.pass_rate
                );
                Ok(run_id)
            }
            Err(source) => Err(self.store_error("save_run", assigned, source)),
        }
    }

    /// The `limit` most recent runs, newest first.
    pub fn get_history(&self, limit: usize) -> Result<Vec<TestRun>> {
        let rows = self.with_conn("get_history", None, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM test_runs
                 ORDER BY timestamp DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit as i64], RunRow::from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        debug!("Loaded {} runs from history", rows.len());
        rows.into_iter().map(RunRow::decode).collect()
    }

    pub fn get_run(&self, run_id: i64) -> Result<Option<TestRun>> {
        let row = self.with_conn("get_run", Some(run_id), |conn| {
            conn.query_row(
                &format!("SELECT {RUN_COLUMNS} FROM test_runs WHERE id=?1"),
                params![run_id],
                RunRow::from_row,
            )
            .optional()
        })?;
        row.map(RunRow::decode).transpose()
    }

    // ========================================================================
    // Results
    // ========================================================================

    /// Results of one run in chronological order.
    pub fn get_results_for_run(&self, run_id: i64) -> Result<Vec<TestResult>> {
        self.with_conn("get_results_for_run", Some(run_id), |conn| {
            let mut stmt = conn.prepare(
                "SELECT name, passed, error, duration, timestamp
                 FROM test_results WHERE run_id=?1 ORDER BY timestamp ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![run_id], result_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    /// Most recent failing results across all runs.
    pub fn get_failed_tests(&self, limit: usize) -> Result<Vec<FailedTest>> {
        self.with_conn("get_failed_tests", None, |conn| {
            let mut stmt = conn.prepare(
                "SELECT tr.name, tr.passed, tr.error, tr.duration, tr.timestamp,
                        tr.run_id, r.timestamp
                 FROM test_results tr
                 JOIN test_runs r ON tr.run_id = r.id
                 WHERE tr.passed = 0
                 ORDER BY tr.timestamp DESC, tr.id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(FailedTest {
                    result: result_from_row(row)?,
                    run_id: row.get(5)?,
                    run_timestamp: row.get(6)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    // ========================================================================
    // Coverage history
    // ========================================================================

    pub fn get_coverage_history(&self, limit: usize) -> Result<Vec<CoverageHistoryPoint>> {
        self.with_conn("get_coverage_history", None, |conn| {
            let mut stmt = conn.prepare(
                "SELECT run_id, lines_percentage, branches_percentage, functions_percentage,
                        statements_percentage, timestamp
                 FROM coverage_history ORDER BY timestamp DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(CoverageHistoryPoint {
                    run_id: row.get(0)?,
                    lines_percentage: row.get(1)?,
                    branches_percentage: row.get(2)?,
                    functions_percentage: row.get(3)?,
                    statements_percentage: row.get(4)?,
                    timestamp: row.get(5)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Delete every run, result and coverage point. Irreversible.
    pub fn clear(&self) -> Result<()> {
        self.with_conn("clear", None, |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM coverage_history", [])?;
            tx.execute("DELETE FROM test_results", [])?;
            tx.execute("DELETE FROM test_runs", [])?;
            tx.commit()
        })?;
        info!("Cleared test history at {:?}", self.db_path);
        Ok(())
    }

    /// Release the connection. Later operations fail with `StoreClosed`;
    /// closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let Some(conn) = self.lock().take() else {
            return Ok(());
        };
        conn.close()
            .map_err(|(_, source)| self.store_error("close", None, source))?;
        info!("Closed test history store at {:?}", self.db_path);
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS test_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            total_tests INTEGER NOT NULL,
            passed_tests INTEGER NOT NULL,
            failed_tests INTEGER NOT NULL,
            pass_rate REAL NOT NULL,
            duration REAL NOT NULL,
            coverage_data TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (passed_tests + failed_tests = total_tests)
        );

        CREATE TABLE IF NOT EXISTS test_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES test_runs(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            passed INTEGER NOT NULL CHECK (passed IN (0, 1)),
            error TEXT,
            duration REAL NOT NULL CHECK (duration >= 0),
            timestamp INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS coverage_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES test_runs(id) ON DELETE CASCADE,
            lines_percentage REAL NOT NULL,
            branches_percentage REAL NOT NULL,
            functions_percentage REAL NOT NULL,
            statements_percentage REAL NOT NULL,
            timestamp INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_runs_timestamp ON test_runs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_results_run_id ON test_results(run_id);
        CREATE INDEX IF NOT EXISTS idx_results_passed ON test_results(passed);
        CREATE INDEX IF NOT EXISTS idx_coverage_timestamp ON coverage_history(timestamp);
    ",
    )
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<TestResult> {
    Ok(TestResult {
        name: row.get(0)?,
        passed: row.get::<_, i64>(1)? != 0,
        error: row.get(2)?,
        duration: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

/// Write the run and its children inside one transaction. `assigned` is
/// filled as soon as the run id exists so failures can report it.
fn write_run(
    conn: &mut Connection,
    summary: &RunSummary,
    timestamp: i64,
    coverage_json: Option<&str>,
    coverage: Option<&CoverageData>,
    results: &[TestResult],
    assigned: &mut Option<i64>,
) -> rusqlite::Result<i64> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO test_runs (timestamp, total_tests, passed_tests, failed_tests, pass_rate, duration, coverage_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            timestamp,
            summary.total_tests,
            summary.passed_tests,
            summary.failed_tests,
            summary.pass_rate,
            summary.duration,
            coverage_json,
        ],
    )?;
    let run_id = tx.last_insert_rowid();
    *assigned = Some(run_id);

    {
        let mut stmt = tx.prepare(
            "INSERT INTO test_results (run_id, name, passed, error, duration, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for result in results {
            stmt.execute(params![
                run_id,
                result.name,
                result.passed as i64,
                result.error,
                result.duration,
                result.timestamp,
            ])?;
        }
    }

    if let Some(coverage) = coverage {
        tx.execute(
            "INSERT INTO coverage_history
                (run_id, lines_percentage, branches_percentage, functions_percentage, statements_percentage, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                coverage.percentage(Metric::Lines),
                coverage.percentage(Metric::Branches),
                coverage.percentage(Metric::Functions),
                coverage.percentage(Metric::Statements),
                timestamp,
            ],
        )?;
    }

    tx.commit()?;
    Ok(run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_round_trip() {
        let store = HistoryStore::open_in_memory().unwrap();
        let id = store
            .save_run(&[TestResult::pass("a", 1.0, 10)], None)
            .unwrap();
        let run = store.get_run(id).unwrap().unwrap();
        assert_eq!(run.total_tests, 1);
        assert_eq!(run.pass_rate, 100.0);
        assert!(run.coverage.is_none());
    }

    #[test]
    fn test_negative_duration_rejected_by_schema() {
        let store = HistoryStore::open_in_memory().unwrap();
        let err = store
            .save_run(&[TestResult::pass("neg", -1.0, 10)], None)
            .unwrap_err();
        match err {
            TesterError::Store { op, run_id, .. } => {
                assert_eq!(op, "save_run");
                assert!(run_id.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.get_history(10).unwrap().is_empty());
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let store = HistoryStore::open_in_memory().unwrap();
        store.close().unwrap();
        assert!(store.is_closed());
        assert!(matches!(
            store.get_history(5),
            Err(TesterError::StoreClosed { op: "get_history" })
        ));
        assert!(store.close().is_ok());
    }
}
