use std::collections::BTreeMap;
use std::sync::Arc;

use ldesign_tester::coverage::{CoverageData, FileCoverage, MetricCoverage};
use ldesign_tester::error::TesterError;
use ldesign_tester::history::db::HistoryStore;
use ldesign_tester::history::TestResult;
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> HistoryStore {
    HistoryStore::open(&dir.path().join("history.db")).unwrap()
}

fn scenario_results() -> Vec<TestResult> {
    vec![
        TestResult::pass("renders button", 10.0, 1_000),
        TestResult::pass("handles click", 20.0, 1_010),
        TestResult::fail("validates input", "expected true, got false", 5.0, 1_030),
    ]
}

fn sample_coverage() -> CoverageData {
    let mut files = BTreeMap::new();
    files.insert(
        "src/button.ts".to_string(),
        FileCoverage {
            path: "src/button.ts".to_string(),
            lines: MetricCoverage::new(2, 3),
            branches: MetricCoverage::new(0, 0),
            functions: MetricCoverage::new(1, 1),
            statements: MetricCoverage::new(5, 7),
            uncovered_lines: vec![4, 12],
        },
    );
    CoverageData {
        total_lines: 3,
        covered_lines: 2,
        total_branches: 0,
        covered_branches: 0,
        total_functions: 1,
        covered_functions: 1,
        total_statements: 7,
        covered_statements: 5,
        files: Some(files),
    }
}

#[test]
fn test_save_run_summarizes_results() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let run_id = store.save_run(&scenario_results(), None).unwrap();
    let run = store.get_run(run_id).unwrap().expect("run should exist");

    assert_eq!(run.id, run_id);
    assert_eq!(run.total_tests, 3);
    assert_eq!(run.passed_tests, 2);
    assert_eq!(run.failed_tests, 1);
    assert_eq!(run.passed_tests + run.failed_tests, run.total_tests);
    assert!((run.pass_rate - 66.67).abs() < 0.01, "pass rate {}", run.pass_rate);
    assert_eq!(run.duration, 35.0);
    assert!(run.coverage.is_none());
}

#[test]
fn test_empty_run_has_zero_pass_rate() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let run_id = store.save_run(&[], None).unwrap();
    let run = store.get_run(run_id).unwrap().unwrap();
    assert_eq!(run.total_tests, 0);
    assert_eq!(run.pass_rate, 0.0);
}

#[test]
fn test_coverage_snapshot_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let coverage = sample_coverage();

    let run_id = store.save_run(&scenario_results(), Some(&coverage)).unwrap();
    let run = store.get_run(run_id).unwrap().unwrap();
    assert_eq!(run.coverage, Some(coverage));
}

#[test]
fn test_failed_child_write_leaves_no_partial_run() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let results = vec![
        TestResult::pass("ok", 1.0, 1_000),
        TestResult::pass("broken clock", -1.0, 1_001),
    ];
    let err = store.save_run(&results, Some(&sample_coverage())).unwrap_err();

    let run_id = match err {
        TesterError::Store { op, run_id, .. } => {
            assert_eq!(op, "save_run");
            run_id.expect("error should carry the attempted run id")
        }
        other => panic!("expected store error, got {other:?}"),
    };

    assert!(store.get_run(run_id).unwrap().is_none());
    assert!(store.get_results_for_run(run_id).unwrap().is_empty());
    assert!(store.get_history(10).unwrap().is_empty());
    assert!(store.get_coverage_history(10).unwrap().is_empty());
}

#[test]
fn test_history_on_empty_store_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert!(store.get_history(5).unwrap().is_empty());
}

#[test]
fn test_history_newest_first_and_limited() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let ids: Vec<i64> = (0..4)
        .map(|i| {
            store
                .save_run(&[TestResult::pass(format!("t{i}"), 1.0, i)], None)
                .unwrap()
        })
        .collect();

    let history = store.get_history(3).unwrap();
    let got: Vec<i64> = history.iter().map(|r| r.id).collect();
    assert_eq!(got, vec![ids[3], ids[2], ids[1]]);
}

#[test]
fn test_results_for_run_in_chronological_order() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let results = vec![
        TestResult::pass("third", 1.0, 3_000),
        TestResult::pass("first", 1.0, 1_000),
        TestResult::fail("second", "boom", 1.0, 2_000),
    ];
    let run_id = store.save_run(&results, None).unwrap();

    let loaded = store.get_results_for_run(run_id).unwrap();
    let names: Vec<&str> = loaded.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);
    assert_eq!(loaded[1].error.as_deref(), Some("boom"));
    assert!(!loaded[1].passed);
}

#[test]
fn test_results_for_unknown_run_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert!(store.get_results_for_run(42).unwrap().is_empty());
    assert!(store.get_run(42).unwrap().is_none());
}

#[test]
fn test_failed_tests_across_runs() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let first = store.save_run(&scenario_results(), None).unwrap();
    let second = store
        .save_run(&[TestResult::fail("flaky", "timeout", 3.0, 5_000)], None)
        .unwrap();

    let failed = store.get_failed_tests(10).unwrap();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].run_id, second);
    assert_eq!(failed[0].result.name, "flaky");
    assert_eq!(failed[1].run_id, first);
    assert_eq!(failed[1].result.name, "validates input");
    assert!(failed.iter().all(|f| !f.result.passed));

    assert_eq!(store.get_failed_tests(1).unwrap().len(), 1);
}

#[test]
fn test_coverage_history_recorded_with_run() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    store.save_run(&scenario_results(), None).unwrap();
    let run_id = store
        .save_run(&scenario_results(), Some(&sample_coverage()))
        .unwrap();

    let points = store.get_coverage_history(30).unwrap();
    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point.run_id, run_id);
    assert!((point.lines_percentage - 66.666).abs() < 0.01);
    assert_eq!(point.branches_percentage, 0.0);
    assert_eq!(point.functions_percentage, 100.0);
}

#[test]
fn test_clear_removes_everything() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let run_id = store
        .save_run(&scenario_results(), Some(&sample_coverage()))
        .unwrap();
    store.clear().unwrap();

    assert!(store.get_history(10).unwrap().is_empty());
    assert!(store.get_results_for_run(run_id).unwrap().is_empty());
    assert!(store.get_failed_tests(10).unwrap().is_empty());
    assert!(store.get_coverage_history(10).unwrap().is_empty());
}

#[test]
fn test_closed_store_fails_every_operation() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.close().unwrap();
    store.close().unwrap();

    assert!(store.is_closed());
    assert!(matches!(
        store.get_history(5),
        Err(TesterError::StoreClosed { .. })
    ));
    let err = store.save_run(&scenario_results(), None).unwrap_err();
    assert_eq!(err.kind(), "StoreError");
}

#[test]
fn test_runs_persist_across_reopen() {
    let dir = TempDir::new().unwrap();
    let run_id = {
        let store = open_store(&dir);
        let id = store
            .save_run(&scenario_results(), Some(&sample_coverage()))
            .unwrap();
        store.close().unwrap();
        id
    };

    let store = open_store(&dir);
    let run = store.get_run(run_id).unwrap().unwrap();
    assert_eq!(run.total_tests, 3);
    assert_eq!(run.coverage, Some(sample_coverage()));
    assert_eq!(store.get_results_for_run(run_id).unwrap().len(), 3);
}

#[test]
fn test_open_creates_missing_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("history.db");
    let store = HistoryStore::open(&path).unwrap();
    assert_eq!(store.path(), path.as_path());
    assert!(path.exists());
}

#[test]
fn test_concurrent_saves_get_unique_ids() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                (0..5)
                    .map(|i| {
                        store
                            .save_run(&[TestResult::pass(format!("t{t}-{i}"), 1.0, 0)], None)
                            .unwrap()
                    })
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let mut ids: Vec<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 40);
    assert_eq!(store.get_history(100).unwrap().len(), 40);
}
