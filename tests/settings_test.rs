use ldesign_tester::coverage::{CoverageThresholds, Metric, MetricThresholds};
use ldesign_tester::error::TesterError;
use ldesign_tester::settings::{load_settings, save_settings, DashboardSettings, TesterSettings};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nonexistent.json");
    let settings = load_settings(&path).unwrap();
    assert!(settings.thresholds.is_none());
    assert!(settings.dashboard.is_none());
}

#[test]
fn test_missing_thresholds_default_to_eighty() {
    let settings = TesterSettings::default();
    let thresholds = settings.effective_thresholds();
    let global = thresholds.global.unwrap();
    for metric in Metric::ALL {
        assert_eq!(global.get(metric), Some(80.0));
    }
    assert!(thresholds.files.is_empty());
}

#[test]
fn test_load_invalid_json_is_validation_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "not json at all {{{").unwrap();
    let err = load_settings(&path).unwrap_err();
    assert!(matches!(err, TesterError::Validation(_)));
}

#[test]
fn test_out_of_range_threshold_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"thresholds": {"global": {"lines": 120}}}"#).unwrap();
    let err = load_settings(&path).unwrap_err();
    match err {
        TesterError::Validation(msg) => assert!(msg.contains("Lines"), "{msg}"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_per_file_thresholds_parsed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{
            "thresholds": {
                "global": {"lines": 80, "branches": 70},
                "src/core.ts": {"lines": 95}
            },
            "dashboard": {"port": 4100, "dbPath": "ci/history.db"}
        }"#,
    )
    .unwrap();

    let settings = load_settings(&path).unwrap();
    let thresholds = settings.thresholds.unwrap();
    let global = thresholds.global.unwrap();
    assert_eq!(global.lines, Some(80.0));
    assert_eq!(global.branches, Some(70.0));
    assert!(global.functions.is_none());
    assert_eq!(thresholds.files["src/core.ts"].lines, Some(95.0));

    let dashboard = settings.dashboard.unwrap();
    assert_eq!(dashboard.port, Some(4100));
    assert_eq!(dashboard.db_path, Some(PathBuf::from("ci/history.db")));
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");

    let settings = TesterSettings {
        thresholds: Some(CoverageThresholds::global(MetricThresholds::uniform(75.0))),
        dashboard: Some(DashboardSettings {
            port: Some(3100),
            db_path: None,
        }),
    };

    save_settings(&path, &settings).unwrap();
    let loaded = load_settings(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_save_to_missing_directory_is_file_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-such-dir").join("settings.json");
    let err = save_settings(&path, &TesterSettings::default()).unwrap_err();
    assert!(matches!(err, TesterError::File { .. }));
    assert_eq!(err.kind(), "FileError");
}
