//! Runs against a real SQLite database through the driver registry

use bsr_drivers::DriverRegistry;
use bsr_runner::{RunConfig, RunEngine, RunState, RunnerError};
use std::sync::Arc;
use tempfile::tempdir;

fn count_rows(db: &std::path::Path) -> i64 {
    let conn = rusqlite::Connection::open(db).unwrap();
    conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
        .unwrap()
}

#[tokio::test]
async fn test_script_runs_against_sqlite() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("app.db");
    let script = dir.path().join("seed.sql");
    std::fs::write(
        &script,
        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
         go\n\
         INSERT INTO items (name) VALUES ('a');\n\
         INSERT INTO items (name) VALUES ('b');\n\
         go\n\
         INSERT INTO items (name) VALUES ('c');\n\
         go\n\
         UPDATE items SET name = upper(name);\n\
         go\n",
    )
    .unwrap();

    let config = RunConfig::builder(format!("sqlite:{}", db.display()), &script)
        .batch_size(2)
        .retry_count(0)
        .build()
        .unwrap();
    let engine = RunEngine::new(config, Arc::new(DriverRegistry::with_defaults())).unwrap();

    let summary = engine.run(|_| {}, |_| {}).await.unwrap();

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.batches_executed, 2);
    // 3 inserts + 3 updated rows
    assert_eq!(summary.affected_rows, 6);
    assert_eq!(count_rows(&db), 3);

    // Resuming does not insert again
    let again = engine.run(|_| {}, |_| {}).await.unwrap();
    assert_eq!(again.affected_rows, 0);
    assert_eq!(count_rows(&db), 3);
}

#[tokio::test]
async fn test_sql_error_fails_run_and_keeps_earlier_batches() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("app.db");
    let script = dir.path().join("broken.sql");
    std::fs::write(
        &script,
        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL);\nGO\n\
         INSERT INTO items (name) VALUES ('a');\nGO\n\
         INSERT INTO missing_table VALUES (1);\nGO\n",
    )
    .unwrap();

    let config = RunConfig::builder(format!("sqlite:{}", db.display()), &script)
        .retry_count(0)
        .build()
        .unwrap();
    let engine = RunEngine::new(config, Arc::new(DriverRegistry::with_defaults())).unwrap();

    let err = engine.run(|_| {}, |_| {}).await.unwrap_err();
    assert!(matches!(err, RunnerError::Execution { .. }));
    assert_eq!(engine.state(), RunState::Failed);
    assert_eq!(engine.checkpoint_summary().unwrap().executed, 2);
    assert_eq!(count_rows(&db), 1);
}

#[test]
fn test_unknown_driver_rejected() {
    let config = RunConfig::builder("oracle:prod", "seed.sql").build().unwrap();
    let err = RunEngine::new(config, Arc::new(DriverRegistry::with_defaults())).err();
    assert!(matches!(err, Some(RunnerError::Configuration(_))));
}
