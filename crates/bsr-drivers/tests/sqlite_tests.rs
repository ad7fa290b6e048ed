#![cfg(feature = "sqlite")]

/// Integration tests for the registry + SQLite driver
use bsr_drivers::{BsrError, DriverRegistry};

#[test]
fn test_defaults_include_sqlite() {
    let registry = DriverRegistry::with_defaults();
    assert!(registry.has("sqlite"));
    assert!(registry.has("SQLite"));
    assert_eq!(registry.list(), vec!["sqlite"]);
}

#[tokio::test]
async fn test_connect_and_execute_blob() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("target.db");
    let target = format!("sqlite:{}", db_path.display());

    let registry = DriverRegistry::with_defaults();
    let conn = registry.connect(&target).await.expect("Failed to connect");
    assert_eq!(conn.driver_name(), "sqlite");

    conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT);")
        .await
        .expect("Failed to create table");
    let result = conn
        .execute_batch("INSERT INTO items (name) VALUES ('a');\nINSERT INTO items (name) VALUES ('b');")
        .await
        .expect("Failed to insert");
    assert_eq!(result.affected_rows, 2);

    // a second connection sees the committed rows
    let again = registry.connect(&target).await.expect("Failed to reconnect");
    let result = again
        .execute_batch("DELETE FROM items;")
        .await
        .expect("Failed to delete");
    assert_eq!(result.affected_rows, 2);
}

#[tokio::test]
async fn test_unknown_driver_is_configuration_error() {
    let registry = DriverRegistry::with_defaults();
    let err = match registry.connect("oracle:scott/tiger").await {
        Ok(_) => panic!("oracle is not a registered driver"),
        Err(e) => e,
    };
    assert!(matches!(err, BsrError::Configuration(_)));
    assert!(err.to_string().contains("sqlite"));
}

#[test]
fn test_malformed_sqlite_target_explains_format() {
    let registry = DriverRegistry::with_defaults();
    let err = match registry.resolve("sqlite:   ") {
        Ok(_) => panic!("a target without a path must be rejected"),
        Err(e) => e,
    };
    assert!(matches!(err, BsrError::Configuration(_)));
    assert!(err.to_string().contains("expected sqlite:<database file>"));
}
