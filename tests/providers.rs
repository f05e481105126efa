//! Script provider tests.

mod common;

use std::fs;

use common::*;
use pretty_assertions::assert_eq;
use qail_script::prelude::*;
use tempfile::TempDir;

fn write(dir: &TempDir, relative: &str, text: &str) {
    let path = dir.path().join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

#[test]
fn test_directory_provider_keys_by_relative_path() {
    let dir = TempDir::new().unwrap();
    write(&dir, "Queries/ResourceQuery.sql", "SELECT 1");
    write(&dir, "Commands/ResourceCommand.sql", "DELETE FROM resource");
    write(&dir, "Queries/Reports/Daily.sql", "SELECT 2");
    write(&dir, "Queries/notes.txt", "ignored");

    let provider = DirectoryScriptProvider::new(dir.path()).unwrap();
    assert_eq!(
        provider.names(),
        vec![
            "Commands.ResourceCommand",
            "Queries.Reports.Daily",
            "Queries.ResourceQuery",
        ]
    );
    assert_eq!(provider.get("Queries.ResourceQuery"), Some("SELECT 1"));
    assert_eq!(provider.get("Queries.notes"), None);
    assert_eq!(provider.len(), 3);
}

#[test]
fn test_directory_provider_keeps_text_verbatim() {
    let dir = TempDir::new().unwrap();
    let text = "-- header\r\nSELECT '@x'\n  FROM t;\n\n";
    write(&dir, "Queries/Verbatim.sql", text);

    let provider = DirectoryScriptProvider::new(dir.path()).unwrap();
    assert_eq!(provider.get("Queries.Verbatim"), Some(text));
}

#[test]
fn test_directory_provider_empty_and_missing() {
    let dir = TempDir::new().unwrap();
    let provider = DirectoryScriptProvider::new(dir.path()).unwrap();
    assert!(provider.is_empty());

    let missing = dir.path().join("nope");
    let err = DirectoryScriptProvider::new(&missing).unwrap_err();
    assert!(matches!(err, ScriptError::DirectoryNotFound(ref path) if *path == missing));

    write(&dir, "file.sql", "SELECT 1");
    let err = DirectoryScriptProvider::new(dir.path().join("file.sql")).unwrap_err();
    assert!(matches!(err, ScriptError::DirectoryNotFound(_)));
}

#[test]
fn test_directory_and_embedded_agree() {
    let directory = DirectoryScriptProvider::new(scripts_dir()).unwrap();
    let embedded = scripts();

    assert_eq!(directory.names(), embedded.names());
    for name in embedded.names() {
        assert_eq!(directory.get(name), embedded.get(name), "script {name}");
    }
}

#[test]
fn test_providers_behind_pointers() {
    let shared: std::sync::Arc<dyn ScriptProvider> = std::sync::Arc::new(scripts());
    let boxed: Box<dyn ScriptProvider> = Box::new(scripts());

    assert!(shared.get("Queries.ResourceQuery").is_some());
    assert!(boxed.get("Commands.ResourceCommand").is_some());

    let mut query = QuerySingle::with_provider(ResourceQuery, &shared).unwrap();
    query.setup(Some(1)).unwrap();
    assert_eq!(
        query.action().script().placeholders(),
        &["param".to_string()]
    );
}

#[tokio::test]
async fn test_directory_scripts_run() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "Commands/CreateTablesCommand.sql",
        "CREATE TABLE \"table\" (id INTEGER);\nCREATE TABLE another_table (id INTEGER);",
    );
    write(
        &dir,
        "Queries/TablesQuery.sql",
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    );
    let provider = DirectoryScriptProvider::new(dir.path()).unwrap();
    let db = memory_db().await;

    let command = Command::with_provider(CreateTablesCommand, &provider).unwrap();
    assert!(command.run_async(Some(&db)).await.unwrap());

    let names = QuerySingle::with_provider(TablesQuery, &provider)
        .unwrap()
        .run_async(Some(&db))
        .await
        .unwrap();
    assert_eq!(names.as_deref(), Some("another_table"));
}
