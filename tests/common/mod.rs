//! Action definitions and fixtures shared by the integration tests.

#![allow(dead_code)]

use qail_script::prelude::*;

/// Scripts under `tests/sql`, embedded at compile time.
pub fn scripts() -> EmbeddedScriptProvider {
    embed_scripts!(
        "tests",
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/sql"),
        [
            "Commands/CreateResourceTableCommand.sql",
            "Commands/CreateTablesCommand.sql",
            "Commands/ResourceCommand.sql",
            "Commands/UpdateResourceCommand.sql",
            "Queries/AllResourcesQuery.sql",
            "Queries/MissingTableQuery.sql",
            "Queries/ResourceQuery.sql",
            "Queries/ResourceSlotQuery.sql",
            "Queries/TablesQuery.sql",
        ]
    )
}

pub fn scripts_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/sql")
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Resource {
    pub id: i64,
    pub value: Option<String>,
}

impl_record!(Resource { id, value });

pub struct CreateResourceTableCommand;

impl Action for CreateResourceTableCommand {
    type Params = ();
}

impl CommandAction for CreateResourceTableCommand {}

pub struct ResourceCommand;

impl Action for ResourceCommand {
    type Params = Resource;
}

impl CommandAction for ResourceCommand {
    fn is_success(&self, rows_affected: u64) -> bool {
        rows_affected == 1
    }
}

pub struct UpdateResourceCommand;

impl Action for UpdateResourceCommand {
    type Params = Resource;
}

impl CommandAction for UpdateResourceCommand {
    fn is_success(&self, rows_affected: u64) -> bool {
        rows_affected == 1
    }
}

/// Runs `Commands.ResourceCommand` with a scalar, leaving `@id` and
/// `@value` unbound.
pub struct ScalarResourceCommand;

impl Action for ScalarResourceCommand {
    type Params = i64;

    fn name() -> &'static str {
        "ResourceCommand"
    }
}

impl CommandAction for ScalarResourceCommand {}

pub struct CreateTablesCommand;

impl Action for CreateTablesCommand {
    type Params = ();
}

impl CommandAction for CreateTablesCommand {}

pub struct ResourceQuery;

impl Action for ResourceQuery {
    type Params = Option<i64>;
}

impl QueryAction for ResourceQuery {
    type Output = Resource;
}

/// Left-joins the wanted id against `resource`, so a missing resource
/// still yields one row of NULLs.
pub struct ResourceSlotQuery;

impl Action for ResourceSlotQuery {
    type Params = i64;
}

impl QueryAction for ResourceSlotQuery {
    type Output = Option<Resource>;
}

pub struct AllResourcesQuery;

impl Action for AllResourcesQuery {
    type Params = ();
}

impl QueryAction for AllResourcesQuery {
    type Output = Resource;
}

pub struct TablesQuery;

impl Action for TablesQuery {
    type Params = ();
}

impl QueryAction for TablesQuery {
    type Output = String;
}

pub struct MissingTableQuery;

impl Action for MissingTableQuery {
    type Params = i64;
}

impl QueryAction for MissingTableQuery {
    type Output = Resource;
}

/// `Queries.ResourceQuery` read through serde instead of `impl_record!`.
pub struct SerializedResourceQuery;

impl Action for SerializedResourceQuery {
    type Params = Serialized<Option<i64>>;

    fn name() -> &'static str {
        "ResourceQuery"
    }
}

impl QueryAction for SerializedResourceQuery {
    type Output = Serialized<serde_json::Value>;
}

pub async fn memory_db() -> Database {
    Database::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite")
}

/// A fresh database holding the empty `resource` table.
pub async fn resource_db(provider: &EmbeddedScriptProvider) -> Database {
    let db = memory_db().await;
    let created = Command::with_provider(CreateResourceTableCommand, provider)
        .unwrap()
        .run_async(Some(&db))
        .await
        .unwrap();
    assert!(created);
    db
}
