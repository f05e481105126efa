//! Scripted actions.
//!
//! An action pairs a named script with a parameter set and runs it against a
//! connection. Users describe an action with a small definition type:
//!
//! ```rust,ignore
//! struct ResourceQuery;
//!
//! impl Action for ResourceQuery {
//!     type Params = Option<i64>;
//! }
//!
//! impl QueryAction for ResourceQuery {
//!     type Output = Resource;
//! }
//!
//! let mut query = QuerySingle::new(ResourceQuery)?;   // Queries.ResourceQuery
//! let resource = query.setup(Some(1))?.run_async(None).await?;
//! ```
//!
//! and pick how to run it: [`Command`], [`QuerySingle`] or [`QueryMultiple`].

mod command;
mod query;

pub use command::Command;
pub use query::{QueryMultiple, QuerySingle, Rows};

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::Configuration;
use crate::convert::{FieldNameConverter, SharedConverter};
use crate::engine::Database;
use crate::error::{ScriptError, ScriptResult};
use crate::mapper::{FromRow, Row};
use crate::params::{bind, ParameterSet, ToParams};
use crate::parser::CompiledScript;
use crate::provider::ScriptProvider;
use crate::value::Value;

/// A user-defined action.
pub trait Action: Send + Sync + 'static {
    /// What `setup` accepts: `()`, a scalar, an `Option`, or a record.
    type Params: ToParams;

    /// The action name, `"<Name>"` in `"<Category>.<Name>"`.
    ///
    /// Defaults to the type's own name without its module path.
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

/// An action that changes data and reports an affected-row count.
pub trait CommandAction: Action {
    /// Decide whether the affected-row count means success.
    fn is_success(&self, rows_affected: u64) -> bool {
        let _ = rows_affected;
        true
    }
}

/// An action that returns rows.
pub trait QueryAction: Action {
    type Output: FromRow + Send + 'static;

    /// Map one row. Override to bypass the generic mapping.
    fn map_row(&self, row: &Row, converter: &dyn FieldNameConverter) -> ScriptResult<Self::Output> {
        Self::Output::from_row(row, converter)
    }
}

/// `crate::module::Type<Param>` → `Type`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Which half of the script store and configuration an action uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Commands,
    Queries,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Commands => "Commands",
            Category::Queries => "Queries",
        }
    }

    /// `"<Category>.<name>"`
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.as_str(), name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit overrides for constructing an action.
///
/// Anything left unset is taken from the configuration.
#[derive(Default, Clone)]
pub struct ActionOptions<'a> {
    provider: Option<&'a dyn ScriptProvider>,
    converter: Option<SharedConverter>,
    config: Option<Arc<Configuration>>,
}

impl<'a> ActionOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the script from this provider.
    pub fn provider(mut self, provider: &'a dyn ScriptProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn converter(mut self, converter: impl FieldNameConverter + 'static) -> Self {
        self.converter = Some(SharedConverter::new(converter));
        self
    }

    /// Consult this configuration instead of the global one.
    pub fn config(mut self, config: Arc<Configuration>) -> Self {
        self.config = Some(config);
        self
    }
}

/// Where an action looks up what it was not given.
#[derive(Debug, Clone)]
enum ConfigSource {
    Global,
    Explicit(Arc<Configuration>),
}

impl ConfigSource {
    fn connection(&self, category: Category) -> Option<Database> {
        match (self, category) {
            (ConfigSource::Global, Category::Queries) => {
                Configuration::global().default_query_connection()
            }
            (ConfigSource::Global, Category::Commands) => {
                Configuration::global().default_command_connection()
            }
            (ConfigSource::Explicit(c), Category::Queries) => c.query_connection.clone(),
            (ConfigSource::Explicit(c), Category::Commands) => c.command_connection.clone(),
        }
    }

    fn provider(&self, category: Category) -> Option<Arc<dyn ScriptProvider>> {
        match (self, category) {
            (ConfigSource::Global, Category::Queries) => {
                Configuration::global().default_query_provider()
            }
            (ConfigSource::Global, Category::Commands) => {
                Configuration::global().default_command_provider()
            }
            (ConfigSource::Explicit(c), Category::Queries) => c.query_provider.clone(),
            (ConfigSource::Explicit(c), Category::Commands) => c.command_provider.clone(),
        }
    }

    fn converter(&self) -> SharedConverter {
        match self {
            ConfigSource::Global => Configuration::global().field_name_converter(),
            ConfigSource::Explicit(c) => c.converter.clone(),
        }
    }
}

/// The untyped core shared by every action kind: a compiled script, its
/// current parameters, and where to find a connection.
#[derive(Debug, Clone)]
pub struct ScriptedAction {
    name: String,
    category: Category,
    script: Arc<CompiledScript>,
    converter: SharedConverter,
    config: ConfigSource,
    params: ParameterSet,
}

impl ScriptedAction {
    /// Resolve and compile the script `"<category>.<name>"`.
    pub fn load(category: Category, name: &str, options: ActionOptions<'_>) -> ScriptResult<Self> {
        let config = match options.config {
            Some(config) => ConfigSource::Explicit(config),
            None => ConfigSource::Global,
        };
        let qualified = category.qualify(name);

        let text = match options.provider {
            Some(provider) => provider.get(&qualified).map(str::to_string),
            None => {
                let provider = config.provider(category).ok_or(match category {
                    Category::Queries => ScriptError::ConfigurationMissing("query script provider"),
                    Category::Commands => {
                        ScriptError::ConfigurationMissing("command script provider")
                    }
                })?;
                provider.get(&qualified).map(str::to_string)
            }
        };
        let text = text.ok_or_else(|| ScriptError::not_found(&qualified))?;
        let script = CompiledScript::compile(text)?;
        debug!(name = %qualified, placeholders = ?script.placeholders(), "script loaded");

        Ok(Self {
            converter: options.converter.unwrap_or_else(|| config.converter()),
            name: qualified,
            category,
            script: Arc::new(script),
            config,
            params: ParameterSet::new(),
        })
    }

    /// Replace the parameter set by binding `params`.
    pub fn setup<P: ToParams + ?Sized>(&mut self, params: &P) -> ScriptResult<()> {
        self.params = bind(params, self.converter.as_dyn())?;
        Ok(())
    }

    pub fn set_parameters(&mut self, params: ParameterSet) {
        self.params = params;
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    pub fn script(&self) -> &CompiledScript {
        &self.script
    }

    /// `"<Category>.<Name>"`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn converter(&self) -> &SharedConverter {
        &self.converter
    }

    /// The explicit connection, else the configured default.
    pub fn connection(&self, explicit: Option<&Database>) -> ScriptResult<Database> {
        if let Some(db) = explicit {
            return Ok(db.clone());
        }
        self.config
            .connection(self.category)
            .ok_or(match self.category {
                Category::Queries => ScriptError::ConfigurationMissing("query connection"),
                Category::Commands => ScriptError::ConfigurationMissing("command connection"),
            })
    }

    fn prepare(&self, conn: Option<&Database>) -> ScriptResult<(Database, String, Vec<Value>)> {
        let db = self.connection(conn)?;
        let args = self.script.arguments(db.dialect(), &self.params)?;
        let sql = self.script.render(db.dialect()).sql.clone();
        Ok((db, sql, args))
    }

    /// Run as a statement, returning the affected-row count.
    pub async fn execute(&self, conn: Option<&Database>) -> ScriptResult<u64> {
        let (db, sql, args) = self.prepare(conn)?;
        db.execute(&sql, args).await
    }

    /// Run as a query, returning the first row only.
    pub async fn fetch_optional(&self, conn: Option<&Database>) -> ScriptResult<Option<Row>> {
        let (db, sql, args) = self.prepare(conn)?;
        db.fetch_optional(&sql, args).await
    }

    /// Run as a query, streaming rows from a producer spawned on `handle`.
    ///
    /// Errors raised before the query starts arrive as the only item.
    pub fn fetch(&self, conn: Option<&Database>, handle: &Handle) -> mpsc::Receiver<ScriptResult<Row>> {
        match self.prepare(conn) {
            Ok((db, sql, args)) => db.fetch(sql, args, handle),
            Err(e) => failed(e),
        }
    }
}

/// A finished channel carrying a single error.
pub(crate) fn failed(err: ScriptError) -> mpsc::Receiver<ScriptResult<Row>> {
    let (tx, rx) = mpsc::channel(1);
    // Capacity one and nothing sent yet, so this cannot fail
    let _ = tx.try_send(Err(err));
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EmbeddedScriptProvider;

    struct GetThing;

    impl Action for GetThing {
        type Params = i64;
    }

    struct Renamed;

    impl Action for Renamed {
        type Params = ();

        fn name() -> &'static str {
            "SomethingElse"
        }
    }

    struct Generic<T>(std::marker::PhantomData<T>);

    fn provider() -> EmbeddedScriptProvider {
        EmbeddedScriptProvider::new(
            "",
            [
                ("Queries.GetThing.sql", "SELECT * FROM thing WHERE id = @param"),
                ("Commands.GetThing.sql", "DELETE FROM thing"),
            ],
        )
    }

    #[test]
    fn test_action_names() {
        assert_eq!(GetThing::name(), "GetThing");
        assert_eq!(Renamed::name(), "SomethingElse");
        assert_eq!(short_type_name::<Generic<GetThing>>(), "Generic");
    }

    #[test]
    fn test_load_resolves_by_category() {
        let provider = provider();
        let options = ActionOptions::new().provider(&provider);
        let action = ScriptedAction::load(Category::Queries, GetThing::name(), options).unwrap();
        assert_eq!(action.name(), "Queries.GetThing");
        assert_eq!(action.script().placeholders(), &["param".to_string()]);

        let action = ScriptedAction::load(
            Category::Commands,
            "GetThing",
            ActionOptions::new().provider(&provider),
        )
        .unwrap();
        assert!(action.script().placeholders().is_empty());
    }

    #[test]
    fn test_unknown_script_is_fatal() {
        let provider = provider();
        let err = ScriptedAction::load(
            Category::Queries,
            "Missing",
            ActionOptions::new().provider(&provider),
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::ScriptNotFound { name } if name == "Queries.Missing"));
    }

    #[test]
    fn test_missing_provider_and_connection() {
        let config = Arc::new(Configuration::default());
        let err = ScriptedAction::load(
            Category::Queries,
            "GetThing",
            ActionOptions::new().config(config.clone()),
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::ConfigurationMissing(_)));

        let provider = provider();
        let action = ScriptedAction::load(
            Category::Queries,
            "GetThing",
            ActionOptions::new().provider(&provider).config(config),
        )
        .unwrap();
        assert!(matches!(
            action.connection(None),
            Err(ScriptError::ConfigurationMissing("query connection"))
        ));
    }

    #[test]
    fn test_setup_replaces_parameters() {
        let provider = provider();
        let mut action = ScriptedAction::load(
            Category::Queries,
            "GetThing",
            ActionOptions::new().provider(&provider),
        )
        .unwrap();

        action.setup(&1i64).unwrap();
        action.setup(&2i64).unwrap();
        assert_eq!(action.parameters().len(), 1);
        assert_eq!(action.parameters().get("param"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_failed_channel_yields_error_once() {
        let mut rx = failed(ScriptError::UnboundParameter("id".into()));
        assert!(matches!(rx.try_recv(), Ok(Err(ScriptError::UnboundParameter(_)))));
        assert!(rx.try_recv().is_err());
    }
}
