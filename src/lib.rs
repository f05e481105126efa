//! # qail-script — Named SQL scripts, typed parameters, typed rows
//!
//! > **Keep SQL in `.sql` files. Keep types in Rust.**
//!
//! Scripts live in a store under `"<Category>.<Name>"`, use `@name`
//! placeholders, and are run through one of three action kinds.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use qail_script::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Resource { id: i64, value: Option<String> }
//! impl_record!(Resource { id, value });
//!
//! struct ResourceCommand;     // Commands/ResourceCommand.sql
//! impl Action for ResourceCommand { type Params = Resource; }
//! impl CommandAction for ResourceCommand {}
//!
//! let db = Database::connect("sqlite::memory:").await?;
//! let scripts = DirectoryScriptProvider::new("sql")?;
//!
//! let mut insert = Command::with_provider(ResourceCommand, &scripts)?;
//! let ok = insert
//!     .setup(Resource { id: 1, value: Some("Test".into()) })?
//!     .run_async(Some(&db))
//!     .await?;
//! ```
//!
//! ## Action kinds
//!
//! | Kind            | Category   | Result                              |
//! |-----------------|------------|-------------------------------------|
//! | `Command`       | `Commands` | `bool` from the affected-row count  |
//! | `QuerySingle`   | `Queries`  | `Option<T>` from the first row      |
//! | `QueryMultiple` | `Queries`  | lazy stream / iterator of `T`       |
//!
//! Every kind has `run_async` and a blocking `run`. Both swallow database
//! failures into `false`, `None` or an ended sequence; `try_run_async` and
//! `try_run` return them.

pub mod action;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod params;
pub mod parser;
pub mod provider;
pub mod record;
pub mod runtime;
pub mod serialized;
pub mod value;

pub use action::{
    Action, ActionOptions, Category, Command, CommandAction, QueryAction, QueryMultiple,
    QuerySingle, Rows, ScriptedAction,
};
pub use config::{Configuration, ConfigurationBuilder, GlobalConfiguration, PoolSettings, Settings};
pub use convert::{FieldNameConverter, PascalToSnakeCase, SharedConverter};
pub use engine::{Database, Dialect};
pub use error::{ScriptError, ScriptResult};
pub use mapper::{FromRow, Row};
pub use params::{bind, ParamShape, ParameterSet, ToParams, SCALAR_PARAM};
pub use parser::CompiledScript;
pub use provider::{DirectoryScriptProvider, EmbeddedScriptProvider, ScriptProvider};
pub use record::{Field, Record};
pub use serialized::Serialized;
pub use value::{FromValue, ToValue, Value, ValueError};

pub mod prelude {
    pub use crate::action::{
        Action, ActionOptions, Command, CommandAction, QueryAction, QueryMultiple, QuerySingle,
    };
    pub use crate::config::{Configuration, Settings};
    pub use crate::convert::{FieldNameConverter, PascalToSnakeCase};
    pub use crate::engine::Database;
    pub use crate::error::*;
    pub use crate::mapper::{FromRow, Row};
    pub use crate::params::ToParams;
    pub use crate::provider::{DirectoryScriptProvider, EmbeddedScriptProvider, ScriptProvider};
    pub use crate::serialized::Serialized;
    pub use crate::value::{FromValue, ToValue, Value};
    pub use crate::{embed_scripts, impl_record};
}

/// Compile a script without running it.
///
/// # Example
///
/// ```
/// use qail_script::{compile, Dialect};
///
/// let script = compile("SELECT * FROM resource WHERE id = @param").unwrap();
/// assert_eq!(script.render(Dialect::Postgres).sql, "SELECT * FROM resource WHERE id = $1");
/// ```
pub fn compile(source: &str) -> ScriptResult<CompiledScript> {
    CompiledScript::compile(source)
}
