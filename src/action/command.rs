use std::sync::Arc;

use tracing::warn;

use super::{ActionOptions, Category, CommandAction, ScriptedAction};
use crate::config::Configuration;
use crate::engine::Database;
use crate::error::ScriptResult;
use crate::provider::ScriptProvider;
use crate::runtime;

/// Runs a `Commands.<Name>` script as a statement.
///
/// `run_async`/`run` answer `true` when the affected-row count passes
/// [`CommandAction::is_success`], and `false` when the database round trip
/// fails. `try_run_async`/`try_run` return the raw count or the error.
#[derive(Debug)]
pub struct Command<A: CommandAction> {
    action: ScriptedAction,
    definition: A,
}

impl<A: CommandAction> Command<A> {
    /// Load the script through the global configuration.
    pub fn new(definition: A) -> ScriptResult<Self> {
        Self::with_options(definition, ActionOptions::new())
    }

    pub fn with_provider(definition: A, provider: &dyn ScriptProvider) -> ScriptResult<Self> {
        Self::with_options(definition, ActionOptions::new().provider(provider))
    }

    pub fn with_config(definition: A, config: Arc<Configuration>) -> ScriptResult<Self> {
        Self::with_options(definition, ActionOptions::new().config(config))
    }

    pub fn with_options(definition: A, options: ActionOptions<'_>) -> ScriptResult<Self> {
        let action = ScriptedAction::load(Category::Commands, A::name(), options)?;
        Ok(Self { action, definition })
    }

    /// Bind parameters, replacing any bound earlier.
    pub fn setup(&mut self, params: A::Params) -> ScriptResult<&mut Self> {
        self.action.setup(&params)?;
        Ok(self)
    }

    pub fn action(&self) -> &ScriptedAction {
        &self.action
    }

    pub fn definition(&self) -> &A {
        &self.definition
    }

    pub async fn try_run_async(&self, conn: Option<&Database>) -> ScriptResult<u64> {
        self.action.execute(conn).await
    }

    pub async fn run_async(&self, conn: Option<&Database>) -> ScriptResult<bool> {
        match self.try_run_async(conn).await {
            Ok(rows_affected) => Ok(self.definition.is_success(rows_affected)),
            Err(e) if e.is_execution_failure() => {
                warn!(action = self.action.name(), error = %e, "command failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Blocking form of [`run_async`](Self::run_async).
    pub fn run(&self, conn: Option<&Database>) -> ScriptResult<bool> {
        runtime::block_on(self.run_async(conn))?
    }

    /// Blocking form of [`try_run_async`](Self::try_run_async).
    pub fn try_run(&self, conn: Option<&Database>) -> ScriptResult<u64> {
        runtime::block_on(self.try_run_async(conn))?
    }
}
