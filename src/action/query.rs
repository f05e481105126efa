use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

use super::{failed, ActionOptions, Category, QueryAction, ScriptedAction};
use crate::config::Configuration;
use crate::convert::SharedConverter;
use crate::engine::Database;
use crate::error::{ScriptError, ScriptResult};
use crate::mapper::Row;
use crate::provider::ScriptProvider;
use crate::runtime;

/// Runs a `Queries.<Name>` script and maps the first row, if any.
///
/// Extra rows are discarded. A failed round trip reads as `None` from
/// `run_async`/`run`; mapping errors are always returned.
#[derive(Debug)]
pub struct QuerySingle<A: QueryAction> {
    action: ScriptedAction,
    definition: A,
}

impl<A: QueryAction> QuerySingle<A> {
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
        let action = ScriptedAction::load(Category::Queries, A::name(), options)?;
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

    pub async fn try_run_async(&self, conn: Option<&Database>) -> ScriptResult<Option<A::Output>> {
        let row = self.action.fetch_optional(conn).await?;
        row.map(|row| self.definition.map_row(&row, self.action.converter().as_dyn()))
            .transpose()
    }

    pub async fn run_async(&self, conn: Option<&Database>) -> ScriptResult<Option<A::Output>> {
        match self.try_run_async(conn).await {
            Err(e) if e.is_execution_failure() => {
                warn!(action = self.action.name(), error = %e, "query failed");
                Ok(None)
            }
            other => other,
        }
    }

    /// Blocking form of [`run_async`](Self::run_async).
    pub fn run(&self, conn: Option<&Database>) -> ScriptResult<Option<A::Output>> {
        runtime::block_on(self.run_async(conn))?
    }

    /// Blocking form of [`try_run_async`](Self::try_run_async).
    pub fn try_run(&self, conn: Option<&Database>) -> ScriptResult<Option<A::Output>> {
        runtime::block_on(self.try_run_async(conn))?
    }
}

/// Runs a `Queries.<Name>` script and maps every row, lazily.
///
/// Each run yields a fresh single-pass sequence. Rows are fetched one at a
/// time as the consumer pulls; dropping the sequence early closes the
/// cursor. With `run_async`/`run` a failed round trip ends the sequence
/// (possibly before the first row); `try_run_async`/`try_run` yield the
/// error as the last item instead.
#[derive(Debug)]
pub struct QueryMultiple<A: QueryAction> {
    action: ScriptedAction,
    definition: Arc<A>,
}

impl<A: QueryAction> QueryMultiple<A> {
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
        let action = ScriptedAction::load(Category::Queries, A::name(), options)?;
        Ok(Self {
            action,
            definition: Arc::new(definition),
        })
    }

    /// Bind parameters, replacing any bound earlier.
    pub fn setup(&mut self, params: A::Params) -> ScriptResult<&mut Self> {
        self.action.setup(&params)?;
        Ok(self)
    }

    pub fn action(&self) -> &ScriptedAction {
        &self.action
    }

    /// Stream every mapped row, errors included.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn try_run_async(&self, conn: Option<&Database>) -> BoxStream<'static, ScriptResult<A::Output>> {
        let mut rx = match Handle::try_current() {
            Ok(handle) => self.action.fetch(conn, &handle),
            Err(_) => failed(ScriptError::Config(
                "QueryMultiple::run_async needs a Tokio runtime; use run instead".to_string(),
            )),
        };

        let definition = self.definition.clone();
        let converter = self.action.converter().clone();
        stream::poll_fn(move |cx| rx.poll_recv(cx))
            .map(move |item| item.and_then(|row| definition.map_row(&row, converter.as_dyn())))
            .boxed()
    }

    /// Stream mapped rows, ending quietly if the round trip fails.
    pub fn run_async(&self, conn: Option<&Database>) -> BoxStream<'static, ScriptResult<A::Output>> {
        let name = self.action.name().to_string();
        self.try_run_async(conn)
            .take_while(move |item| {
                let keep = match item {
                    Err(e) if e.is_execution_failure() => {
                        warn!(action = %name, error = %e, "query failed, ending sequence");
                        false
                    }
                    _ => true,
                };
                futures::future::ready(keep)
            })
            .boxed()
    }

    /// Blocking form of [`run_async`](Self::run_async).
    pub fn run(&self, conn: Option<&Database>) -> ScriptResult<Rows<A>> {
        self.blocking(conn, true)
    }

    /// Blocking form of [`try_run_async`](Self::try_run_async).
    pub fn try_run(&self, conn: Option<&Database>) -> ScriptResult<Rows<A>> {
        self.blocking(conn, false)
    }

    fn blocking(&self, conn: Option<&Database>, collapse: bool) -> ScriptResult<Rows<A>> {
        if Handle::try_current().is_ok() {
            return Err(ScriptError::BlockingInAsyncContext);
        }
        Ok(Rows {
            rx: self.action.fetch(conn, runtime::handle()),
            definition: self.definition.clone(),
            converter: self.action.converter().clone(),
            name: self.action.name().to_string(),
            collapse,
            done: false,
        })
    }
}

/// Blocking, single-pass iterator over the rows of a [`QueryMultiple`] run.
pub struct Rows<A: QueryAction> {
    rx: mpsc::Receiver<ScriptResult<Row>>,
    definition: Arc<A>,
    converter: SharedConverter,
    name: String,
    collapse: bool,
    done: bool,
}

impl<A: QueryAction> Iterator for Rows<A> {
    type Item = ScriptResult<A::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if Handle::try_current().is_ok() {
            self.done = true;
            return Some(Err(ScriptError::BlockingInAsyncContext));
        }

        match self.rx.blocking_recv() {
            None => {
                self.done = true;
                None
            }
            Some(Err(e)) if self.collapse && e.is_execution_failure() => {
                warn!(action = %self.name, error = %e, "query failed, ending sequence");
                self.done = true;
                None
            }
            Some(item) => {
                Some(item.and_then(|row| self.definition.map_row(&row, self.converter.as_dyn())))
            }
        }
    }
}
