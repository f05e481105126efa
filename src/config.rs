//! Configuration: default connections, providers and converter.
//!
//! Actions resolve what they were not given explicitly through a
//! [`Configuration`]. Either pass one to the action, or fill in the
//! process-wide instance returned by [`Configuration::global`].
//!
//! ```rust,ignore
//! let db = Database::connect("sqlite::memory:").await?;
//! Configuration::global().update(|config| {
//!     config.query_connection = Some(db.clone());
//!     config.command_connection = Some(db);
//! });
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::debug;

use crate::convert::{FieldNameConverter, SharedConverter};
use crate::engine::Database;
use crate::error::{ScriptError, ScriptResult};
use crate::provider::{DirectoryScriptProvider, ScriptProvider};

/// Environment variable overriding [`Settings::database_url`].
pub const DATABASE_URL_ENV: &str = "QAIL_DATABASE_URL";

/// Defaults consulted by actions.
#[derive(Clone, Default)]
pub struct Configuration {
    pub query_connection: Option<Database>,
    pub command_connection: Option<Database>,
    pub query_provider: Option<Arc<dyn ScriptProvider>>,
    pub command_provider: Option<Arc<dyn ScriptProvider>>,
    pub converter: SharedConverter,
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("query_connection", &self.query_connection)
            .field("command_connection", &self.command_connection)
            .field("query_provider", &self.query_provider.is_some())
            .field("command_provider", &self.command_provider.is_some())
            .finish_non_exhaustive()
    }
}

static GLOBAL: Lazy<GlobalConfiguration> = Lazy::new(|| GlobalConfiguration {
    inner: RwLock::new(Configuration::default()),
});

impl Configuration {
    /// Create a new configuration builder
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// The process-wide configuration, created empty on first access.
    pub fn global() -> &'static GlobalConfiguration {
        &GLOBAL
    }

    /// Connect and load scripts as described by `settings`.
    ///
    /// Queries and commands share one pool unless their URLs differ.
    pub async fn from_settings(settings: &Settings) -> ScriptResult<Self> {
        let query_url = settings.query_url()?;
        let command_url = settings.command_url()?;

        let query_connection = Database::connect_with(query_url, &settings.pool).await?;
        let command_connection = if command_url == query_url {
            query_connection.clone()
        } else {
            Database::connect_with(command_url, &settings.pool).await?
        };

        let mut builder = Self::builder()
            .query_connection(query_connection)
            .command_connection(command_connection);
        if let Some(dir) = &settings.scripts_dir {
            builder = builder.provider(DirectoryScriptProvider::new(dir)?);
        }
        Ok(builder.build())
    }
}

/// Builder for [`Configuration`]
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    config: Configuration,
}

impl ConfigurationBuilder {
    /// Set the connection used by queries
    pub fn query_connection(mut self, db: Database) -> Self {
        self.config.query_connection = Some(db);
        self
    }

    /// Set the connection used by commands
    pub fn command_connection(mut self, db: Database) -> Self {
        self.config.command_connection = Some(db);
        self
    }

    /// Use one connection for queries and commands
    pub fn connection(self, db: Database) -> Self {
        self.query_connection(db.clone()).command_connection(db)
    }

    /// Set the provider for `Queries.*` scripts
    pub fn query_provider(mut self, provider: impl ScriptProvider + 'static) -> Self {
        self.config.query_provider = Some(Arc::new(provider));
        self
    }

    /// Set the provider for `Commands.*` scripts
    pub fn command_provider(mut self, provider: impl ScriptProvider + 'static) -> Self {
        self.config.command_provider = Some(Arc::new(provider));
        self
    }

    /// Use one provider for queries and commands
    pub fn provider(self, provider: impl ScriptProvider + 'static) -> Self {
        self.shared_provider(Arc::new(provider))
    }

    /// Use one already shared provider for queries and commands
    pub fn shared_provider(mut self, provider: Arc<dyn ScriptProvider>) -> Self {
        self.config.query_provider = Some(provider.clone());
        self.config.command_provider = Some(provider);
        self
    }

    /// Set the field name converter
    pub fn converter(mut self, converter: impl FieldNameConverter + 'static) -> Self {
        self.config.converter = SharedConverter::new(converter);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Configuration {
        self.config
    }
}

/// The process-wide configuration.
///
/// Single setters replace one slot each. Use [`update`](Self::update) when
/// several slots must change together.
pub struct GlobalConfiguration {
    inner: RwLock<Configuration>,
}

impl GlobalConfiguration {
    fn read<T>(&self, f: impl FnOnce(&Configuration) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// A copy of every slot as it is now.
    pub fn snapshot(&self) -> Configuration {
        self.read(Configuration::clone)
    }

    /// Change several slots under one lock.
    pub fn update(&self, f: impl FnOnce(&mut Configuration)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    /// Replace the whole configuration.
    pub fn replace(&self, config: Configuration) {
        self.update(|current| *current = config);
    }

    pub fn default_query_connection(&self) -> Option<Database> {
        self.read(|c| c.query_connection.clone())
    }

    pub fn set_default_query_connection(&self, db: Option<Database>) {
        self.update(|c| c.query_connection = db);
    }

    pub fn default_command_connection(&self) -> Option<Database> {
        self.read(|c| c.command_connection.clone())
    }

    pub fn set_default_command_connection(&self, db: Option<Database>) {
        self.update(|c| c.command_connection = db);
    }

    pub fn default_query_provider(&self) -> Option<Arc<dyn ScriptProvider>> {
        self.read(|c| c.query_provider.clone())
    }

    pub fn set_default_query_provider(&self, provider: Option<Arc<dyn ScriptProvider>>) {
        self.update(|c| c.query_provider = provider);
    }

    pub fn default_command_provider(&self) -> Option<Arc<dyn ScriptProvider>> {
        self.read(|c| c.command_provider.clone())
    }

    pub fn set_default_command_provider(&self, provider: Option<Arc<dyn ScriptProvider>>) {
        self.update(|c| c.command_provider = provider);
    }

    pub fn field_name_converter(&self) -> SharedConverter {
        self.read(|c| c.converter.clone())
    }

    pub fn set_field_name_converter(&self, converter: impl FieldNameConverter + 'static) {
        let converter = SharedConverter::new(converter);
        self.update(|c| c.converter = converter);
    }
}

/// Settings file contents.
///
/// ```toml
/// database_url = "sqlite://app.db"
/// scripts_dir = "sql"
///
/// [pool]
/// max_connections = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Connection URL used for both queries and commands.
    pub database_url: Option<String>,
    /// Overrides `database_url` for queries.
    pub query_database_url: Option<String>,
    /// Overrides `database_url` for commands.
    pub command_database_url: Option<String>,
    /// Root of a script directory.
    pub scripts_dir: Option<PathBuf>,
    pub pool: PoolSettings,
}

impl Settings {
    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ScriptResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading settings");
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ScriptResult<Self> {
        toml::from_str(text).map_err(|e| ScriptError::Config(e.to_string()))
    }

    /// `<config dir>/qail-script/config.toml`, if the platform has a
    /// config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("qail-script").join("config.toml"))
    }

    /// Apply `QAIL_DATABASE_URL` when it is set.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            self.database_url = Some(url);
        }
        self
    }

    fn query_url(&self) -> ScriptResult<&str> {
        self.query_database_url
            .as_deref()
            .or(self.database_url.as_deref())
            .ok_or(ScriptError::ConfigurationMissing("query database URL"))
    }

    fn command_url(&self) -> ScriptResult<&str> {
        self.command_database_url
            .as_deref()
            .or(self.database_url.as_deref())
            .ok_or(ScriptError::ConfigurationMissing("command database URL"))
    }
}

/// Connection pool limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout_secs: 30,
            idle_timeout_secs: None,
        }
    }
}

impl PoolSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EmbeddedScriptProvider;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_settings_from_toml() {
        let settings = Settings::from_toml(
            r#"
            database_url = "sqlite::memory:"
            scripts_dir = "sql"

            [pool]
            max_connections = 2
            "#,
        )
        .unwrap();

        assert_eq!(settings.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(settings.scripts_dir, Some(PathBuf::from("sql")));
        assert_eq!(
            settings.pool,
            PoolSettings {
                max_connections: 2,
                acquire_timeout_secs: 30,
                idle_timeout_secs: None,
            }
        );
    }

    #[test]
    fn test_settings_url_resolution() {
        let settings = Settings {
            database_url: Some("sqlite://a.db".into()),
            command_database_url: Some("sqlite://b.db".into()),
            ..Settings::default()
        };
        assert_eq!(settings.query_url().unwrap(), "sqlite://a.db");
        assert_eq!(settings.command_url().unwrap(), "sqlite://b.db");

        let err = Settings::default().query_url().unwrap_err();
        assert!(matches!(err, ScriptError::ConfigurationMissing(_)));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Settings::from_toml("database_url = ").unwrap_err();
        assert!(matches!(err, ScriptError::Config(_)));
    }

    #[test]
    fn test_builder_shares_provider() {
        let config = Configuration::builder()
            .provider(EmbeddedScriptProvider::new("", [("Queries.A.sql", "SELECT 1")]))
            .converter(|name: &str| name.to_lowercase())
            .build();

        let query = config.query_provider.as_ref().unwrap();
        let command = config.command_provider.as_ref().unwrap();
        assert!(Arc::ptr_eq(query, command));
        assert_eq!(query.get("Queries.A"), Some("SELECT 1"));
        assert_eq!(config.converter.convert("SomeValue"), "somevalue");
        assert!(config.query_connection.is_none());
    }

    #[tokio::test]
    async fn test_from_settings_reuses_pool_for_same_url() {
        let settings = Settings {
            database_url: Some("sqlite::memory:".into()),
            ..Settings::default()
        };
        let config = Configuration::from_settings(&settings).await.unwrap();
        let query = config.query_connection.unwrap();
        let command = config.command_connection.unwrap();

        command
            .execute("CREATE TABLE shared (id INTEGER)", vec![])
            .await
            .unwrap();
        let row = query
            .fetch_optional("SELECT COUNT(*) AS n FROM shared", vec![])
            .await
            .unwrap();
        assert!(row.is_some());
        assert!(config.query_provider.is_none());
    }
}
