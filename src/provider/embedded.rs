//! Scripts compiled into the binary.

use tracing::debug;

use super::{strip_sql_suffix, ScriptProvider, ScriptRegistry};

/// A provider over scripts embedded at compile time.
///
/// Resources are named `<prefix>.<Category>.<Action>.sql`; path separators
/// are treated as dots. Resources outside the prefix, or without the `.sql`
/// suffix, are skipped.
///
/// ```
/// use qail_script::{EmbeddedScriptProvider, ScriptProvider};
///
/// let provider = EmbeddedScriptProvider::new(
///     "app.sql",
///     [("app.sql.Queries.Count.sql", "SELECT COUNT(*) FROM resource")],
/// );
/// assert_eq!(provider.get("Queries.Count"), Some("SELECT COUNT(*) FROM resource"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedScriptProvider {
    registry: ScriptRegistry,
}

impl EmbeddedScriptProvider {
    pub fn new<I, N, T>(prefix: &str, resources: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: AsRef<str>,
        T: Into<String>,
    {
        let prefix = normalize(prefix);
        let mut registry = ScriptRegistry::default();

        for (resource, text) in resources {
            let resource = normalize(resource.as_ref());
            let rest = if prefix.is_empty() {
                Some(resource.as_str())
            } else {
                resource
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('.'))
            };
            match rest.and_then(strip_sql_suffix) {
                Some(name) => registry.register(name.to_string(), text.into()),
                None => debug!(%resource, %prefix, "skipping embedded resource"),
            }
        }

        debug!(scripts = registry.len(), "embedded scripts loaded");
        Self { registry }
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }
}

impl ScriptProvider for EmbeddedScriptProvider {
    fn get(&self, name: &str) -> Option<&str> {
        self.registry.get(name)
    }

    fn names(&self) -> Vec<&str> {
        self.registry.names()
    }
}

fn normalize(name: &str) -> String {
    name.replace(['/', '\\'], ".")
}

/// Embed `.sql` files from a directory and build an
/// [`EmbeddedScriptProvider`] over them.
///
/// `$dir` is resolved like `include_str!`, so it is usually built from
/// `env!("CARGO_MANIFEST_DIR")`. Files are listed relative to `$dir`.
///
/// ```rust,ignore
/// let provider = embed_scripts!(
///     "app",
///     concat!(env!("CARGO_MANIFEST_DIR"), "/sql"),
///     ["Commands/ResourceCommand.sql", "Queries/ResourceQuery.sql"]
/// );
/// assert!(provider.get("Queries.ResourceQuery").is_some());
/// ```
#[macro_export]
macro_rules! embed_scripts {
    ($prefix:literal, $dir:expr, [$($file:literal),* $(,)?]) => {
        $crate::EmbeddedScriptProvider::new(
            $prefix,
            [
                $(
                    (
                        concat!($prefix, ".", $file),
                        include_str!(concat!($dir, "/", $file)),
                    )
                ),*
            ],
        )
    };
}
