//! Script providers: where named SQL scripts come from.
//!
//! A provider maps a logical name such as `Queries.ResourceQuery` to the
//! script text. Two stores ship with the crate:
//!
//! - [`EmbeddedScriptProvider`]: scripts compiled into the binary, usually
//!   through [`embed_scripts!`](crate::embed_scripts).
//! - [`DirectoryScriptProvider`]: `*.sql` files under a directory tree.
//!
//! Both are read once at construction and never change afterwards.

mod directory;
mod embedded;

pub use directory::DirectoryScriptProvider;
pub use embedded::EmbeddedScriptProvider;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

/// A read-only store of scripts keyed by logical name.
///
/// A missing name is not an error at this level; callers decide.
pub trait ScriptProvider: Send + Sync {
    /// The script registered under `name`, if any.
    fn get(&self, name: &str) -> Option<&str>;

    /// Every registered name, sorted.
    fn names(&self) -> Vec<&str>;
}

impl<P: ScriptProvider + ?Sized> ScriptProvider for &P {
    fn get(&self, name: &str) -> Option<&str> {
        (**self).get(name)
    }

    fn names(&self) -> Vec<&str> {
        (**self).names()
    }
}

impl<P: ScriptProvider + ?Sized> ScriptProvider for Box<P> {
    fn get(&self, name: &str) -> Option<&str> {
        (**self).get(name)
    }

    fn names(&self) -> Vec<&str> {
        (**self).names()
    }
}

impl<P: ScriptProvider + ?Sized> ScriptProvider for Arc<P> {
    fn get(&self, name: &str) -> Option<&str> {
        (**self).get(name)
    }

    fn names(&self) -> Vec<&str> {
        (**self).names()
    }
}

/// The name → text map behind both stores. Last write wins.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptRegistry {
    scripts: HashMap<String, String>,
}

impl ScriptRegistry {
    pub(crate) fn register(&mut self, name: String, text: String) {
        if self.scripts.insert(name.clone(), text).is_some() {
            debug!(%name, "script registered twice, keeping the last one");
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).map(String::as_str)
    }

    pub(crate) fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scripts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.scripts.len()
    }
}

/// Strip a trailing `.sql`, ignoring case.
pub(crate) fn strip_sql_suffix(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(4)?;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (stem, ext) = name.split_at(split);
    (ext.eq_ignore_ascii_case(".sql") && !stem.is_empty()).then_some(stem)
}
