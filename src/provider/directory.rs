//! Scripts read from a directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::{strip_sql_suffix, ScriptProvider, ScriptRegistry};
use crate::error::{ScriptError, ScriptResult};

/// A provider over `*.sql` files below a root directory.
///
/// `<root>/Queries/ResourceQuery.sql` is registered as
/// `Queries.ResourceQuery`. The tree is read once, at construction.
#[derive(Debug, Clone)]
pub struct DirectoryScriptProvider {
    root: PathBuf,
    registry: ScriptRegistry,
}

impl DirectoryScriptProvider {
    pub fn new(root: impl AsRef<Path>) -> ScriptResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ScriptError::DirectoryNotFound(root));
        }

        let mut registry = ScriptRegistry::default();
        for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| ScriptError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = logical_name(&root, entry.path()) else {
                continue;
            };
            let text = fs::read_to_string(entry.path())?;
            debug!(%name, path = %entry.path().display(), "script loaded");
            registry.register(name, text);
        }

        debug!(root = %root.display(), scripts = registry.len(), "script directory scanned");
        Ok(Self { root, registry })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }
}

impl ScriptProvider for DirectoryScriptProvider {
    fn get(&self, name: &str) -> Option<&str> {
        self.registry.get(name)
    }

    fn names(&self) -> Vec<&str> {
        self.registry.names()
    }
}

/// `Queries/Sub/Name.sql` → `Queries.Sub.Name`.
fn logical_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?
        .join(".");
    strip_sql_suffix(&joined).map(str::to_string)
}
