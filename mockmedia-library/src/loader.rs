//! Source loading seam between the library and whatever holds the fixture
//! definitions.
//!
//! The on-disk asset layer is out of scope; the library only needs a way to
//! turn a source path into a [`NodeDef`] tree. [`MemoryLoader`] is the
//! shipped implementation: test drivers register definitions (programmatic or
//! JSON) under the paths the trees reference.

use crate::error::{LibraryError, Result};
use crate::model::NodeDef;
use std::collections::HashMap;

/// Produces the root definition of a source file.
///
/// A missing source is not an error: implementations return `None` and the
/// library treats the include as an empty child set (after logging).
#[cfg_attr(test, mockall::automock)]
pub trait SourceLoader: Send {
    fn load_source(&self, path: &str) -> Option<NodeDef>;
}

/// Path-keyed in-memory source registry.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    sources: HashMap<String, NodeDef>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a programmatically built definition under `path`.
    pub fn insert(&mut self, path: impl Into<String>, def: NodeDef) -> Result<()> {
        let path = path.into();
        if self.sources.contains_key(&path) {
            return Err(LibraryError::DuplicateSource(path));
        }
        self.sources.insert(path, def);
        Ok(())
    }

    /// Parses a fixture JSON document and registers it under `path`.
    pub fn insert_json(&mut self, path: impl Into<String>, json: &str) -> Result<()> {
        let def: NodeDef = serde_json::from_str(json)?;
        self.insert(path, def)
    }
}

impl SourceLoader for MemoryLoader {
    fn load_source(&self, path: &str) -> Option<NodeDef> {
        self.sources.get(path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_source_is_none() {
        let loader = MemoryLoader::new();
        assert!(loader.load_source("media_items/unknown.json").is_none());
    }

    #[test]
    fn registered_source_is_returned() {
        let mut loader = MemoryLoader::new();
        loader
            .insert("tree.json", NodeDef::branch("tree.json", vec![]))
            .unwrap();
        let def = loader.load_source("tree.json").unwrap();
        assert_eq!(def.id, "tree.json");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut loader = MemoryLoader::new();
        loader.insert("a.json", NodeDef::new("a.json")).unwrap();
        let err = loader.insert("a.json", NodeDef::new("a.json"));
        assert!(matches!(err, Err(LibraryError::DuplicateSource(_))));
    }

    #[test]
    fn json_sources_parse() {
        let mut loader = MemoryLoader::new();
        loader
            .insert_json(
                "tree.json",
                r#"{ "id": "tree.json", "children": [ { "id": "a", "browsable": true } ] }"#,
            )
            .unwrap();
        let def = loader.load_source("tree.json").unwrap();
        assert_eq!(def.children.len(), 1);

        assert!(matches!(
            loader.insert_json("bad.json", "{ not json"),
            Err(LibraryError::Parse(_))
        ));
    }
}
