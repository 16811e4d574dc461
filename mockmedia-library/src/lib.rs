//! # Content Tree Library
//!
//! The simulated backend's catalog: source definitions, the arena-interned
//! item graph, and the resolver that turns identity paths into nodes.
//!
//! ## Overview
//!
//! This crate manages:
//! - Authoring types ([`model::NodeDef`], [`model::ScriptedEvent`]) parsed
//!   from fixture JSON or built programmatically
//! - The [`loader::SourceLoader`] seam and its in-memory implementation
//! - The [`library::Library`] resolver: path resolution, lazy include
//!   merging with a never-evicted source cache, flag-filtered children,
//!   bounded-depth search, and the single-writer node mutation API

pub mod error;
pub mod library;
pub mod loader;
pub mod model;

pub use error::{LibraryError, Result};
pub use library::Library;
pub use loader::{MemoryLoader, SourceLoader};
pub use model::{
    parent_path, BrowseAction, ContentStyle, Node, NodeDef, NodeFilter, NodeId, PlaybackAction,
    ScriptedEvent, ROOT_MEDIA_ID, ROOT_PATH, TREE_PATH_SEPARATOR,
};
