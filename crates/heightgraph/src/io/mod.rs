//! Persistence of graphs and projects as JSON.
pub mod document;
pub mod project;

pub use document::{json_from, json_to, GraphDocument, LinkRecord, NodeRecord, DEFAULT_LINK_TYPE};
pub use project::{ProjectDocument, SCHEMA_VERSION};
