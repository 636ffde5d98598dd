//! Project files: several graph documents plus per-view state, under a schema version.
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::document::GraphDocument;
use crate::error::{Error, Result};
use crate::graph::Graph;

/// Schema written by this crate. Documents with another major version are rejected.
pub const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphManagerRecord {
    /// Graph documents by graph id.
    pub graph_nodes: BTreeMap<String, GraphDocument>,
    /// Display order of the graph ids.
    pub id_order: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphTabsRecord {
    /// Opaque view state (zoom, scroll, selection) by graph id.
    pub graph_node_widgets: BTreeMap<String, Map<String, Value>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDocument {
    pub schema_version: String,
    pub graph_manager: GraphManagerRecord,
    pub graph_tabs_widget: GraphTabsRecord,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            graph_manager: GraphManagerRecord::default(),
            graph_tabs_widget: GraphTabsRecord::default(),
        }
    }
}

fn major(version: &str) -> Option<u64> {
    version.split('.').next()?.trim().parse().ok()
}

impl ProjectDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the document of `graph` under its id, appending the id to the order once.
    pub fn insert_graph(&mut self, graph: &Graph) {
        let id = graph.id().to_string();
        if !self.graph_manager.id_order.contains(&id) {
            self.graph_manager.id_order.push(id.clone());
        }
        self.graph_manager
            .graph_nodes
            .insert(id, GraphDocument::from_graph(graph, None));
    }

    pub fn graph(&self, id: &str) -> Option<&GraphDocument> {
        self.graph_manager.graph_nodes.get(id)
    }

    /// Graph ids in display order, followed by any id missing from the order.
    pub fn graph_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .graph_manager
            .id_order
            .iter()
            .filter(|id| self.graph_manager.graph_nodes.contains_key(*id))
            .map(|id| id.as_str())
            .collect();
        for id in self.graph_manager.graph_nodes.keys() {
            if !ids.contains(&id.as_str()) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn set_view_state(&mut self, id: &str, state: Map<String, Value>) {
        self.graph_tabs_widget
            .graph_node_widgets
            .insert(id.to_string(), state);
    }

    pub fn view_state(&self, id: &str) -> Option<&Map<String, Value>> {
        self.graph_tabs_widget.graph_node_widgets.get(id)
    }

    /// Parses a project, rejecting a schema with another major version. A missing
    /// version is read as the current one.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Err(Error::UnsupportedSchema("project must be an object".into()));
        };
        if let Some(version) = obj.get("schema_version") {
            let version = version.as_str().ok_or_else(|| {
                Error::UnsupportedSchema(format!("schema_version must be a string, got {version}"))
            })?;
            if major(version) != major(SCHEMA_VERSION) {
                return Err(Error::UnsupportedSchema(format!(
                    "schema version {version} (supported: {SCHEMA_VERSION})"
                )));
            }
        }
        Self::deserialize(value).map_err(|e| Error::UnsupportedSchema(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        info!("Saved project to '{}'.", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        let project = Self::from_value(&value)?;
        info!(
            "Loaded project '{}' with {} graphs.",
            path.display(),
            project.graph_manager.graph_nodes.len()
        );
        Ok(project)
    }
}
