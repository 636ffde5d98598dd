#![forbid(unsafe_code)]
//! heightgraph: node-graph compute engine for procedural terrain.
//!
//! Modules:
//! - heightmap: tiled scalar fields, per-tile seeding and the CPU/GPU transform dispatch
//! - ops: operator descriptors, the registry and the built-in catalogue
//! - graph: nodes, typed links, topological ordering and dirty tracking
//! - scheduler: background batch execution with progress events and cancellation
//! - history: undoable commands and the bounded undo stack
//! - controller: user intents tying graph, history and scheduler together
//! - io: graph documents and project files
pub mod attribute;
pub mod cloud;
pub mod controller;
pub mod data;
pub mod error;
pub mod graph;
pub mod heightmap;
pub mod history;
pub mod io;
pub mod ops;
pub mod scheduler;

/// Convenient re-exports for common types. Import with `use heightgraph::prelude::*;`.
pub mod prelude {
    pub use crate::attribute::{AttrValue, Attribute, AttributeKind, Attributes};
    pub use crate::cloud::{Cloud, CloudPoint};
    pub use crate::controller::{BusyPolicy, ControllerConfig, GraphController};
    pub use crate::data::{DataType, PortData};
    pub use crate::error::{Error, Result};
    pub use crate::graph::{Graph, GraphConfig, GraphSnapshot, Link, Node, NodeId, Port, PortDirection};
    pub use crate::heightmap::{
        BBox, BackendTag, GpuRuntime, Heightmap, HeightmapLayout, Tile, TileId, TransformMode,
    };
    pub use crate::history::{Command, UndoStack};
    pub use crate::io::{json_from, json_to, GraphDocument, ProjectDocument};
    pub use crate::ops::{ComputeContext, OperatorDescriptor, OperatorRegistry};
    pub use crate::scheduler::{
        run_batch, BatchReport, CancelToken, ChannelSink, ComputeEvent, ComputeWorker, EventSink,
        FnSink, VecSink,
    };
}
