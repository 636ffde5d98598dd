//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. Variants cover
//! graph validation failures, heightmap shape mismatches, document schema problems,
//! scheduler state, IO and generic errors.
use thiserror::Error;

use crate::graph::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown operator '{type_name}'")]
    UnknownOperator { type_name: String },

    #[error("no such node {id}")]
    NoSuchNode { id: NodeId },

    #[error("node {node} has no port '{port}'")]
    NoSuchPort { node: NodeId, port: String },

    #[error("no link {0}")]
    NoSuchLink(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("input port '{port}' of node {node} is already connected")]
    PortOccupied { node: NodeId, port: String },

    #[error("link {0} would close a cycle")]
    WouldCycle(String),

    #[error("graph is not acyclic")]
    NotAcyclic,

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("node {node} has no attribute '{key}'")]
    NoSuchAttribute { node: NodeId, key: String },

    #[error("invalid value for attribute '{key}': {reason}")]
    InvalidAttribute { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported schema: {0}")]
    UnsupportedSchema(String),

    #[error("a compute batch is running")]
    Busy,

    #[error("compute failed on node {node_id}: {source}")]
    ComputeFailed {
        node_id: NodeId,
        #[source]
        source: Box<Error>,
    },

    #[error("cancel requested")]
    CancelRequested,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns `true` for the validation errors that controller intents report
    /// back to the caller without mutating anything.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::TypeMismatch(_)
                | Error::PortOccupied { .. }
                | Error::WouldCycle(_)
                | Error::NoSuchPort { .. }
                | Error::NoSuchNode { .. }
                | Error::Busy
        )
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}
