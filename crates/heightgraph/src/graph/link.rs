use std::fmt;

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Directed edge `(from, from_port) -> (to, to_port)` between an OUT and an IN port.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub from: NodeId,
    pub from_port: String,
    pub to: NodeId,
    pub to_port: String,
}

impl Link {
    pub fn new(
        from: NodeId,
        from_port: impl Into<String>,
        to: NodeId,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from,
            from_port: from_port.into(),
            to,
            to_port: to_port.into(),
        }
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.from == id || self.to == id
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.from, self.from_port, self.to, self.to_port
        )
    }
}
