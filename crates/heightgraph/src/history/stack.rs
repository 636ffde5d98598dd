use std::collections::VecDeque;

use tracing::{debug, trace};

use super::command::Command;
use crate::error::Result;
use crate::graph::{Graph, NodeId};

pub const DEFAULT_UNDO_LIMIT: usize = 50;

/// Bounded history of committed commands with a cursor.
///
/// Entries below the cursor can be undone, entries at or above it redone. Pushing drops
/// the redo tail; past the limit the oldest entry is discarded.
#[derive(Debug)]
pub struct UndoStack {
    commands: VecDeque<Command>,
    cursor: usize,
    limit: usize,
    replaying: bool,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl UndoStack {
    pub fn new(limit: usize) -> Self {
        Self {
            commands: VecDeque::new(),
            cursor: 0,
            limit: limit.max(1),
            replaying: false,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// `true` while an undo or redo is being applied; pushes are ignored meanwhile.
    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    /// The entry the next undo would revert.
    pub fn top(&self) -> Option<&Command> {
        self.cursor.checked_sub(1).and_then(|k| self.commands.get(k))
    }

    pub fn push(&mut self, cmd: Command) {
        if self.replaying {
            trace!("Ignoring {:?} pushed during replay.", cmd.kind());
            return;
        }
        self.commands.truncate(self.cursor);
        if let Some(top) = self.commands.back_mut() {
            if top.try_merge(&cmd) {
                trace!("Merged {:?} into the top entry.", cmd.kind());
                return;
            }
        }
        self.commands.push_back(cmd);
        if self.commands.len() > self.limit {
            self.commands.pop_front();
        }
        self.cursor = self.commands.len();
    }

    /// Reverts the top entry. Returns `None` when there is nothing to undo, otherwise the
    /// nodes whose outputs are now stale. On failure the cursor is left unchanged.
    pub fn undo(&mut self, graph: &mut Graph) -> Result<Option<Vec<NodeId>>> {
        let Some(index) = self.cursor.checked_sub(1) else {
            return Ok(None);
        };
        self.replaying = true;
        let result = self.commands[index].undo(graph);
        self.replaying = false;
        let stale = result?;
        self.cursor = index;
        debug!("Undid {:?}.", self.commands[index].kind());
        Ok(Some(stale))
    }

    /// Re-applies the entry at the cursor. Returns `None` when there is nothing to redo.
    pub fn redo(&mut self, graph: &mut Graph) -> Result<Option<Vec<NodeId>>> {
        if !self.can_redo() {
            return Ok(None);
        }
        let index = self.cursor;
        self.replaying = true;
        let result = self.commands[index].redo(graph);
        self.replaying = false;
        let stale = result?;
        self.cursor = index + 1;
        debug!("Redid {:?}.", self.commands[index].kind());
        Ok(Some(stale))
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }
}
