//! Undo/redo: reversible commands and the bounded stack that replays them.
pub mod command;
pub mod stack;

pub use command::{Command, CommandKind};
pub use stack::{UndoStack, DEFAULT_UNDO_LIMIT};
