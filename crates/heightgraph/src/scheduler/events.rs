//! Event types and sinks for observing compute batches.
//!
//! This module defines [`ComputeEvent`] and a set of sinks to emit, collect, or forward
//! events while the scheduler runs a batch via [`crate::scheduler::run_batch`] or
//! [`crate::scheduler::ComputeWorker`].
use crossbeam_channel::Sender;

use crate::graph::NodeId;
use crate::heightmap::BackendTag;

/// Describes events emitted by the scheduler.
///
/// For each computed node the order is `ProgressUpdated` (before),
/// `NodeComputeStarted`, `NodeComputeFinished`, `NodeExecutionTime`, `ProgressUpdated`
/// (after). `ComputeAllFinished` is always the last event of a batch.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeEvent {
    /// Batch progress in percent, reported before and after each node.
    ProgressUpdated { node_id: NodeId, percent: f32 },
    NodeComputeStarted { node_id: NodeId },
    NodeComputeFinished { node_id: NodeId },
    /// Wall-clock time of the node compute and the backend that ran it.
    NodeExecutionTime {
        node_id: NodeId,
        ms: f64,
        backend: BackendTag,
    },
    /// Emitted once when the batch ends.
    ComputeAllFinished {
        /// `true` when the batch stopped on a cancel request.
        cancelled: bool,
        /// Number of nodes handled before the batch ended.
        processed: usize,
    },
}

impl ComputeEvent {
    /// The node the event refers to, if any.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            ComputeEvent::ProgressUpdated { node_id, .. }
            | ComputeEvent::NodeComputeStarted { node_id }
            | ComputeEvent::NodeComputeFinished { node_id }
            | ComputeEvent::NodeExecutionTime { node_id, .. } => Some(*node_id),
            ComputeEvent::ComputeAllFinished { .. } => None,
        }
    }

    pub fn is_batch_end(&self) -> bool {
        matches!(self, ComputeEvent::ComputeAllFinished { .. })
    }
}

/// A generic event sink that accepts [`ComputeEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: ComputeEvent);
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: ComputeEvent) {}
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    #[inline]
    fn send(&mut self, event: ComputeEvent) {
        (**self).send(event);
    }
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(ComputeEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(ComputeEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(ComputeEvent),
{
    #[inline]
    fn send(&mut self, event: ComputeEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects all events in a `Vec`.
#[derive(Default)]
pub struct VecSink {
    events: Vec<ComputeEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn into_inner(self) -> Vec<ComputeEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[ComputeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: ComputeEvent) {
        self.events.push(event);
    }
}

/// Forwards events into a channel drained on another thread. A disconnected receiver
/// silently drops events.
#[derive(Clone)]
pub struct ChannelSink {
    pub tx: Sender<ComputeEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<ComputeEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    #[inline]
    fn send(&mut self, event: ComputeEvent) {
        let _ = self.tx.send(event);
    }
}
