//! Execution scheduler: runs a sorted node list, reports progress and honours cancellation.
//!
//! Cancellation is polled between nodes only; a node always runs to completion. A node
//! whose compute fails gets empty outputs and the batch continues.
pub mod events;
pub mod worker;

pub use events::{ChannelSink, ComputeEvent, EventSink, FnSink, VecSink};
pub use worker::{run_batch, BatchReport, CancelToken, ComputeWorker, WorkerHandle};
