//! Batch execution of a pre-sorted node list.
//!
//! [`run_batch`] runs on the calling thread against a borrowed graph; [`ComputeWorker`]
//! runs the same loop on a background thread against a weak graph handle. In both,
//! the graph is only locked to prepare a node and to store its outcome, never while an
//! operator computes.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::events::{ComputeEvent, EventSink};
use crate::error::{Error, Result};
use crate::graph::{ComputeJob, Graph, NodeId};

/// Cancellation flag shared between the worker and any other thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of a finished batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Nodes handled, computed or skipped.
    pub processed: usize,
    /// Nodes whose compute function ran.
    pub computed: Vec<NodeId>,
    /// Nodes whose compute failed.
    pub failed: Vec<NodeId>,
    pub cancelled: bool,
}

/// Access to the graph for the duration of one closure. `None` means the graph is gone.
trait GraphAccess {
    fn with<R>(&mut self, f: impl FnOnce(&mut Graph) -> R) -> Option<R>;
}

impl GraphAccess for &mut Graph {
    fn with<R>(&mut self, f: impl FnOnce(&mut Graph) -> R) -> Option<R> {
        Some(f(&mut **self))
    }
}

impl GraphAccess for Weak<Mutex<Graph>> {
    fn with<R>(&mut self, f: impl FnOnce(&mut Graph) -> R) -> Option<R> {
        let graph = self.upgrade()?;
        let mut guard = graph.lock();
        Some(f(&mut *guard))
    }
}

/// Runs `ids` (already in evaluation order) against `graph` on the calling thread.
pub fn run_batch<S>(graph: &mut Graph, ids: &[NodeId], cancel: &CancelToken, sink: &mut S) -> BatchReport
where
    S: EventSink + ?Sized,
{
    run_sorted(&mut &mut *graph, ids, cancel, sink)
}

enum Step {
    Compute(ComputeJob),
    Skip,
}

fn run_sorted<G, S>(graph: &mut G, ids: &[NodeId], cancel: &CancelToken, sink: &mut S) -> BatchReport
where
    G: GraphAccess,
    S: EventSink + ?Sized,
{
    let total = ids.len();
    let percent = |k: usize| 100.0 * k as f32 / total.max(1) as f32;
    let mut report = BatchReport::default();
    if total > 0 {
        info!("Compute batch started: {} nodes.", total);
    }

    for (i, &node_id) in ids.iter().enumerate() {
        if cancel.is_cancelled() {
            return finish_cancelled(report, sink);
        }
        sink.send(ComputeEvent::ProgressUpdated {
            node_id,
            percent: percent(i),
        });

        let step = graph.with(|g| -> Result<Step> {
            let node = g.require_node_mut(node_id)?;
            if !node.dirty && node.has_outputs() {
                return Ok(Step::Skip);
            }
            node.dirty = true;
            g.prepare_compute(node_id).map(Step::Compute)
        });
        let job = match step {
            None => return finish_cancelled(report, sink),
            Some(Ok(Step::Compute(job))) => job,
            Some(Ok(Step::Skip)) => {
                debug!("Node {} is clean, skipping.", node_id);
                report.processed += 1;
                sink.send(ComputeEvent::ProgressUpdated {
                    node_id,
                    percent: percent(i + 1),
                });
                continue;
            }
            Some(Err(e)) => {
                warn!("Skipping node {}: {}", node_id, e);
                report.processed += 1;
                sink.send(ComputeEvent::ProgressUpdated {
                    node_id,
                    percent: percent(i + 1),
                });
                continue;
            }
        };

        sink.send(ComputeEvent::NodeComputeStarted { node_id });
        let outcome = job.run();
        let (ms, backend) = (outcome.elapsed_ms, outcome.backend);
        let keep_dirty = cancel.is_cancelled();
        let failed = outcome.is_failure();
        let stored = graph.with(|g| g.apply_outcome(outcome, keep_dirty));

        report.processed += 1;
        report.computed.push(node_id);
        if failed {
            report.failed.push(node_id);
        }
        sink.send(ComputeEvent::NodeComputeFinished { node_id });
        sink.send(ComputeEvent::NodeExecutionTime {
            node_id,
            ms,
            backend,
        });
        sink.send(ComputeEvent::ProgressUpdated {
            node_id,
            percent: percent(i + 1),
        });
        if stored.is_none() {
            return finish_cancelled(report, sink);
        }
    }

    sink.send(ComputeEvent::ComputeAllFinished {
        cancelled: false,
        processed: report.processed,
    });
    if total > 0 {
        info!(
            "Compute batch finished: {} computed, {} failed.",
            report.computed.len(),
            report.failed.len()
        );
    }
    report
}

fn finish_cancelled<S: EventSink + ?Sized>(mut report: BatchReport, sink: &mut S) -> BatchReport {
    info!("Compute batch cancelled after {} nodes.", report.processed);
    report.cancelled = true;
    sink.send(ComputeEvent::ComputeAllFinished {
        cancelled: true,
        processed: report.processed,
    });
    report
}

/// Background executor of one batch.
pub struct ComputeWorker;

impl ComputeWorker {
    /// Starts a thread running `ids` against `graph`. The thread holds only a weak
    /// reference; a dropped graph is observed as cancellation.
    pub fn spawn<S>(graph: Weak<Mutex<Graph>>, ids: Vec<NodeId>, mut sink: S) -> Result<WorkerHandle>
    where
        S: EventSink + Send + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let join = std::thread::Builder::new()
            .name("heightgraph-worker".into())
            .spawn(move || {
                let mut graph = graph;
                run_sorted(&mut graph, &ids, &token, &mut sink)
            })?;
        Ok(WorkerHandle {
            cancel,
            join: Some(join),
        })
    }
}

/// Handle to a running [`ComputeWorker`]. Dropping it cancels and joins the thread.
pub struct WorkerHandle {
    cancel: CancelToken,
    join: Option<JoinHandle<BatchReport>>,
}

impl WorkerHandle {
    /// Requests cancellation; the current node still runs to completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Waits for the batch to end.
    pub fn join(mut self) -> Result<BatchReport> {
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<BatchReport> {
        match self.join.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Other("compute worker panicked".into())),
            None => Ok(BatchReport::default()),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.cancel.cancel();
            let _ = self.join_inner();
        }
    }
}
