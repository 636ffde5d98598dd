//! Detached node computations.
//!
//! [`ComputeJob`] captures everything one node compute reads, so it can run without
//! holding the graph; [`ComputeOutcome`] carries the result back to
//! [`Graph::apply_outcome`](super::Graph::apply_outcome).
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::attribute::Attributes;
use crate::data::PortData;
use crate::error::{Error, Result};
use crate::graph::{GraphConfig, NodeId};
use crate::heightmap::{BackendTag, GpuRuntime};
use crate::ops::{ComputeContext, OperatorDescriptor};

/// Snapshot of a node's inputs and attributes, ready to run off the graph lock.
pub struct ComputeJob {
    pub(crate) node_id: NodeId,
    pub(crate) descriptor: Arc<OperatorDescriptor>,
    pub(crate) attributes: Attributes,
    pub(crate) config: GraphConfig,
    pub(crate) inputs: Vec<Option<Arc<PortData>>>,
    pub(crate) gpu: Option<Arc<dyn GpuRuntime>>,
}

/// Result of running a [`ComputeJob`].
#[derive(Debug)]
pub struct ComputeOutcome {
    pub node_id: NodeId,
    pub elapsed_ms: f64,
    /// [`BackendTag::None`] when the compute failed.
    pub backend: BackendTag,
    pub(crate) outputs: Vec<Arc<PortData>>,
    pub(crate) error: Option<Error>,
}

impl ComputeOutcome {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

impl ComputeJob {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn type_name(&self) -> &str {
        &self.descriptor.type_name
    }

    /// Runs the operator. Failures, panics and outputs of the wrong shape are reported in
    /// the outcome as [`Error::ComputeFailed`], with every output reset to the empty value
    /// of its declared type. Outputs the operator did not write are empty too.
    pub fn run(&self) -> ComputeOutcome {
        let start = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| self.run_operator()))
            .unwrap_or_else(|payload| Err(Error::Other(panic_message(payload))))
            .and_then(|(outputs, backend)| Ok((self.complete(outputs)?, backend)));
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok((outputs, backend)) => ComputeOutcome {
                node_id: self.node_id,
                elapsed_ms,
                backend,
                outputs,
                error: None,
            },
            Err(e) => ComputeOutcome {
                node_id: self.node_id,
                elapsed_ms,
                backend: BackendTag::None,
                outputs: self.complete(Vec::new()).unwrap_or_default(),
                error: Some(Error::ComputeFailed {
                    node_id: self.node_id,
                    source: Box::new(e),
                }),
            },
        }
    }

    fn run_operator(&self) -> Result<(Vec<Option<PortData>>, BackendTag)> {
        let mut ctx = ComputeContext::new(
            self.node_id,
            &self.descriptor,
            &self.attributes,
            &self.config,
            &self.inputs,
            self.gpu.as_deref(),
        );
        (self.descriptor.compute)(&mut ctx)?;
        Ok(ctx.finish())
    }

    /// Fills unwritten outputs with empty values and checks field layouts.
    fn complete(&self, mut outputs: Vec<Option<PortData>>) -> Result<Vec<Arc<PortData>>> {
        outputs.resize(self.descriptor.outputs.len(), None);
        self.descriptor
            .outputs
            .iter()
            .zip(outputs)
            .map(|(spec, value)| {
                let value = match value {
                    Some(v) => v,
                    None => PortData::empty(spec.data_type, self.config.layout)?,
                };
                if let Some(field) = value.as_field() {
                    if *field.layout() != self.config.layout {
                        return Err(Error::InvalidShape(format!(
                            "output '{}' has layout {:?}, graph uses {:?}",
                            spec.label,
                            field.layout(),
                            self.config.layout
                        )));
                    }
                }
                Ok(Arc::new(value))
            })
            .collect()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("operator panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("operator panicked: {s}")
    } else {
        "operator panicked".to_string()
    }
}
