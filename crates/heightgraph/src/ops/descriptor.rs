//! Operator descriptors and the compute context handed to operator functions.
//!
//! A descriptor is a plain record: ports, attribute defaults, a display order and a
//! compute function pointer. Nodes are concrete values parameterised by their
//! descriptor; there is no per-operator node type.
use std::sync::Arc;

use crate::attribute::{Attribute, Attributes};
use crate::data::{DataType, PortData};
use crate::error::{Error, Result};
use crate::graph::{GraphConfig, Node, NodeId, Port, PortDirection};
use crate::heightmap::transform::GpuKernel;
use crate::heightmap::{transform, BackendTag, GpuRuntime, Heightmap, HeightmapLayout, Tile};

/// Operator compute function.
pub type ComputeFn = fn(&mut ComputeContext<'_>) -> Result<()>;

/// A port declared by a descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
    pub label: String,
    pub data_type: DataType,
}

/// An attribute declared by a descriptor with its default value and bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSpec {
    pub key: String,
    pub default: Attribute,
}

/// An entry of a descriptor's display order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutItem {
    Attribute(String),
    Separator,
    Label(String),
}

/// Static description of an operator type.
#[derive(Clone)]
pub struct OperatorDescriptor {
    pub type_name: String,
    /// Slash-separated category path, e.g. `"Primitive/Coherent"`.
    pub category: String,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub attributes: Vec<AttributeSpec>,
    pub display_order: Vec<LayoutItem>,
    /// Same inputs and attributes always give bitwise-equal outputs.
    pub deterministic: bool,
    /// Name of the kernel to request from a [`GpuRuntime`], if the operator has one.
    pub gpu_kernel: Option<String>,
    pub compute: ComputeFn,
}

impl std::fmt::Debug for OperatorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorDescriptor")
            .field("type_name", &self.type_name)
            .field("category", &self.category)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl OperatorDescriptor {
    pub fn new(type_name: impl Into<String>, category: impl Into<String>, compute: ComputeFn) -> Self {
        Self {
            type_name: type_name.into(),
            category: category.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: Vec::new(),
            display_order: Vec::new(),
            deterministic: true,
            gpu_kernel: None,
            compute,
        }
    }

    pub fn input(mut self, label: impl Into<String>, data_type: DataType) -> Self {
        self.inputs.push(PortSpec {
            label: label.into(),
            data_type,
        });
        self
    }

    pub fn output(mut self, label: impl Into<String>, data_type: DataType) -> Self {
        self.outputs.push(PortSpec {
            label: label.into(),
            data_type,
        });
        self
    }

    /// Declares an attribute and appends it to the display order.
    pub fn attribute(mut self, key: impl Into<String>, default: Attribute) -> Self {
        let key = key.into();
        self.display_order.push(LayoutItem::Attribute(key.clone()));
        self.attributes.push(AttributeSpec { key, default });
        self
    }

    pub fn separator(mut self) -> Self {
        self.display_order.push(LayoutItem::Separator);
        self
    }

    pub fn label(mut self, text: impl Into<String>) -> Self {
        self.display_order.push(LayoutItem::Label(text.into()));
        self
    }

    pub fn gpu_kernel(mut self, kernel: impl Into<String>) -> Self {
        self.gpu_kernel = Some(kernel.into());
        self
    }

    pub fn non_deterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    pub fn input_index(&self, label: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.label == label)
    }

    pub fn output_index(&self, label: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.label == label)
    }

    /// Materialises ports (inputs first, then outputs) and default attributes on a fresh node.
    pub fn setup(&self, node: &mut Node) {
        let ports = self
            .inputs
            .iter()
            .map(|p| Port::new(&p.label, PortDirection::In, p.data_type))
            .chain(
                self.outputs
                    .iter()
                    .map(|p| Port::new(&p.label, PortDirection::Out, p.data_type)),
            )
            .collect();
        let mut attributes = Attributes::new();
        for spec in &self.attributes {
            attributes.insert(spec.key.clone(), spec.default.clone());
        }
        node.install(ports, attributes, self.outputs.len());
    }
}

/// Everything an operator may read, and the output slots it writes.
pub struct ComputeContext<'a> {
    node_id: NodeId,
    descriptor: &'a OperatorDescriptor,
    attributes: &'a Attributes,
    config: &'a GraphConfig,
    inputs: &'a [Option<Arc<PortData>>],
    outputs: Vec<Option<PortData>>,
    gpu: Option<&'a dyn GpuRuntime>,
    backend: BackendTag,
}

impl<'a> ComputeContext<'a> {
    pub fn new(
        node_id: NodeId,
        descriptor: &'a OperatorDescriptor,
        attributes: &'a Attributes,
        config: &'a GraphConfig,
        inputs: &'a [Option<Arc<PortData>>],
        gpu: Option<&'a dyn GpuRuntime>,
    ) -> Self {
        Self {
            node_id,
            descriptor,
            attributes,
            config,
            inputs,
            outputs: vec![None; descriptor.outputs.len()],
            gpu,
            backend: BackendTag::None,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn attributes(&self) -> &Attributes {
        self.attributes
    }

    pub fn config(&self) -> &GraphConfig {
        self.config
    }

    pub fn layout(&self) -> HeightmapLayout {
        self.config.layout
    }

    /// Value feeding the input `label`, or `None` when the port is unconnected or the
    /// upstream node has not produced anything yet.
    pub fn input(&self, label: &str) -> Result<Option<Arc<PortData>>> {
        let idx = self
            .descriptor
            .input_index(label)
            .ok_or_else(|| Error::NoSuchPort {
                node: self.node_id,
                port: label.to_string(),
            })?;
        Ok(self.inputs.get(idx).cloned().flatten())
    }

    /// A zero-filled heightmap in the graph layout.
    pub fn new_heightmap(&self) -> Result<Heightmap> {
        Heightmap::new(self.config.layout)
    }

    pub fn set_output(&mut self, label: &str, data: PortData) -> Result<()> {
        let idx = self
            .descriptor
            .output_index(label)
            .ok_or_else(|| Error::NoSuchPort {
                node: self.node_id,
                port: label.to_string(),
            })?;
        let declared = self.descriptor.outputs[idx].data_type;
        if data.data_type() != declared {
            return Err(Error::TypeMismatch(format!(
                "output '{}' of {} expects {}, got {}",
                label,
                self.descriptor.type_name,
                declared,
                data.data_type()
            )));
        }
        self.outputs[idx] = Some(data);
        Ok(())
    }

    /// Runs a tile kernel with the graph's transform mode and the operator's GPU kernel,
    /// recording the backend that ran.
    pub fn transform<F>(
        &mut self,
        outputs: &mut [&mut Heightmap],
        inputs: &[&Heightmap],
        f: F,
    ) -> Result<()>
    where
        F: Fn(&mut [&mut Tile], &[&Tile]) + Send + Sync,
    {
        let gpu = match (self.gpu, self.descriptor.gpu_kernel.as_deref()) {
            (Some(runtime), Some(kernel)) => Some(GpuKernel { runtime, kernel }),
            _ => None,
        };
        let tag = transform(outputs, inputs, self.config.transform_mode, gpu, f)?;
        self.backend = self.backend.combine(tag);
        Ok(())
    }

    /// Output values by port index and the backend used. Pure CPU operators that never
    /// called [`ComputeContext::transform`] report [`BackendTag::Cpu`].
    pub fn finish(self) -> (Vec<Option<PortData>>, BackendTag) {
        let backend = match self.backend {
            BackendTag::None => BackendTag::Cpu,
            b => b,
        };
        (self.outputs, backend)
    }
}
