//! Operator library: descriptors, the registry and the built-in catalogue.
pub mod builtin;
pub mod descriptor;
pub mod registry;

pub use descriptor::{
    AttributeSpec, ComputeContext, ComputeFn, LayoutItem, OperatorDescriptor, PortSpec,
};
pub use registry::OperatorRegistry;
