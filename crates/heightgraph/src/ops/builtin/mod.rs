//! Built-in operator catalogue.
//!
//! | Operator | Inputs | Outputs |
//! |---|---|---|
//! | `ConstantHeightmap` | | `out` |
//! | `GradientLinear` | | `out` |
//! | `Noise` | | `out` |
//! | `WhiteNoise` | | `out` |
//! | `RemapRange`, `Clamp`, `Invert`, `Smooth` | `in` | `out` |
//! | `Blend` | `input 1`, `input 2` | `out` |
//! | `SelectRange` | `in` | `mask` |
//! | `ApplyMask` | `in`, `mask` | `out` |
//! | `CloudRandom` | | `cloud` |
//! | `CloudToHeightmap` | `cloud` | `out` |
//!
//! Operators whose required input is unconnected produce nothing; the graph then stores
//! the empty value of each declared output type.
pub mod combine;
pub mod filters;
pub mod points;
pub mod primitives;

use super::registry::OperatorRegistry;

/// Registers every built-in operator.
pub fn register_all(registry: &mut OperatorRegistry) {
    for descriptor in [
        primitives::constant_heightmap(),
        primitives::gradient_linear(),
        primitives::noise(),
        primitives::white_noise(),
        filters::remap_range(),
        filters::clamp(),
        filters::invert(),
        filters::smooth(),
        combine::blend(),
        combine::select_range(),
        combine::apply_mask(),
        points::cloud_random(),
        points::cloud_to_heightmap(),
    ] {
        registry.register(descriptor);
    }
}
