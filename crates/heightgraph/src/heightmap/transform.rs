//! Per-tile compute dispatch.
//!
//! [`transform`] runs a tile kernel over every tile of a set of output heightmaps,
//! handing it the matching tiles of the input heightmaps. The kernel runs either
//! serially, on the rayon thread pool, or through an external [`GpuRuntime`].
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::{Heightmap, Tile};
use crate::error::{Error, Result};

/// How tile kernels are dispatched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformMode {
    CpuSerial,
    #[default]
    CpuParallel,
    Gpu,
}

/// Compute path that produced a node's last result.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendTag {
    #[default]
    None = 0,
    Cpu = 1,
    Vulkan = 2,
    OpenCl = 3,
}

impl BackendTag {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => BackendTag::Cpu,
            2 => BackendTag::Vulkan,
            3 => BackendTag::OpenCl,
            _ => BackendTag::None,
        }
    }

    /// Merges the tags of two dispatches made by one node; any GPU use wins.
    pub fn combine(self, other: BackendTag) -> BackendTag {
        self.max_by_rank(other)
    }

    fn max_by_rank(self, other: BackendTag) -> BackendTag {
        if other.as_u8() > self.as_u8() {
            other
        } else {
            self
        }
    }
}

/// GPU device binding implemented outside the core (OpenCL, Vulkan).
pub trait GpuRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Backend reported for nodes computed on this runtime.
    fn backend(&self) -> BackendTag;

    /// Runs the named kernel over whole heightmaps.
    fn dispatch(
        &self,
        kernel: &str,
        outputs: &mut [&mut Heightmap],
        inputs: &[&Heightmap],
    ) -> Result<()>;
}

/// GPU request attached to a transform: the runtime and the kernel to run on it.
#[derive(Clone, Copy)]
pub struct GpuKernel<'a> {
    pub runtime: &'a dyn GpuRuntime,
    pub kernel: &'a str,
}

/// Invokes `f(output_tiles, input_tiles)` once per tile position.
///
/// All heightmaps must share one layout, otherwise [`Error::InvalidShape`] is returned.
/// In [`TransformMode::Gpu`] the GPU kernel is tried first; a missing runtime or a
/// dispatch failure falls back to the CPU thread pool with a warning. Returns the
/// backend that actually ran.
pub fn transform<F>(
    outputs: &mut [&mut Heightmap],
    inputs: &[&Heightmap],
    mode: TransformMode,
    gpu: Option<GpuKernel<'_>>,
    f: F,
) -> Result<BackendTag>
where
    F: Fn(&mut [&mut Tile], &[&Tile]) + Send + Sync,
{
    let Some(reference) = outputs
        .first()
        .map(|h| *h.layout())
        .or_else(|| inputs.first().map(|h| *h.layout()))
    else {
        return Err(Error::InvalidShape("transform needs at least one heightmap".into()));
    };
    for hm in outputs.iter() {
        if *hm.layout() != reference {
            return Err(Error::InvalidShape(format!(
                "output layout {:?} differs from {:?}",
                hm.layout(),
                reference
            )));
        }
    }
    for hm in inputs {
        if *hm.layout() != reference {
            return Err(Error::InvalidShape(format!(
                "input layout {:?} differs from {:?}",
                hm.layout(),
                reference
            )));
        }
    }

    let mode = match (mode, gpu) {
        (TransformMode::Gpu, Some(req)) => match req.runtime.dispatch(req.kernel, outputs, inputs)
        {
            Ok(()) => return Ok(req.runtime.backend()),
            Err(e) => {
                warn!(
                    "GPU kernel '{}' failed on '{}': {}; falling back to CPU.",
                    req.kernel,
                    req.runtime.name(),
                    e
                );
                TransformMode::CpuParallel
            }
        },
        (TransformMode::Gpu, None) => {
            warn!("No GPU kernel available; falling back to CPU.");
            TransformMode::CpuParallel
        }
        (m, _) => m,
    };

    let tile_count = reference.tile_count();
    let mut out_groups: Vec<Vec<&mut Tile>> = (0..tile_count)
        .map(|_| Vec::with_capacity(outputs.len()))
        .collect();
    for hm in outputs.iter_mut() {
        for (k, tile) in hm.tiles_mut().iter_mut().enumerate() {
            out_groups[k].push(tile);
        }
    }
    let in_groups: Vec<Vec<&Tile>> = (0..tile_count)
        .map(|k| inputs.iter().map(|hm| &hm.tiles()[k]).collect())
        .collect();

    trace!("Dispatching {} tiles ({:?}).", tile_count, mode);
    match mode {
        TransformMode::CpuSerial => {
            for (mut outs, ins) in out_groups.into_iter().zip(in_groups) {
                f(&mut outs, &ins);
            }
        }
        _ => {
            out_groups
                .into_par_iter()
                .zip(in_groups.into_par_iter())
                .for_each(|(mut outs, ins)| f(&mut outs, &ins));
        }
    }
    Ok(BackendTag::Cpu)
}
