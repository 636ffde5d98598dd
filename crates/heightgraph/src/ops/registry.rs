//! Operator registry and the process-wide instance.
//!
//! - Build registries with [`OperatorRegistry::new`] / [`OperatorRegistry::builtin`].
//! - Install the process-wide registry with [`init`] or [`install`]; release it with
//!   [`teardown`].
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::builtin;
use super::descriptor::OperatorDescriptor;
use crate::error::{Error, Result};

/// Maps operator type names to their descriptors.
#[non_exhaustive]
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    descriptors: HashMap<String, Arc<OperatorDescriptor>>,
}

impl OperatorRegistry {
    /// Creates a new, empty [`OperatorRegistry`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in operator.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registers a descriptor, replacing any previous one with the same type name.
    pub fn register(&mut self, descriptor: OperatorDescriptor) {
        debug!("Registering operator '{}'.", descriptor.type_name);
        self.descriptors
            .insert(descriptor.type_name.clone(), Arc::new(descriptor));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.descriptors.contains_key(type_name)
    }

    /// Looks up a descriptor, failing with [`Error::UnknownOperator`].
    pub fn get(&self, type_name: &str) -> Result<Arc<OperatorDescriptor>> {
        self.descriptors
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::UnknownOperator {
                type_name: type_name.to_string(),
            })
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Registered type names under a category prefix, sorted.
    pub fn in_category(&self, prefix: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .descriptors
            .values()
            .filter(|d| d.category.starts_with(prefix))
            .map(|d| d.type_name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

static GLOBAL: RwLock<Option<Arc<OperatorRegistry>>> = parking_lot::const_rwlock(None);

/// Installs the built-in registry as the process-wide registry and returns it.
pub fn init() -> Arc<OperatorRegistry> {
    install(OperatorRegistry::builtin())
}

/// Installs `registry` as the process-wide registry.
pub fn install(registry: OperatorRegistry) -> Arc<OperatorRegistry> {
    let registry = Arc::new(registry);
    info!("Operator registry initialised with {} operators.", registry.len());
    *GLOBAL.write() = Some(registry.clone());
    registry
}

/// The process-wide registry. Installs the built-in one on first use.
pub fn global() -> Arc<OperatorRegistry> {
    if let Some(registry) = GLOBAL.read().as_ref() {
        return registry.clone();
    }
    let mut slot = GLOBAL.write();
    match slot.as_ref() {
        Some(registry) => registry.clone(),
        None => {
            let registry = Arc::new(OperatorRegistry::builtin());
            info!("Operator registry initialised with {} operators.", registry.len());
            *slot = Some(registry.clone());
            registry
        }
    }
}

/// Drops the process-wide registry. Graphs keep the registry they were created with.
pub fn teardown() {
    if GLOBAL.write().take().is_some() {
        debug!("Operator registry released.");
    }
}
