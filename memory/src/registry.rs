use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::builtin;
use crate::error::{DuplicateSpaceSnafu, Result, UnknownSpaceSnafu};
use crate::space::MemSpace;

/// Name-indexed table of memory spaces.
pub struct MemoryRegistry {
    spaces: RwLock<HashMap<String, Arc<MemSpace>>>,
}

impl MemoryRegistry {
    /// Registry preloaded with the built-in spaces.
    pub fn with_builtins() -> Result<Self> {
        let registry = Self { spaces: RwLock::new(HashMap::new()) };
        for space in builtin::all()? {
            registry.register(space)?;
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Result<Arc<MemSpace>> {
        match self.spaces.read().get(name) {
            Some(space) => Ok(Arc::clone(space)),
            None => UnknownSpaceSnafu { name }.fail(),
        }
    }

    /// Register a space. Re-registering an identical descriptor is a no-op.
    pub fn register(&self, space: MemSpace) -> Result<Arc<MemSpace>> {
        let mut spaces = self.spaces.write();
        if let Some(existing) = spaces.get(space.name()) {
            let same = existing.flags() == space.flags()
                && existing.alloc_rule() == space.alloc_rule()
                && existing.emit_style() == space.emit_style();
            if same {
                return Ok(Arc::clone(existing));
            }
            return DuplicateSpaceSnafu { name: space.name() }.fail();
        }
        tracing::debug!(space = %space.name(), flags = ?space.flags(), "registering memory space");
        let space = Arc::new(space);
        spaces.insert(space.name().to_string(), Arc::clone(&space));
        Ok(space)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.spaces.read().keys().cloned().collect();
        names.sort();
        names
    }
}

static REGISTRY: Lazy<MemoryRegistry> = Lazy::new(|| match MemoryRegistry::with_builtins() {
    Ok(registry) => registry,
    Err(err) => panic!("built-in memory spaces are inconsistent: {err}"),
});

/// Process-wide registry.
pub fn registry() -> &'static MemoryRegistry {
    &REGISTRY
}

/// Look up a space in the global registry.
pub fn get_space(name: &str) -> Result<Arc<MemSpace>> {
    REGISTRY.get(name)
}

/// Register a space in the global registry.
pub fn register(space: MemSpace) -> Result<Arc<MemSpace>> {
    REGISTRY.register(space)
}

/// The default space for allocations and parameters.
pub fn dram() -> Arc<MemSpace> {
    match REGISTRY.get("DRAM") {
        Ok(space) => space,
        Err(err) => panic!("DRAM is always registered: {err}"),
    }
}
