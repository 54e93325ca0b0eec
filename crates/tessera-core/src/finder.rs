//! Sources of module specs
//!
//! A loader asks its finders, in order, for the spec of an identifier. The
//! first finder that knows the identifier wins; `Ok(None)` means "not mine"
//! and lets the next finder answer.

use crate::error::Result;
use crate::identifier::ModuleIdentifier;
use crate::spec::ModuleSpec;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Produces module specs on demand
pub trait ModuleFinder: Send + Sync {
    /// Spec for `identifier`, `None` if this finder does not know it
    fn find_module_spec(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>>;
}

impl<F: ModuleFinder + ?Sized> ModuleFinder for Arc<F> {
    fn find_module_spec(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>> {
        (**self).find_module_spec(identifier)
    }
}

/// In-memory spec table
///
/// Specs may be added or replaced at any time, including while a loader that
/// uses the table is resolving other modules. Already linked modules are not
/// affected.
#[derive(Debug, Default)]
pub struct ModuleSpecTable {
    specs: RwLock<HashMap<ModuleIdentifier, ModuleSpec>>,
}

impl ModuleSpecTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `spec`, returning the spec it replaced
    pub fn add_module_spec(&self, spec: ModuleSpec) -> Option<ModuleSpec> {
        self.specs.write().insert(spec.identifier().clone(), spec)
    }

    /// Forget the spec for `identifier`
    pub fn remove_module_spec(&self, identifier: &ModuleIdentifier) -> Option<ModuleSpec> {
        self.specs.write().remove(identifier)
    }

    pub fn contains(&self, identifier: &ModuleIdentifier) -> bool {
        self.specs.read().contains_key(identifier)
    }

    /// Registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<ModuleIdentifier> {
        let mut ids: Vec<_> = self.specs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.specs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.read().is_empty()
    }
}

impl ModuleFinder for ModuleSpecTable {
    fn find_module_spec(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>> {
        Ok(self.specs.read().get(identifier).cloned())
    }
}
