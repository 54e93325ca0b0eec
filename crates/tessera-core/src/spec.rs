//! Module specifications
//!
//! A [`ModuleSpec`] is the immutable declaration a module is linked from:
//! its identifier, its named resource roots, its dependency edges in lookup
//! priority order, and the filter over what its own roots export. Specs are
//! accumulated in a [`ModuleSpecBuilder`] and frozen by
//! [`ModuleSpecBuilder::create`], which is also where malformed declarations
//! are rejected. Nothing here performs I/O.

use crate::error::{DeclarationKind, ModuleError, Result};
use crate::filter::{FilterAction, PathFilter, PathFilterBuilder};
use crate::identifier::ModuleIdentifier;
use crate::root::ResourceRoot;
use std::collections::HashSet;
use std::sync::Arc;

/// A resource root together with its name inside the module
#[derive(Debug, Clone)]
pub struct NamedRoot {
    name: String,
    root: Arc<dyn ResourceRoot>,
}

impl NamedRoot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Arc<dyn ResourceRoot> {
        &self.root
    }
}

/// One declared dependency edge
#[derive(Debug, Clone)]
pub struct DependencySpec {
    target: ModuleIdentifier,
    export: bool,
    export_filter: PathFilter,
    import_filter: PathFilter,
    optional: bool,
}

impl DependencySpec {
    /// Module this edge points at
    pub fn target(&self) -> &ModuleIdentifier {
        &self.target
    }

    /// Whether importers of the declaring module see this dependency
    pub fn is_exported(&self) -> bool {
        self.export
    }

    /// What crosses the edge for importers; rejects everything when not exported
    pub fn export_filter(&self) -> &PathFilter {
        &self.export_filter
    }

    /// What the declaring module itself may see through the edge
    pub fn import_filter(&self) -> &PathFilter {
        &self.import_filter
    }

    /// Whether a missing target is tolerated
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Immutable module declaration
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    identifier: ModuleIdentifier,
    roots: Vec<NamedRoot>,
    dependencies: Vec<DependencySpec>,
    local_exports: PathFilter,
}

impl ModuleSpec {
    /// Start building a spec for `identifier`
    pub fn build(identifier: ModuleIdentifier) -> ModuleSpecBuilder {
        ModuleSpecBuilder::new(identifier)
    }

    pub fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    /// Roots in declaration order
    pub fn roots(&self) -> &[NamedRoot] {
        &self.roots
    }

    /// Dependencies in declaration (lookup priority) order
    pub fn dependencies(&self) -> &[DependencySpec] {
        &self.dependencies
    }

    /// Filter over what the module's own roots export
    pub fn local_exports(&self) -> &PathFilter {
        &self.local_exports
    }
}

/// Dependency declaration under construction
///
/// Returned by [`ModuleSpecBuilder::add_dependency`]; every setter returns
/// the draft again so declarations read as one chain.
#[derive(Debug, Clone)]
pub struct DependencyDraft {
    target: ModuleIdentifier,
    export: bool,
    export_filter: PathFilterBuilder,
    import_filter: PathFilterBuilder,
    optional: bool,
}

impl DependencyDraft {
    fn new(target: ModuleIdentifier) -> Self {
        Self {
            target,
            export: false,
            export_filter: PathFilterBuilder::default(),
            import_filter: PathFilterBuilder::default(),
            optional: false,
        }
    }

    pub fn set_export(&mut self, export: bool) -> &mut Self {
        self.export = export;
        self
    }

    pub fn set_optional(&mut self, optional: bool) -> &mut Self {
        self.optional = optional;
        self
    }

    pub fn export_include(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.export_filter.include(pattern);
        self
    }

    pub fn export_exclude(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.export_filter.exclude(pattern);
        self
    }

    pub fn export_default(&mut self, action: FilterAction) -> &mut Self {
        self.export_filter.default_action(action);
        self
    }

    pub fn import_include(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.import_filter.include(pattern);
        self
    }

    pub fn import_exclude(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.import_filter.exclude(pattern);
        self
    }

    pub fn import_default(&mut self, action: FilterAction) -> &mut Self {
        self.import_filter.default_action(action);
        self
    }

    fn freeze(self) -> Result<DependencySpec> {
        let export_filter = if self.export {
            self.export_filter.build()?
        } else {
            PathFilter::reject_all()
        };
        Ok(DependencySpec {
            target: self.target,
            export: self.export,
            export_filter,
            import_filter: self.import_filter.build()?,
            optional: self.optional,
        })
    }
}

/// Staged builder for [`ModuleSpec`]
#[derive(Debug)]
pub struct ModuleSpecBuilder {
    identifier: ModuleIdentifier,
    roots: Vec<NamedRoot>,
    dependencies: Vec<DependencyDraft>,
    local_exports: PathFilterBuilder,
    allow_duplicate_dependencies: bool,
}

impl ModuleSpecBuilder {
    pub fn new(identifier: ModuleIdentifier) -> Self {
        Self {
            identifier,
            roots: Vec::new(),
            dependencies: Vec::new(),
            local_exports: PathFilterBuilder::default(),
            allow_duplicate_dependencies: false,
        }
    }

    pub fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    /// Append a resource root; roots are searched in the order they are added
    pub fn add_root(&mut self, name: impl Into<String>, root: impl ResourceRoot + 'static) -> &mut Self {
        self.add_shared_root(name, Arc::new(root))
    }

    /// Append a root that is already shared
    pub fn add_shared_root(
        &mut self,
        name: impl Into<String>,
        root: Arc<dyn ResourceRoot>,
    ) -> &mut Self {
        self.roots.push(NamedRoot {
            name: name.into(),
            root,
        });
        self
    }

    /// Append a dependency on `target` and return its draft for configuration
    pub fn add_dependency(&mut self, target: ModuleIdentifier) -> &mut DependencyDraft {
        self.dependencies.push(DependencyDraft::new(target));
        let last = self.dependencies.len() - 1;
        &mut self.dependencies[last]
    }

    /// Rules over what this module's own roots export
    pub fn local_exports(&mut self) -> &mut PathFilterBuilder {
        &mut self.local_exports
    }

    pub fn local_export_include(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.local_exports.include(pattern);
        self
    }

    pub fn local_export_exclude(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.local_exports.exclude(pattern);
        self
    }

    pub fn local_export_default(&mut self, action: FilterAction) -> &mut Self {
        self.local_exports.default_action(action);
        self
    }

    /// Permit several edges to the same target (each keeps its own filters)
    pub fn allow_duplicate_dependencies(&mut self, allow: bool) -> &mut Self {
        self.allow_duplicate_dependencies = allow;
        self
    }

    /// Freeze the declaration
    ///
    /// Fails on duplicate root names, on duplicate dependency targets unless
    /// explicitly allowed, and on filter patterns that do not compile. The
    /// first offending declaration in declaration order is reported.
    pub fn create(self) -> Result<ModuleSpec> {
        let mut root_names = HashSet::new();
        for root in &self.roots {
            if !root_names.insert(root.name.as_str()) {
                return Err(ModuleError::DuplicateDeclaration {
                    module: self.identifier.clone(),
                    kind: DeclarationKind::Root,
                    name: root.name.clone(),
                });
            }
        }

        if !self.allow_duplicate_dependencies {
            let mut targets = HashSet::new();
            for dep in &self.dependencies {
                if !targets.insert(&dep.target) {
                    return Err(ModuleError::DuplicateDeclaration {
                        module: self.identifier.clone(),
                        kind: DeclarationKind::Dependency,
                        name: dep.target.to_string(),
                    });
                }
            }
        }

        let local_exports = self.local_exports.build()?;
        let dependencies = self
            .dependencies
            .into_iter()
            .map(DependencyDraft::freeze)
            .collect::<Result<Vec<_>>>()?;

        Ok(ModuleSpec {
            identifier: self.identifier,
            roots: self.roots,
            dependencies,
            local_exports,
        })
    }
}
