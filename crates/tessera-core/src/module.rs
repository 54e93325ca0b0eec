//! Linked modules and scoped lookup
//!
//! A [`Module`] is what a loader produces from a [`ModuleSpec`]: the spec's
//! roots plus one [`DependencyEdge`] per resolved dependency. Modules are
//! allocated before their edges exist so that dependency cycles can point at
//! each other; the edges are then set exactly once and never change.
//!
//! # Lookup
//!
//! Every lookup runs in one of two modes:
//! - [`LookupMode::Unrestricted`]: the module's own view. Local roots in
//!   declaration order, then every dependency edge in declaration order,
//!   each filtered by the edge's import filter.
//! - [`LookupMode::ExportedOnly`]: what an importer sees. Local roots only
//!   for paths the module's local-export filter accepts, and only edges
//!   marked as exported, each filtered by the edge's export filter.
//!
//! Dependencies are always asked in exported-only mode. Single-result
//! lookups stop at the first hit; enumerations visit everything and keep
//! duplicates that arrive along different paths (diamonds). A module that
//! is already on the current traversal path is skipped, which is what
//! keeps export cycles finite.

use crate::class::{class_path, ClassDefiner};
use crate::error::{ModuleError, Result};
use crate::filter::PathFilter;
use crate::identifier::ModuleIdentifier;
use crate::root::{normalize_path, ResourceRoot};
use crate::spec::{DependencySpec, ModuleSpec, NamedRoot};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

/// Visibility mode of a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Everything the module itself can see
    Unrestricted,
    /// Only what the module exports to its importers
    ExportedOnly,
}

/// A resolved dependency edge
///
/// The edge does not keep its target alive; the loader that linked the
/// target owns it.
#[derive(Clone)]
pub struct DependencyEdge {
    spec: DependencySpec,
    target: Weak<Module>,
}

impl DependencyEdge {
    pub(crate) fn new(spec: DependencySpec, target: &Arc<Module>) -> Self {
        Self {
            spec,
            target: Arc::downgrade(target),
        }
    }

    /// Identifier of the target module
    pub fn target(&self) -> &ModuleIdentifier {
        self.spec.target()
    }

    /// Declaration this edge was linked from
    pub fn spec(&self) -> &DependencySpec {
        &self.spec
    }

    /// The target module, if its loader still holds it
    pub fn module(&self) -> Result<Arc<Module>> {
        self.target
            .upgrade()
            .ok_or_else(|| ModuleError::DetachedModule {
                identifier: self.spec.target().clone(),
            })
    }

    /// Check whether `path` may cross this edge in `mode`
    pub fn admits(&self, path: &str, mode: LookupMode) -> bool {
        match mode {
            LookupMode::Unrestricted => self.spec.import_filter().accepts_resource(path),
            LookupMode::ExportedOnly => {
                self.spec.is_exported() && self.spec.export_filter().accepts_resource(path)
            }
        }
    }

    /// True if nothing can cross this edge in `mode`
    fn is_closed(&self, mode: LookupMode) -> bool {
        match mode {
            LookupMode::Unrestricted => self.spec.import_filter().is_reject_all(),
            LookupMode::ExportedOnly => !self.spec.is_exported(),
        }
    }
}

impl fmt::Debug for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyEdge")
            .field("target", self.spec.target())
            .field("export", &self.spec.is_exported())
            .field("live", &(self.target.strong_count() > 0))
            .finish()
    }
}

/// A resource found by a lookup
#[derive(Clone)]
pub struct Resource {
    path: String,
    root_name: String,
    root: Arc<dyn ResourceRoot>,
    module: Arc<Module>,
}

impl Resource {
    /// Path inside the root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name of the root within its module
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Module whose root holds the resource
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// `<root location>!/<path>`
    pub fn location(&self) -> String {
        format!("{}!/{}", self.root.location(), self.path)
    }

    /// Read the resource bytes from its root
    pub fn read(&self) -> Result<Vec<u8>> {
        match self.root.read(&self.path) {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(ModuleError::resource_read(
                self.module.identifier(),
                &self.path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "entry disappeared from root"),
            )),
            Err(e) => Err(ModuleError::resource_read(
                self.module.identifier(),
                &self.path,
                e,
            )),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("module", self.module.identifier())
            .field("root", &self.root_name)
            .field("path", &self.path)
            .finish()
    }
}

/// Result of a multi-result lookup
///
/// A root or edge that fails is skipped; the traversal continues and the
/// failure is recorded next to the resources that were found.
#[derive(Debug, Default)]
pub struct ResourceEnumeration {
    resources: Vec<Resource>,
    failures: Vec<ModuleError>,
}

impl ResourceEnumeration {
    /// Resources in traversal order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Failures of individual roots or edges, in traversal order
    pub fn failures(&self) -> &[ModuleError] {
        &self.failures
    }

    /// True if every contributing root and edge was read successfully
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    /// Drop the failure report
    pub fn into_resources(self) -> Vec<Resource> {
        self.resources
    }

    /// The resources, or the first failure if there was any
    pub fn into_result(self) -> Result<Vec<Resource>> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure),
            None => Ok(self.resources),
        }
    }

    fn fail(&mut self, error: ModuleError) {
        warn!("skipping failed resource source: {}", error);
        self.failures.push(error);
    }
}

impl IntoIterator for ResourceEnumeration {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResourceEnumeration {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

/// What an enumeration is looking for
#[derive(Clone, Copy)]
enum Query<'a> {
    /// One exact path
    Path(&'a str),
    /// Everything under a directory prefix ("" for everything)
    Prefix(&'a str),
}

impl Query<'_> {
    fn matches_in(&self, root: &dyn ResourceRoot) -> std::io::Result<Vec<String>> {
        match self {
            Query::Path(path) => Ok(if root.contains(path)? {
                vec![path.to_string()]
            } else {
                Vec::new()
            }),
            Query::Prefix(prefix) => root.list(prefix),
        }
    }

    fn describe(&self) -> &str {
        match self {
            Query::Path(path) | Query::Prefix(path) => path,
        }
    }
}

/// Modules on the current traversal path, by address
type Visiting = Vec<*const Module>;

/// Linked, immutable runtime module
pub struct Module {
    identifier: ModuleIdentifier,
    roots: Vec<NamedRoot>,
    local_exports: PathFilter,
    edges: OnceCell<Vec<DependencyEdge>>,
    this: Weak<Module>,
}

impl Module {
    /// Allocate a module with its roots and no edges yet
    pub(crate) fn allocate(spec: &ModuleSpec) -> Arc<Module> {
        Arc::new_cyclic(|this| Module {
            identifier: spec.identifier().clone(),
            roots: spec.roots().to_vec(),
            local_exports: spec.local_exports().clone(),
            edges: OnceCell::new(),
            this: this.clone(),
        })
    }

    /// Set the dependency edges; returns false if they were already set
    pub(crate) fn link(&self, edges: Vec<DependencyEdge>) -> bool {
        self.edges.set(edges).is_ok()
    }

    pub fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    /// Local roots in declaration order
    pub fn roots(&self) -> &[NamedRoot] {
        &self.roots
    }

    /// Filter over what the local roots export
    pub fn local_exports(&self) -> &PathFilter {
        &self.local_exports
    }

    /// Resolved dependency edges in declaration order
    pub fn dependencies(&self) -> &[DependencyEdge] {
        self.edges.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// True once the edges have been set
    pub fn is_linked(&self) -> bool {
        self.edges.get().is_some()
    }

    fn handle(&self) -> Result<Arc<Module>> {
        self.this
            .upgrade()
            .ok_or_else(|| ModuleError::DetachedModule {
                identifier: self.identifier.clone(),
            })
    }

    fn resource(&self, root: &NamedRoot, path: String) -> Result<Resource> {
        Ok(Resource {
            path,
            root_name: root.name().to_string(),
            root: Arc::clone(root.root()),
            module: self.handle()?,
        })
    }

    // ── Single-result lookups ────────────────────────────────────────

    /// Find a resource visible from inside this module
    pub fn get_resource(&self, path: &str) -> Result<Option<Resource>> {
        self.find_resource(path, LookupMode::Unrestricted)
    }

    /// Find a resource this module exports to its importers
    pub fn get_exported_resource(&self, path: &str) -> Result<Option<Resource>> {
        self.find_resource(path, LookupMode::ExportedOnly)
    }

    /// Find the first resource at `path` in `mode`
    ///
    /// `Ok(None)` means nothing is visible at that path. A root that fails
    /// to answer aborts the lookup with [`ModuleError::ResourceRead`].
    pub fn find_resource(&self, path: &str, mode: LookupMode) -> Result<Option<Resource>> {
        let path = normalize_path(path);
        self.find_in(&path, mode, &mut Vec::new())
    }

    fn find_in(
        &self,
        path: &str,
        mode: LookupMode,
        visiting: &mut Visiting,
    ) -> Result<Option<Resource>> {
        let me = self as *const Module;
        if visiting.contains(&me) {
            return Ok(None);
        }
        visiting.push(me);
        let found = self.find_unvisited(path, mode, visiting);
        visiting.pop();
        found
    }

    fn find_unvisited(
        &self,
        path: &str,
        mode: LookupMode,
        visiting: &mut Visiting,
    ) -> Result<Option<Resource>> {
        trace!(module = %self.identifier, path, ?mode, "lookup");

        if mode == LookupMode::Unrestricted || self.local_exports.accepts_resource(path) {
            for root in &self.roots {
                let present = root
                    .root()
                    .contains(path)
                    .map_err(|e| ModuleError::resource_read(&self.identifier, path, e))?;
                if present {
                    return self.resource(root, path.to_string()).map(Some);
                }
            }
        }

        for edge in self.dependencies() {
            if !edge.admits(path, mode) {
                continue;
            }
            let target = edge.module()?;
            if let Some(found) = target.find_in(path, LookupMode::ExportedOnly, visiting)? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    // ── Multi-result lookups ─────────────────────────────────────────

    /// Every resource at `path` visible from inside this module
    pub fn get_resources(&self, path: &str) -> ResourceEnumeration {
        self.find_resources(path, LookupMode::Unrestricted)
    }

    /// Every resource at `path` this module exports
    pub fn get_exported_resources(&self, path: &str) -> ResourceEnumeration {
        self.find_resources(path, LookupMode::ExportedOnly)
    }

    /// Every resource at `path` in `mode`, local roots first, then
    /// dependencies in declaration order
    pub fn find_resources(&self, path: &str, mode: LookupMode) -> ResourceEnumeration {
        let path = normalize_path(path);
        let mut out = ResourceEnumeration::default();
        self.enumerate_in(Query::Path(&path), mode, &mut Vec::new(), &mut out);
        out
    }

    /// Every visible resource under the directory `prefix`
    pub fn list_resources(&self, prefix: &str, mode: LookupMode) -> ResourceEnumeration {
        let prefix = normalize_path(prefix);
        let mut out = ResourceEnumeration::default();
        self.enumerate_in(Query::Prefix(&prefix), mode, &mut Vec::new(), &mut out);
        out
    }

    /// The effective classpath: every resource visible in `mode`
    pub fn classpath(&self, mode: LookupMode) -> ResourceEnumeration {
        self.list_resources("", mode)
    }

    fn enumerate_in(
        &self,
        query: Query<'_>,
        mode: LookupMode,
        visiting: &mut Visiting,
        out: &mut ResourceEnumeration,
    ) {
        let me = self as *const Module;
        if visiting.contains(&me) {
            return;
        }
        visiting.push(me);
        self.enumerate_unvisited(query, mode, visiting, out);
        visiting.pop();
    }

    fn enumerate_unvisited(
        &self,
        query: Query<'_>,
        mode: LookupMode,
        visiting: &mut Visiting,
        out: &mut ResourceEnumeration,
    ) {
        trace!(module = %self.identifier, query = query.describe(), ?mode, "enumerate");

        let local_open = match (mode, query) {
            (LookupMode::Unrestricted, _) => true,
            (LookupMode::ExportedOnly, Query::Path(path)) => self.local_exports.accepts_resource(path),
            (LookupMode::ExportedOnly, Query::Prefix(_)) => !self.local_exports.is_reject_all(),
        };
        if local_open {
            for root in &self.roots {
                let paths = match query.matches_in(root.root().as_ref()) {
                    Ok(paths) => paths,
                    Err(e) => {
                        out.fail(ModuleError::resource_read(
                            &self.identifier,
                            query.describe(),
                            e,
                        ));
                        continue;
                    }
                };
                for path in paths {
                    if mode == LookupMode::ExportedOnly && !self.local_exports.accepts_resource(&path) {
                        continue;
                    }
                    match self.resource(root, path) {
                        Ok(resource) => out.resources.push(resource),
                        Err(e) => out.fail(e),
                    }
                }
            }
        }

        for edge in self.dependencies() {
            if edge.is_closed(mode) {
                continue;
            }
            if let Query::Path(path) = query {
                if !edge.admits(path, mode) {
                    continue;
                }
            }
            let target = match edge.module() {
                Ok(target) => target,
                Err(e) => {
                    out.fail(e);
                    continue;
                }
            };

            match query {
                Query::Path(_) => {
                    target.enumerate_in(query, LookupMode::ExportedOnly, visiting, out);
                }
                Query::Prefix(_) => {
                    let mut inner = ResourceEnumeration::default();
                    target.enumerate_in(query, LookupMode::ExportedOnly, visiting, &mut inner);
                    out.resources.extend(
                        inner
                            .resources
                            .into_iter()
                            .filter(|resource| edge.admits(resource.path(), mode)),
                    );
                    out.failures.extend(inner.failures);
                }
            }
        }
    }

    // ── Classes ──────────────────────────────────────────────────────

    /// Find the bytes of a dotted class name in `mode`
    pub fn find_class(&self, class_name: &str, mode: LookupMode) -> Result<Option<Resource>> {
        self.find_resource(&class_path(class_name), mode)
    }

    /// Load a class visible from inside this module through `definer`
    pub fn load_class<D: ClassDefiner>(
        &self,
        class_name: &str,
        definer: &D,
    ) -> Result<Option<D::Class>> {
        self.define_with(class_name, LookupMode::Unrestricted, definer)
    }

    /// Load a class this module exports through `definer`
    pub fn load_exported_class<D: ClassDefiner>(
        &self,
        class_name: &str,
        definer: &D,
    ) -> Result<Option<D::Class>> {
        self.define_with(class_name, LookupMode::ExportedOnly, definer)
    }

    fn define_with<D: ClassDefiner>(
        &self,
        class_name: &str,
        mode: LookupMode,
        definer: &D,
    ) -> Result<Option<D::Class>> {
        let Some(resource) = self.find_class(class_name, mode)? else {
            return Ok(None);
        };
        let bytes = resource.read()?;
        definer
            .define_class(class_name, &bytes, resource.module())
            .map(Some)
            .map_err(|e| ModuleError::ClassDefinition {
                module: resource.module().identifier().clone(),
                class: class_name.to_string(),
                message: e.to_string(),
            })
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roots: Vec<&str> = self.roots.iter().map(|r| r.name()).collect();
        let deps: Vec<&ModuleIdentifier> = self.dependencies().iter().map(|e| e.target()).collect();
        f.debug_struct("Module")
            .field("identifier", &self.identifier)
            .field("roots", &roots)
            .field("dependencies", &deps)
            .field("linked", &self.is_linked())
            .finish()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module {}", self.identifier)
    }
}
