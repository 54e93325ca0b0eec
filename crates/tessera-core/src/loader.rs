//! Module loader
//!
//! Turns identifiers into linked [`Module`]s and owns them. Each loader has
//! its own cache; there is no process-wide registry.
//!
//! # Resolution
//!
//! A resolution attempt fetches the spec of the requested module, allocates
//! it, and resolves its dependencies depth-first in declaration order before
//! setting its edges. Dependencies are looked up in this loader first and
//! then in the parent. An identifier that is already being linked in the
//! same attempt binds to the allocated-but-unlinked module, which is how
//! cycles resolve. Everything allocated in an attempt is published together
//! when the attempt succeeds and dropped together when it fails.
//!
//! # Concurrency
//!
//! - Linked modules live in a `DashMap`; cache hits take no other lock.
//! - A caller that finds the identifier in flight waits on that attempt and
//!   gets the same outcome, success or failure.
//! - Attempts of one loader are serialized by its link lock, so two threads
//!   linking the two halves of a cycle cannot deadlock.
//! - Failures are not cached: the next call starts a fresh attempt.
//! - A child may call into its parent while linking; a parent never calls
//!   into a child.

use crate::error::{ModuleError, Result};
use crate::finder::ModuleFinder;
use crate::identifier::ModuleIdentifier;
use crate::module::{DependencyEdge, Module};
use crate::spec::ModuleSpec;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Snapshot of loader counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Modules currently held by the loader
    pub loaded: usize,
    /// Requests answered from the cache
    pub hits: u64,
    /// Requests that waited on another caller's attempt
    pub joined: u64,
    /// Resolution attempts started
    pub attempts: u64,
    /// Specs obtained from finders
    pub spec_fetches: u64,
    /// Modules linked (including ones later discarded by a failed attempt)
    pub linked: u64,
    /// Attempts that ended in an error
    pub failed: u64,
}

impl LoaderStats {
    /// Get cache hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.attempts;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    joined: AtomicU64,
    attempts: AtomicU64,
    spec_fetches: AtomicU64,
    linked: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Outcome slot shared by every caller of one in-flight attempt
struct PendingLoad {
    outcome: Mutex<Option<Result<Arc<Module>>>>,
    done: Condvar,
}

impl PendingLoad {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<Arc<Module>> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut outcome);
        }
    }

    fn complete(&self, result: Result<Arc<Module>>) {
        *self.outcome.lock() = Some(result);
        self.done.notify_all();
    }
}

/// Completes the in-flight record of the attempt it guards
///
/// If the attempt unwinds before finishing, waiters get an error instead of
/// blocking forever.
struct LeaderGuard<'a> {
    loader: &'a ModuleLoader,
    identifier: &'a ModuleIdentifier,
    pending: Arc<PendingLoad>,
    finished: bool,
}

impl LeaderGuard<'_> {
    fn finish(mut self, outcome: Result<Arc<Module>>) -> Result<Arc<Module>> {
        self.loader.pending.lock().remove(self.identifier);
        self.pending.complete(outcome.clone());
        self.finished = true;
        outcome
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.loader.pending.lock().remove(self.identifier);
            self.pending.complete(Err(ModuleError::SpecLoad {
                identifier: self.identifier.clone(),
                message: "resolution aborted".to_string(),
            }));
        }
    }
}

/// State of one resolution attempt
#[derive(Default)]
struct Attempt {
    /// Every module allocated so far, linked or not
    allocated: HashMap<ModuleIdentifier, Arc<Module>>,
    /// Publication order
    order: Vec<ModuleIdentifier>,
    /// Modules whose dependencies are being resolved, outermost first
    chain: Vec<ModuleIdentifier>,
}

/// Caller-scoped module loader
pub struct ModuleLoader {
    name: String,
    finders: Vec<Box<dyn ModuleFinder>>,
    parent: Option<Arc<ModuleLoader>>,
    modules: DashMap<ModuleIdentifier, Arc<Module>>,
    pending: Mutex<HashMap<ModuleIdentifier, Arc<PendingLoad>>>,
    link_lock: Mutex<()>,
    counters: Counters,
}

impl ModuleLoader {
    /// Create a loader with no finders and no parent
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            finders: Vec::new(),
            parent: None,
            modules: DashMap::new(),
            pending: Mutex::new(HashMap::new()),
            link_lock: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    /// Add a finder; finders are asked in the order they are added
    pub fn with_finder(mut self, finder: impl ModuleFinder + 'static) -> Self {
        self.add_finder(finder);
        self
    }

    /// Delegate identifiers this loader cannot find to `parent`
    pub fn with_parent(mut self, parent: Arc<ModuleLoader>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn add_finder(&mut self, finder: impl ModuleFinder + 'static) {
        self.finders.push(Box::new(finder));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<ModuleLoader>> {
        self.parent.as_ref()
    }

    /// Resolve `identifier` to a linked module
    ///
    /// Returns the cached module when there is one. Otherwise resolves it,
    /// or waits for the caller already doing so and shares its outcome.
    pub fn load_module(&self, identifier: &ModuleIdentifier) -> Result<Arc<Module>> {
        if let Some(module) = self.get_module(identifier) {
            Counters::bump(&self.counters.hits);
            return Ok(module);
        }

        let pending = {
            let mut pending = self.pending.lock();
            // Published between the lookup above and taking the lock
            if let Some(module) = self.get_module(identifier) {
                Counters::bump(&self.counters.hits);
                return Ok(module);
            }
            if let Some(in_flight) = pending.get(identifier) {
                let in_flight = Arc::clone(in_flight);
                drop(pending);
                Counters::bump(&self.counters.joined);
                debug!(loader = %self.name, module = %identifier, "waiting on in-flight resolution");
                return in_flight.wait();
            }
            let record = Arc::new(PendingLoad::new());
            pending.insert(identifier.clone(), Arc::clone(&record));
            record
        };

        let guard = LeaderGuard {
            loader: self,
            identifier,
            pending,
            finished: false,
        };
        Counters::bump(&self.counters.attempts);
        let outcome = self.resolve(identifier);
        if outcome.is_err() {
            Counters::bump(&self.counters.failed);
        }
        guard.finish(outcome)
    }

    /// Module already linked in this loader, without resolving
    pub fn get_module(&self, identifier: &ModuleIdentifier) -> Option<Arc<Module>> {
        self.modules.get(identifier).map(|entry| Arc::clone(entry.value()))
    }

    pub fn is_loaded(&self, identifier: &ModuleIdentifier) -> bool {
        self.modules.contains_key(identifier)
    }

    /// Identifiers of every module held by this loader, sorted
    pub fn loaded_modules(&self) -> Vec<ModuleIdentifier> {
        let mut ids: Vec<_> = self.modules.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> LoaderStats {
        let c = &self.counters;
        LoaderStats {
            loaded: self.modules.len(),
            hits: c.hits.load(Ordering::Relaxed),
            joined: c.joined.load(Ordering::Relaxed),
            attempts: c.attempts.load(Ordering::Relaxed),
            spec_fetches: c.spec_fetches.load(Ordering::Relaxed),
            linked: c.linked.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }

    fn resolve(&self, identifier: &ModuleIdentifier) -> Result<Arc<Module>> {
        let local = {
            let _link = self.link_lock.lock();
            let mut attempt = Attempt::default();
            match self.link_local(identifier, &mut attempt) {
                Ok(found) => {
                    self.publish(attempt);
                    found
                }
                Err(e) => {
                    debug!(
                        loader = %self.name,
                        module = %identifier,
                        discarded = attempt.allocated.len(),
                        "resolution failed: {}", e
                    );
                    return Err(e);
                }
            }
        };

        match local {
            Some(module) => Ok(module),
            None => self.delegate(identifier, &[]),
        }
    }

    /// Ask the parent for a module this loader has no spec for
    fn delegate(
        &self,
        identifier: &ModuleIdentifier,
        chain: &[ModuleIdentifier],
    ) -> Result<Arc<Module>> {
        let not_found = || ModuleError::ModuleNotFound {
            identifier: identifier.clone(),
            chain: chain.to_vec(),
        };
        let Some(parent) = &self.parent else {
            return Err(not_found());
        };
        debug!(loader = %self.name, parent = %parent.name, module = %identifier, "delegating to parent");
        match parent.load_module(identifier) {
            Ok(module) => Ok(module),
            // Report the miss with this loader's requester chain
            Err(ModuleError::ModuleNotFound { identifier: missing, .. }) if &missing == identifier => {
                Err(not_found())
            }
            Err(e) => Err(e),
        }
    }

    /// Link `identifier` from this loader's own finders
    ///
    /// `Ok(None)` when no finder knows the identifier.
    fn link_local(
        &self,
        identifier: &ModuleIdentifier,
        attempt: &mut Attempt,
    ) -> Result<Option<Arc<Module>>> {
        if let Some(module) = self.get_module(identifier) {
            return Ok(Some(module));
        }
        if let Some(module) = attempt.allocated.get(identifier) {
            // Already linked in this attempt, or linking further up the path
            return Ok(Some(Arc::clone(module)));
        }
        let Some(spec) = self.fetch_spec(identifier)? else {
            return Ok(None);
        };

        let module = Module::allocate(&spec);
        attempt.allocated.insert(identifier.clone(), Arc::clone(&module));
        attempt.order.push(identifier.clone());

        attempt.chain.push(identifier.clone());
        let edges = self.link_edges(&spec, attempt);
        attempt.chain.pop();

        if !module.link(edges?) {
            warn!(loader = %self.name, module = %identifier, "edges were already set");
        }
        Counters::bump(&self.counters.linked);
        debug!(
            loader = %self.name,
            module = %identifier,
            dependencies = module.dependencies().len(),
            "linked"
        );
        Ok(Some(module))
    }

    fn link_edges(&self, spec: &ModuleSpec, attempt: &mut Attempt) -> Result<Vec<DependencyEdge>> {
        let mut edges = Vec::with_capacity(spec.dependencies().len());
        for dependency in spec.dependencies() {
            let target = dependency.target();
            let resolved = match self.link_local(target, attempt)? {
                Some(module) => Ok(module),
                None => self.delegate(target, &attempt.chain),
            };
            match resolved {
                Ok(module) => edges.push(DependencyEdge::new(dependency.clone(), &module)),
                Err(ModuleError::ModuleNotFound { identifier, .. })
                    if dependency.is_optional() && &identifier == target =>
                {
                    warn!(
                        loader = %self.name,
                        module = %spec.identifier(),
                        dependency = %target,
                        "optional dependency not found, skipping"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(edges)
    }

    fn fetch_spec(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>> {
        for finder in &self.finders {
            if let Some(spec) = finder.find_module_spec(identifier)? {
                Counters::bump(&self.counters.spec_fetches);
                debug!(loader = %self.name, module = %identifier, "fetched spec");
                return Ok(Some(spec));
            }
        }
        Ok(None)
    }

    fn publish(&self, attempt: Attempt) {
        let Attempt {
            mut allocated,
            order,
            ..
        } = attempt;
        for identifier in order {
            if let Some(module) = allocated.remove(&identifier) {
                debug!(loader = %self.name, module = %identifier, "published");
                self.modules.insert(identifier, module);
            }
        }
    }
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("name", &self.name)
            .field("finders", &self.finders.len())
            .field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
            .field("loaded", &self.modules.len())
            .finish()
    }
}
