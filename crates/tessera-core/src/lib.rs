//! Tessera Core
//!
//! Module isolation and resolution engine. This crate provides:
//! - Module identifiers (`group:name:slot`)
//! - Ordered include/exclude path filters for exports and imports
//! - Module specs and their staged builder
//! - Module loaders with per-loader caching, parent delegation and cycle-safe linking
//! - Scoped class and resource lookup over a module and its dependencies
//!
//! Concrete roots and finders backed by the filesystem live in `tessera-repo`.

pub mod class;
pub mod error;
pub mod filter;
pub mod finder;
pub mod identifier;
pub mod loader;
pub mod module;
pub mod root;
pub mod spec;

pub use class::{class_name, class_path, ClassDefiner};
pub use error::{DeclarationKind, ModuleError, Result};
pub use filter::{FilterAction, FilterRule, PathFilter, PathFilterBuilder, PathPattern};
pub use finder::{ModuleFinder, ModuleSpecTable};
pub use identifier::{IdentifierError, ModuleIdentifier, DEFAULT_SLOT};
pub use loader::{LoaderStats, ModuleLoader};
pub use module::{DependencyEdge, LookupMode, Module, Resource, ResourceEnumeration};
pub use root::{has_prefix, normalize_path, resource_dir, MemoryRoot, ResourceRoot};
pub use spec::{DependencyDraft, DependencySpec, ModuleSpec, ModuleSpecBuilder, NamedRoot};
