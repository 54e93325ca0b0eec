//! Tessera Repositories
//!
//! Filesystem-backed collaborators for `tessera-core`:
//! - Module descriptors (module.toml)
//! - Directory and zip-archive resource roots
//! - Repository-layout module finder
//! - Archive-backed modules and the single-archive loader
//! - Loader configuration (tessera.toml)

pub mod archive;
pub mod config;
pub mod descriptor;
pub mod repository;
pub mod roots;

pub use archive::{archive_module_loader, ArchiveModuleFinder, ArchiveModuleLoader, ARCHIVE_DESCRIPTOR};
pub use config::{ConfigError, LoaderConfig, CONFIG_FILE, REPOSITORY_ENV};
pub use descriptor::{
    DependencyEntry, DescriptorError, FilterTable, ModuleDescriptor, ModuleInfo, RootEntry,
    RuleEntry, DESCRIPTOR_FILE,
};
pub use repository::RepositoryFinder;
pub use roots::{is_archive, open_root, ArchiveRoot, DirectoryRoot};
