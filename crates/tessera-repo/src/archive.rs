//! Archive-backed modules
//!
//! A `.jar` or `.zip` file is one module whose identifier is the archive's
//! file name. The archive itself is the module's only root. An embedded
//! `META-INF/module.toml` may add exports and dependencies; its `[module]`
//! identity and `[[roots]]` are ignored.

use crate::descriptor::{DescriptorError, ModuleDescriptor};
use crate::roots::ArchiveRoot;
use std::path::Path;
use std::sync::Arc;
use tessera_core::{
    Module, ModuleFinder, ModuleIdentifier, ModuleLoader, ModuleSpec, ResourceRoot,
    Result,
};
use tracing::debug;

/// Path of the embedded descriptor inside an archive
pub const ARCHIVE_DESCRIPTOR: &str = "META-INF/module.toml";

/// Finder serving the single module stored in an archive
#[derive(Debug, Clone)]
pub struct ArchiveModuleFinder {
    identifier: ModuleIdentifier,
    root: Arc<ArchiveRoot>,
}

impl ArchiveModuleFinder {
    /// Open `path`; the module is named after the archive's file name
    pub fn open(path: &Path) -> std::result::Result<Self, DescriptorError> {
        let root = ArchiveRoot::open(path).map_err(|source| DescriptorError::RootError {
            name: "archive".to_string(),
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            identifier: ModuleIdentifier::from_name(root.file_name()),
            root: Arc::new(root),
        })
    }

    /// Identifier of the archive's module
    pub fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    pub fn root(&self) -> &Arc<ArchiveRoot> {
        &self.root
    }

    fn embedded_descriptor(&self) -> std::result::Result<Option<ModuleDescriptor>, DescriptorError> {
        let Some(bytes) = self.root.read(ARCHIVE_DESCRIPTOR)? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| {
            DescriptorError::ValidationError(format!("{} is not UTF-8: {}", ARCHIVE_DESCRIPTOR, e))
        })?;
        ModuleDescriptor::from_str(&text).map(Some)
    }

    fn spec(&self) -> std::result::Result<ModuleSpec, DescriptorError> {
        let mut builder = ModuleSpec::build(self.identifier.clone());
        let root: Arc<dyn ResourceRoot> = self.root.clone();
        builder.add_shared_root(self.root.file_name(), root);
        if let Some(descriptor) = self.embedded_descriptor()? {
            debug!(module = %self.identifier, "applying embedded descriptor");
            descriptor.apply(&mut builder);
        }
        Ok(builder.create()?)
    }
}

impl ModuleFinder for ArchiveModuleFinder {
    fn find_module_spec(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>> {
        if identifier != &self.identifier {
            return Ok(None);
        }
        self.spec()
            .map(Some)
            .map_err(|e| e.into_module_error(identifier))
    }
}

/// Loader for a single archive, delegating everything else to a parent
#[derive(Debug)]
pub struct ArchiveModuleLoader {
    identifier: ModuleIdentifier,
    loader: ModuleLoader,
}

impl ArchiveModuleLoader {
    /// Identifier of the archive's own module
    pub fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Load the archive's own module
    pub fn load_main(&self) -> Result<Arc<Module>> {
        self.loader.load_module(&self.identifier)
    }

    pub fn load_module(&self, identifier: &ModuleIdentifier) -> Result<Arc<Module>> {
        self.loader.load_module(identifier)
    }

    pub fn into_loader(self) -> ModuleLoader {
        self.loader
    }
}

/// Build a loader serving the archive at `path` as a module named after
/// its file name, with every other identifier delegated to `parent`
pub fn archive_module_loader(
    parent: Arc<ModuleLoader>,
    path: &Path,
) -> std::result::Result<ArchiveModuleLoader, DescriptorError> {
    let finder = ArchiveModuleFinder::open(path)?;
    let identifier = finder.identifier().clone();
    let loader = ModuleLoader::new(format!("archive:{}", identifier))
        .with_finder(finder)
        .with_parent(parent);
    Ok(ArchiveModuleLoader { identifier, loader })
}
