//! Directory-layout module repositories
//!
//! A repository stores each module under a path derived from its
//! identifier: the dotted group becomes nested directories, followed by the
//! name and the slot, with the descriptor at the bottom.
//!
//! ```text
//! <repo>/org/example/app/1.0/module.toml
//! <repo>/org/example/app/1.0/classes/...
//! <repo>/solo/main/module.toml          (no group)
//! ```

use crate::descriptor::{ModuleDescriptor, DESCRIPTOR_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use tessera_core::{ModuleError, ModuleFinder, ModuleIdentifier, ModuleSpec, Result};
use tracing::debug;

/// Finds module specs in one or more repository directories
#[derive(Debug, Clone, Default)]
pub struct RepositoryFinder {
    repositories: Vec<PathBuf>,
    allow_duplicate_dependencies: bool,
}

impl RepositoryFinder {
    /// Create a finder over `repositories`, searched in order
    pub fn new(repositories: Vec<PathBuf>) -> Self {
        Self {
            repositories,
            allow_duplicate_dependencies: false,
        }
    }

    /// Accept duplicate dependency targets in every descriptor
    pub fn with_duplicate_dependencies(mut self, allow: bool) -> Self {
        self.allow_duplicate_dependencies = allow;
        self
    }

    pub fn repositories(&self) -> &[PathBuf] {
        &self.repositories
    }

    /// Directory of `identifier` inside `repository`
    ///
    /// `None` when a component cannot name a single directory (empty, `.`,
    /// `..`, or containing a path separator), so no identifier reaches
    /// outside the repository.
    pub fn module_dir(repository: &Path, identifier: &ModuleIdentifier) -> Option<PathBuf> {
        let group = identifier.group().split('.').filter(|p| !p.is_empty());
        let mut dir = repository.to_path_buf();
        for part in group.chain([identifier.name(), identifier.slot()]) {
            if !is_plain_component(part) {
                return None;
            }
            dir.push(part);
        }
        Some(dir)
    }

    /// Descriptor path of `identifier` inside `repository`
    pub fn descriptor_path(repository: &Path, identifier: &ModuleIdentifier) -> Option<PathBuf> {
        Self::module_dir(repository, identifier).map(|dir| dir.join(DESCRIPTOR_FILE))
    }

    /// Every module found in the repositories, sorted
    ///
    /// A descriptor that fails to parse is skipped.
    pub fn available_modules(&self) -> Vec<ModuleIdentifier> {
        let mut found = Vec::new();
        for repository in &self.repositories {
            collect_descriptors(repository, &mut found);
        }
        found.sort();
        found.dedup();
        found
    }

    fn load_spec(&self, path: &Path, identifier: &ModuleIdentifier) -> Result<ModuleSpec> {
        let descriptor = ModuleDescriptor::from_file(path)
            .map_err(|e| e.into_module_error(identifier))?;
        if &descriptor.identifier() != identifier {
            return Err(ModuleError::SpecLoad {
                identifier: identifier.clone(),
                message: format!(
                    "{} declares module {}",
                    path.display(),
                    descriptor.identifier()
                ),
            });
        }

        let base_dir = path.parent().unwrap_or(Path::new("."));
        let mut builder = descriptor
            .spec_builder(base_dir)
            .map_err(|e| e.into_module_error(identifier))?;
        if self.allow_duplicate_dependencies {
            builder.allow_duplicate_dependencies(true);
        }
        builder.create()
    }
}

impl ModuleFinder for RepositoryFinder {
    fn find_module_spec(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>> {
        for repository in &self.repositories {
            let Some(path) = Self::descriptor_path(repository, identifier) else {
                debug!(module = %identifier, "identifier has no repository path");
                return Ok(None);
            };
            if !path.is_file() {
                continue;
            }
            debug!(module = %identifier, descriptor = %path.display(), "found descriptor");
            return self.load_spec(&path, identifier).map(Some);
        }
        Ok(None)
    }
}

fn is_plain_component(part: &str) -> bool {
    !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
}

fn collect_descriptors(dir: &Path, found: &mut Vec<ModuleIdentifier>) {
    let descriptor = dir.join(DESCRIPTOR_FILE);
    if descriptor.is_file() {
        if let Ok(parsed) = ModuleDescriptor::from_file(&descriptor) {
            found.push(parsed.identifier());
        }
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            collect_descriptors(&entry.path(), found);
        }
    }
}
