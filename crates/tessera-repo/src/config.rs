//! Loader configuration (tessera.toml)
//!
//! ```toml
//! repositories = ["modules", "/opt/shared/modules"]
//! archives = ["lib/app.jar"]
//! allow-duplicate-dependencies = false
//! ```
//!
//! Relative paths are resolved against the directory of the file.

use crate::archive::ArchiveModuleFinder;
use crate::descriptor::DescriptorError;
use crate::repository::RepositoryFinder;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::{ModuleIdentifier, ModuleLoader};
use thiserror::Error;

/// Default configuration file name
pub const CONFIG_FILE: &str = "tessera.toml";

/// Environment variable holding extra repositories (platform path-list syntax)
pub const REPOSITORY_ENV: &str = "TESSERA_REPOSITORY";

/// Errors that can occur while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),

    /// A configured archive could not be opened
    #[error("Failed to open archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: DescriptorError,
    },
}

/// Parsed tessera.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LoaderConfig {
    /// Repository directories, searched in order
    #[serde(default)]
    pub repositories: Vec<PathBuf>,

    /// Archives served as modules named after their file names
    #[serde(default)]
    pub archives: Vec<PathBuf>,

    /// Accept duplicate dependency targets in every descriptor
    #[serde(default)]
    pub allow_duplicate_dependencies: bool,
}

impl LoaderConfig {
    /// Parse a config file, resolving relative paths against its directory
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    /// Parse a config from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: LoaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(empty) = self
            .repositories
            .iter()
            .chain(&self.archives)
            .find(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::ValidationError(format!(
                "Empty path in config: {:?}",
                empty
            )));
        }
        Ok(())
    }

    /// Make relative paths absolute against `base_dir`
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        for path in self.repositories.iter_mut().chain(self.archives.iter_mut()) {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
    }

    /// Append repositories from a path list such as `$TESSERA_REPOSITORY`
    pub fn add_repository_list(&mut self, list: &OsStr) {
        self.repositories
            .extend(std::env::split_paths(list).filter(|p| !p.as_os_str().is_empty()));
    }

    /// Open every configured archive
    pub fn archive_finders(&self) -> Result<Vec<ArchiveModuleFinder>, ConfigError> {
        self.archives
            .iter()
            .map(|path| {
                ArchiveModuleFinder::open(path).map_err(|source| ConfigError::Archive {
                    path: path.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Identifiers of the configured archives' modules
    pub fn archive_modules(&self) -> Result<Vec<ModuleIdentifier>, ConfigError> {
        Ok(self
            .archive_finders()?
            .iter()
            .map(|finder| finder.identifier().clone())
            .collect())
    }

    /// Repository finder over the configured repositories
    pub fn repository_finder(&self) -> RepositoryFinder {
        RepositoryFinder::new(self.repositories.clone())
            .with_duplicate_dependencies(self.allow_duplicate_dependencies)
    }

    /// Build a loader: repositories first, then archives
    pub fn build_loader(
        &self,
        name: &str,
        parent: Option<Arc<ModuleLoader>>,
    ) -> Result<ModuleLoader, ConfigError> {
        let mut loader = ModuleLoader::new(name).with_finder(self.repository_finder());
        for finder in self.archive_finders()? {
            loader.add_finder(finder);
        }
        if let Some(parent) = parent {
            loader = loader.with_parent(parent);
        }
        Ok(loader)
    }
}
