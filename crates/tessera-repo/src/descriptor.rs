//! Module descriptor parsing (module.toml)
//!
//! A descriptor declares one module: its identifier, its resource roots
//! (paths relative to the descriptor), the filter over what its roots
//! export, and its dependencies in lookup order.
//!
//! ```toml
//! [module]
//! group = "org.example"
//! name = "app"
//! slot = "1.0"
//!
//! [[roots]]
//! name = "classes"
//! path = "classes"
//!
//! [exports]
//! rules = [{ exclude = "impl/**" }]
//!
//! [[dependencies]]
//! module = "org.example:lib:1.0"
//! export = true
//! export-filter = { rules = [{ exclude = "x/**" }] }
//! ```

use crate::roots::open_root;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tessera_core::{
    FilterAction, ModuleError, ModuleIdentifier, ModuleSpec, ModuleSpecBuilder, PathFilterBuilder,
    DEFAULT_SLOT,
};
use thiserror::Error;

/// File name of module descriptors
pub const DESCRIPTOR_FILE: &str = "module.toml";

/// Errors that can occur while reading a descriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Failed to read descriptor file
    #[error("Failed to read module descriptor: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse module descriptor: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid module descriptor: {0}")]
    ValidationError(String),

    /// A declared root could not be opened
    #[error("Failed to open root '{name}' at {}: {source}", .path.display())]
    RootError {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The declarations do not form a valid module spec
    #[error(transparent)]
    Spec(#[from] ModuleError),
}

impl DescriptorError {
    /// Convert to the error a finder reports for `identifier`
    pub fn into_module_error(self, identifier: &ModuleIdentifier) -> ModuleError {
        match self {
            DescriptorError::Spec(e) => e,
            other => ModuleError::SpecLoad {
                identifier: identifier.clone(),
                message: other.to_string(),
            },
        }
    }
}

/// Parsed module.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleDescriptor {
    /// Module identity
    pub module: ModuleInfo,

    /// Resource roots in lookup order
    #[serde(default)]
    pub roots: Vec<RootEntry>,

    /// Filter over what the module's own roots export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports: Option<FilterTable>,

    /// Dependencies in lookup order
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

/// `[module]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleInfo {
    /// Group, empty for ungrouped modules
    #[serde(default)]
    pub group: String,

    pub name: String,

    /// Slot (defaults to "main")
    #[serde(default = "default_slot")]
    pub slot: String,

    /// Permit several edges to the same target
    #[serde(default)]
    pub allow_duplicate_dependencies: bool,
}

fn default_slot() -> String {
    DEFAULT_SLOT.to_string()
}

/// `[[roots]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RootEntry {
    pub name: String,
    /// Directory or `.jar`/`.zip` archive, relative to the descriptor
    pub path: String,
}

/// One filter rule: `{ include = ".." }` or `{ exclude = ".." }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RuleEntry {
    Include(String),
    Exclude(String),
}

/// Ordered rule list with an optional default
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterTable {
    #[serde(default)]
    pub rules: Vec<RuleEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FilterAction>,
}

impl FilterTable {
    fn apply(&self, builder: &mut PathFilterBuilder) {
        for rule in &self.rules {
            match rule {
                RuleEntry::Include(pattern) => builder.include(pattern.as_str()),
                RuleEntry::Exclude(pattern) => builder.exclude(pattern.as_str()),
            };
        }
        if let Some(action) = self.default {
            builder.default_action(action);
        }
    }
}

/// `[[dependencies]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DependencyEntry {
    /// Target identifier in `group:name:slot` form
    pub module: ModuleIdentifier,

    /// Re-export the target to importers of this module
    #[serde(default)]
    pub export: bool,

    /// Tolerate a missing target
    #[serde(default)]
    pub optional: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_filter: Option<FilterTable>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_filter: Option<FilterTable>,
}

impl ModuleDescriptor {
    /// Parse a descriptor from a file
    pub fn from_file(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a descriptor from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, DescriptorError> {
        let descriptor: ModuleDescriptor = toml::from_str(content)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Validate the descriptor
    pub fn validate(&self) -> Result<(), DescriptorError> {
        for (component, value) in [
            ("group", &self.module.group),
            ("name", &self.module.name),
            ("slot", &self.module.slot),
        ] {
            if value.contains(':') {
                return Err(DescriptorError::ValidationError(format!(
                    "Module {} '{}' must not contain ':'",
                    component, value
                )));
            }
        }
        if self.module.name.is_empty() {
            return Err(DescriptorError::ValidationError(
                "Module name cannot be empty".to_string(),
            ));
        }
        if self.module.slot.is_empty() {
            return Err(DescriptorError::ValidationError(
                "Module slot cannot be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for root in &self.roots {
            if root.name.is_empty() || root.path.is_empty() {
                return Err(DescriptorError::ValidationError(
                    "Root name and path cannot be empty".to_string(),
                ));
            }
            if !names.insert(root.name.as_str()) {
                return Err(DescriptorError::ValidationError(format!(
                    "Duplicate root name: {}",
                    root.name
                )));
            }
        }

        Ok(())
    }

    /// Identifier declared in `[module]`
    pub fn identifier(&self) -> ModuleIdentifier {
        ModuleIdentifier::new(
            self.module.group.as_str(),
            self.module.name.as_str(),
            self.module.slot.as_str(),
        )
    }

    /// Build the module spec, opening roots relative to `base_dir`
    pub fn to_spec(&self, base_dir: &Path) -> Result<ModuleSpec, DescriptorError> {
        Ok(self.spec_builder(base_dir)?.create()?)
    }

    /// Open roots relative to `base_dir` and stage every declaration
    pub fn spec_builder(&self, base_dir: &Path) -> Result<ModuleSpecBuilder, DescriptorError> {
        let mut builder = ModuleSpec::build(self.identifier());
        for root in &self.roots {
            let path = base_dir.join(&root.path);
            let opened = open_root(&path).map_err(|source| DescriptorError::RootError {
                name: root.name.clone(),
                path,
                source,
            })?;
            builder.add_shared_root(root.name.as_str(), opened);
        }
        self.apply(&mut builder);
        Ok(builder)
    }

    /// Add this descriptor's exports and dependencies to `builder`
    ///
    /// Roots are left to the caller.
    pub fn apply(&self, builder: &mut ModuleSpecBuilder) {
        builder.allow_duplicate_dependencies(self.module.allow_duplicate_dependencies);
        if let Some(exports) = &self.exports {
            exports.apply(builder.local_exports());
        }
        for dependency in &self.dependencies {
            let draft = builder.add_dependency(dependency.module.clone());
            draft
                .set_export(dependency.export)
                .set_optional(dependency.optional);
            if let Some(filter) = &dependency.export_filter {
                for rule in &filter.rules {
                    match rule {
                        RuleEntry::Include(p) => draft.export_include(p.as_str()),
                        RuleEntry::Exclude(p) => draft.export_exclude(p.as_str()),
                    };
                }
                if let Some(action) = filter.default {
                    draft.export_default(action);
                }
            }
            if let Some(filter) = &dependency.import_filter {
                for rule in &filter.rules {
                    match rule {
                        RuleEntry::Include(p) => draft.import_include(p.as_str()),
                        RuleEntry::Exclude(p) => draft.import_exclude(p.as_str()),
                    };
                }
                if let Some(action) = filter.default {
                    draft.import_default(action);
                }
            }
        }
    }

}
