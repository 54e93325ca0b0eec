//! Errors produced by module resolution and lookup
//!
//! `ModuleError` is `Clone` so that the outcome of one failed resolution
//! attempt can be handed to every caller that was waiting on it.

use crate::identifier::ModuleIdentifier;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// What a duplicate declaration in a module spec refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Root,
    Dependency,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationKind::Root => write!(f, "resource root"),
            DeclarationKind::Dependency => write!(f, "dependency"),
        }
    }
}

/// Errors that can occur while building, resolving or reading modules
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// No spec for the identifier in the loader or its parents
    #[error("Module not found: {identifier}{}", format_chain(.chain))]
    ModuleNotFound {
        identifier: ModuleIdentifier,
        /// Modules whose dependencies led to this request, outermost first
        chain: Vec<ModuleIdentifier>,
    },

    /// Same root name or dependency target declared twice
    #[error("Duplicate {kind} '{name}' in module {module}")]
    DuplicateDeclaration {
        module: ModuleIdentifier,
        kind: DeclarationKind,
        name: String,
    },

    /// Filter pattern that cannot be compiled
    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A resource root failed to read or list a path
    #[error("Failed to read '{path}' in module {module}: {source}")]
    ResourceRead {
        module: ModuleIdentifier,
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A finder could not produce a spec for an identifier it knows about
    #[error("Failed to load spec for module {identifier}: {message}")]
    SpecLoad {
        identifier: ModuleIdentifier,
        message: String,
    },

    /// The class definition primitive rejected the bytes
    #[error("Failed to define class '{class}' in module {module}: {message}")]
    ClassDefinition {
        module: ModuleIdentifier,
        class: String,
        message: String,
    },

    /// A dependency edge points at a module its loader has released
    #[error("Module {identifier} is no longer held by its loader")]
    DetachedModule { identifier: ModuleIdentifier },
}

impl ModuleError {
    pub(crate) fn resource_read(
        module: &ModuleIdentifier,
        path: &str,
        source: std::io::Error,
    ) -> Self {
        ModuleError::ResourceRead {
            module: module.clone(),
            path: path.to_string(),
            source: Arc::new(source),
        }
    }

    /// Identifier of the module this error is about
    pub fn identifier(&self) -> Option<&ModuleIdentifier> {
        match self {
            ModuleError::ModuleNotFound { identifier, .. }
            | ModuleError::SpecLoad { identifier, .. }
            | ModuleError::DetachedModule { identifier } => Some(identifier),
            ModuleError::DuplicateDeclaration { module, .. }
            | ModuleError::ResourceRead { module, .. }
            | ModuleError::ClassDefinition { module, .. } => Some(module),
            ModuleError::InvalidPattern { .. } => None,
        }
    }
}

fn format_chain(chain: &[ModuleIdentifier]) -> String {
    if chain.is_empty() {
        return String::new();
    }
    let path: Vec<String> = chain.iter().map(|id| id.to_string()).collect();
    format!(" (required by {})", path.join(" -> "))
}

pub type Result<T> = std::result::Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_includes_chain() {
        let err = ModuleError::ModuleNotFound {
            identifier: ModuleIdentifier::new("test", "d", "1.0"),
            chain: vec![
                ModuleIdentifier::new("test", "a", "1.0"),
                ModuleIdentifier::new("test", "b", "1.0"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Module not found: test:d:1.0 (required by test:a:1.0 -> test:b:1.0)"
        );
    }

    #[test]
    fn test_not_found_message_without_chain() {
        let err = ModuleError::ModuleNotFound {
            identifier: ModuleIdentifier::from_name("missing"),
            chain: vec![],
        };
        assert_eq!(err.to_string(), "Module not found: missing");
    }

    #[test]
    fn test_resource_read_keeps_source() {
        use std::error::Error as _;

        let module = ModuleIdentifier::from_name("app");
        let err = ModuleError::resource_read(
            &module,
            "a/b.txt",
            std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"),
        );
        assert_eq!(err.identifier(), Some(&module));
        assert!(err.source().is_some());
        // Clones share the underlying io::Error
        let copy = err.clone();
        assert_eq!(copy.to_string(), err.to_string());
    }
}
