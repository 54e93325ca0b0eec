//! Module identifiers
//!
//! A module is named by `(group, name, slot)`. The textual form is
//! `group:name:slot`; shorter forms fill in an empty group and the
//! `main` slot. An identifier without a group and with a non-default slot
//! is written `:name:slot`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Slot used when an identifier does not name one
pub const DEFAULT_SLOT: &str = "main";

/// Errors that can occur while parsing an identifier
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// Empty input or an empty component
    #[error("Empty {0} in module identifier")]
    EmptyComponent(&'static str),

    /// More than three `:`-separated components
    #[error("Too many components in module identifier: {0}")]
    TooManyComponents(String),
}

/// Structured module identifier, the key of every module table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleIdentifier {
    group: String,
    name: String,
    slot: String,
}

impl ModuleIdentifier {
    /// Create an identifier from its three components
    pub fn new(group: impl Into<String>, name: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            slot: slot.into(),
        }
    }

    /// Create an identifier with no group in the default slot
    ///
    /// Used for modules named after a single file, such as an archive.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self::new("", name, DEFAULT_SLOT)
    }

    /// Parse `name`, `group:name` or `group:name:slot`
    pub fn parse(text: &str) -> Result<Self, IdentifierError> {
        let parts: Vec<&str> = text.split(':').collect();
        let (group, name, slot) = match parts.as_slice() {
            [name] => ("", *name, DEFAULT_SLOT),
            [group, name] => (*group, *name, DEFAULT_SLOT),
            [group, name, slot] => (*group, *name, *slot),
            _ => return Err(IdentifierError::TooManyComponents(text.to_string())),
        };

        if name.is_empty() {
            return Err(IdentifierError::EmptyComponent("name"));
        }
        if slot.is_empty() {
            return Err(IdentifierError::EmptyComponent("slot"));
        }
        // "group:name" must carry a group
        if parts.len() == 2 && group.is_empty() {
            return Err(IdentifierError::EmptyComponent("group"));
        }

        Ok(Self::new(group, name, slot))
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version or slot component
    pub fn slot(&self) -> &str {
        &self.slot
    }
}

impl fmt::Display for ModuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            if self.slot == DEFAULT_SLOT {
                write!(f, "{}", self.name)
            } else {
                write!(f, ":{}:{}", self.name, self.slot)
            }
        } else {
            write!(f, "{}:{}:{}", self.group, self.name, self.slot)
        }
    }
}

impl FromStr for ModuleIdentifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModuleIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModuleIdentifier> for String {
    fn from(id: ModuleIdentifier) -> Self {
        id.to_string()
    }
}
