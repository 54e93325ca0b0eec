//! Resource roots
//!
//! A resource root is one ordered source of class and resource bytes local
//! to a module: a directory, an archive, or an in-memory table. Roots speak
//! plain `std::io` errors; the module wraps them with its identifier and the
//! offending path.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Source of class and resource bytes for a single module
pub trait ResourceRoot: Send + Sync + fmt::Debug {
    /// Read the bytes stored at `path`, `None` if the root has no such entry
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>>;

    /// Check whether an entry exists at `path`
    fn contains(&self, path: &str) -> io::Result<bool> {
        Ok(self.read(path)?.is_some())
    }

    /// All entry paths under `prefix`, in the root's own order
    ///
    /// An empty prefix lists everything.
    fn list(&self, prefix: &str) -> io::Result<Vec<String>>;

    /// Every entry path in the root
    fn paths(&self) -> io::Result<Vec<String>> {
        self.list("")
    }

    /// Human-readable location, used in resource URLs and diagnostics
    fn location(&self) -> String;
}

/// Normalize a resource path: no leading slash, no empty segments
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Directory part of a resource path, `""` for top-level resources
///
/// Module filters match against this rather than the full path, so for a
/// class file the subject is its package directory.
pub fn resource_dir(path: &str) -> &str {
    let path = path.trim_matches('/');
    match path.rfind('/') {
        Some(split) => path[..split].trim_end_matches('/'),
        None => "",
    }
}

/// Check whether `path` lies under the directory-style `prefix`
pub fn has_prefix(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// In-memory resource root
///
/// Entries are kept sorted by path, which is also their listing order.
#[derive(Clone, Default)]
pub struct MemoryRoot {
    label: String,
    entries: BTreeMap<String, Arc<[u8]>>,
}

impl MemoryRoot {
    /// Create an empty root labelled `label` in diagnostics
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Add a resource at `path`
    pub fn with_resource(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    /// Add class bytes for a dotted class name (`a.b.C` is stored as `a/b/C.class`)
    pub fn with_class(mut self, class_name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(&crate::class::class_path(class_name), bytes);
        self
    }

    /// Add or replace a resource at `path`
    pub fn insert(&mut self, path: &str, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.entries.insert(normalize_path(path), Arc::from(bytes));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MemoryRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRoot")
            .field("label", &self.label)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ResourceRoot for MemoryRoot {
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .get(&normalize_path(path))
            .map(|bytes| bytes.to_vec()))
    }

    fn contains(&self, path: &str) -> io::Result<bool> {
        Ok(self.entries.contains_key(&normalize_path(path)))
    }

    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let prefix = normalize_path(prefix);
        Ok(self
            .entries
            .keys()
            .filter(|path| has_prefix(path, &prefix))
            .cloned()
            .collect())
    }

    fn location(&self) -> String {
        format!("memory:{}", self.label)
    }
}
