//! Filesystem and zip-archive resource roots

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::{has_prefix, normalize_path, ResourceRoot};
use zip::result::ZipError;
use zip::ZipArchive;

/// File extensions treated as archive roots
pub const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip"];

/// Check whether `path` names an archive by its extension
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ARCHIVE_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
        .unwrap_or(false)
}

/// Open a directory or archive as a resource root
pub fn open_root(path: &Path) -> io::Result<Arc<dyn ResourceRoot>> {
    if path.is_dir() {
        Ok(Arc::new(DirectoryRoot::new(path)?))
    } else if is_archive(path) {
        Ok(Arc::new(ArchiveRoot::open(path)?))
    } else if path.exists() {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a directory or archive: {}", path.display()),
        ))
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("resource root does not exist: {}", path.display()),
        ))
    }
}

// ============================================================================
// Directory
// ============================================================================

/// Resource root over a directory tree
#[derive(Debug, Clone)]
pub struct DirectoryRoot {
    base: PathBuf,
}

impl DirectoryRoot {
    pub fn new(base: &Path) -> io::Result<Self> {
        // Canonicalize so locations are stable regardless of how the root was named
        let base = base.canonicalize()?;
        if !base.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a directory: {}", base.display()),
            ));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Filesystem path of a resource, `None` if it would leave the root
    fn file_path(&self, path: &str) -> Option<PathBuf> {
        let path = normalize_path(path);
        if path.split('/').any(|segment| segment == ".." || segment == ".") {
            return None;
        }
        Some(self.base.join(path))
    }

    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> io::Result<()> {
        let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.walk(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.base) {
                let segments: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(segments.join("/"));
            }
        }
        Ok(())
    }
}

impl ResourceRoot for DirectoryRoot {
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        match self.file_path(path) {
            Some(file) if file.is_file() => fs::read(file).map(Some),
            _ => Ok(None),
        }
    }

    fn contains(&self, path: &str) -> io::Result<bool> {
        Ok(self.file_path(path).map(|file| file.is_file()).unwrap_or(false))
    }

    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let Some(start) = self.file_path(prefix) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        if start.is_dir() {
            self.walk(&start, &mut out)?;
        } else if start.is_file() {
            out.push(normalize_path(prefix));
        }
        Ok(out)
    }

    fn location(&self) -> String {
        format!("file:{}", self.base.display())
    }
}

// ============================================================================
// Archive
// ============================================================================

/// Resource root over a zip archive (`.jar` or `.zip`)
///
/// The entry index is read once when the archive is opened; reads share one
/// open handle.
pub struct ArchiveRoot {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
    /// File entries in archive order, normalized
    entries: Vec<String>,
    /// Normalized name to archive index; entry names may carry `//` or a
    /// leading `/` that lookups by name would not match
    index: HashMap<String, usize>,
}

impl ArchiveRoot {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file).map_err(zip_error)?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut index = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(zip_error)?;
            if entry.is_dir() {
                continue;
            }
            let name = normalize_path(entry.name());
            // First entry wins when two names normalize alike
            if !index.contains_key(&name) {
                index.insert(name.clone(), i);
                entries.push(name);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            archive: Mutex::new(archive),
            entries,
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the archive, e.g. `app.jar`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl fmt::Debug for ArchiveRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveRoot")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ResourceRoot for ArchiveRoot {
    fn read(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let Some(&position) = self.index.get(&normalize_path(path)) else {
            return Ok(None);
        };
        let mut archive = self.archive.lock();
        let mut entry = archive.by_index(position).map_err(zip_error)?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    fn contains(&self, path: &str) -> io::Result<bool> {
        Ok(self.index.contains_key(&normalize_path(path)))
    }

    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let prefix = normalize_path(prefix);
        Ok(self
            .entries
            .iter()
            .filter(|entry| has_prefix(entry, &prefix))
            .cloned()
            .collect())
    }

    fn location(&self) -> String {
        format!("jar:{}", self.path.display())
    }
}

fn zip_error(e: ZipError) -> io::Error {
    match e {
        ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}
