//! Class lookup and the definition seam
//!
//! The engine never turns bytes into a loaded class itself. It finds the
//! bytes and the module that owns them, and hands both to a [`ClassDefiner`]
//! supplied by the host.

use crate::module::Module;
use std::sync::Arc;

/// Suffix of class entries inside a resource root
pub const CLASS_SUFFIX: &str = ".class";

/// Resource path of a dotted class name: `a.b.C` is `a/b/C.class`
pub fn class_path(class_name: &str) -> String {
    format!("{}{}", class_name.replace('.', "/"), CLASS_SUFFIX)
}

/// Dotted class name of a resource path, if it names a class entry
pub fn class_name(path: &str) -> Option<String> {
    path.strip_suffix(CLASS_SUFFIX)
        .filter(|stem| !stem.is_empty())
        .map(|stem| stem.trim_start_matches('/').replace('/', "."))
}

/// Host primitive that defines a class from resolved bytes
pub trait ClassDefiner {
    /// Loaded class handle produced by the host
    type Class;
    /// Host error type
    type Error: std::fmt::Display;

    /// Define `name` from `bytes`, owned by `module`
    fn define_class(
        &self,
        name: &str,
        bytes: &[u8],
        module: &Arc<Module>,
    ) -> Result<Self::Class, Self::Error>;
}
