//! Dotted module paths derived from source file paths
//!
//! Provides [`ModulePath`], the importable name of a Python source file.

use std::fmt::{self, Display, Formatter};

/// Default directories stripped from the front of a file path
pub const DEFAULT_SOURCE_ROOTS: &[&str] = &["src", "lib"];

/// Importable module path
///
/// # Examples
/// - `src/pkg/shapes.py` → `pkg.shapes`
/// - `pkg/__init__.py` → `pkg`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    /// Create path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Derive the module path of a file
    ///
    /// Strips a leading `./`, the first matching source root, the file
    /// extension and a trailing `__init__` segment, then joins what remains.
    #[must_use]
    pub fn from_file_path<S: AsRef<str>>(file_path: &str, source_roots: &[S]) -> Self {
        let normalized = file_path.replace('\\', "/");
        let mut segments: Vec<&str> = normalized
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();

        if segments.len() > 1 {
            if let Some(root) = source_roots.iter().find_map(|root| {
                let root_segments: Vec<&str> = root
                    .as_ref()
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .collect();
                (!root_segments.is_empty()
                    && segments.len() > root_segments.len()
                    && segments[..root_segments.len()] == root_segments[..])
                    .then_some(root_segments.len())
            }) {
                segments.drain(..root);
            }
        }

        let mut owned: Vec<String> = segments.into_iter().map(str::to_string).collect();
        if let Some(last) = owned.last_mut() {
            if let Some((stem, _ext)) = last.rsplit_once('.') {
                if !stem.is_empty() {
                    *last = stem.to_string();
                }
            }
        }
        if owned.len() > 1 && owned.last().is_some_and(|s| s == "__init__") {
            owned.pop();
        }

        Self(owned)
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Check if no module could be derived
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get last segment (the module's own name)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Get parent package (if any)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() <= 1 {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }
}

impl Display for ModulePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(path: &str) -> String {
        ModulePath::from_file_path(path, DEFAULT_SOURCE_ROOTS).to_string()
    }

    #[test]
    fn strips_source_root_and_extension() {
        assert_eq!(derive("src/pkg/shapes.py"), "pkg.shapes");
        assert_eq!(derive("lib/util.py"), "util");
    }

    #[test]
    fn keeps_paths_without_root() {
        assert_eq!(derive("pkg/calc.py"), "pkg.calc");
        assert_eq!(derive("./pkg/calc.py"), "pkg.calc");
    }

    #[test]
    fn package_init_maps_to_package() {
        assert_eq!(derive("src/pkg/__init__.py"), "pkg");
    }

    #[test]
    fn windows_separators() {
        assert_eq!(derive("src\\pkg\\calc.py"), "pkg.calc");
    }

    #[test]
    fn root_alone_is_not_stripped() {
        // "src.py" is a module named src, not a root directory
        assert_eq!(derive("src.py"), "src");
    }

    #[test]
    fn nested_custom_root() {
        let path = ModulePath::from_file_path("python/src/app/core.py", &["python/src"]);
        assert_eq!(path.to_string(), "app.core");
        assert_eq!(path.last(), Some("core"));
        assert_eq!(path.parent().map(|p| p.to_string()), Some("app".to_string()));
    }

    #[test]
    fn empty_path() {
        assert!(ModulePath::from_file_path("", DEFAULT_SOURCE_ROOTS).is_empty());
    }
}
