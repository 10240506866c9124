//! Locating and reading source units.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use super::error::{ExchangeError, Result};

/// The text of one script together with where it came from.
#[derive(Clone, Debug)]
pub struct SourceUnit {
    language: String,
    path: PathBuf,
    text: Arc<str>,
}

impl SourceUnit {
    pub fn new(language: impl Into<String>, path: impl Into<PathBuf>, text: impl Into<Arc<str>>) -> Self {
        SourceUnit {
            language: language.into(),
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Reads source text for `eval`.
pub trait SourceLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<String>;

    fn exists(&self, path: &Path) -> bool;
}

/// Loads sources from disk, resolving relative paths against `root`.
#[derive(Clone, Debug, Default)]
pub struct FileSystemLoader {
    root: Option<PathBuf>,
}

impl FileSystemLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        FileSystemLoader {
            root: Some(root.into()),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl SourceLoader for FileSystemLoader {
    fn load(&self, path: &Path) -> Result<String> {
        let full = self.full_path(path);
        std::fs::read_to_string(&full).map_err(|e| ExchangeError::SourceNotFound {
            path: full,
            source: Some(e),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.full_path(path).is_file()
    }
}

/// Serves sources from memory. Clones share the same files.
#[derive(Clone, Debug, Default)]
pub struct MemoryLoader {
    files: Arc<RwLock<BTreeMap<PathBuf, Arc<str>>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, P, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: AsRef<Path>,
        S: Into<Arc<str>>,
    {
        let loader = Self::new();
        for (path, text) in files {
            loader.insert(path, text);
        }
        loader
    }

    pub fn insert(&self, path: impl AsRef<Path>, text: impl Into<Arc<str>>) {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.insert(normalize(path.as_ref()), text.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<String> {
        let normalized = normalize(path);
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files
            .get(&normalized)
            .map(|text| text.to_string())
            .ok_or(ExchangeError::SourceNotFound {
                path: normalized,
                source: None,
            })
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files.contains_key(&normalize(path))
    }
}

/// Removes `.` components and folds `..` into the preceding component.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolves `path` as written inside the unit at `including`.
pub fn resolve_relative(including: Option<&Path>, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize(path);
    }
    match including.and_then(Path::parent) {
        Some(dir) => normalize(&dir.join(path)),
        None => normalize(path),
    }
}

/// A host file is an entry point: its file stem ends in `host`.
pub fn is_host_path(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with("host"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_follow_the_including_unit() {
        assert_eq!(
            resolve_relative(Some(Path::new("demo/host.lisp")), Path::new("guest1.jss")),
            PathBuf::from("demo/guest1.jss")
        );
        assert_eq!(
            resolve_relative(Some(Path::new("demo/a/b.lisp")), Path::new("../c.lisp")),
            PathBuf::from("demo/c.lisp")
        );
        assert_eq!(
            resolve_relative(None, Path::new("./guest.lisp")),
            PathBuf::from("guest.lisp")
        );
    }

    #[test]
    fn memory_loader_reports_missing_sources() {
        let loader = MemoryLoader::with_files([("a/b.lisp", "(print 1)")]);
        assert!(loader.exists(Path::new("a/./b.lisp")));
        assert_eq!(loader.load(Path::new("a/b.lisp")).unwrap(), "(print 1)");
        assert!(matches!(
            loader.load(Path::new("a/c.lisp")),
            Err(ExchangeError::SourceNotFound { path, .. }) if path == Path::new("a/c.lisp")
        ));
    }

    #[test]
    fn host_files_are_recognized_by_stem() {
        assert!(is_host_path(Path::new("examples/host.lisp")));
        assert!(is_host_path(Path::new("typing_host.jss")));
        assert!(!is_host_path(Path::new("guest1.jss")));
        assert!(!is_host_path(Path::new("host.d/guest.lisp")));
    }

    #[test]
    fn file_system_loader_fails_with_source_not_found() {
        let loader = FileSystemLoader::with_root("/nonexistent-polyglot-root");
        assert!(!loader.exists(Path::new("missing.lisp")));
        assert!(matches!(
            loader.load(Path::new("missing.lisp")),
            Err(ExchangeError::SourceNotFound { source: Some(_), .. })
        ));
    }
}
