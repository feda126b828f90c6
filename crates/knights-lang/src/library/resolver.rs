use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::Library;
use crate::library::error::LoadError;

/// Resolves the path named by a `{! path !}` directive into a library.
pub trait LibraryResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Result<Library, LoadError>;
}

impl<F> LibraryResolver for F
where
    F: Fn(&str) -> Result<Library, LoadError> + Send + Sync,
{
    fn resolve(&self, path: &str) -> Result<Library, LoadError> {
        self(path)
    }
}

/// A resolver over a fixed set of libraries registered up front.
#[derive(Debug, Clone, Default)]
pub struct StaticLibraryResolver {
    libraries: FxHashMap<SmolStr, Library>,
}

impl StaticLibraryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<SmolStr>, library: Library) -> &mut Self {
        self.libraries.insert(path.into(), library);
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.libraries.keys().map(SmolStr::as_str)
    }
}

impl LibraryResolver for StaticLibraryResolver {
    fn resolve(&self, path: &str) -> Result<Library, LoadError> {
        self.libraries
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }
}
