//! Shared-library loading for plugins.
//!
//! `PluginLibrary` is the only place a raw library handle exists. It owns the
//! `libloading::Library`, resolves the entry symbol once at load time, and
//! unloads the library exactly once when dropped.

use std::env::consts::DLL_EXTENSION;
use std::path::{Path, PathBuf};

use ember_sdk::{EntryPoint, ENTRY_SYMBOL};
use libloading::Library;
use tracing::debug;

use crate::error::PluginLoadError;

/// A loaded plugin library with its resolved entry point.
#[derive(Debug)]
pub struct PluginLibrary {
    entry: EntryPoint,
    path: PathBuf,
    // Dropped last: `entry` must never be called once this is gone.
    library: Library,
}

impl PluginLibrary {
    /// Load `path` and resolve [`ENTRY_SYMBOL`].
    ///
    /// # Errors
    /// [`PluginLoadError::Open`] if the file is not a loadable library,
    /// [`PluginLoadError::MissingEntryPoint`] if it lacks the symbol.
    pub fn open(path: &Path) -> Result<Self, PluginLoadError> {
        // Safety: loading runs the library's initializers. Plugins are trusted
        // code by contract; there is no sandbox.
        let library = unsafe { Library::new(path) }.map_err(|source| PluginLoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        // Safety: the symbol is declared by the SDK with exactly this type.
        // The copied fn pointer lives alongside the library that backs it.
        let entry = unsafe { library.get::<EntryPoint>(ENTRY_SYMBOL) }
            .map(|symbol| *symbol)
            .map_err(|source| PluginLoadError::MissingEntryPoint {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Opened plugin library: {}", path.display());

        Ok(Self {
            entry,
            path: path.to_path_buf(),
            library,
        })
    }

    #[must_use]
    pub fn entry(&self) -> EntryPoint {
        self.entry
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PluginLibrary {
    fn drop(&mut self) {
        debug!("Unloading plugin library: {}", self.path.display());
    }
}

/// Whether `path` has this platform's shared-library extension.
#[must_use]
pub fn is_library_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == DLL_EXTENSION)
}
