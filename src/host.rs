//! The command host: plugin registry, session flags and dispatcher in one
//! value that the server and console drive line by line.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::dispatch::{Dispatcher, ExitCode};
use crate::error::{RegistryError, TableError};
use crate::plugins::{LoadSummary, PluginRegistry};

/// Mutable state shared by every command of a host.
#[derive(Debug)]
pub struct HostState {
    registry: PluginRegistry,
    plugin_dir: PathBuf,
    plugins_loaded: bool,
    done: bool,
}

impl HostState {
    #[must_use]
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry: PluginRegistry::new(),
            plugin_dir: plugin_dir.into(),
            plugins_loaded: false,
            done: false,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    #[must_use]
    pub fn plugins_loaded(&self) -> bool {
        self.plugins_loaded
    }

    /// Discover plugins in the plugin directory. Does not register them.
    ///
    /// # Errors
    /// [`RegistryError::Io`] if the directory cannot be read; the loaded
    /// flag is left unchanged.
    pub fn load_plugins(&mut self) -> Result<LoadSummary, RegistryError> {
        let summary = self.registry.discover(&self.plugin_dir)?;
        self.plugins_loaded = true;
        Ok(summary)
    }

    /// Unload every plugin and clear the loaded flag.
    pub fn unload_plugins(&mut self) {
        self.registry.teardown();
        self.plugins_loaded = false;
    }

    /// Ask the session to end after the current command.
    pub fn finish(&mut self) {
        self.done = true;
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Clear the done flag for a new session.
    pub fn reset_session(&mut self) {
        self.done = false;
    }
}

/// A dispatcher bound to its state.
#[derive(Debug)]
pub struct Host {
    dispatcher: Dispatcher,
    state: HostState,
}

impl Host {
    /// A host with the standard built-ins and no plugins loaded.
    ///
    /// # Errors
    /// Only if the built-in table is malformed.
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Result<Self, TableError> {
        Ok(Self {
            dispatcher: Dispatcher::with_builtins()?,
            state: HostState::new(plugin_dir),
        })
    }

    /// A host for `config`'s plugin directory.
    ///
    /// # Errors
    /// Only if the built-in table is malformed.
    pub fn from_config(config: &Config) -> Result<Self, TableError> {
        Self::new(&config.plugins.directory)
    }

    /// Discover plugins; see [`HostState::load_plugins`].
    ///
    /// # Errors
    /// [`RegistryError::Io`] if the plugin directory cannot be read.
    pub fn start_plugins(&mut self) -> Result<LoadSummary, RegistryError> {
        let summary = self.state.load_plugins()?;
        info!(
            "Plugin directory {}: {} loaded, {} skipped",
            self.state.plugin_dir().display(),
            summary.loaded.len(),
            summary.skipped.len()
        );
        Ok(summary)
    }

    /// Start a session on `channel`: clears the done flag and runs every
    /// plugin's entry point once. Unregistered plugins declare their role
    /// here; registered ones perform their normal action.
    pub fn greet(&mut self, channel: &mut dyn Write) {
        self.state.reset_session();
        debug!("Broadcasting registration to {} plugin(s)", self.state.registry().len());
        self.state.registry_mut().broadcast_register(channel);
    }

    /// Dispatch one command line, answering on `channel`.
    pub fn handle_line(&mut self, line: &str, channel: &mut dyn Write) -> ExitCode {
        self.dispatcher.dispatch(line, &mut self.state, channel)
    }

    /// Whether the current session asked to end.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn state(&self) -> &HostState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut HostState {
        &mut self.state
    }

    /// Unload all plugins. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.state.unload_plugins();
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}
