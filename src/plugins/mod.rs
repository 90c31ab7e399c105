// Plugin registry: discovery, registration and invocation of plugin modules
pub mod api;
pub mod loader;

// Safety model:
// - Every library handle is owned by exactly one `PluginLibrary` and unloaded on drop
// - Only typed entry points and command handlers leave this module, never raw symbols
// - Registration status is tracked here, not by the plugins themselves
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use ember_sdk::EntryPoint;
pub use ember_sdk::Role;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandTable};
use crate::error::{LookupError, PluginLoadError, RegistryError};

use api::{Declaration, Declared, ForeignHandler};
use loader::{is_library_candidate, PluginLibrary};

/// Identities are process-wide and never reused, even across teardown.
static NEXT_PLUGIN_ID: AtomicU32 = AtomicU32::new(0);

/// Numeric identity assigned to a plugin when it is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginId(u32);

impl PluginId {
    fn next() -> Self {
        Self(NEXT_PLUGIN_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
enum Source {
    Library(PluginLibrary),
    /// Entry point compiled into the host.
    Linked,
}

/// A loaded plugin
#[derive(Debug)]
pub struct Plugin {
    id: PluginId,
    name: String,
    role: Role,
    registered: bool,
    commands: Option<CommandTable<ForeignHandler>>,
    entry: EntryPoint,
    // Declared last so the library outlives the command table pointing into it
    source: Source,
}

impl Plugin {
    fn new(name: String, entry: EntryPoint, source: Source) -> Self {
        Self {
            id: PluginId::next(),
            name,
            role: Role::Unknown,
            registered: false,
            commands: None,
            entry,
            source,
        }
    }

    #[must_use]
    pub fn id(&self) -> PluginId {
        self.id
    }

    /// Display name: the library's file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display name truncated at its first `.`; what `run` matches against.
    #[must_use]
    pub fn module_name(&self) -> &str {
        self.name
            .split_once('.')
            .map_or(self.name.as_str(), |(stem, _)| stem)
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Present only for command contributors, and then never empty.
    #[must_use]
    pub fn commands(&self) -> Option<&CommandTable<ForeignHandler>> {
        self.commands.as_ref()
    }

    /// Library path, or `None` for plugins linked into the host.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Library(library) => Some(library.path()),
            Source::Linked => None,
        }
    }

    fn call_entry(&self, channel: &mut dyn Write) -> Declaration {
        api::call_entry(self.entry, self.registered, channel)
    }

    fn complete_registration(&mut self, declaration: Declaration) {
        self.registered = true;

        match declaration {
            None => debug!("Plugin {} declared no role", self.name),
            Some(Err(e)) => warn!("Rejected declaration from plugin {}: {}", self.name, e),
            Some(Ok(Declared::Unknown)) => debug!("Plugin {} declared an unknown role", self.name),
            Some(Ok(Declared::Invokable)) => self.role = Role::Invokable,
            Some(Ok(Declared::Commands(table))) => {
                self.role = Role::CommandContributor;
                self.commands = Some(table);
            }
        }

        info!("Registered plugin {} {} as {}", self.id, self.name, self.role);
    }
}

/// Outcome of one discovery pass.
#[derive(Debug, Default)]
pub struct LoadSummary {
    /// Display names of the plugins added, in load order.
    pub loaded: Vec<String>,
    /// Candidates that could not be loaded.
    pub skipped: Vec<(PathBuf, PluginLoadError)>,
}

/// Plugin registry for loading and managing plugins
///
/// Owns every plugin and therefore every library handle. Plugins keep their
/// load order, which is also the order commands are resolved in.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Load every shared library in `dir` that exports the entry point.
    ///
    /// Candidates are loaded in file-name order. Files that fail to load are
    /// reported in the summary and otherwise ignored.
    ///
    /// # Errors
    /// [`RegistryError::Io`] if the directory itself cannot be read.
    pub fn discover(&mut self, dir: &Path) -> Result<LoadSummary, RegistryError> {
        let entries = std::fs::read_dir(dir).map_err(|source| RegistryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    warn!("Failed to read entry in {}: {}", dir.display(), e);
                    None
                }
            })
            .filter(|path| path.is_file() && is_library_candidate(path))
            .collect();
        candidates.sort();

        let mut summary = LoadSummary::default();
        for path in candidates {
            match PluginLibrary::open(&path) {
                Ok(library) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let plugin = Plugin::new(name.clone(), library.entry(), Source::Library(library));
                    info!("Loaded plugin {}: {}", plugin.id, path.display());
                    self.plugins.push(plugin);
                    summary.loaded.push(name);
                }
                Err(e) => {
                    warn!("Skipping plugin candidate: {}", e);
                    summary.skipped.push((path, e));
                }
            }
        }

        info!("Total plugins loaded {}.", summary.loaded.len());
        Ok(summary)
    }

    /// Register an entry point compiled into the host under `name`.
    ///
    /// Linked plugins go through the same registration and role rules as
    /// loaded ones and are dropped by [`teardown`](Self::teardown) too.
    pub fn link(&mut self, name: impl Into<String>, entry: EntryPoint) -> PluginId {
        let plugin = Plugin::new(name.into(), entry, Source::Linked);
        let id = plugin.id;
        debug!("Linked plugin {} {}", id, plugin.name);
        self.plugins.push(plugin);
        id
    }

    /// Call every plugin's entry point once, in load order.
    ///
    /// Unregistered plugins get to declare their role during this call;
    /// afterwards they are registered and the role is fixed. Registered
    /// plugins simply run their entry point again.
    pub fn broadcast_register(&mut self, channel: &mut dyn Write) {
        for plugin in &mut self.plugins {
            let declaration = plugin.call_entry(channel);
            if !plugin.registered {
                plugin.complete_registration(declaration);
            }
        }
    }

    /// First invokable plugin whose module name equals `name` exactly.
    #[must_use]
    pub fn find_invokable(&self, name: &str) -> Option<&Plugin> {
        self.plugins
            .iter()
            .find(|p| p.role == Role::Invokable && p.module_name() == name)
    }

    /// Run an invokable plugin's entry point.
    ///
    /// # Errors
    /// [`LookupError::NotInvokable`] if `plugin` is not an invokable plugin.
    pub fn invoke(&self, plugin: &Plugin, channel: &mut dyn Write) -> Result<(), LookupError> {
        if plugin.role != Role::Invokable {
            return Err(LookupError::NotInvokable(plugin.name.clone()));
        }
        debug!("Invoking plugin {} {}", plugin.id, plugin.name);
        // Registered plugins cannot declare anything; nothing to collect
        let _ = plugin.call_entry(channel);
        Ok(())
    }

    /// [`find_invokable`](Self::find_invokable) followed by [`invoke`](Self::invoke).
    ///
    /// # Errors
    /// [`LookupError::NotFound`] if no invokable plugin has that name.
    pub fn run(&self, name: &str, channel: &mut dyn Write) -> Result<(), LookupError> {
        let plugin = self
            .find_invokable(name)
            .ok_or_else(|| LookupError::NotFound(name.to_string()))?;
        self.invoke(plugin, channel)
    }

    /// Every command contributor with its table, in load order.
    pub fn commands_of_contributors(
        &self,
    ) -> impl Iterator<Item = (&Plugin, &CommandTable<ForeignHandler>)> + '_ {
        self.plugins
            .iter()
            .filter(|p| p.role == Role::CommandContributor)
            .filter_map(|p| p.commands.as_ref().map(|table| (p, table)))
    }

    /// First contributed command whose name starts with `token`, scanning
    /// plugins in load order and each table in declaration order.
    #[must_use]
    pub fn resolve_command(&self, token: &str) -> Option<(&Plugin, &Command<ForeignHandler>)> {
        self.commands_of_contributors()
            .find_map(|(plugin, table)| table.find_prefix(token).map(|cmd| (plugin, cmd)))
    }

    /// Invokable plugins, in load order.
    pub fn invokables(&self) -> impl Iterator<Item = &Plugin> + '_ {
        self.plugins.iter().filter(|p| p.role == Role::Invokable)
    }

    /// `help` lines for every contributed command.
    #[must_use]
    pub fn contributed_help(&self) -> String {
        self.commands_of_contributors()
            .map(|(_, table)| table.help_text())
            .collect()
    }

    /// Unload every plugin. Calling this on an empty registry does nothing.
    pub fn teardown(&mut self) {
        if self.plugins.is_empty() {
            return;
        }
        let count = self.plugins.len();
        self.plugins.clear();
        info!("Plugins deactivated ({} unloaded).", count);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Plugin> {
        self.plugins.iter()
    }

    #[must_use]
    pub fn get(&self, id: PluginId) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Drop for PluginRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_sdk::{command, handler, Args, Channel, PluginHandle, RawChannel, RawCommand, Registration};
    use tempfile::tempdir;

    handler!(fn noop => noop_impl);

    fn noop_impl(_channel: &mut Channel<'_>, _args: &Args<'_>) -> i32 {
        0
    }

    static FIRST: [RawCommand; 1] = [command!("addu", "", "First.", noop)];
    static SECOND: [RawCommand; 1] = [command!("addv", "", "Second.", noop)];

    unsafe extern "C" fn first_contributor(plugin: *mut PluginHandle, _channel: *mut RawChannel) {
        if let Some(mut registration) = Registration::from_raw(plugin) {
            if !registration.is_registered() {
                registration.declare_commands(&FIRST);
            }
        }
    }

    unsafe extern "C" fn second_contributor(plugin: *mut PluginHandle, _channel: *mut RawChannel) {
        if let Some(mut registration) = Registration::from_raw(plugin) {
            if !registration.is_registered() {
                registration.declare_commands(&SECOND);
            }
        }
    }

    unsafe extern "C" fn greeter(plugin: *mut PluginHandle, channel: *mut RawChannel) {
        if let (Some(mut registration), Some(mut channel)) =
            (Registration::from_raw(plugin), Channel::from_raw(channel))
        {
            if registration.is_registered() {
                channel.send_line("Hello world!");
            } else {
                registration.declare_invokable();
            }
        }
    }

    unsafe extern "C" fn silent(_plugin: *mut PluginHandle, _channel: *mut RawChannel) {}

    #[test]
    fn test_plugin_registry_creation() {
        let registry = PluginRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.commands_of_contributors().count(), 0);
    }

    #[test]
    fn test_roles_fixed_after_first_broadcast() {
        let mut registry = PluginRegistry::new();
        registry.link("first.so", first_contributor);
        registry.link("greeter.so", greeter);
        registry.link("silent.so", silent);

        let mut out: Vec<u8> = Vec::new();
        registry.broadcast_register(&mut out);
        assert!(out.is_empty(), "registration call must not greet");

        let roles: Vec<Role> = registry.iter().map(Plugin::role).collect();
        assert_eq!(
            roles,
            vec![Role::CommandContributor, Role::Invokable, Role::Unknown]
        );
        assert!(registry.iter().all(Plugin::is_registered));

        // A second broadcast runs the normal action and re-declares nothing
        registry.broadcast_register(&mut out);
        assert_eq!(out, b"Hello world!\r\n");
        assert_eq!(registry.commands_of_contributors().count(), 1);
        assert_eq!(registry.iter().nth(2).map(Plugin::role), Some(Role::Unknown));
    }

    #[test]
    fn test_find_invokable_matches_module_name_exactly() {
        let mut registry = PluginRegistry::new();
        registry.link("first.so", first_contributor);
        registry.link("greeter.so", greeter);
        registry.broadcast_register(&mut Vec::<u8>::new());

        assert!(registry.find_invokable("greeter").is_some());
        assert!(registry.find_invokable("greet").is_none());
        assert!(registry.find_invokable("greeter.so").is_none());
        // Contributors are invisible to this lookup
        assert!(registry.find_invokable("first").is_none());
    }

    #[test]
    fn test_invoke_requires_invokable_role() {
        let mut registry = PluginRegistry::new();
        let id = registry.link("first.so", first_contributor);
        registry.broadcast_register(&mut Vec::<u8>::new());

        let plugin = registry.get(id).unwrap();
        let err = registry.invoke(plugin, &mut Vec::<u8>::new()).unwrap_err();
        assert_eq!(err, LookupError::NotInvokable("first.so".to_string()));
        assert_eq!(
            registry.run("nothing", &mut Vec::<u8>::new()).unwrap_err(),
            LookupError::NotFound("nothing".to_string())
        );
    }

    #[test]
    fn test_prefix_resolution_first_registered_wins() {
        let mut registry = PluginRegistry::new();
        registry.link("first.so", first_contributor);
        registry.link("second.so", second_contributor);
        registry.broadcast_register(&mut Vec::<u8>::new());

        let (plugin, cmd) = registry.resolve_command("add").unwrap();
        assert_eq!(plugin.name(), "first.so");
        assert_eq!(cmd.name(), "addu");

        let (plugin, cmd) = registry.resolve_command("addv").unwrap();
        assert_eq!(plugin.name(), "second.so");
        assert_eq!(cmd.name(), "addv");
    }

    #[test]
    fn test_ids_monotonic_across_teardown() {
        let mut registry = PluginRegistry::new();
        let a = registry.link("a.so", silent);
        registry.teardown();
        let b = registry.link("a.so", silent);
        assert!(b > a);
    }

    #[test]
    fn test_teardown_twice_is_noop() {
        let mut registry = PluginRegistry::new();
        registry.link("a.so", silent);
        registry.teardown();
        assert!(registry.is_empty());
        registry.teardown();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_discover_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let mut registry = PluginRegistry::new();
        assert!(matches!(
            registry.discover(&missing),
            Err(RegistryError::Io { .. })
        ));
    }

    #[test]
    fn test_discover_skips_bad_candidates() {
        let dir = tempdir().unwrap();
        let ext = std::env::consts::DLL_EXTENSION;
        std::fs::write(dir.path().join(format!("broken.{ext}")), b"garbage").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"not a plugin").unwrap();
        std::fs::create_dir(dir.path().join(format!("folder.{ext}"))).unwrap();

        let mut registry = PluginRegistry::new();
        let summary = registry.discover(dir.path()).unwrap();

        assert!(summary.loaded.is_empty());
        assert_eq!(summary.skipped.len(), 1);
        assert!(registry.is_empty());
    }
}
