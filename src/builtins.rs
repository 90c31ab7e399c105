//! Built-in commands
//!
//! These are always available, with or without plugins, and shadow any
//! plugin command of the same name.

use std::io::Write;

use chrono::Local;
use tracing::{debug, warn};

use crate::codec::ArgumentVector;
use crate::command::{Command, CommandTable};
use crate::dispatch::{respond, ExitCode};
use crate::error::TableError;
use crate::host::HostState;

/// Handler signature shared by every built-in.
pub type Builtin = fn(&mut Session<'_>, &ArgumentVector<'_>) -> ExitCode;

/// Everything a built-in may touch during one dispatch.
pub struct Session<'a> {
    pub state: &'a mut HostState,
    pub channel: &'a mut dyn Write,
    /// The table the command was found in; `help` lists it.
    pub builtins: &'a CommandTable<Builtin>,
}

impl Session<'_> {
    /// Send `text` as one response line.
    pub fn respond(&mut self, text: &str) {
        respond(&mut *self.channel, text);
    }

    /// Send pre-formatted text as is.
    pub fn send(&mut self, text: &str) {
        if let Err(e) = self.channel.write_all(text.as_bytes()) {
            warn!("Failed to write response: {}", e);
        }
    }
}

pub const MODULE_NOT_FOUND: &str = "Cannot find module.";
pub const INVALID_OPTION: &str = "Invalid option.";
pub const NOT_UNDERSTOOD: &str = "Sorry I'm having trouble, what do you mean?";

fn builtin(name: &str, signature: &str, description: &str, handler: Builtin) -> Result<Command<Builtin>, TableError> {
    Command::new(name, signature, description, handler)
}

/// The standard built-in table, in `help` order.
///
/// # Errors
/// Only if an entry below is malformed.
pub fn table() -> Result<CommandTable<Builtin>, TableError> {
    CommandTable::try_from(vec![
        builtin("help", "", "Display command information.", help)?,
        builtin("when", "s", "Display the time or date ('time' or 'date').", when)?,
        builtin("list", "", "List the contents of the current directory.", list)?,
        builtin("sdir", "s", "Switch to a different directory.", sdir)?,
        builtin("pdir", "", "Switch to the previous directory.", pdir)?,
        builtin("cdir", "", "Display the current directory.", cdir)?,
        builtin("run", "s", "Run an invokable module.", run)?,
        builtin("mods", "s", "Manage modules (show, start, stop, reload).", mods)?,
        builtin("exit", "", "Close the session.", exit)?,
    ])
}

fn help(session: &mut Session<'_>, _args: &ArgumentVector<'_>) -> ExitCode {
    let mut text = session.builtins.help_text();
    text.push_str(&session.state.registry().contributed_help());
    session.send(&text);
    ExitCode::SUCCESS
}

fn when(session: &mut Session<'_>, args: &ArgumentVector<'_>) -> ExitCode {
    let now = Local::now();
    match args.text(0) {
        Some("time") => session.respond(&now.format("%H:%M:%S").to_string()),
        Some("date") => session.respond(&now.format("%B %-d, %Y").to_string()),
        _ => session.respond(NOT_UNDERSTOOD),
    }
    ExitCode::SUCCESS
}

fn list(session: &mut Session<'_>, _args: &ArgumentVector<'_>) -> ExitCode {
    let entries = match std::fs::read_dir(".") {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list current directory: {}", e);
            session.respond("Cannot open directory.");
            return ExitCode::FAILURE;
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    for name in &names {
        session.respond(name);
    }
    ExitCode::SUCCESS
}

fn change_dir(path: &str) -> ExitCode {
    match std::env::set_current_dir(path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("Cannot change directory to {}: {}", path, e);
            ExitCode::FAILURE
        }
    }
}

fn sdir(session: &mut Session<'_>, args: &ArgumentVector<'_>) -> ExitCode {
    let path = args.text(0).unwrap_or_default();
    session.respond(&format!("Directory: {path}"));
    change_dir(path)
}

fn pdir(session: &mut Session<'_>, _args: &ArgumentVector<'_>) -> ExitCode {
    session.respond("Previous directory.");
    change_dir("..")
}

fn cdir(session: &mut Session<'_>, _args: &ArgumentVector<'_>) -> ExitCode {
    match std::env::current_dir() {
        Ok(dir) => {
            session.respond(&format!("Current directory: {}", dir.display()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            warn!("Cannot read current directory: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(session: &mut Session<'_>, args: &ArgumentVector<'_>) -> ExitCode {
    let name = args.text(0).unwrap_or_default();
    match session.state.registry().run(name, &mut *session.channel) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("run {}: {}", name, e);
            session.respond(MODULE_NOT_FOUND);
            ExitCode::FAILURE
        }
    }
}

fn mods(session: &mut Session<'_>, args: &ArgumentVector<'_>) -> ExitCode {
    match args.text(0) {
        Some("show") => {
            let names: String = session
                .state
                .registry()
                .invokables()
                .map(|plugin| format!("{}\r\n", plugin.name()))
                .collect();
            session.send(&names);
            ExitCode::SUCCESS
        }
        Some("start") => {
            if session.state.plugins_loaded() {
                session.respond("Plugins loaded already!");
                return ExitCode::FAILURE;
            }
            start(session, "Plugins started!")
        }
        Some("stop") => {
            if !session.state.plugins_loaded() {
                session.respond("Plugins unloaded already!");
                return ExitCode::FAILURE;
            }
            session.state.unload_plugins();
            session.respond("Plugins stopped!");
            ExitCode::SUCCESS
        }
        Some("reload") => {
            if !session.state.plugins_loaded() {
                session.respond("Plugins not loaded use 'start'.");
                return ExitCode::FAILURE;
            }
            session.state.unload_plugins();
            start(session, "Plugins reloaded!")
        }
        _ => {
            session.respond(INVALID_OPTION);
            ExitCode::FAILURE
        }
    }
}

/// Discover plugins and run their registration call, answering `done` on
/// success.
fn start(session: &mut Session<'_>, done: &str) -> ExitCode {
    if let Err(e) = session.state.load_plugins() {
        warn!("{}", e);
        session.respond("Cannot open plugin directory.");
        return ExitCode::FAILURE;
    }
    session.state.registry_mut().broadcast_register(&mut *session.channel);
    session.respond(done);
    ExitCode::SUCCESS
}

fn exit(session: &mut Session<'_>, _args: &ArgumentVector<'_>) -> ExitCode {
    session.state.finish();
    ExitCode::SUCCESS
}
