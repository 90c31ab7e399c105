//! Command dispatch
//!
//! One line in, one [`ExitCode`] out. Built-in commands are matched by exact
//! name first; anything else goes to the plugin registry, where a command is
//! matched by prefix and the first registered plugin wins.

use std::fmt;
use std::io::Write;

use ember_sdk::LINE_END;
use tracing::{debug, warn};

use crate::builtins::{self, Builtin, Session};
use crate::codec::{parse_exact, tokenize};
use crate::command::CommandTable;
use crate::error::{DispatchError, LookupError, TableError};
use crate::host::HostState;

/// Sent when the line holds no tokens.
pub const NO_COMMAND: &str = "No command entered!";
/// Sent when neither a built-in nor a plugin command matches.
pub const BAD_COMMAND: &str = "Bad command.";
/// Sent when the arguments do not satisfy the command's signature.
pub const BAD_ARGUMENTS: &str = "Bad argument(s).";

/// Status returned by a command handler. Zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: Self = Self(0);
    pub const FAILURE: Self = Self(1);

    #[must_use]
    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DispatchError {
    /// The line sent back to the client for this failure.
    #[must_use]
    pub fn response(&self) -> &'static str {
        match self {
            Self::Empty => NO_COMMAND,
            Self::Lookup(_) => BAD_COMMAND,
            Self::Parse(_) => BAD_ARGUMENTS,
        }
    }
}

/// Write `text` followed by a line terminator. Write failures are logged;
/// a client that went away is noticed by the connection loop, not here.
pub fn respond(channel: &mut dyn Write, text: &str) {
    let result = channel
        .write_all(text.as_bytes())
        .and_then(|()| channel.write_all(LINE_END.as_bytes()));
    if let Err(e) = result {
        warn!("Failed to write response: {}", e);
    }
}

/// Routes command lines to built-in and plugin handlers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    builtins: CommandTable<Builtin>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(builtins: CommandTable<Builtin>) -> Self {
        Self { builtins }
    }

    /// A dispatcher over the standard built-in table.
    ///
    /// # Errors
    /// Only if the built-in table itself is malformed.
    pub fn with_builtins() -> Result<Self, TableError> {
        Ok(Self::new(builtins::table()?))
    }

    #[must_use]
    pub fn builtins(&self) -> &CommandTable<Builtin> {
        &self.builtins
    }

    /// Dispatch one line. Lookup and argument failures are answered on
    /// `channel` with a fixed message and reported as [`ExitCode::FAILURE`];
    /// otherwise the handler's own code is returned.
    pub fn dispatch(&self, line: &str, state: &mut HostState, channel: &mut dyn Write) -> ExitCode {
        match self.try_dispatch(line, state, channel) {
            Ok(code) => code,
            Err(e) => {
                debug!("Dispatch of {:?} failed: {}", line.trim_end(), e);
                respond(channel, e.response());
                ExitCode::FAILURE
            }
        }
    }

    /// Like [`dispatch`](Self::dispatch) but hands failures back instead of
    /// answering them.
    ///
    /// # Errors
    /// [`DispatchError::Empty`] for a blank line, [`DispatchError::Lookup`]
    /// for an unknown command, [`DispatchError::Parse`] for bad arguments.
    pub fn try_dispatch(
        &self,
        line: &str,
        state: &mut HostState,
        channel: &mut dyn Write,
    ) -> Result<ExitCode, DispatchError> {
        let mut tokens = tokenize(line);
        let name = tokens.next().ok_or(DispatchError::Empty)?;

        if let Some(command) = self.builtins.find_exact(name) {
            let args = parse_exact(command.signature(), tokens)?;
            debug!("Dispatching built-in {}", command.name());
            let mut session = Session {
                state,
                channel,
                builtins: &self.builtins,
            };
            return Ok((command.handler())(&mut session, &args));
        }

        let (plugin, command) = state
            .registry()
            .resolve_command(name)
            .ok_or_else(|| LookupError::NotFound(name.to_string()))?;
        let args = parse_exact(command.signature(), tokens)?;
        debug!("Dispatching {} from plugin {} {}", command.name(), plugin.id(), plugin.name());
        Ok(command.handler().call(channel, &args))
    }
}
