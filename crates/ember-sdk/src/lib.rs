//! ember-sdk - the plugin ABI for the ember command host
//!
//! A plugin is a shared library (`crate-type = ["cdylib"]`) exporting one
//! symbol, [`ENTRY_SYMBOL`], with the [`EntryPoint`] signature. Everything
//! that crosses the library boundary is plain `#[repr(C)]` data defined here,
//! so the host and its plugins agree on layout without sharing any Rust
//! trait objects.
//!
//! On the first broadcast the host hands the plugin an unregistered
//! [`PluginHandle`]; the plugin answers by declaring its [`Role`] (and, for
//! command contributors, a static table of [`RawCommand`]s). Every later call
//! arrives with the handle already registered and the plugin performs its
//! normal action instead.
//!
//! ```ignore
//! use ember_sdk::{command, export_plugin, handler, Args, Channel, Registration};
//!
//! handler!(fn shout => shout_impl);
//!
//! fn shout_impl(channel: &mut Channel<'_>, args: &Args<'_>) -> i32 {
//!     let text = args.text(0).unwrap_or_default().to_uppercase();
//!     channel.send_line(&text);
//!     0
//! }
//!
//! static COMMANDS: [ember_sdk::RawCommand; 1] = [command!("shout", "s", "Shout a word.", shout)];
//!
//! fn entry(mut registration: Registration<'_>, _channel: Channel<'_>) {
//!     if !registration.is_registered() {
//!         registration.declare_commands(&COMMANDS);
//!     }
//! }
//!
//! export_plugin!(entry);
//! ```

use std::ffi::{c_char, c_void};
use std::fmt;
use std::io;

/// Name of the symbol every plugin library must export (NUL-terminated).
pub const ENTRY_SYMBOL: &[u8] = b"ember_plugin_entry\0";

/// Line terminator used for every text response.
pub const LINE_END: &str = "\r\n";

/// What a plugin is to the host. Fixed once the plugin has registered.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Not declared yet, or declared something invalid.
    #[default]
    Unknown = 0,
    /// The entry point itself is the user-facing action (`run <name>`).
    Invokable = 1,
    /// Contributes named commands to the dispatch table.
    CommandContributor = 2,
}

impl Role {
    /// Number of defined role codes; codes at or above this are unknown.
    pub const COUNT: u32 = 3;

    /// Decode a role code received over the ABI. Out-of-range codes map to
    /// [`Role::Unknown`].
    #[must_use]
    pub fn from_raw(code: u32) -> Self {
        match code {
            1 => Self::Invokable,
            2 => Self::CommandContributor,
            _ => Self::Unknown,
        }
    }

    /// Role code as sent over the ABI.
    #[must_use]
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Invokable => "invokable",
            Self::CommandContributor => "command",
        };
        f.write_str(name)
    }
}

/// Discriminant of a [`RawArgument`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgTag {
    /// Sentinel terminating an argument array.
    End = 0,
    Text = 1,
    Integer = 2,
    Float = 3,
}

/// One parsed argument as handed to a plugin command handler.
///
/// Only the field selected by `tag` is meaningful. Text points into the
/// dispatched line and is *not* NUL-terminated; use `text_len`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawArgument {
    pub tag: ArgTag,
    pub text: *const u8,
    pub text_len: usize,
    pub integer: i64,
    pub float: f64,
}

impl RawArgument {
    /// End-of-arguments sentinel.
    pub const END: Self = Self {
        tag: ArgTag::End,
        text: std::ptr::null(),
        text_len: 0,
        integer: 0,
        float: 0.0,
    };

    /// Borrow `value` without copying. The argument must not outlive it.
    #[must_use]
    pub fn text(value: &str) -> Self {
        Self {
            tag: ArgTag::Text,
            text: value.as_ptr(),
            text_len: value.len(),
            ..Self::END
        }
    }

    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self {
            tag: ArgTag::Integer,
            integer: value,
            ..Self::END
        }
    }

    #[must_use]
    pub fn float(value: f64) -> Self {
        Self {
            tag: ArgTag::Float,
            float: value,
            ..Self::END
        }
    }
}

/// Writes `len` bytes from `data` to the response channel. Returns 0 on success.
pub type SendFn = unsafe extern "C" fn(ctx: *mut c_void, data: *const u8, len: usize) -> i32;

/// Byte-oriented response channel owned by the host.
#[repr(C)]
pub struct RawChannel {
    pub ctx: *mut c_void,
    pub send: SendFn,
}

/// Command handler exported by a plugin. `args` holds `argc` values followed
/// by an [`ArgTag::End`] sentinel. The return value is the dispatch exit code.
pub type RawHandler =
    unsafe extern "C" fn(channel: *mut RawChannel, args: *const RawArgument, argc: usize) -> i32;

/// One entry of a plugin's command table.
///
/// All strings are NUL-terminated and must stay valid for as long as the
/// library is loaded; in practice they are string literals (see [`command!`]).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawCommand {
    pub name: *const c_char,
    /// One character per argument: `s` text, `d` integer, `f` float.
    pub signature: *const c_char,
    pub description: *const c_char,
    pub handler: RawHandler,
}

// Safety: the pointers reference immutable static data inside the plugin
// library, which is never written after load.
unsafe impl Sync for RawCommand {}

/// Declares the plugin's role (and command table) to the host. Returns 0 if
/// the declaration was accepted.
pub type DeclareFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    role: u32,
    commands: *const RawCommand,
    count: usize,
) -> i32;

/// Per-plugin handle passed to the entry point.
#[repr(C)]
pub struct PluginHandle {
    pub ctx: *mut c_void,
    /// Set by the host once the plugin has gone through registration.
    pub registered: bool,
    pub declare: DeclareFn,
}

/// Signature of [`ENTRY_SYMBOL`].
pub type EntryPoint = unsafe extern "C" fn(plugin: *mut PluginHandle, channel: *mut RawChannel);

/// Safe view of the response channel for plugin code.
pub struct Channel<'a> {
    raw: &'a mut RawChannel,
}

impl<'a> Channel<'a> {
    /// Wrap a channel pointer received from the host.
    ///
    /// # Safety
    /// `raw` must be null or point to a live `RawChannel` for `'a`.
    pub unsafe fn from_raw(raw: *mut RawChannel) -> Option<Self> {
        raw.as_mut().map(|raw| Self { raw })
    }

    /// Send raw bytes. Returns `false` if the host could not deliver them.
    pub fn send(&mut self, data: &[u8]) -> bool {
        // Safety: the host keeps `ctx` valid for the duration of the call
        // that handed us this channel.
        unsafe { (self.raw.send)(self.raw.ctx, data.as_ptr(), data.len()) == 0 }
    }

    /// Send `text` followed by `\r\n`.
    pub fn send_line(&mut self, text: &str) -> bool {
        self.send(text.as_bytes()) && self.send(LINE_END.as_bytes())
    }
}

impl io::Write for Channel<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.send(buf) {
            Ok(buf.len())
        } else {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "host channel rejected write"))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Safe view of the plugin handle for the entry point.
pub struct Registration<'a> {
    handle: &'a mut PluginHandle,
}

impl<'a> Registration<'a> {
    /// # Safety
    /// `raw` must be null or point to a live `PluginHandle` for `'a`.
    pub unsafe fn from_raw(raw: *mut PluginHandle) -> Option<Self> {
        raw.as_mut().map(|handle| Self { handle })
    }

    /// Whether the host has already recorded this plugin's role.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.handle.registered
    }

    /// Declare the plugin as invokable. Returns `true` if accepted.
    pub fn declare_invokable(&mut self) -> bool {
        self.declare(Role::Invokable, &[])
    }

    /// Declare the plugin as a command contributor. Returns `true` if accepted.
    pub fn declare_commands(&mut self, commands: &'static [RawCommand]) -> bool {
        self.declare(Role::CommandContributor, commands)
    }

    fn declare(&mut self, role: Role, commands: &'static [RawCommand]) -> bool {
        // Safety: `ctx` and `declare` come from the host together and stay
        // valid while the entry point runs; `commands` is static.
        unsafe {
            (self.handle.declare)(
                self.handle.ctx,
                role.as_raw(),
                commands.as_ptr(),
                commands.len(),
            ) == 0
        }
    }
}

/// A decoded argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    Text(&'a str),
    Integer(i64),
    Float(f64),
}

/// Safe view of a handler's argument array.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    raw: &'a [RawArgument],
}

impl<'a> Args<'a> {
    /// # Safety
    /// `args` must point to at least `argc` initialized `RawArgument`s whose
    /// text pointers are valid UTF-8 for `'a`, or be null with `argc == 0`.
    pub unsafe fn from_raw(args: *const RawArgument, argc: usize) -> Self {
        if args.is_null() || argc == 0 {
            return Self { raw: &[] };
        }
        Self {
            raw: std::slice::from_raw_parts(args, argc),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Arg<'a>> {
        let raw = self.raw.get(index)?;
        match raw.tag {
            ArgTag::End => None,
            ArgTag::Text => {
                // Safety: guaranteed by `from_raw`.
                let bytes = unsafe { std::slice::from_raw_parts(raw.text, raw.text_len) };
                std::str::from_utf8(bytes).ok().map(Arg::Text)
            }
            ArgTag::Integer => Some(Arg::Integer(raw.integer)),
            ArgTag::Float => Some(Arg::Float(raw.float)),
        }
    }

    #[must_use]
    pub fn text(&self, index: usize) -> Option<&'a str> {
        match self.get(index)? {
            Arg::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn integer(&self, index: usize) -> Option<i64> {
        match self.get(index)? {
            Arg::Integer(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn float(&self, index: usize) -> Option<f64> {
        match self.get(index)? {
            Arg::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Arg<'a>> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

/// Build a [`RawCommand`] from string literals, usable in a `static`.
#[macro_export]
macro_rules! command {
    ($name:literal, $signature:literal, $description:literal, $handler:path) => {
        $crate::RawCommand {
            name: concat!($name, "\0").as_ptr().cast(),
            signature: concat!($signature, "\0").as_ptr().cast(),
            description: concat!($description, "\0").as_ptr().cast(),
            handler: $handler,
        }
    };
}

/// Generate an `extern "C"` command handler forwarding to a safe function
/// `fn(&mut Channel<'_>, &Args<'_>) -> i32`.
#[macro_export]
macro_rules! handler {
    ($vis:vis fn $name:ident => $body:path) => {
        $vis unsafe extern "C" fn $name(
            channel: *mut $crate::RawChannel,
            args: *const $crate::RawArgument,
            argc: usize,
        ) -> i32 {
            let args = $crate::Args::from_raw(args, argc);
            match $crate::Channel::from_raw(channel) {
                Some(mut channel) => $body(&mut channel, &args),
                None => 1,
            }
        }
    };
}

/// Export [`ENTRY_SYMBOL`] forwarding to a safe function
/// `fn(Registration<'_>, Channel<'_>)`.
#[macro_export]
macro_rules! export_plugin {
    ($entry:path) => {
        #[no_mangle]
        pub unsafe extern "C" fn ember_plugin_entry(
            plugin: *mut $crate::PluginHandle,
            channel: *mut $crate::RawChannel,
        ) {
            if let (Some(registration), Some(channel)) = (
                $crate::Registration::from_raw(plugin),
                $crate::Channel::from_raw(channel),
            ) {
                $entry(registration, channel);
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    unsafe extern "C" fn collect(ctx: *mut c_void, data: *const u8, len: usize) -> i32 {
        let sink = &mut *ctx.cast::<Vec<u8>>();
        sink.extend_from_slice(std::slice::from_raw_parts(data, len));
        0
    }

    handler!(fn echo => echo_impl);

    fn echo_impl(channel: &mut Channel<'_>, args: &Args<'_>) -> i32 {
        match args.text(0) {
            Some(text) => {
                channel.send_line(text);
                0
            }
            None => 1,
        }
    }

    static TABLE: [RawCommand; 1] = [command!("echo", "s", "Echo a word.", echo)];

    #[test]
    fn test_role_from_raw_coerces_out_of_range() {
        assert_eq!(Role::from_raw(1), Role::Invokable);
        assert_eq!(Role::from_raw(2), Role::CommandContributor);
        assert_eq!(Role::from_raw(Role::COUNT), Role::Unknown);
        assert_eq!(Role::from_raw(u32::MAX), Role::Unknown);
    }

    #[test]
    fn test_command_macro_strings_are_nul_terminated() {
        let cmd = &TABLE[0];
        unsafe {
            assert_eq!(CStr::from_ptr(cmd.name).to_str().unwrap(), "echo");
            assert_eq!(CStr::from_ptr(cmd.signature).to_str().unwrap(), "s");
            assert_eq!(CStr::from_ptr(cmd.description).to_str().unwrap(), "Echo a word.");
        }
    }

    #[test]
    fn test_handler_macro_round_trip() {
        let mut sink: Vec<u8> = Vec::new();
        let mut channel = RawChannel {
            ctx: (&mut sink as *mut Vec<u8>).cast(),
            send: collect,
        };
        let line = String::from("echo hello");
        let args = [RawArgument::text(&line[5..]), RawArgument::END];

        let rc = unsafe { (TABLE[0].handler)(&mut channel, args.as_ptr(), 1) };

        assert_eq!(rc, 0);
        assert_eq!(sink, b"hello\r\n");
    }

    #[test]
    fn test_args_accessors() {
        let args = [
            RawArgument::integer(-7),
            RawArgument::float(2.5),
            RawArgument::END,
        ];
        let view = unsafe { Args::from_raw(args.as_ptr(), 2) };
        assert_eq!(view.len(), 2);
        assert_eq!(view.integer(0), Some(-7));
        assert_eq!(view.float(1), Some(2.5));
        assert_eq!(view.text(0), None);
        assert_eq!(view.get(2), None);
    }

    #[test]
    fn test_null_args_are_empty() {
        let view = unsafe { Args::from_raw(std::ptr::null(), 3) };
        assert!(view.is_empty());
    }
}
