//! Host side of the plugin ABI.
//!
//! Everything `unsafe` about talking to plugin code is confined here: the
//! `declare` call-back that receives a plugin's role and command table, the
//! bridge that exposes a `Write` sink as a [`RawChannel`], and
//! [`ForeignHandler`], the typed wrapper around a plugin command function.

use std::ffi::{c_char, c_void, CStr};
use std::fmt;
use std::io::Write;
use std::ptr::addr_of_mut;

use ember_sdk::{EntryPoint, PluginHandle, RawChannel, RawCommand, RawHandler, Role};
use tracing::{debug, warn};

use crate::codec::ArgumentVector;
use crate::command::{Command, CommandTable};
use crate::dispatch::ExitCode;
use crate::error::DeclarationError;

/// What a plugin declared during its registration call.
#[derive(Debug)]
pub(crate) enum Declared {
    Unknown,
    Invokable,
    Commands(CommandTable<ForeignHandler>),
}

pub(crate) type Declaration = Option<Result<Declared, DeclarationError>>;

struct EntryContext {
    registered: bool,
    declaration: Declaration,
}

/// Call `entry` once. Returns whatever the plugin declared during the call;
/// declarations are only collected while `registered` is false.
pub(crate) fn call_entry(entry: EntryPoint, registered: bool, channel: &mut dyn Write) -> Declaration {
    let mut ctx = EntryContext {
        registered,
        declaration: None,
    };
    let mut handle = PluginHandle {
        ctx: addr_of_mut!(ctx).cast(),
        registered,
        declare,
    };

    with_raw_channel(channel, |raw| {
        // Safety: `handle` and the channel outlive the call; the entry point
        // was resolved from a library that is still loaded.
        unsafe { entry(&mut handle, raw) }
    });

    ctx.declaration
}

unsafe extern "C" fn declare(
    ctx: *mut c_void,
    role: u32,
    commands: *const RawCommand,
    count: usize,
) -> i32 {
    let Some(ctx) = ctx.cast::<EntryContext>().as_mut() else {
        return -1;
    };

    if ctx.registered {
        debug!("Ignoring role declaration from an already registered plugin");
        return -1;
    }
    if matches!(ctx.declaration, Some(Ok(_))) {
        debug!("Ignoring repeated role declaration");
        return -1;
    }

    let result = decode_declaration(Role::from_raw(role), commands, count);
    let rc = if result.is_ok() { 0 } else { -1 };
    ctx.declaration = Some(result);
    rc
}

/// # Safety
/// `commands` must be null or point to `count` valid `RawCommand`s.
unsafe fn decode_declaration(
    role: Role,
    commands: *const RawCommand,
    count: usize,
) -> Result<Declared, DeclarationError> {
    match role {
        Role::Unknown => Ok(Declared::Unknown),
        Role::Invokable => {
            if count > 0 {
                debug!("Invokable plugin supplied {} command(s); ignoring them", count);
            }
            Ok(Declared::Invokable)
        }
        Role::CommandContributor => {
            if count == 0 {
                return Err(DeclarationError::EmptyTable);
            }
            if commands.is_null() {
                return Err(DeclarationError::NullTable);
            }

            let raw = std::slice::from_raw_parts(commands, count);
            let mut table = CommandTable::new();
            for (index, entry) in raw.iter().enumerate() {
                let command = Command::new(
                    c_str(entry.name, index, "name")?,
                    c_str(entry.signature, index, "signature")?,
                    c_str(entry.description, index, "description")?,
                    ForeignHandler(entry.handler),
                )?;
                table.push(command)?;
            }
            Ok(Declared::Commands(table))
        }
    }
}

unsafe fn c_str<'a>(
    ptr: *const c_char,
    index: usize,
    field: &'static str,
) -> Result<&'a str, DeclarationError> {
    if ptr.is_null() {
        return Err(DeclarationError::BadString { index, field });
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| DeclarationError::BadString { index, field })
}

struct ChannelBridge<'a> {
    writer: &'a mut dyn Write,
}

unsafe extern "C" fn bridge_send(ctx: *mut c_void, data: *const u8, len: usize) -> i32 {
    let Some(bridge) = ctx.cast::<ChannelBridge<'_>>().as_mut() else {
        return -1;
    };
    if len == 0 {
        return 0;
    }
    if data.is_null() {
        return -1;
    }

    let bytes = std::slice::from_raw_parts(data, len);
    match bridge.writer.write_all(bytes) {
        Ok(()) => 0,
        Err(e) => {
            warn!("Plugin write to response channel failed: {}", e);
            -1
        }
    }
}

/// Expose `writer` to plugin code as a [`RawChannel`] for the duration of `f`.
pub(crate) fn with_raw_channel<R>(writer: &mut dyn Write, f: impl FnOnce(*mut RawChannel) -> R) -> R {
    let mut bridge = ChannelBridge { writer };
    let mut raw = RawChannel {
        ctx: addr_of_mut!(bridge).cast(),
        send: bridge_send,
    };
    f(&mut raw)
}

/// A command function exported by a plugin.
///
/// Only reachable through the owning plugin's command table, so it cannot
/// outlive the library it points into.
#[derive(Clone, Copy)]
pub struct ForeignHandler(RawHandler);

impl ForeignHandler {
    /// Call the plugin function with `args` in ABI form. The raw argument
    /// array is released when this returns, whatever the handler did.
    pub fn call(&self, channel: &mut dyn Write, args: &ArgumentVector<'_>) -> ExitCode {
        let raw_args = args.to_raw();
        let rc = with_raw_channel(channel, |raw| {
            // Safety: `raw_args` holds `args.len()` values plus the sentinel
            // and outlives the call.
            unsafe { (self.0)(raw, raw_args.as_ptr(), args.len()) }
        });
        ExitCode(rc)
    }
}

impl fmt::Debug for ForeignHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignHandler({:p})", self.0 as *const ())
    }
}
