//! Error types for the plugin registry, argument codec and dispatcher.

use std::path::PathBuf;

use crate::codec::ArgKind;

/// Registry-level failures that abort the whole call.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Cannot open plugin directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A discovery candidate that was skipped. Never propagated past discovery.
#[derive(Debug, thiserror::Error)]
pub enum PluginLoadError {
    #[error("Failed to load library {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("Library {} does not export the plugin entry point: {source}", .path.display())]
    MissingEntryPoint {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
}

/// Argument codec failures. Recovered by the dispatcher as "Bad argument(s)."
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Missing {kind} argument at position {position}")]
    MissingArgument { position: usize, kind: ArgKind },
    #[error("Invalid {kind} '{token}' at position {position}")]
    InvalidNumber {
        position: usize,
        kind: ArgKind,
        token: String,
    },
    #[error("Expected {expected} argument(s), got extra '{first_extra}'")]
    TooManyArguments { expected: usize, first_extra: String },
}

/// Name resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("No command or module named '{0}'")]
    NotFound(String),
    #[error("Plugin '{0}' is not invokable")]
    NotInvokable(String),
}

/// A signature string contained a character that is not `s`, `d` or `f`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Unknown argument kind '{kind}' in signature '{signature}'")]
    UnknownKind { signature: String, kind: char },
}

/// Command table construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("Duplicate command name '{0}'")]
    DuplicateName(String),
    #[error("Command name '{0}' must be non-empty and free of whitespace")]
    InvalidName(String),
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// Why a plugin's role declaration was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeclarationError {
    #[error("Command contributor declared an empty command table")]
    EmptyTable,
    #[error("Command table pointer is null")]
    NullTable,
    #[error("Command #{index} has a null or non UTF-8 {field}")]
    BadString { index: usize, field: &'static str },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Why a command line was not dispatched to a handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("No command entered")]
    Empty,
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
