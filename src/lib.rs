//! Ember - A plugin-extensible command server
//!
//! This library provides the core of the Ember command host: a dispatcher
//! for line-oriented commands, a set of built-in commands, and a registry
//! that loads native plugin libraries which either contribute commands or
//! can be invoked by name.
//!
//! # Modules
//!
//! - [`codec`]: Signature strings and typed argument parsing
//! - [`command`]: Command tables with exact and prefix lookup
//! - [`plugins`]: Plugin discovery, registration and invocation
//! - [`dispatch`]: Line dispatch and response messages
//! - [`builtins`]: The built-in command table
//! - [`host`]: Dispatcher plus session state
//! - [`server`]: TCP front end
//! - [`console`]: Local rustyline front end
//! - [`config`]: Configuration management and serialization
//! - [`error`]: Library error types

pub mod builtins;
pub mod codec;
pub mod command;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod plugins;
pub mod server;

pub use dispatch::ExitCode;
pub use host::Host;
