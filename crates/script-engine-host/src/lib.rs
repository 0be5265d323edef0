//! Host API bindings and engine bring-up for script-engine.
//!
//! This crate provides the host side of the guest namespace: the `server`
//! table guest functions call into, and the helpers that build the Lua
//! engine with those bindings and register it.
//!
//! # Interfaces
//!
//! - [`bindings`]: The `server` table (`log`, `error_reply`, `status_reply`)
//! - [`logging`]: Guest log capture into the run context
//! - [`init`]: Engine construction and registration

pub mod bindings;
pub mod init;
pub mod logging;

pub use bindings::register_all;
pub use init::{create_lua_engine, register_lua_engine};
pub use logging::LoggingHost;
