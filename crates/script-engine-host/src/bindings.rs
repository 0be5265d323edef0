//! Host API bindings.
//!
//! Installs the `server` table into the interpreter globals. Guest functions
//! use it to log and to build status and error replies:
//!
//! ```lua
//! return function(keys, args)
//!   server.log(server.LOG_INFO, "called with", #keys, "keys")
//!   if #args == 0 then
//!     return server.error_reply("ERR missing argument")
//!   end
//!   return server.status_reply("OK")
//! end
//! ```

use mlua::{Lua, Table, Value, Variadic};

use script_engine_common::HostFunctionError;
use script_engine_core::{ENGINE_NAME, EngineTag, LogLevel, RunContext};

use crate::logging::{LoggingHost, level_from_i64, level_to_i64};

/// Global name of the host API table.
pub const API_TABLE: &str = "server";

/// Register all host bindings into the interpreter globals.
///
/// This installs the `server` table with:
/// - `server.log` and the `server.LOG_*` level constants
/// - `server.error_reply` and `server.status_reply`
pub fn register_all(lua: &Lua) -> mlua::Result<()> {
    let api = lua.create_table()?;
    register_logging(lua, &api)?;
    register_replies(lua, &api)?;
    lua.globals().set(API_TABLE, api)
}

/// Register `server.log(level, ...)`.
///
/// At least two arguments are required. String and number arguments after
/// the level are joined with spaces; anything else is skipped. Inside a call
/// the line is captured into the [`RunContext`]; at create time it only goes
/// to `tracing`.
pub fn register_logging(lua: &Lua, api: &Table) -> mlua::Result<()> {
    for (name, level) in [
        ("LOG_DEBUG", LogLevel::Debug),
        ("LOG_INFO", LogLevel::Info),
        ("LOG_WARN", LogLevel::Warn),
        ("LOG_ERROR", LogLevel::Error),
    ] {
        api.set(name, level_to_i64(level))?;
    }

    let log = lua.create_function(|lua, args: Variadic<Value>| {
        if args.len() < 2 {
            return Err(host_error(HostFunctionError::invalid_argument(
                "server.log() requires two arguments or more.",
            )));
        }

        let Value::Integer(level) = args[0] else {
            return Err(host_error(HostFunctionError::invalid_argument(
                "First argument must be a number (log level).",
            )));
        };
        let level = level_from_i64(level)
            .ok_or_else(|| host_error(HostFunctionError::InvalidLogLevel { level }))?;

        let message = args[1..]
            .iter()
            .filter_map(log_text)
            .collect::<Vec<_>>()
            .join(" ");

        let engine = lua
            .app_data_ref::<EngineTag>()
            .map_or_else(|| ENGINE_NAME.to_string(), |tag| tag.name.clone());

        match lua.app_data_mut::<RunContext>() {
            Some(mut run) => LoggingHost::log(&mut run, &engine, level, &message),
            None => LoggingHost::log_detached(&engine, level, &message),
        }

        Ok(())
    })?;

    api.set("log", log)
}

/// Register `server.error_reply(msg)` and `server.status_reply(msg)`.
///
/// They return `{err = msg}` and `{ok = msg}` respectively.
pub fn register_replies(lua: &Lua, api: &Table) -> mlua::Result<()> {
    let error_reply = lua.create_function(|lua, args: Variadic<Value>| {
        reply_table(lua, "err", "server.error_reply", &args)
    })?;
    let status_reply = lua.create_function(|lua, args: Variadic<Value>| {
        reply_table(lua, "ok", "server.status_reply", &args)
    })?;

    api.set("error_reply", error_reply)?;
    api.set("status_reply", status_reply)
}

fn reply_table(lua: &Lua, field: &str, function: &str, args: &[Value]) -> mlua::Result<Table> {
    let [Value::String(text)] = args else {
        return Err(host_error(HostFunctionError::invalid_argument(format!(
            "wrong number or type of arguments to {function}"
        ))));
    };

    let table = lua.create_table()?;
    table.raw_set(field, text.clone())?;
    Ok(table)
}

fn log_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_string_lossy()),
        Value::Integer(n) => Some(n.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn host_error(err: HostFunctionError) -> mlua::Error {
    mlua::Error::external(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lua() -> Lua {
        let lua = Lua::new();
        register_all(&lua).unwrap();
        lua
    }

    #[test]
    fn test_register_all() {
        let lua = lua();
        let api: Table = lua.globals().get(API_TABLE).unwrap();

        assert!(api.contains_key("log").unwrap());
        assert!(api.contains_key("error_reply").unwrap());
        assert!(api.contains_key("status_reply").unwrap());
        assert_eq!(api.get::<i64>("LOG_WARN").unwrap(), 2);
    }

    #[test]
    fn test_log_captured_in_run_context() {
        let lua = lua();
        lua.set_app_data(EngineTag { name: "LUA".into() });
        lua.set_app_data(RunContext::new("test"));

        lua.load("server.log(server.LOG_WARN, 'disk', 'at', 93, 'percent', {})")
            .exec()
            .unwrap();

        let run = lua.remove_app_data::<RunContext>().unwrap();
        assert_eq!(run.logs.len(), 1);
        assert_eq!(run.logs[0].level, LogLevel::Warn);
        assert_eq!(run.logs[0].message, "disk at 93 percent");
    }

    #[test]
    fn test_log_without_run_context() {
        let lua = lua();

        assert!(lua.load("server.log(server.LOG_INFO, 'detached')").exec().is_ok());
    }

    #[test]
    fn test_log_requires_two_arguments() {
        let lua = lua();
        let err = lua.load("server.log(server.LOG_INFO)").exec().unwrap_err();

        assert!(err.to_string().contains("requires two arguments"));
    }

    #[test]
    fn test_log_rejects_unknown_level() {
        let lua = lua();
        let err = lua.load("server.log(7, 'x')").exec().unwrap_err();

        assert!(err.to_string().contains("Invalid log level: 7"));
    }

    #[test]
    fn test_reply_helpers() {
        let lua = lua();

        let err: Table = lua.load("return server.error_reply('ERR bad')").eval().unwrap();
        assert_eq!(err.get::<String>("err").unwrap(), "ERR bad");

        let ok: Table = lua.load("return server.status_reply('OK')").eval().unwrap();
        assert_eq!(ok.get::<String>("ok").unwrap(), "OK");
    }

    #[test]
    fn test_reply_helpers_validate_arguments() {
        let lua = lua();
        let err = lua.load("return server.error_reply(1, 2)").eval::<Value>().unwrap_err();

        assert!(err.to_string().contains("server.error_reply"));
    }
}
