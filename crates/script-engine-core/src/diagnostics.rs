//! Error decoration.
//!
//! The error handler is created once per interpreter and stored under
//! [`ERROR_HANDLER_SLOT`] in the interpreter registry. Every guest execution
//! runs under it as the message handler of a protected call, so it sees the
//! stack at the moment of the error. It looks for the nearest guest frame
//! and prefixes the message with that frame's `source:line`.
//!
//! Native frames are skipped: an error raised by a host native called from
//! guest code points at the guest line that made the call.

use mlua::{Function, Lua, Value};

/// Registry slot holding the error handler.
pub const ERROR_HANDLER_SLOT: &str = "__ERROR_HANDLER__";

/// How far up the stack the handler looks for a guest frame.
const MAX_FRAME_DEPTH: usize = 16;

/// Where in guest code an error surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticContext {
    /// Short source name of the guest chunk, e.g. `user_function`.
    pub source: String,
    /// Line being executed in that chunk.
    pub line: u32,
}

impl DiagnosticContext {
    /// Find the nearest guest frame at or above stack `level`.
    ///
    /// Returns `None` if no frame with line information is found.
    pub fn capture(lua: &Lua, level: usize) -> Option<Self> {
        (level..level + MAX_FRAME_DEPTH)
            .map_while(|level| lua.inspect_stack(level))
            .find_map(|frame| {
                let source = frame.source();
                if source.what == "C" {
                    return None;
                }
                let line = u32::try_from(frame.curr_line()).ok()?;
                let name = source.short_src?;

                Some(Self {
                    source: name.into_owned(),
                    line,
                })
            })
    }

    /// Prefix `message` with `source:line: `.
    ///
    /// Messages that already carry this exact position (as produced by the
    /// interpreter's own `error`) are returned unchanged.
    pub fn decorate(&self, message: &str) -> String {
        let prefix = format!("{}:{}:", self.source, self.line);
        if message.starts_with(&prefix) {
            message.to_string()
        } else {
            format!("{prefix} {message}")
        }
    }
}

/// Create the error handler and store it under [`ERROR_HANDLER_SLOT`].
pub fn install_error_handler(lua: &Lua) -> mlua::Result<()> {
    let handler = lua.create_function(decorate_error)?;
    lua.set_named_registry_value(ERROR_HANDLER_SLOT, handler)
}

/// Fetch the stored error handler.
pub fn error_handler(lua: &Lua) -> mlua::Result<Function> {
    lua.named_registry_value(ERROR_HANDLER_SLOT)
}

fn decorate_error(lua: &Lua, err: Value) -> mlua::Result<Value> {
    let message = match &err {
        Value::String(s) => s.to_string_lossy(),
        Value::Error(e) => error_message(e),
        // Error tables ({err = ...}) pass through untouched.
        Value::Table(_) | Value::Nil => return Ok(err),
        _ => lua.globals().get::<Function>("tostring")?.call::<String>(err.clone())?,
    };

    // Level 0 is this handler.
    let message = match DiagnosticContext::capture(lua, 1) {
        Some(context) => context.decorate(&message),
        None => message,
    };

    lua.create_string(message).map(Value::String)
}

/// Text of an interpreter error, without mlua's own wrapping.
pub fn error_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => error_message(cause),
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::ExternalError(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

/// Text of an error value returned by a protected call.
pub fn error_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string_lossy(),
        Value::Error(e) => error_message(e),
        Value::Table(table) => match table.raw_get::<Value>("err") {
            Ok(Value::String(err)) => err.to_string_lossy(),
            _ => "error object is a table".to_string(),
        },
        Value::Nil => "unknown error".to_string(),
        other => format!("error object is a {} value", other.type_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> DiagnosticContext {
        DiagnosticContext {
            source: "user_function".into(),
            line: 3,
        }
    }

    #[test]
    fn test_decorate_prefixes_message() {
        assert_eq!(context().decorate("boom"), "user_function:3: boom");
    }

    #[test]
    fn test_decorate_keeps_existing_position() {
        assert_eq!(
            context().decorate("user_function:3: boom"),
            "user_function:3: boom"
        );
        assert_eq!(
            context().decorate("user_function:4: boom"),
            "user_function:3: user_function:4: boom"
        );
    }

    #[test]
    fn test_handler_installed() {
        let lua = Lua::new();
        install_error_handler(&lua).unwrap();

        assert!(error_handler(&lua).is_ok());
    }

    #[test]
    fn test_handler_decorates_guest_error() {
        let lua = Lua::new();
        install_error_handler(&lua).unwrap();
        let handler = error_handler(&lua).unwrap();
        let xpcall: Function = lua.globals().get("xpcall").unwrap();

        let guest = lua
            .load("local x = 1\nerror('boom', 0)")
            .set_name("@guest")
            .into_function()
            .unwrap();
        let (ok, err): (bool, Value) = xpcall.call((guest, handler)).unwrap();

        assert!(!ok);
        assert_eq!(error_text(&err), "guest:2: boom");
    }

    #[test]
    fn test_handler_skips_native_frame() {
        let lua = Lua::new();
        install_error_handler(&lua).unwrap();
        let native = lua
            .create_function(|_, ()| -> mlua::Result<()> { Err(mlua::Error::runtime("native failed")) })
            .unwrap();
        lua.globals().set("native", native).unwrap();
        let handler = error_handler(&lua).unwrap();
        let xpcall: Function = lua.globals().get("xpcall").unwrap();

        let guest = lua
            .load("local x = 1\n\nnative()")
            .set_name("@guest")
            .into_function()
            .unwrap();
        let (ok, err): (bool, Value) = xpcall.call((guest, handler)).unwrap();

        assert!(!ok);
        assert_eq!(error_text(&err), "guest:3: native failed");
    }

    #[test]
    fn test_handler_passes_tables_through() {
        let lua = Lua::new();
        install_error_handler(&lua).unwrap();
        let handler = error_handler(&lua).unwrap();
        let xpcall: Function = lua.globals().get("xpcall").unwrap();

        let guest = lua
            .load("error({err = 'ERR custom'})")
            .into_function()
            .unwrap();
        let (ok, err): (bool, Value) = xpcall.call((guest, handler)).unwrap();

        assert!(!ok);
        assert_eq!(error_text(&err), "ERR custom");
    }

    #[test]
    fn test_error_message_unwraps() {
        let err = mlua::Error::runtime("plain");
        assert_eq!(error_message(&err), "plain");

        let wrapped = mlua::Error::CallbackError {
            traceback: "stack traceback:".into(),
            cause: std::sync::Arc::new(mlua::Error::runtime("inner")),
        };
        assert_eq!(error_message(&wrapped), "inner");
    }
}
