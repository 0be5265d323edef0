//! Frozen guest namespace.
//!
//! Guest chunks do not run against the interpreter globals directly. They
//! get an empty proxy table whose metatable resolves reads against the real
//! globals and rejects every write, so the set of top-level bindings is fixed
//! once the engine is initialized.
//!
//! Base-library functions that could step around the proxy are replaced
//! inside it: `rawset` refuses the proxy as a target, `load` compiles text
//! only and binds chunks to the proxy unless given another environment, and
//! the file loaders are not visible at all.

use mlua::{Lua, MultiValue, Table, Value};

/// Globals that read files from the host and bind them to the real globals.
const HIDDEN: &[&str] = &["dofile", "loadfile"];

/// Build a read-only view over `backing`.
///
/// Reading a name that `backing` does not define is an error, as is any
/// assignment. `_G` resolves to the view itself so it cannot be used to reach
/// the writable table.
pub fn frozen_view(lua: &Lua, backing: Table) -> mlua::Result<Table> {
    let view = lua.create_table()?;
    let meta = lua.create_table()?;
    let overrides = guarded_builtins(lua, &backing, &view)?;

    let index = lua.create_function(move |_, (this, key): (Table, Value)| {
        if let Value::String(name) = &key {
            if *name == "_G" {
                return Ok(Value::Table(this));
            }
            if HIDDEN.iter().any(|hidden| *name == hidden) {
                return Err(missing_global(&key));
            }
        }

        match overrides.raw_get::<Value>(key.clone())? {
            Value::Nil => {}
            guarded => return Ok(guarded),
        }

        match backing.raw_get::<Value>(key.clone())? {
            Value::Nil => Err(missing_global(&key)),
            value => Ok(value),
        }
    })?;

    let newindex = lua.create_function(|_, (_, key, _): (Value, Value, Value)| -> mlua::Result<()> {
        Err(modified_global(&key))
    })?;

    meta.raw_set("__index", index)?;
    meta.raw_set("__newindex", newindex)?;
    meta.raw_set("__metatable", false)?;
    view.set_metatable(Some(meta));

    Ok(view)
}

/// Replacements for base functions that bypass metamethods or pick their
/// own environment.
fn guarded_builtins(lua: &Lua, backing: &Table, view: &Table) -> mlua::Result<Table> {
    let overrides = lua.create_table()?;

    if let Value::Function(raw_set) = backing.raw_get::<Value>("rawset")? {
        // Identity only; the address is never dereferenced.
        let proxy = view.to_pointer() as usize;
        let guarded = lua.create_function(
            move |_, (target, key, value): (Table, Value, Value)| -> mlua::Result<Table> {
                if target.to_pointer() as usize == proxy {
                    return Err(modified_global(&key));
                }
                raw_set.call::<Table>((target, key, value))
            },
        )?;
        overrides.raw_set("rawset", guarded)?;
    }

    if let Value::Function(load) = backing.raw_get::<Value>("load")? {
        let proxy = view.clone();
        let guarded = lua.create_function(
            move |_, (chunk, name, _mode, env): (Value, Value, Value, Value)| {
                let env = match env {
                    Value::Nil => Value::Table(proxy.clone()),
                    env => env,
                };
                load.call::<MultiValue>((chunk, name, "t", env))
            },
        )?;
        overrides.raw_set("load", guarded)?;
    }

    Ok(overrides)
}

fn missing_global(key: &Value) -> mlua::Error {
    mlua::Error::runtime(format!(
        "Script attempted to access nonexistent global variable '{}'",
        key_name(key)
    ))
}

fn modified_global(key: &Value) -> mlua::Error {
    mlua::Error::runtime(format!(
        "Script attempted to modify global variable '{}'",
        key_name(key)
    ))
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(name) => name.to_string_lossy(),
        Value::Integer(n) => n.to_string(),
        other => other.type_name().to_string(),
    }
}
