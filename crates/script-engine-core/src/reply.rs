//! Host-side replies produced by guest functions.

use mlua::Value;
use serde_json::json;

/// Nesting limit for converting guest tables; also stops self-referencing tables.
const MAX_REPLY_DEPTH: usize = 64;

/// Cap on the number of values a single reply may expand to. Tables shared
/// between several parents are expanded once per parent.
const MAX_REPLY_NODES: usize = 1 << 20;

/// A value returned by a guest function, in host terms.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No value.
    Nil,
    /// Integer value.
    Integer(i64),
    /// Binary-safe string.
    Bulk(Vec<u8>),
    /// Status line, from a table with an `ok` field.
    Status(String),
    /// Error text, from a table with an `err` field or a raised error.
    Error(String),
    /// Sequence of replies.
    Array(Vec<Reply>),
}

impl Reply {
    /// Convert the first value returned by a guest function.
    ///
    /// Floats are truncated toward zero, `true` becomes `1` and `false`
    /// becomes nil. Tables carrying an `err` or `ok` string become error
    /// and status replies; any other table contributes its sequence part.
    ///
    /// A reply that would expand to more than `MAX_REPLY_NODES` values is
    /// replaced as a whole by an error reply.
    pub fn from_lua(value: &Value) -> Self {
        let mut budget = MAX_REPLY_NODES;
        Self::convert(value, 0, &mut budget).unwrap_or_else(|| {
            Self::Error(format!("reply exceeds {MAX_REPLY_NODES} elements"))
        })
    }

    fn convert(value: &Value, depth: usize, budget: &mut usize) -> Option<Self> {
        *budget = budget.checked_sub(1)?;

        if depth > MAX_REPLY_DEPTH {
            return Some(Self::Error("reached lua stack limit".to_string()));
        }

        let reply = match value {
            Value::Boolean(true) => Self::Integer(1),
            Value::Integer(n) => Self::Integer(*n),
            #[allow(clippy::cast_possible_truncation)]
            Value::Number(n) => Self::Integer(n.trunc() as i64),
            Value::String(s) => Self::Bulk(s.as_bytes().to_vec()),
            Value::Table(table) => {
                if let Ok(Value::String(err)) = table.raw_get::<Value>("err") {
                    return Some(Self::Error(err.to_string_lossy()));
                }
                if let Ok(Value::String(ok)) = table.raw_get::<Value>("ok") {
                    return Some(Self::Status(ok.to_string_lossy()));
                }

                let len = table.raw_len();
                let mut items = Vec::with_capacity(len);
                for index in 1..=len {
                    match table.raw_get::<Value>(index) {
                        Ok(Value::Nil) | Err(_) => break,
                        Ok(item) => items.push(Self::convert(&item, depth + 1, budget)?),
                    }
                }
                Self::Array(items)
            }
            _ => Self::Nil,
        };

        Some(reply)
    }

    /// Returns `true` for error replies.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Render the reply as JSON; bulk strings are decoded lossily.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Nil => serde_json::Value::Null,
            Self::Integer(n) => json!(n),
            Self::Bulk(bytes) => json!(String::from_utf8_lossy(bytes)),
            Self::Status(status) => json!({ "ok": status }),
            Self::Error(message) => json!({ "err": message }),
            Self::Array(items) => items.iter().map(Self::to_json).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    fn eval(source: &str) -> Reply {
        let lua = Lua::new();
        let value: Value = lua.load(source).eval().unwrap();
        Reply::from_lua(&value)
    }

    #[test]
    fn test_scalars() {
        assert_eq!(eval("return nil"), Reply::Nil);
        assert_eq!(eval("return false"), Reply::Nil);
        assert_eq!(eval("return true"), Reply::Integer(1));
        assert_eq!(eval("return 1 + 1"), Reply::Integer(2));
        assert_eq!(eval("return 3.99"), Reply::Integer(3));
        assert_eq!(eval("return -3.99"), Reply::Integer(-3));
        assert_eq!(eval("return 'a\\0b'"), Reply::Bulk(b"a\0b".to_vec()));
        assert_eq!(eval("return print"), Reply::Nil);
    }

    #[test]
    fn test_status_and_error_tables() {
        assert_eq!(eval("return {ok = 'OK'}"), Reply::Status("OK".into()));
        assert_eq!(eval("return {err = 'ERR bad'}"), Reply::Error("ERR bad".into()));
    }

    #[test]
    fn test_array_stops_at_first_nil() {
        assert_eq!(
            eval("return {1, 'two', {3}, nil, 5}"),
            Reply::Array(vec![
                Reply::Integer(1),
                Reply::Bulk(b"two".to_vec()),
                Reply::Array(vec![Reply::Integer(3)]),
            ])
        );
    }

    #[test]
    fn test_self_referencing_table() {
        let reply = eval("local t = {}; t[1] = t; return t");

        let mut depth = 0;
        let mut current = &reply;
        while let Reply::Array(items) = current {
            current = &items[0];
            depth += 1;
        }
        assert!(current.is_error());
        assert!(depth > MAX_REPLY_DEPTH);
    }

    #[test]
    fn test_shared_subtables_are_bounded() {
        // Sixty tables, but 2^60 values once every shared child is expanded.
        let reply = eval("local t = {1} for i = 1, 60 do t = {t, t} end return t");

        assert_eq!(
            reply,
            Reply::Error(format!("reply exceeds {MAX_REPLY_NODES} elements"))
        );
    }

    #[test]
    fn test_shared_subtable_within_budget() {
        let reply = eval("local leaf = {1, 2} return {leaf, leaf}");

        let leaf = Reply::Array(vec![Reply::Integer(1), Reply::Integer(2)]);
        assert_eq!(reply, Reply::Array(vec![leaf.clone(), leaf]));
    }

    #[test]
    fn test_to_json() {
        let reply = Reply::Array(vec![
            Reply::Nil,
            Reply::Integer(2),
            Reply::Bulk(b"hi".to_vec()),
            Reply::Status("OK".into()),
            Reply::Error("ERR x".into()),
        ]);

        assert_eq!(
            reply.to_json(),
            json!([null, 2, "hi", {"ok": "OK"}, {"err": "ERR x"}])
        );
    }
}
