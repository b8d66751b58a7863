//! Construction of the global environment a script runs in.
//!
//! A script sees the `table`, `string`, `math` and `utf8` libraries, a
//! trimmed base library, `console`/`print`, the `tools`/`sdk` capability
//! proxy, and plain-data context values. Nothing else from the host is
//! reachable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mlua::{Lua, LuaOptions, LuaSerdeExt, SerializeOptions, StdLib, Table, Value, Variadic};
use tracing::warn;

use crate::log::ScriptLog;
use crate::proxy::CapabilityProxy;

/// Globals owned by the sandbox. Context keys with these names are dropped.
pub(crate) const RESERVED_GLOBALS: &[&str] = &[
    "console",
    "print",
    "tools",
    "sdk",
    "pcall",
    "xpcall",
    "setmetatable",
];

/// Base-library entries that reach the filesystem, compile arbitrary text,
/// or poke the collector.
const REMOVED_GLOBALS: &[&str] = &["dofile", "loadfile", "load", "collectgarbage", "print"];

/// Builds the proxy table and re-binds `pcall`/`xpcall` so that a run
/// whose deadline has passed cannot swallow the timeout error.
const PRELUDE: &str = r#"
local invoke, expired = ...
local raw_pcall, raw_xpcall = pcall, xpcall
local pack, unpack, error, tostring = table.pack, table.unpack, error, tostring
local raw_setmetatable, rawget, type = setmetatable, rawget, type

local function settle(results)
  if expired() then
    error("script execution timed out", 0)
  end
  return unpack(results, 1, results.n)
end

pcall = function(...) return settle(pack(raw_pcall(...))) end
xpcall = function(...) return settle(pack(raw_xpcall(...))) end

-- Finalizers run while the interpreter closes, outside any deadline.
setmetatable = function(t, mt)
  if type(mt) == "table" and rawget(mt, "__gc") ~= nil then
    error("__gc metamethods are not allowed", 2)
  end
  return raw_setmetatable(t, mt)
end

local capabilities = raw_setmetatable({}, {
  __index = function(_, name)
    local name = tostring(name)
    return function(params) return invoke(name, params) end
  end,
  __newindex = function() error("tools is read-only", 2) end,
  __metatable = false,
})

tools = capabilities
sdk = capabilities
"#;

fn libraries() -> StdLib {
    StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8
}

/// JSON `null` becomes `nil` inside scripts.
fn to_lua_options() -> SerializeOptions {
    SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false)
}

/// A bare interpreter with the restricted library set. Used on its own
/// for compile-only checks.
pub(crate) fn bare_state() -> mlua::Result<Lua> {
    Lua::new_with(libraries(), LuaOptions::default())
}

/// A fully prepared interpreter for one run.
pub(crate) fn prepare(
    proxy: CapabilityProxy,
    log: &ScriptLog,
    expired: Arc<AtomicBool>,
    context: &serde_json::Map<String, serde_json::Value>,
) -> mlua::Result<Lua> {
    let lua = bare_state()?;
    install_capabilities(&lua, proxy, expired)?;
    strip(&lua)?;
    install_console(&lua, log)?;
    install_context(&lua, context)?;
    Ok(lua)
}

fn install_capabilities(
    lua: &Lua,
    proxy: CapabilityProxy,
    expired: Arc<AtomicBool>,
) -> mlua::Result<()> {
    let invoke = lua.create_async_function(move |lua, (name, params): (String, Value)| {
        let proxy = proxy.clone();
        async move {
            let params = match params {
                Value::Nil => serde_json::Value::Object(Default::default()),
                other => lua.from_value(other)?,
            };
            let result = proxy
                .invoke(&name, params)
                .await
                .map_err(|e| mlua::Error::runtime(format!("{e:#}")))?;
            lua.to_value_with(&result, to_lua_options())
        }
    })?;
    let expired = lua.create_function(move |_, ()| Ok(expired.load(Ordering::SeqCst)))?;

    lua.load(PRELUDE)
        .set_name("=sandbox")
        .call::<_, ()>((invoke, expired))
}

/// Drop everything the restricted library set still leaks. `coroutine`
/// is loaded by the async bridge and removed again here.
fn strip(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in REMOVED_GLOBALS.iter().chain(["coroutine"].iter()) {
        globals.raw_set(*name, Value::Nil)?;
    }
    let string: Table = globals.raw_get("string")?;
    string.raw_set("dump", Value::Nil)?;
    Ok(())
}

fn install_console(lua: &Lua, log: &ScriptLog) -> mlua::Result<()> {
    let console = lua.create_table()?;
    for (method, prefix) in [("log", ""), ("warn", "WARN: "), ("error", "ERROR: ")] {
        let log = log.clone();
        let func = lua.create_function(move |lua, args: Variadic<Value>| {
            log.push(format!("{prefix}{}", render_args(lua, &args)));
            Ok(())
        })?;
        console.raw_set(method, func)?;
    }

    let globals = lua.globals();
    globals.raw_set("print", console.raw_get::<_, mlua::Function>("log")?)?;
    globals.raw_set("console", console)?;
    Ok(())
}

fn install_context(
    lua: &Lua,
    context: &serde_json::Map<String, serde_json::Value>,
) -> mlua::Result<()> {
    let globals = lua.globals();
    for (key, value) in context {
        if RESERVED_GLOBALS.contains(&key.as_str()) {
            warn!(key = %key, "Context key collides with a sandbox global, ignoring");
            continue;
        }
        globals.raw_set(key.as_str(), lua.to_value_with(value, to_lua_options())?)?;
    }
    Ok(())
}

/// Console arguments are rendered individually and joined by spaces.
fn render_args(lua: &Lua, args: &[Value]) -> String {
    args.iter()
        .map(|value| render_value(lua, value))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_value(lua: &Lua, value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().into_owned(),
        Value::Table(_) => lua
            .from_value::<serde_json::Value>(value.clone())
            .map(|json| json.to_string())
            .unwrap_or_else(|_| "table".to_string()),
        other => other
            .to_string()
            .map(|text| strip_traceback(&text))
            .unwrap_or_else(|_| other.type_name().to_string()),
    }
}

/// Raised errors render as their message followed by a traceback; only the
/// message is kept.
pub(crate) fn strip_traceback(message: &str) -> String {
    match message.find("\nstack traceback:") {
        Some(at) => message[..at].to_string(),
        None => message.to_string(),
    }
}
