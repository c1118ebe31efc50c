//! The script capability surface
//!
//! One canonical table of functions, published twice: inside the `GHUB`
//! table and as globals, so both `GHUB.PressKey("a")` and `PressKey("a")`
//! work. Unknown `GHUB.*` names resolve to a logging no-op.

use std::rc::Rc;
use std::time::Duration;

use macrobridge_input::{is_modifier_pressed, lookup_key, LockKey, MouseButton};
use mlua::{Function, Lua, MultiValue, Result as LuaResult, Table, Value, Variadic};
use tracing::{debug, warn};

use super::host::Host;
use crate::error::ScriptError;

/// Every capability name, in registration order
pub const CAPABILITIES: &[&str] = &[
    "PressKey",
    "ReleaseKey",
    "PressAndReleaseKey",
    "PressMouseButton",
    "ReleaseMouseButton",
    "PressAndReleaseMouseButton",
    "MoveMouseRelative",
    "MoveMouseTo",
    "GetMousePosition",
    "IsModifierPressed",
    "IsMouseButtonPressed",
    "IsKeyLockOn",
    "EnablePrimaryMouseButtonEvents",
    "GetRunningTime",
    "OutputLogMessage",
    "ClearLog",
    "Sleep",
    "Sleep_extra",
    "AbortMacro",
    "PlaySound",
    "SetBacklightColor",
];

/// Name of the namespace table
pub const NAMESPACE: &str = "GHUB";

/// Register the full capability surface on a fresh interpreter
pub fn register(lua: &Lua, host: &Rc<Host>) -> LuaResult<()> {
    let functions = build(lua, host)?;
    debug_assert_eq!(functions.len(), CAPABILITIES.len());

    let globals = lua.globals();
    let ghub = lua.create_table()?;
    for (name, function) in functions {
        ghub.set(name, function.clone())?;
        globals.set(name, function)?;
    }

    let fallback = lua.create_table()?;
    fallback.set(
        "__index",
        lua.create_function(|lua, (_table, key): (Table, Value)| {
            let name = display_value(&key);
            lua.create_function(move |_, _args: MultiValue| {
                warn!("Call to unknown function {}.{} ignored", NAMESPACE, name);
                Ok(())
            })
        })?,
    )?;
    let setmetatable: Function = globals.get("setmetatable")?;
    setmetatable.call::<()>((ghub.clone(), fallback))?;

    globals.set(NAMESPACE, ghub)?;
    Ok(())
}

fn build(lua: &Lua, host: &Rc<Host>) -> LuaResult<Vec<(&'static str, Function)>> {
    let mut f = Vec::with_capacity(CAPABILITIES.len());

    // ========================================================================
    // Keys
    // ========================================================================

    let h = host.clone();
    f.push((
        "PressKey",
        lua.create_function(move |_, keys: Variadic<String>| {
            for name in keys.iter() {
                with_key(&h, "PressKey", name, |h, key| h.adapter().press_key(key));
            }
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "ReleaseKey",
        lua.create_function(move |_, keys: Variadic<String>| {
            for name in keys.iter() {
                with_key(&h, "ReleaseKey", name, |h, key| h.adapter().release_key(key));
            }
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "PressAndReleaseKey",
        lua.create_function(move |_, keys: Variadic<String>| {
            for name in keys.iter() {
                with_key(&h, "PressAndReleaseKey", name, |h, key| {
                    let mut adapter = h.adapter();
                    adapter.press_key(key);
                    adapter.release_key(key);
                });
            }
            Ok(())
        })?,
    ));

    // ========================================================================
    // Mouse buttons and movement
    // ========================================================================

    let h = host.clone();
    f.push((
        "PressMouseButton",
        lua.create_function(move |_, id: i64| {
            let button = mouse_button("PressMouseButton", id)?;
            h.adapter().press_button(button);
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "ReleaseMouseButton",
        lua.create_function(move |_, id: i64| {
            let button = mouse_button("ReleaseMouseButton", id)?;
            h.adapter().release_button(button);
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "PressAndReleaseMouseButton",
        lua.create_function(move |_, id: i64| {
            let button = mouse_button("PressAndReleaseMouseButton", id)?;
            let mut adapter = h.adapter();
            adapter.press_button(button);
            adapter.release_button(button);
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "MoveMouseRelative",
        lua.create_function(move |_, (dx, dy): (f64, f64)| {
            let (dx, dy) = h.jitter(dx.round() as i32, dy.round() as i32);
            h.adapter().move_relative(dx, dy);
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "MoveMouseTo",
        lua.create_function(move |_, (x, y): (f64, f64)| {
            h.adapter().move_absolute(x.round() as i32, y.round() as i32);
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "GetMousePosition",
        lua.create_function(move |_, ()| Ok(h.adapter().position()))?,
    ));

    // ========================================================================
    // State queries
    // ========================================================================

    let h = host.clone();
    f.push((
        "IsModifierPressed",
        lua.create_function(move |_, name: String| {
            Ok(is_modifier_pressed(h.probe(), &name).unwrap_or_else(|| {
                debug!("IsModifierPressed: '{}' is not a modifier", name);
                false
            }))
        })?,
    ));

    let h = host.clone();
    f.push((
        "IsMouseButtonPressed",
        lua.create_function(move |_, id: i64| {
            Ok(MouseButton::from_id(id).is_some_and(|b| h.is_button_down(b)))
        })?,
    ));

    let h = host.clone();
    f.push((
        "IsKeyLockOn",
        lua.create_function(move |_, name: String| {
            Ok(LockKey::from_name(&name).is_some_and(|lock| h.probe().is_lock_on(lock)))
        })?,
    ));

    let h = host.clone();
    f.push((
        "EnablePrimaryMouseButtonEvents",
        lua.create_function(move |_, enable: bool| {
            h.set_primary_events(enable);
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "GetRunningTime",
        lua.create_function(move |_, ()| Ok(h.running_time_ms() as i64))?,
    ));

    // ========================================================================
    // Log
    // ========================================================================

    let h = host.clone();
    f.push((
        "OutputLogMessage",
        lua.create_function(move |lua, args: MultiValue| {
            let message = if args.len() > 1 {
                let format: Function = lua.globals().get::<Table>("string")?.get("format")?;
                format.call::<String>(args)?
            } else {
                args.front().map(display_value).unwrap_or_default()
            };
            h.log().push(&message);
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "ClearLog",
        lua.create_function(move |_, ()| {
            h.log().clear();
            Ok(())
        })?,
    ));

    // ========================================================================
    // Timing
    // ========================================================================

    let h = host.clone();
    f.push((
        "Sleep",
        lua.create_function(move |_, ms: f64| {
            h.sleep(millis(ms));
            Ok(())
        })?,
    ));

    let h = host.clone();
    f.push((
        "Sleep_extra",
        lua.create_function(move |_, (id, ms): (i64, f64)| {
            match MouseButton::from_id(id) {
                Some(button) => {
                    if h.sleep_until_release(button, millis(ms)) {
                        debug!("Sleep_extra ended early on button {} release", id);
                    }
                }
                None => {
                    warn!("Sleep_extra: invalid button {}, sleeping full duration", id);
                    h.sleep(millis(ms));
                }
            }
            Ok(())
        })?,
    ));

    f.push((
        "AbortMacro",
        lua.create_function(|_, ()| -> LuaResult<()> {
            Err(mlua::Error::external(ScriptError::Aborted))
        })?,
    ));

    // ========================================================================
    // Accepted for compatibility
    // ========================================================================

    let h = host.clone();
    f.push((
        "PlaySound",
        lua.create_function(move |_, file: String| {
            h.log().push(&format!("[SOUND] Play: {file}"));
            Ok(true)
        })?,
    ));

    f.push((
        "SetBacklightColor",
        lua.create_function(|_, _args: MultiValue| Ok(true))?,
    ));

    Ok(f)
}

fn with_key(
    host: &Host,
    capability: &str,
    name: &str,
    action: impl FnOnce(&Host, macrobridge_input::Key),
) {
    match lookup_key(name) {
        Some(key) => {
            debug!("{}: {}", capability, name);
            action(host, key);
        }
        None => host
            .log()
            .push(&format!("{capability}: Unknown key '{name}'")),
    }
}

fn mouse_button(capability: &'static str, id: i64) -> LuaResult<MouseButton> {
    MouseButton::from_id(id).ok_or_else(|| {
        mlua::Error::external(ScriptError::Capability {
            name: capability,
            reason: format!("invalid mouse button {id} (expected 1-5)"),
        })
    })
}

fn millis(ms: f64) -> Duration {
    Duration::from_millis(ms.max(0.0) as u64)
}

/// Render a Lua value for log output
fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().into(),
        other => other.type_name().to_string(),
    }
}
