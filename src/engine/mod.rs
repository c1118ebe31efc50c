//! Lua macro sandbox
//!
//! Each reload builds a brand new interpreter ([`ScriptEnv`]), registers
//! the capability surface on it and runs the user script. The previous
//! environment is dropped wholesale; nothing carries over except the
//! [`Host`] services.
//!
//! Script failures never escape: load errors leave the sandbox in
//! [`ScriptState::LoadFailed`] and handler errors are reported as an
//! [`InvokeOutcome`].

pub mod capabilities;
pub mod host;

use std::fmt;
use std::rc::Rc;

use macrobridge_input::{EventKind, InputEvent, MouseButton};
use mlua::{Function, Lua, LuaOptions, StdLib};
use tracing::{debug, error, info, warn};

pub use host::Host;

use crate::error::ScriptError;
use crate::script_store::ScriptStore;

/// Global the script must define to receive events
pub const HANDLER_NAME: &str = "OnEvent";

/// Standard library functions removed from every environment
const STRIPPED_GLOBALS: &[&str] = &["dofile", "loadfile"];
const STRIPPED_OS: &[&str] = &["execute", "exit", "remove", "rename", "tmpname", "getenv"];

/// Script lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    /// No reload has happened yet
    Uninitialized,
    /// Interpreter built and capabilities registered; source not yet run
    Loaded,
    /// Script ran and defined `OnEvent`
    Active,
    /// Source missing, invalid or without a handler
    LoadFailed,
}

impl fmt::Display for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScriptState::Uninitialized => "uninitialized",
            ScriptState::Loaded => "loaded",
            ScriptState::Active => "active",
            ScriptState::LoadFailed => "load failed",
        };
        f.write_str(s)
    }
}

/// Result of delivering one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    Handled,
    /// No active handler; the event was dropped
    Inactive,
    /// Primary-button events are disabled by the script
    Suppressed,
    /// The script called `AbortMacro`
    Aborted,
    /// The handler raised; carries the cleaned-up message
    Failed(String),
}

/// One interpreter instance and its handler
struct ScriptEnv {
    handler: Option<Function>,
    lua: Lua,
}

impl ScriptEnv {
    fn new(host: &Rc<Host>) -> Result<Self, ScriptError> {
        let lua = Lua::new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::OS | StdLib::UTF8,
            LuaOptions::default(),
        )?;

        let globals = lua.globals();
        for name in STRIPPED_GLOBALS {
            globals.set(*name, mlua::Value::Nil)?;
        }
        let os: mlua::Table = globals.get("os")?;
        for name in STRIPPED_OS {
            os.set(*name, mlua::Value::Nil)?;
        }

        capabilities::register(&lua, host)?;
        Ok(Self { handler: None, lua })
    }
}

/// Embedded interpreter with reloadable user script
pub struct MacroSandbox {
    host: Rc<Host>,
    store: Box<dyn ScriptStore>,
    env: Option<ScriptEnv>,
    state: ScriptState,
}

impl MacroSandbox {
    /// Create an uninitialized sandbox. Call [`reload`](Self::reload) to load a script.
    pub fn new(host: Host, store: Box<dyn ScriptStore>) -> Self {
        Self {
            host: Rc::new(host),
            store,
            env: None,
            state: ScriptState::Uninitialized,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn store(&self) -> &dyn ScriptStore {
        self.store.as_ref()
    }

    pub fn state(&self) -> ScriptState {
        self.state
    }

    pub fn set_randomization(&self, enabled: bool) {
        self.host.set_randomization(enabled);
    }

    /// Destroy the current interpreter and load the script from the store.
    ///
    /// Never fails: problems are logged and reflected in the returned state.
    pub fn reload(&mut self) -> ScriptState {
        if self.state == ScriptState::Active {
            self.invoke(&EventKind::PROFILE_DEACTIVATED, 0);
        }
        self.env = None;
        self.host.set_primary_events(true);

        let mut env = match ScriptEnv::new(&self.host) {
            Ok(env) => env,
            Err(e) => {
                error!("Failed to create script environment: {}", e);
                self.state = ScriptState::LoadFailed;
                return self.state;
            }
        };
        self.state = ScriptState::Loaded;

        match load_script(&env, self.store.as_ref()) {
            Ok(handler) => {
                env.handler = Some(handler);
                self.state = ScriptState::Active;
            }
            Err(e) => {
                warn!("Script not loaded: {}", e);
                self.state = ScriptState::LoadFailed;
            }
        }
        self.env = Some(env);

        if self.state == ScriptState::Active {
            info!("Script loaded, OnEvent active");
            self.invoke(&EventKind::PROFILE_ACTIVATED, 0);
        }
        self.state
    }

    /// Deliver an input event, honoring primary-button gating
    pub fn invoke_event(&mut self, event: &InputEvent) -> InvokeOutcome {
        let primary = matches!(
            event.kind(),
            EventKind::ButtonPressed | EventKind::ButtonReleased
        ) && event.argument() == MouseButton::Left.id() as i64;

        if primary && !self.host.primary_events() {
            return InvokeOutcome::Suppressed;
        }
        self.invoke(event.kind(), event.argument())
    }

    /// Call `OnEvent(name, argument)` if a handler is active.
    ///
    /// Script errors are caught, cleaned and logged here.
    pub fn invoke(&mut self, kind: &EventKind, argument: i64) -> InvokeOutcome {
        if self.state != ScriptState::Active {
            return InvokeOutcome::Inactive;
        }
        let Some(handler) = self.env.as_ref().and_then(|env| env.handler.as_ref()) else {
            return InvokeOutcome::Inactive;
        };

        match handler.call::<()>((kind.script_name(), argument)) {
            Ok(()) => InvokeOutcome::Handled,
            Err(e) if is_abort(&e) => {
                info!("Macro aborted during {}", kind);
                InvokeOutcome::Aborted
            }
            Err(e) => {
                let message = clean_error(&e);
                if is_unknown_call(&message) {
                    debug!("Suppressed script error in {}: {}", kind, message);
                } else {
                    error!("Script error in {}({}): {}", kind, argument, message);
                    self.host.log().push(&format!("[LUA ERROR] {message}"));
                }
                InvokeOutcome::Failed(message)
            }
        }
    }
}

impl Drop for MacroSandbox {
    fn drop(&mut self) {
        if self.state == ScriptState::Active {
            self.invoke(&EventKind::PROFILE_DEACTIVATED, 0);
        }
    }
}

/// Run the script source and find its handler
fn load_script(env: &ScriptEnv, store: &dyn ScriptStore) -> Result<Function, ScriptError> {
    let source = store.load()?;
    if source.builtin {
        info!("Loading built-in example script");
    }
    env.lua
        .load(source.text.as_str())
        .set_name(format!("={}", source.name))
        .exec()
        .map_err(|e| {
            error!("Script {} failed to load: {}", source.name, clean_error(&e));
            ScriptError::Lua(e)
        })?;

    env.lua
        .globals()
        .get::<Option<Function>>(HANDLER_NAME)?
        .ok_or(ScriptError::MissingHandler)
}

fn is_abort(err: &mlua::Error) -> bool {
    match err {
        mlua::Error::CallbackError { cause, .. } => is_abort(cause),
        mlua::Error::ExternalError(e) => e
            .downcast_ref::<ScriptError>()
            .is_some_and(|e| matches!(e, ScriptError::Aborted)),
        _ => false,
    }
}

/// Calls to undefined functions are noise from scripts written for other hosts
fn is_unknown_call(message: &str) -> bool {
    message.contains("attempt to call")
}

/// Innermost error message with any traceback removed
pub fn clean_error(err: &mlua::Error) -> String {
    let message = match err {
        mlua::Error::CallbackError { cause, .. } => return clean_error(cause),
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::SyntaxError { message, .. } => format!("syntax error: {message}"),
        mlua::Error::ExternalError(e) => e.to_string(),
        other => other.to_string(),
    };
    match message.find("stack traceback") {
        Some(pos) => message[..pos].trim_end().to_string(),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script_log::ScriptLog;
    use crate::script_store::MemoryScriptStore;
    use macrobridge_input::{OutputAdapter, RecordingOsInput, ScriptedProbe};
    use macrobridge_transport::{LinkSettings, SerialTransport};
    use std::sync::Arc;

    fn sandbox(script: &str) -> (MacroSandbox, Arc<ScriptLog>) {
        let log = Arc::new(ScriptLog::default());
        let adapter = OutputAdapter::new(
            SerialTransport::new(LinkSettings::default()),
            Box::new(RecordingOsInput::new()),
        );
        let host = Host::new(adapter, Arc::new(ScriptedProbe::new()), log.clone());
        let sandbox = MacroSandbox::new(host, Box::new(MemoryScriptStore::new(script)));
        (sandbox, log)
    }

    #[test]
    fn test_state_transitions() {
        let (mut sb, _) = sandbox("function OnEvent(e, a) end");
        assert_eq!(sb.state(), ScriptState::Uninitialized);
        assert_eq!(sb.invoke(&EventKind::KeyPressed, 70), InvokeOutcome::Inactive);
        assert_eq!(sb.reload(), ScriptState::Active);
        assert_eq!(sb.invoke(&EventKind::KeyPressed, 70), InvokeOutcome::Handled);
    }

    #[test]
    fn test_syntax_error_is_load_failed() {
        let (mut sb, _) = sandbox("function OnEvent(");
        assert_eq!(sb.reload(), ScriptState::LoadFailed);
        assert_eq!(sb.invoke(&EventKind::KeyPressed, 1), InvokeOutcome::Inactive);
    }

    #[test]
    fn test_missing_handler_is_load_failed() {
        let (mut sb, _) = sandbox("x = 1");
        assert_eq!(sb.reload(), ScriptState::LoadFailed);
    }

    #[test]
    fn test_profile_events() {
        let (mut sb, log) = sandbox(
            r#"function OnEvent(e, a) OutputLogMessage(e) end"#,
        );
        sb.reload();
        sb.reload();
        assert_eq!(
            log.lines(),
            vec!["PROFILE_ACTIVATED", "PROFILE_DEACTIVATED", "PROFILE_ACTIVATED"]
        );
    }

    #[test]
    fn test_error_truncated_and_logged() {
        let (mut sb, log) = sandbox(r#"function OnEvent(e, a) error("boom") end"#);
        sb.reload();
        // PROFILE_ACTIVATED already failed once
        log.clear();
        match sb.invoke(&EventKind::ButtonPressed, 4) {
            InvokeOutcome::Failed(msg) => {
                assert!(msg.contains("boom"));
                assert!(!msg.contains("stack traceback"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_unknown_global_call_not_logged() {
        let (mut sb, log) = sandbox(
            r#"function OnEvent(e, a) if e ~= "PROFILE_ACTIVATED" then NoSuchThing() end end"#,
        );
        sb.reload();
        assert!(matches!(
            sb.invoke(&EventKind::KeyPressed, 1),
            InvokeOutcome::Failed(_)
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn test_abort_macro() {
        let (mut sb, log) = sandbox(
            r#"function OnEvent(e, a)
                if e == "G_PRESSED" then AbortMacro() OutputLogMessage("unreachable") end
            end"#,
        );
        sb.reload();
        assert_eq!(sb.invoke(&EventKind::KeyPressed, 70), InvokeOutcome::Aborted);
        assert!(log.is_empty());
    }

    #[test]
    fn test_primary_gating() {
        let (mut sb, log) = sandbox(
            r#"function OnEvent(e, a)
                if e == "PROFILE_ACTIVATED" then EnablePrimaryMouseButtonEvents(false) end
                if e == "MOUSE_BUTTON_PRESSED" then OutputLogMessage("btn " .. a) end
            end"#,
        );
        sb.reload();
        let left = InputEvent::new(EventKind::ButtonPressed, 1);
        let right = InputEvent::new(EventKind::ButtonPressed, 2);
        assert_eq!(sb.invoke_event(&left), InvokeOutcome::Suppressed);
        assert_eq!(sb.invoke_event(&right), InvokeOutcome::Handled);
        assert_eq!(log.lines(), vec!["btn 2"]);
    }

    #[test]
    fn test_reload_restores_primary_events() {
        let (mut sb, _) = sandbox("function OnEvent(e, a) end");
        sb.reload();
        sb.host().set_primary_events(false);
        sb.reload();
        assert!(sb.host().primary_events());
    }

    #[test]
    fn test_dangerous_globals_removed() {
        let (mut sb, log) = sandbox(
            r#"function OnEvent(e, a)
                OutputLogMessage("%s %s %s", type(os.execute), type(dofile), type(os.time))
            end"#,
        );
        sb.reload();
        assert_eq!(log.lines(), vec!["nil nil function"]);
    }
}
