// macrobridge - Scriptable input macro engine
// Lua sandbox, dispatch loop and configuration shared by the CLI and tests

pub mod bind_table;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod script_log;
pub mod script_store;

pub use bind_table::BindTable;
pub use config::AppConfig;
pub use control::{ControlMessage, ControlReceiver, ControlSender};
pub use dispatch::{
    DispatchLoop, NullPresenter, Presenter, StatusLogPresenter, TickOutcome, TickReport,
};
pub use engine::{Host, InvokeOutcome, MacroSandbox, ScriptState};
pub use error::{ConfigError, ScriptError};
pub use script_log::ScriptLog;
pub use script_store::{FileScriptStore, MemoryScriptStore, ScriptSource, ScriptStore};
