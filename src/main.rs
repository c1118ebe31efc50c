//! macrobridge - scriptable input macros
//!
//! Main entry point: wires capture, the Lua sandbox and the output
//! adapter together and runs the dispatch loop on the main thread.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

use macrobridge::control::{self, ControlMessage, ControlSender};
use macrobridge::{
    AppConfig, DispatchLoop, FileScriptStore, Host, MacroSandbox, ScriptLog, ScriptState,
    ScriptStore, StatusLogPresenter,
};
use macrobridge_input::{
    spawn_capture, EvdevProbe, EventQueue, InputProbe, OutputAdapter, RecordingOsInput,
    ScriptedProbe, StateTracker, UinputOsInput,
};
use macrobridge_transport::{list_ports, SerialTransport};

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);

    if let Some(Commands::InitConfig { force }) = &cli.command {
        return init_config(&config_path, *force);
    }

    info!("Loading config from {:?}", config_path);
    let mut config = AppConfig::load(&config_path)?;
    cli.apply(&mut config);

    match cli.command {
        None | Some(Commands::Run) => run(config),
        Some(Commands::CheckScript) => check_script(config),
        Some(Commands::Ports) => ports(),
        Some(Commands::InitConfig { .. }) => Ok(()),
    }
}

/// Capture input and dispatch to the script until Ctrl+C or `quit`
fn run(config: AppConfig) -> Result<()> {
    let queue = Arc::new(EventQueue::new(config.queue_config()));

    let probe: Arc<dyn InputProbe> =
        Arc::new(EvdevProbe::open().context("Opening input devices (is /dev/input readable?)")?);
    let os = UinputOsInput::new().context("Creating uinput devices (is /dev/uinput writable?)")?;
    let adapter = OutputAdapter::new(SerialTransport::new(config.link_settings()), Box::new(os))
        .with_window(config.window);

    let (tx, rx) = control::channel();
    if config.serial.auto_connect {
        match &config.serial.port {
            Some(port) => tx.send(ControlMessage::Connect(port.clone()))?,
            None => warn!("auto_connect is set but no serial port is configured"),
        }
    }

    let host = Host::new(adapter, probe.clone(), Arc::new(ScriptLog::default()))
        .with_control(rx)
        .with_randomization(config.randomize);
    let script_path = config.script_path();
    info!("Script: {}", script_path.display());
    let mut sandbox = MacroSandbox::new(host, Box::new(FileScriptStore::new(script_path)));
    sandbox.reload();

    let shutdown = tx.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown.send(ControlMessage::Shutdown);
    })?;
    spawn_stdin_control(tx)?;

    let capture = spawn_capture(
        probe,
        StateTracker::standard(&config.capture.hotkey),
        queue.clone(),
        config.poll_interval(),
    )?;

    let mut dispatch = DispatchLoop::new(
        sandbox,
        queue,
        StatusLogPresenter::default(),
        config.dispatch.batch_size,
    );
    info!("Running. Press Ctrl+C to exit.");
    dispatch.run(config.dispatch_interval());

    capture.stop();
    Ok(())
}

/// Read control commands from stdin, one per line:
/// `reload`, `connect [port]`, `disconnect`, `randomize on|off`, `quit`
fn spawn_stdin_control(tx: ControlSender) -> Result<()> {
    thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let mut words = line.split_whitespace();
                let msg = match (words.next(), words.next()) {
                    (Some("reload"), _) => ControlMessage::Reload,
                    (Some("connect"), Some(port)) => ControlMessage::Connect(port.to_string()),
                    (Some("disconnect"), _) => ControlMessage::Disconnect,
                    (Some("randomize"), Some("on")) => ControlMessage::SetRandomization(true),
                    (Some("randomize"), Some("off")) => ControlMessage::SetRandomization(false),
                    (Some("quit" | "exit"), _) => ControlMessage::Shutdown,
                    (None, _) => continue,
                    _ => {
                        warn!("Unknown command: {}", line.trim());
                        continue;
                    }
                };
                if tx.send(msg).is_err() {
                    break;
                }
            }
        })?;
    Ok(())
}

/// Load the script against inert input/output and report the result
fn check_script(config: AppConfig) -> Result<()> {
    let store = FileScriptStore::new(config.script_path());
    let source = store.load()?;
    println!(
        "Script: {}{}",
        store.path().display(),
        if source.builtin { " (missing, built-in example used)" } else { "" }
    );

    let log = Arc::new(ScriptLog::default());
    let adapter = OutputAdapter::new(
        SerialTransport::new(config.link_settings()),
        Box::new(RecordingOsInput::new()),
    );
    let host = Host::new(adapter, Arc::new(ScriptedProbe::new()), log.clone());
    let mut sandbox = MacroSandbox::new(host, Box::new(store));
    let state = sandbox.reload();

    for line in log.lines() {
        println!("  {line}");
    }
    println!("State: {state}");
    if state != ScriptState::Active {
        bail!("script is not usable");
    }
    Ok(())
}

fn ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        match port.description {
            Some(desc) => println!("{:<20} {}", port.name, desc),
            None => println!("{}", port.name),
        }
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let config = AppConfig::default();
    config.save(path)?;
    println!("Wrote {}", path.display());

    let store = FileScriptStore::new(config.script_path());
    if !store.path().exists() {
        store.save(macrobridge::script_store::BUILTIN_SCRIPT)?;
        println!("Wrote {}", store.path().display());
    }
    Ok(())
}
