// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use macrobridge::AppConfig;

#[derive(Parser)]
#[command(name = "macrobridge")]
#[command(author, version, about = "Scriptable input macros over serial or uinput")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/macrobridge/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Lua script path (overrides config)
    #[arg(short, long, global = true)]
    pub script: Option<PathBuf>,

    /// Serial port of the output device, e.g. /dev/ttyUSB0
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// Connect to the serial port on start-up
    #[arg(long, global = true)]
    pub connect: bool,

    /// Start with relative-move jitter enabled
    #[arg(long, global = true)]
    pub randomize: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture input and run the macro script (default)
    Run,

    /// Load the script once, report whether it is usable, and exit
    #[command(visible_alias = "check")]
    CheckScript,

    /// List serial ports
    Ports,

    /// Write the default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(script) = &self.script {
            config.script_path = Some(script.clone());
        }
        if let Some(port) = &self.port {
            config.serial.port = Some(port.clone());
        }
        if self.connect {
            config.serial.auto_connect = true;
        }
        if self.randomize {
            config.randomize = true;
        }
    }
}
