//! Error types for the macro engine and configuration

use std::path::PathBuf;

use thiserror::Error;

/// Errors from script loading and execution
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),
    #[error("Failed to read script {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write script {path}: {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Script defines no OnEvent handler")]
    MissingHandler,
    #[error("Macro aborted by script")]
    Aborted,
    #[error("{name}: {reason}")]
    Capability { name: &'static str, reason: String },
}

/// Errors from loading or saving the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync + 'static>() {}

    #[test]
    fn test_errors_cross_threads() {
        assert_send_sync::<ScriptError>();
        assert_send_sync::<ConfigError>();
    }

    #[test]
    fn test_script_error_converts_to_anyhow() {
        let err: anyhow::Error = ScriptError::Lua(mlua::Error::runtime("boom")).into();
        assert!(err.to_string().contains("boom"));
    }
}
