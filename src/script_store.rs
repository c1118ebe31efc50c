//! Script source storage
//!
//! The engine reads the whole script text on every reload. A missing
//! script is not an error: the built-in example is returned instead so a
//! first run always has something to execute.

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::ScriptError;

/// Script used when no user script exists yet
pub const BUILTIN_SCRIPT: &str = r#"-- user_script.lua not found; this is the built-in example
function OnEvent(event, arg)
    OutputLogMessage("Event: " .. event .. ", Arg: " .. arg .. "\n")

    if event == "MOUSE_BUTTON_PRESSED" and arg == 5 then
        OutputLogMessage("Side mouse button pressed!\n")
        PressKey("lshift")
        Sleep(50)
        PressAndReleaseKey("a")
        Sleep(50)
        ReleaseKey("lshift")
    end
end
"#;

/// Script text plus where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    /// Chunk name used in Lua error messages
    pub name: String,
    pub text: String,
    /// True when the built-in example stands in for a missing script
    pub builtin: bool,
}

impl ScriptSource {
    pub fn builtin() -> Self {
        Self {
            name: "builtin".to_string(),
            text: BUILTIN_SCRIPT.to_string(),
            builtin: true,
        }
    }
}

/// Where script text lives
pub trait ScriptStore: Send + Sync {
    /// Read the whole script. A missing script yields the built-in example.
    fn load(&self) -> Result<ScriptSource, ScriptError>;

    /// Replace the stored script text
    fn save(&self, text: &str) -> Result<(), ScriptError>;
}

/// Script stored in a file on disk
#[derive(Debug, Clone)]
pub struct FileScriptStore {
    path: PathBuf,
}

impl FileScriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn chunk_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string())
    }
}

impl ScriptStore for FileScriptStore {
    fn load(&self) -> Result<ScriptSource, ScriptError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                debug!("Read {} bytes from {}", text.len(), self.path.display());
                Ok(ScriptSource {
                    name: self.chunk_name(),
                    text,
                    builtin: false,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    "No script at {}, using built-in example",
                    self.path.display()
                );
                Ok(ScriptSource::builtin())
            }
            Err(source) => Err(ScriptError::SourceUnavailable {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, text: &str) -> Result<(), ScriptError> {
        let save_error = |source| ScriptError::SaveFailed {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(save_error)?;
        }
        std::fs::write(&self.path, text).map_err(save_error)?;
        info!("Saved script to {}", self.path.display());
        Ok(())
    }
}

/// In-memory script store
#[derive(Debug, Default)]
pub struct MemoryScriptStore {
    text: Mutex<Option<String>>,
}

impl MemoryScriptStore {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(Some(text.into())),
        }
    }

    /// Store with no script, so loads fall back to the built-in example
    pub fn empty() -> Self {
        Self::default()
    }
}

impl ScriptStore for MemoryScriptStore {
    fn load(&self) -> Result<ScriptSource, ScriptError> {
        Ok(match self.text.lock().clone() {
            Some(text) => ScriptSource {
                name: "memory".to_string(),
                text,
                builtin: false,
            },
            None => ScriptSource::builtin(),
        })
    }

    fn save(&self, text: &str) -> Result<(), ScriptError> {
        *self.text.lock() = Some(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScriptStore::new(dir.path().join("user_script.lua"));
        let source = store.load().unwrap();
        assert!(source.builtin);
        assert!(source.text.contains("function OnEvent"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScriptStore::new(dir.path().join("nested").join("user_script.lua"));
        store.save("function OnEvent() end").unwrap();
        let source = store.load().unwrap();
        assert!(!source.builtin);
        assert_eq!(source.name, "user_script");
        assert_eq!(source.text, "function OnEvent() end");
    }

    #[test]
    fn test_unreadable_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a script
        let store = FileScriptStore::new(dir.path());
        assert!(matches!(
            store.load(),
            Err(ScriptError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryScriptStore::empty();
        assert!(store.load().unwrap().builtin);
        store.save("x = 1").unwrap();
        assert_eq!(store.load().unwrap().text, "x = 1");
    }
}
