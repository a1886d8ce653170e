use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;

const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt state file {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize state for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Ensure the directory holding a state file exists; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StateDir(format!("{dir:?} is not a directory")));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    }
    Ok(())
}

/// Replaces one state file atomically: the content goes to a temp file next to
/// the target, is flushed and synced, then renamed over the target. Readers see
/// either the old or the new complete file. A temp file left behind by a failed
/// write is removed when the handle drops.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    target: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(target: PathBuf) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    fn dir(&self) -> &Path {
        match self.target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn temp_prefix(&self) -> String {
        let name = self
            .target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        format!(".{name}.")
    }

    pub fn write(&self, content: &str) -> Result<(), PersistError> {
        let dir = self.dir().to_path_buf();
        ensure_state_dir(&dir)?;

        let io_err = |source: io::Error| PersistError::Io {
            path: self.target.clone(),
            source,
        };
        let mut tmp: NamedTempFile = Builder::new()
            .prefix(&self.temp_prefix())
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&dir)
            .map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.as_file_mut().sync_all().map_err(io_err)?;

        // rename(2) replaces the target in one step; never remove it first.
        tmp.persist(&self.target).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// Serialize `value` as pretty JSON and write it atomically.
    pub fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), PersistError> {
        let content =
            serde_json::to_string_pretty(value).map_err(|source| PersistError::Serialize {
                path: self.target.clone(),
                source,
            })?;
        self.write(&content)
    }

    /// Delete temp files a killed process may have left next to the target.
    pub fn sweep_stale_temps(&self) -> usize {
        let prefix = self.temp_prefix();
        let Ok(entries) = fs::read_dir(self.dir()) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(TEMP_SUFFIX) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(err) => engine_warn!("Failed to remove stale temp file {}: {}", name, err),
                }
            }
        }
        if removed > 0 {
            engine_debug!("Removed {} stale temp file(s) for {:?}", removed, self.target);
        }
        removed
    }
}

/// Read a JSON state file. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| PersistError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}
