//! Snapshot storage backends.
//!
//! The whole task list lives in a single blob under a fixed key. On disk that
//! key is the `tasks.json` file inside the data directory.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File name of the snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "tasks.json";

/// A place the serialised snapshot can be read from and written to.
pub trait Storage {
    /// Read the stored blob. `Ok(None)` means nothing has been stored yet.
    fn read(&self) -> io::Result<Option<String>>;

    /// Replace the stored blob.
    fn write(&mut self, blob: &str) -> io::Result<()>;

    /// Human-readable location, for logs and messages.
    fn location(&self) -> String;
}

/// Snapshot kept in a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SNAPSHOT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for JsonFile {
    fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(buf) => Ok(Some(buf)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Atomic-ish write via temp file + rename.
    fn write(&mut self, blob: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(blob.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
pub use memory::MemoryStorage;
