use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::{Error, Result};

/// Small persisted key/value store for process-wide flags.
///
/// Backed by a JSON file that is rewritten atomically on every change.
/// The in-memory variant keeps nothing on disk.
pub struct Settings {
    path: Option<PathBuf>,
    values: Mutex<BTreeMap<String, Value>>,
}

impl Settings {
    /// Load settings from `path`, starting empty when the file does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        let values = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            values: Mutex::new(values),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn flag(&self, key: &str) -> Result<bool> {
        let values = self.values.lock().map_err(|_| Error::StorePoisoned)?;
        Ok(values.get(key).and_then(Value::as_bool).unwrap_or(false))
    }

    pub fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| Error::StorePoisoned)?;
        let previous = values.insert(key.to_string(), Value::Bool(value));
        if let Err(e) = self.persist(&values) {
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
            return Err(e.into_write_failure());
        }
        Ok(())
    }

    fn persist(&self, values: &BTreeMap<String, Value>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, values)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
