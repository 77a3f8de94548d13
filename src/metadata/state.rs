use crate::error::{RedomineError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Durable key/value store backing checkpoints. Writes must be atomic:
/// a reader never observes a torn value under any key.
pub trait StateStore: Send + Sync {
    fn write(&self, name: &str, content: &str) -> Result<()>;
    /// Returns `None` when the key does not exist. Values larger than
    /// `max_size` bytes are refused.
    fn read(&self, name: &str, max_size: u64) -> Result<Option<String>>;
    fn delete(&self, name: &str) -> Result<()>;
    fn list(&self) -> Result<Vec<String>>;
}

/// One file per key under a directory. Writes go through a temp file,
/// fsync, rename, then a directory fsync, so a crash leaves either the
/// old or the new value.
#[derive(Debug)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl StateStore for FileStateStore {
    fn write(&self, name: &str, content: &str) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(name))
            .map_err(|err| RedomineError::Io(err.error))?;
        let dir = fs::File::open(&self.dir)?;
        dir.sync_all()?;
        Ok(())
    }

    fn read(&self, name: &str, max_size: u64) -> Result<Option<String>> {
        let path = self.path_for(name);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if metadata.len() > max_size {
            return Err(RedomineError::runtime(
                10045,
                format!(
                    "state file too large: {name} ({} bytes, maximum: {max_size})",
                    metadata.len()
                ),
            ));
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some(name) = file_name.strip_suffix(".json") {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory state store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn write(&self, name: &str, content: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(name.to_owned(), content.to_owned());
        Ok(())
    }

    fn read(&self, name: &str, max_size: u64) -> Result<Option<String>> {
        match self.entries.lock().get(name) {
            None => Ok(None),
            Some(content) if content.len() as u64 > max_size => Err(RedomineError::runtime(
                10045,
                format!(
                    "state entry too large: {name} ({} bytes, maximum: {max_size})",
                    content.len()
                ),
            )),
            Some(content) => Ok(Some(content.clone())),
        }
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.entries.lock().remove(name);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
