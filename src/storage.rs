//! Small JSON documents persisted on disk
//!
//! Used for the pointer list and the alert history. Saves are written to a
//! temp file beside the target and renamed over it, so a crash mid-save
//! leaves the previous document intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::Result;

#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored document, or `T::default()` if nothing was saved yet
    pub fn load(&self) -> Result<T> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(T::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, value: &T) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, value)?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        log::trace!("saved {}", self.path.display());
        Ok(())
    }

    /// Load, modify and save in one step. The caller is responsible for
    /// serializing concurrent updates.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut value = self.load()?;
        let out = f(&mut value);
        self.save(&value)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Vec<u32>> = JsonStore::new(dir.path().join("none.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Vec<String>> = JsonStore::new(dir.path().join("nested/list.json"));

        store.save(&vec!["a".into()]).unwrap();
        store.update(|list| list.push("b".into())).unwrap();
        assert_eq!(store.load().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{ not json").unwrap();
        let store: JsonStore<Vec<u32>> = JsonStore::new(path);
        assert!(matches!(store.load(), Err(crate::MapError::Serialization(_))));
    }
}
