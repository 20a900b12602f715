use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::atomic_io::write_bytes_atomic;
use super::store::{validate_key, SharedStore, StoreError};

const RECORD_EXTENSION: &str = "json";

/// One JSON document per key under `<store_dir>/<namespace>/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(store_dir: &Path, namespace: &str) -> Result<Self, StoreError> {
        validate_key(namespace)?;
        let dir = store_dir.join(namespace);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Write {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{RECORD_EXTENSION}")))
    }
}

impl SharedStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        write_bytes_atomic(&path, value).map_err(|source| StoreError::Write { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove { path, source }),
        }
    }

    fn list(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::List {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!(dir = %self.dir.display(), error = %error, "store_entry_unreadable");
                    continue;
                }
            };
            let path = entry.path();
            let Some(key) = record_key(&path) else {
                continue;
            };
            match fs::read(&path) {
                Ok(bytes) => records.push((key, bytes)),
                // Removed by another reader between listing and reading.
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "store_entry_unreadable");
                }
            }
        }
        records.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(records)
    }
}

fn record_key(path: &Path) -> Option<String> {
    let is_record = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(RECORD_EXTENSION));
    if !is_record {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    validate_key(stem).ok()?;
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn set_get_list_remove_round_through_files() {
        let temp = TempDir::new().expect("tempdir");
        let store = FileStore::open(temp.path(), "peers").expect("open");

        store.set("200", br#"{"x":1}"#).expect("set b");
        store.set("100", br#"{"x":2}"#).expect("set a");
        assert_eq!(
            store.get("100").expect("get"),
            Some(br#"{"x":2}"#.to_vec())
        );
        assert!(store.dir().join("100.json").is_file());

        let keys = store
            .list()
            .expect("list")
            .into_iter()
            .map(|(key, _)| key)
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["100".to_string(), "200".to_string()]);

        store.remove("100").expect("remove");
        store.remove("100").expect("second remove is a no-op");
        assert_eq!(store.get("100").expect("get"), None);
    }

    #[test]
    fn list_ignores_foreign_files() {
        let temp = TempDir::new().expect("tempdir");
        let store = FileStore::open(temp.path(), "peers").expect("open");
        fs::write(store.dir().join("notes.txt"), "ignore").expect("write txt");
        fs::write(store.dir().join("bad name.json"), "{}").expect("write bad");
        fs::write(store.dir().join("7.json.99.tmp"), "{}").expect("write tmp");
        store.set("7", b"{}").expect("set");

        let listed = store.list().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "7");
    }

    #[test]
    fn namespaces_are_isolated() {
        let temp = TempDir::new().expect("tempdir");
        let a = FileStore::open(temp.path(), "peers").expect("open a");
        let b = FileStore::open(temp.path(), "other").expect("open b");
        a.set("1", b"{}").expect("set");
        assert!(b.list().expect("list").is_empty());
    }
}
