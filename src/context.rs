use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use directories::ProjectDirs;

const APP_NAME: &str = "deckbox";
const APP_AUTHOR: &str = "deckbox";
const APP_QUALIFIER: &str = "com";

const CONFIG_FILE_NAME: &str = "session.json";

/// String key/value storage that survives restarts; the session lives here.
pub trait SessionStorage: Send + Sync {
    fn read_data(&self, key: &str) -> Option<String>;
    fn write_data(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove_data(&self, key: &str) -> io::Result<()>;
}

/// JSON file under the platform's local data directory.
pub struct FileStorage {
    data: Arc<RwLock<HashMap<String, String>>>,
    config_file_path: PathBuf,
}

pub fn create_context() -> io::Result<FileStorage> {
    let project_dirs = ProjectDirs::from(APP_QUALIFIER, APP_AUTHOR, APP_NAME).ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "no home directory for local data")
    })?;

    let runtime_dir = project_dirs.data_local_dir();
    tracing::debug!("runtime directory: {:?}", runtime_dir);

    std::fs::create_dir_all(runtime_dir)?;

    load_data_from_file(runtime_dir.join(CONFIG_FILE_NAME))
}

pub fn load_data_from_file(config_file_path: impl AsRef<Path>) -> io::Result<FileStorage> {
    let path = config_file_path.as_ref();
    let data = if path.exists() {
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        match serde_json::from_str::<HashMap<String, String>>(&contents) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!("ignoring unreadable session file {:?}: {}", path, err);
                HashMap::new()
            }
        }
    } else {
        HashMap::new()
    };

    Ok(FileStorage {
        data: Arc::new(RwLock::new(data)),
        config_file_path: path.to_path_buf(),
    })
}

impl SessionStorage for FileStorage {
    fn read_data(&self, key: &str) -> Option<String> {
        let data_read = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        data_read.get(key).map(|s| s.to_string())
    }

    fn write_data(&self, key: &str, value: &str) -> io::Result<()> {
        let mut data_write = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        data_write.insert(key.to_string(), value.to_string());
        save_data(&self.config_file_path, &data_write)
    }

    fn remove_data(&self, key: &str) -> io::Result<()> {
        let mut data_write = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if data_write.remove(key).is_none() {
            return Ok(());
        }
        save_data(&self.config_file_path, &data_write)
    }
}

fn save_data(config_file_path: &Path, data: &HashMap<String, String>) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(config_file_path)?;
    let content = serde_json::to_string(data)?;
    file.write_all(content.as_bytes())
}

/// Non-persistent storage, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let data = entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        MemoryStorage {
            data: RwLock::new(data),
        }
    }
}

impl SessionStorage for MemoryStorage {
    fn read_data(&self, key: &str) -> Option<String> {
        let data = self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        data.get(key).cloned()
    }

    fn write_data(&self, key: &str, value: &str) -> io::Result<()> {
        let mut data = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_data(&self, key: &str) -> io::Result<()> {
        let mut data = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        data.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_temp_file_path(dir: &TempDir) -> PathBuf {
        dir.path().join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_read_write_data() {
        let dir = TempDir::new().expect("Failed to create a temp dir");
        let runtime_data = load_data_from_file(create_temp_file_path(&dir)).unwrap();

        assert_eq!(runtime_data.read_data("key"), None);

        runtime_data.write_data("key", "value").unwrap();
        assert_eq!(runtime_data.read_data("key"), Some("value".to_string()));
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().expect("Failed to create a temp dir");
        let config_file_path = create_temp_file_path(&dir);

        {
            let runtime_data = load_data_from_file(&config_file_path).unwrap();
            runtime_data.write_data("token", "t").unwrap();
            runtime_data.write_data("username", "u").unwrap();
            runtime_data.remove_data("username").unwrap();
        }

        {
            let runtime_data = load_data_from_file(&config_file_path).unwrap();
            assert_eq!(runtime_data.read_data("token"), Some("t".to_string()));
            assert_eq!(runtime_data.read_data("username"), None);
        }
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().expect("Failed to create a temp dir");
        let config_file_path = create_temp_file_path(&dir);
        std::fs::write(&config_file_path, "{not json").unwrap();

        let runtime_data = load_data_from_file(&config_file_path).unwrap();
        assert_eq!(runtime_data.read_data("token"), None);
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::with_entries(&[("token", "t")]);
        assert_eq!(storage.read_data("token"), Some("t".to_string()));
        storage.remove_data("token").unwrap();
        storage.remove_data("token").unwrap();
        assert_eq!(storage.read_data("token"), None);
    }
}
