//! Persistent record of managed networks.
//!
//! Networks are stored as JSON in `<home>/networks.json`, keyed by name, with
//! atomic writes (write to tmp file, then rename) to prevent corruption.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use virtnet_core::config::home_dir;
use virtnet_core::error::{NetError, Result};
use virtnet_core::NetworkState;

/// Persistent store for network state.
#[derive(Debug)]
pub struct NetworkStore {
    path: PathBuf,
}

/// Serializable wrapper for the networks file.
#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
struct NetworksFile {
    networks: BTreeMap<String, NetworkState>,
}

impl NetworkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location (`<home>/networks.json`).
    pub fn default_path() -> Result<Self> {
        Ok(Self::new(home_dir()?.join("networks.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all networks from disk.
    pub fn load(&self) -> Result<BTreeMap<String, NetworkState>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let data = std::fs::read_to_string(&self.path)
            .map_err(|e| io_context(e, format!("failed to read {}", self.path.display())))?;

        let file: NetworksFile = serde_json::from_str(&data).map_err(|e| {
            NetError::SerializationError(format!(
                "failed to parse networks file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(file.networks)
    }

    /// Save all networks to disk (atomic write).
    pub fn save(&self, networks: &BTreeMap<String, NetworkState>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                io_context(e, format!("failed to create directory {}", parent.display()))
            })?;
        }

        let file = NetworksFile {
            networks: networks.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)
            .map_err(|e| io_context(e, format!("failed to write {}", tmp_path.display())))?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            io_context(
                e,
                format!(
                    "failed to rename {} to {}",
                    tmp_path.display(),
                    self.path.display()
                ),
            )
        })?;

        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Option<NetworkState>> {
        Ok(self.load()?.remove(name))
    }

    /// Get a network that must be recorded.
    pub fn require(&self, name: &str) -> Result<NetworkState> {
        self.get(name)?.ok_or_else(|| {
            NetError::NotFound(format!("no recorded network named '{}'", name))
        })
    }

    /// Insert or replace the record for `state.spec.name`.
    pub fn put(&self, state: NetworkState) -> Result<()> {
        let mut networks = self.load()?;
        networks.insert(state.spec.name.clone(), state);
        self.save(&networks)
    }

    /// Forget a network. Returns the removed record, if any.
    pub fn remove(&self, name: &str) -> Result<Option<NetworkState>> {
        let mut networks = self.load()?;
        let removed = networks.remove(name);
        if removed.is_some() {
            self.save(&networks)?;
        }
        Ok(removed)
    }

    /// All records, ordered by name.
    pub fn list(&self) -> Result<Vec<NetworkState>> {
        Ok(self.load()?.into_values().collect())
    }
}

fn io_context(err: std::io::Error, context: String) -> NetError {
    NetError::IoError(std::io::Error::new(err.kind(), format!("{}: {}", context, err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use virtnet_core::NetworkSpec;

    fn temp_store() -> (tempfile::TempDir, NetworkStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = NetworkStore::new(dir.path().join("networks.json"));
        (dir, store)
    }

    fn state(name: &str, id: &str) -> NetworkState {
        let mut spec = NetworkSpec::new(name);
        spec.addresses = vec!["10.17.3.0/24".to_string()];
        NetworkState::new(id, spec)
    }

    #[test]
    fn test_load_empty() {
        let (_dir, store) = temp_store();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_put_and_get() {
        let (_dir, store) = temp_store();
        store.put(state("k8snet", "uuid-1")).unwrap();

        let found = store.get("k8snet").unwrap().unwrap();
        assert_eq!(found.id, "uuid-1");
        assert_eq!(found.spec.addresses, vec!["10.17.3.0/24".to_string()]);
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_put_replaces() {
        let (_dir, store) = temp_store();
        store.put(state("k8snet", "uuid-1")).unwrap();
        store.put(state("k8snet", "uuid-2")).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "uuid-2");
    }

    #[test]
    fn test_require_missing() {
        let (_dir, store) = temp_store();
        assert!(store.require("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = temp_store();
        store.put(state("k8snet", "uuid-1")).unwrap();

        let removed = store.remove("k8snet").unwrap().unwrap();
        assert_eq!(removed.id, "uuid-1");
        assert!(store.remove("k8snet").unwrap().is_none());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_list_sorted_by_name() {
        let (_dir, store) = temp_store();
        store.put(state("zeta", "uuid-z")).unwrap();
        store.put(state("alpha", "uuid-a")).unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|s| s.spec.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_atomic_write_leaves_no_tmp() {
        let (dir, store) = temp_store();
        store.put(state("k8snet", "uuid-1")).unwrap();
        assert!(dir.path().join("networks.json").exists());
        assert!(!dir.path().join("networks.json.tmp").exists());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = NetworkStore::new(dir.path().join("nested").join("networks.json"));
        store.put(state("k8snet", "uuid-1")).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let (_dir, store) = temp_store();
        std::fs::write(store.path(), "not json").unwrap();
        assert!(matches!(
            store.load(),
            Err(NetError::SerializationError(_))
        ));
    }
}
