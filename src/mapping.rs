//! Named key to value tables used by `lookup` recipes.
//!
//! A table is loaded on first use and kept for the life of the registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::assets::{AssetSource, MAPPING_DIR};
use crate::error::{Error, Result};

pub type Mapping = BTreeMap<String, String>;

type Slot = Arc<OnceLock<std::result::Result<Arc<Mapping>, String>>>;

pub struct MappingRegistry {
    source: Arc<dyn AssetSource>,
    tables: Mutex<HashMap<String, Slot>>,
}

impl MappingRegistry {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, file: &str, key: &str) -> Result<String> {
        self.get_all(file)?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("key '{key}' in mapping '{file}'")))
    }

    pub fn get_all(&self, file: &str) -> Result<Arc<Mapping>> {
        let slot = self.tables.lock().entry(file.to_owned()).or_default().clone();
        slot.get_or_init(|| self.load(file))
            .clone()
            .map_err(Error::not_found)
    }

    fn load(&self, file: &str) -> std::result::Result<Arc<Mapping>, String> {
        let name = if file.ends_with(".yaml") {
            file.to_owned()
        } else {
            format!("{file}.yaml")
        };
        let contents = self
            .source
            .read(&format!("{MAPPING_DIR}/{name}"))
            .map_err(|e| e.to_string())?;
        let raw: BTreeMap<String, serde_yaml::Value> =
            serde_yaml::from_str(&contents).map_err(|e| format!("mapping '{file}': {e}"))?;
        let table = raw
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => serde_yaml::to_string(&other)
                        .unwrap_or_default()
                        .trim()
                        .to_owned(),
                };
                (k, value)
            })
            .collect();
        tracing::debug!(target: "async_devmon::mapping", { mapping = file }, "loaded mapping");
        Ok(Arc::new(table))
    }
}

impl std::fmt::Debug for MappingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingRegistry")
            .field("loaded", &self.tables.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{DirAssets, EmbeddedAssets};

    #[test]
    fn lookups_hit_embedded_tables() {
        let registry = MappingRegistry::new(Arc::new(EmbeddedAssets));
        assert_eq!(registry.get("ifType", "6").unwrap(), "ethernetCsmacd");
        assert!(registry.get("ifType", "99999").unwrap_err().is_not_found());
        assert!(registry.get("missing", "1").unwrap_err().is_not_found());
    }

    #[test]
    fn tables_load_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mappings")).unwrap();
        let path = dir.path().join("mappings/colors.yaml");
        std::fs::write(&path, "\"1\": red\n\"2\": green\n").unwrap();
        let registry = MappingRegistry::new(Arc::new(DirAssets::new(dir.path())));
        assert_eq!(registry.get("colors", "1").unwrap(), "red");
        std::fs::write(&path, "\"1\": blue\n").unwrap();
        assert_eq!(registry.get("colors", "1").unwrap(), "red");
    }
}
