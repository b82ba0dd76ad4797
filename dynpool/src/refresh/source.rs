use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dynpool_api::{ConfigSource, SourceError};
use parking_lot::RwLock;
use serde_json::Value;

/// In-process property store. Changes are picked up by the next refresh
/// tick.
#[derive(Debug)]
pub struct MemoryConfigSource {
    name: String,
    properties: RwLock<BTreeMap<String, String>>,
}

impl MemoryConfigSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_properties(name, BTreeMap::new())
    }

    pub fn with_properties(name: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            properties: RwLock::new(properties),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.properties.write().remove(key)
    }

    pub fn replace_all(&self, properties: BTreeMap<String, String>) {
        *self.properties.write() = properties;
    }
}

impl ConfigSource for MemoryConfigSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<BTreeMap<String, String>, SourceError> {
        Ok(self.properties.read().clone())
    }
}

/// Reads a JSON document on every fetch and flattens it into property keys.
///
/// ```text
/// {"dynamic": {"thread-pool": {"executors": [{"poolName": "io"}]}}}
///   => dynamic.thread-pool.executors[0].poolName = io
/// ```
///
/// Nulls are skipped. Strings are taken verbatim, other scalars in their
/// JSON text form.
#[derive(Debug)]
pub struct JsonFileConfigSource {
    name: String,
    path: PathBuf,
}

impl JsonFileConfigSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for JsonFileConfigSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<BTreeMap<String, String>, SourceError> {
        let text = fs::read_to_string(&self.path).map_err(|e| SourceError::Unavailable {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        let document: Value = serde_json::from_str(&text).map_err(|e| SourceError::Malformed {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        if !document.is_object() {
            return Err(SourceError::Malformed {
                name: self.name.clone(),
                reason: "top-level value must be an object".to_string(),
            });
        }

        let mut properties = BTreeMap::new();
        flatten(String::new(), &document, &mut properties);
        Ok(properties)
    }
}

fn flatten(key: String, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (field, child) in map {
                let child_key = if key.is_empty() {
                    field.clone()
                } else {
                    format!("{key}.{field}")
                };
                flatten(child_key, child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(format!("{key}[{index}]"), child, out);
            }
        }
        Value::String(s) => {
            out.insert(key, s.clone());
        }
        other => {
            out.insert(key, other.to_string());
        }
    }
}
