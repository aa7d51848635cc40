use anyhow::{Context, Result};
use finlens_core::DurableBackend;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// State directory: `$FINLENS_HOME`, or `~/.finlens`
pub fn finlens_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("FINLENS_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".finlens"))
}

pub fn ensure_finlens_home() -> Result<PathBuf> {
    let dir = finlens_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn store_path() -> Result<PathBuf> {
    Ok(ensure_finlens_home()?.join("store.json"))
}

/// Key/value strings in one JSON object file. Every write rewrites the file.
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(store_path()?))
    }

    fn read(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "store file is not a JSON object, starting empty");
                Ok(Map::new())
            }
        }
    }

    fn write(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let s = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, s).with_context(|| format!("write {}", self.path.display()))
    }

    fn modify(&self, f: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read()?;
        f(&mut map);
        self.write(&map)
    }
}

impl DurableBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.read()?;
        Ok(map.get(key).and_then(Value::as_str).map(String::from))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|map| {
            map.insert(key.to_string(), Value::String(value.to_string()));
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|map| {
            map.remove(key);
        })
    }
}
