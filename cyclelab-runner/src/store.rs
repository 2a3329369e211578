//! File-backed stores: JSON parameter documents and JSON cycle history.
//!
//! Parameter layout: `<root>/<symbol>/<YYYY-MM>.json`; cycle layout:
//! `<root>/<symbol>.json`. Writes go through a temp file and rename, and
//! a per-key lock serializes concurrent writers to the same key; distinct
//! symbols never contend, matching the rayon fan-out.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use cyclelab_core::collab::{CycleStore, PersistError};
use cyclelab_core::domain::Cycle;
use cyclelab_core::normalize::{Epoch, ParamDocument, ParamStore, StoreError};

pub struct JsonParamStore {
    root: PathBuf,
    locks: Mutex<HashMap<(String, Epoch), Arc<Mutex<()>>>>,
}

impl JsonParamStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn doc_path(&self, symbol: &str, epoch: Epoch) -> PathBuf {
        self.root.join(symbol).join(format!("{epoch}.json"))
    }

    fn key_lock(&self, symbol: &str, epoch: Epoch) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry((symbol.to_string(), epoch))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl ParamStore for JsonParamStore {
    fn load(&self, symbol: &str, epoch: Epoch) -> Result<Option<ParamDocument>, StoreError> {
        let path = self.doc_path(symbol, epoch);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, symbol: &str, epoch: Epoch, doc: &ParamDocument) -> Result<(), StoreError> {
        let lock = self.key_lock(symbol, epoch);
        let _guard = lock.lock().unwrap();

        let path = self.doc_path(symbol, epoch);
        fs::create_dir_all(path.parent().expect("doc path has a parent"))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(doc)?)?;
        fs::rename(&tmp, &path)?;
        debug!(symbol, epoch = %epoch, path = %path.display(), "param document saved");
        Ok(())
    }

    fn epochs(&self, symbol: &str) -> Result<Vec<Epoch>, StoreError> {
        let dir = self.root.join(symbol);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut epochs = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(stem) = Path::new(&name)
                .file_stem()
                .and_then(|s| s.to_str())
            else {
                continue;
            };
            // Non-document files (temp files, strays) are simply skipped.
            if let Ok(epoch) = stem.parse::<Epoch>() {
                epochs.push(epoch);
            }
        }
        epochs.sort();
        Ok(epochs)
    }
}

/// Cycle history on disk, one JSON file per symbol. The batch runner
/// upserts into this between runs, so `FitFromStoredCycles` sees cycles
/// from earlier batches after a process restart.
pub struct JsonCycleStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JsonCycleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn file_path(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("{symbol}.json"))
    }

    fn symbol_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<Cycle>, PersistError> {
        let raw = match fs::read_to_string(self.file_path(symbol)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_all(&self, symbol: &str, cycles: &[Cycle]) -> Result<(), PersistError> {
        fs::create_dir_all(&self.root)?;
        let path = self.file_path(symbol);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string(cycles)?)?;
        fs::rename(&tmp, &path)?;
        debug!(symbol, rows = cycles.len(), path = %path.display(), "cycle history saved");
        Ok(())
    }
}

impl CycleStore for JsonCycleStore {
    fn append_cycles(&self, symbol: &str, cycles: &[Cycle]) -> Result<(), PersistError> {
        let lock = self.symbol_lock(symbol);
        let _guard = lock.lock().unwrap();

        let mut stored = self.read_all(symbol)?;
        if cycles
            .iter()
            .any(|c| stored.iter().any(|e| e.start_ts == c.start_ts))
        {
            return Err(PersistError::Conflict {
                symbol: symbol.to_string(),
            });
        }
        stored.extend_from_slice(cycles);
        stored.sort_by_key(|c| c.start_ts);
        self.write_all(symbol, &stored)
    }

    fn replace_cycles(&self, symbol: &str, cycles: &[Cycle]) -> Result<(), PersistError> {
        let lock = self.symbol_lock(symbol);
        let _guard = lock.lock().unwrap();

        let mut sorted = cycles.to_vec();
        sorted.sort_by_key(|c| c.start_ts);
        self.write_all(symbol, &sorted)
    }

    fn load_cycles(&self, symbol: &str) -> Result<Vec<Cycle>, PersistError> {
        self.read_all(symbol)
    }
}
