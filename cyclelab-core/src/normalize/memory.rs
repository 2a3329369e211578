//! In-memory param store backend.

use std::collections::HashMap;
use std::sync::Mutex;

use super::epoch::Epoch;
use super::store::{ParamDocument, ParamStore, StoreError};

/// Mutex-guarded map backend. The single lock serializes writers to the
/// same (symbol, epoch) key; used for tests and single-process runs.
#[derive(Debug, Default)]
pub struct MemoryParamStore {
    docs: Mutex<HashMap<(String, Epoch), ParamDocument>>,
}

impl ParamStore for MemoryParamStore {
    fn load(&self, symbol: &str, epoch: Epoch) -> Result<Option<ParamDocument>, StoreError> {
        let docs = self.docs.lock().unwrap();
        Ok(docs.get(&(symbol.to_string(), epoch)).cloned())
    }

    fn save(&self, symbol: &str, epoch: Epoch, doc: &ParamDocument) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().unwrap();
        docs.insert((symbol.to_string(), epoch), doc.clone());
        Ok(())
    }

    fn epochs(&self, symbol: &str) -> Result<Vec<Epoch>, StoreError> {
        let docs = self.docs.lock().unwrap();
        let mut epochs: Vec<Epoch> = docs
            .keys()
            .filter(|(sym, _)| sym == symbol)
            .map(|(_, epoch)| *epoch)
            .collect();
        epochs.sort();
        Ok(epochs)
    }
}
