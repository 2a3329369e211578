//! Param store — versioned normalization documents and the merge logic.
//!
//! One document per (symbol, epoch). The store interface is an explicit
//! read/merge/write key-value contract: no ambient file paths, no implicit
//! global state. Backends decide where documents live (memory, JSON files,
//! a real document store).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{Direction, FeatureField};

use super::bound::{fit_bound, Bound};
use super::epoch::Epoch;

/// Errors from a param-store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("param store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("param document corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// The persisted parameter document for one (symbol, epoch).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamDocument {
    /// Effective (already merged) bound per feature name.
    pub bounds: BTreeMap<String, Bound>,
    /// Last bar date covered by the batch that wrote this document.
    pub record_end_date: Option<NaiveDate>,
    /// Direction of the open cycle at the end of that batch.
    pub record_end_signal: Option<Direction>,
    /// How many bars the open cycle had run at the end of that batch.
    pub record_end_signal_times: Option<usize>,
    /// Where the next incremental batch should resume.
    pub next_start_date: Option<NaiveDate>,
}

/// Document store keyed by (symbol, epoch).
///
/// Concurrent writers to the same key must be serialized by the backend;
/// distinct symbols never contend.
pub trait ParamStore: Send + Sync {
    fn load(&self, symbol: &str, epoch: Epoch) -> Result<Option<ParamDocument>, StoreError>;
    fn save(&self, symbol: &str, epoch: Epoch, doc: &ParamDocument) -> Result<(), StoreError>;
    /// Epochs with a stored document for the symbol, ascending.
    fn epochs(&self, symbol: &str) -> Result<Vec<Epoch>, StoreError>;
}

/// Raw bounds for every feature of one symbol batch, fitted but not yet
/// merged against history.
pub type RawBounds = Vec<(FeatureField, Bound)>;

/// Fits and applies robust, monotonically-widening normalization bounds,
/// versioned by epoch.
#[derive(Clone)]
pub struct NormalizationStore {
    store: Arc<dyn ParamStore>,
    clip_k: f64,
}

impl NormalizationStore {
    pub fn new(store: Arc<dyn ParamStore>, clip_k: f64) -> Self {
        Self { store, clip_k }
    }

    /// Fit a raw bound for one feature. Cycle-level features must pass one
    /// value per completed, deduplicated cycle; bar-level features pass
    /// the full bar set.
    pub fn fit(&self, values: &[f64]) -> Option<Bound> {
        fit_bound(values, self.clip_k)
    }

    /// Merge a freshly fitted bound against the nearest prior epoch's
    /// bound for the same (symbol, feature): the effective bound is the
    /// union, so bounds never shrink across epochs. Returns the effective
    /// bound without persisting it (see `commit_batch`).
    pub fn merge(
        &self,
        symbol: &str,
        feature: FeatureField,
        new_bound: Bound,
        epoch: Epoch,
    ) -> Result<Bound, StoreError> {
        let mut effective = new_bound;
        if let Some(prior) = self.nearest_bound(symbol, feature, epoch, false)? {
            effective = effective.union(&prior);
        }
        // Re-runs of the same epoch must not lose a previously widened bound.
        if let Some(doc) = self.store.load(symbol, epoch)? {
            if let Some(existing) = doc.bounds.get(feature.as_str()) {
                effective = effective.union(existing);
            }
        }
        Ok(effective)
    }

    /// Merge every raw bound of a symbol batch and persist them as one
    /// document write. Called only after the symbol's entire cycle batch
    /// has been computed — there are no partial-cycle commits.
    pub fn commit_batch(
        &self,
        symbol: &str,
        epoch: Epoch,
        raw_bounds: &RawBounds,
        meta: BatchMeta,
    ) -> Result<ParamDocument, StoreError> {
        let mut doc = self.store.load(symbol, epoch)?.unwrap_or_default();
        for &(feature, bound) in raw_bounds {
            let effective = self.merge(symbol, feature, bound, epoch)?;
            doc.bounds.insert(feature.as_str().to_string(), effective);
        }
        doc.record_end_date = meta.record_end_date;
        doc.record_end_signal = meta.record_end_signal;
        doc.record_end_signal_times = meta.record_end_signal_times;
        doc.next_start_date = meta.next_start_date;
        self.store.save(symbol, epoch, &doc)?;
        debug!(symbol, epoch = %epoch, features = raw_bounds.len(), "bounds committed");
        Ok(doc)
    }

    /// The effective bound for (symbol, feature) as of an epoch: the
    /// nearest stored bound at or before it.
    pub fn bound_for(
        &self,
        symbol: &str,
        feature: FeatureField,
        as_of: Epoch,
    ) -> Result<Option<Bound>, StoreError> {
        self.nearest_bound(symbol, feature, as_of, true)
    }

    /// Search stored epochs in reverse-chronological order for the nearest
    /// bound. `inclusive` controls whether `epoch` itself counts.
    fn nearest_bound(
        &self,
        symbol: &str,
        feature: FeatureField,
        epoch: Epoch,
        inclusive: bool,
    ) -> Result<Option<Bound>, StoreError> {
        let epochs = self.store.epochs(symbol)?;
        for &candidate in epochs.iter().rev() {
            let before = if inclusive {
                candidate <= epoch
            } else {
                candidate < epoch
            };
            if !before {
                continue;
            }
            if let Some(doc) = self.store.load(symbol, candidate)? {
                if let Some(bound) = doc.bounds.get(feature.as_str()) {
                    return Ok(Some(*bound));
                }
            }
        }
        Ok(None)
    }
}

/// Batch bookkeeping persisted alongside the bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchMeta {
    pub record_end_date: Option<NaiveDate>,
    pub record_end_signal: Option<Direction>,
    pub record_end_signal_times: Option<usize>,
    pub next_start_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::bound::DEFAULT_CLIP_K;
    use crate::normalize::memory::MemoryParamStore;

    fn store() -> NormalizationStore {
        NormalizationStore::new(Arc::new(MemoryParamStore::default()), DEFAULT_CLIP_K)
    }

    fn commit_one(
        ns: &NormalizationStore,
        epoch: Epoch,
        feature: FeatureField,
        bound: Bound,
    ) -> ParamDocument {
        ns.commit_batch(
            "600000",
            epoch,
            &vec![(feature, bound)],
            BatchMeta::default(),
        )
        .unwrap()
    }

    #[test]
    fn merge_without_prior_keeps_new_bound() {
        let ns = store();
        let merged = ns
            .merge(
                "600000",
                FeatureField::CycleChange,
                Bound::new(-0.1, 0.1),
                Epoch::new(2024, 1),
            )
            .unwrap();
        assert_eq!(merged, Bound::new(-0.1, 0.1));
    }

    #[test]
    fn merge_unions_with_nearest_prior_epoch() {
        let ns = store();
        commit_one(
            &ns,
            Epoch::new(2024, 1),
            FeatureField::CycleChange,
            Bound::new(-0.2, 0.1),
        );
        let merged = ns
            .merge(
                "600000",
                FeatureField::CycleChange,
                Bound::new(-0.1, 0.3),
                Epoch::new(2024, 2),
            )
            .unwrap();
        assert_eq!(merged, Bound::new(-0.2, 0.3));
    }

    #[test]
    fn bounds_never_shrink_across_epochs() {
        let ns = store();
        let e1 = Epoch::new(2024, 1);
        let e2 = Epoch::new(2024, 2);
        let e3 = Epoch::new(2024, 3);
        commit_one(&ns, e1, FeatureField::CycleChange, Bound::new(-0.5, 0.5));
        // A much narrower later fit must still carry the wide envelope.
        commit_one(&ns, e2, FeatureField::CycleChange, Bound::new(-0.01, 0.01));
        commit_one(&ns, e3, FeatureField::CycleChange, Bound::new(-0.02, 0.6));

        let b1 = ns.bound_for("600000", FeatureField::CycleChange, e1).unwrap().unwrap();
        let b2 = ns.bound_for("600000", FeatureField::CycleChange, e2).unwrap().unwrap();
        let b3 = ns.bound_for("600000", FeatureField::CycleChange, e3).unwrap().unwrap();
        assert!(b1.is_within(&b2));
        assert!(b2.is_within(&b3));
        assert_eq!(b3, Bound::new(-0.5, 0.6));
    }

    #[test]
    fn rerun_of_same_epoch_does_not_lose_widened_bound() {
        let ns = store();
        let e = Epoch::new(2024, 1);
        commit_one(&ns, e, FeatureField::CycleChange, Bound::new(-0.5, 0.5));
        commit_one(&ns, e, FeatureField::CycleChange, Bound::new(-0.1, 0.1));
        let bound = ns.bound_for("600000", FeatureField::CycleChange, e).unwrap().unwrap();
        assert_eq!(bound, Bound::new(-0.5, 0.5));
    }

    #[test]
    fn bound_for_skips_epochs_missing_the_feature() {
        let ns = store();
        commit_one(
            &ns,
            Epoch::new(2024, 1),
            FeatureField::CycleChange,
            Bound::new(-0.3, 0.3),
        );
        commit_one(
            &ns,
            Epoch::new(2024, 2),
            FeatureField::BarVolume,
            Bound::new(0.0, 1e6),
        );
        let bound = ns
            .bound_for("600000", FeatureField::CycleChange, Epoch::new(2024, 3))
            .unwrap()
            .unwrap();
        assert_eq!(bound, Bound::new(-0.3, 0.3));
    }

    #[test]
    fn bound_for_unknown_symbol_is_none() {
        let ns = store();
        assert!(ns
            .bound_for("000001", FeatureField::CycleChange, Epoch::new(2024, 1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn commit_batch_writes_metadata() {
        let ns = store();
        let meta = BatchMeta {
            record_end_date: NaiveDate::from_ymd_opt(2024, 1, 31),
            record_end_signal: Some(Direction::Up),
            record_end_signal_times: Some(7),
            next_start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
        };
        let doc = ns
            .commit_batch(
                "600000",
                Epoch::new(2024, 1),
                &vec![(FeatureField::CycleChange, Bound::new(-0.1, 0.1))],
                meta,
            )
            .unwrap();
        assert_eq!(doc.record_end_signal, Some(Direction::Up));
        assert_eq!(doc.record_end_signal_times, Some(7));
        assert_eq!(
            doc.next_start_date,
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
    }
}
