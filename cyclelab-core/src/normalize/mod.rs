//! Adaptive normalization — robust bounds that widen monotonically across
//! calendar-month epochs without reprocessing history.

pub mod bound;
pub mod epoch;
pub mod memory;
pub mod store;

pub use bound::{fit_bound, Bound, DEFAULT_CLIP_K};
pub use epoch::Epoch;
pub use memory::MemoryParamStore;
pub use store::{BatchMeta, NormalizationStore, ParamDocument, ParamStore, RawBounds, StoreError};
