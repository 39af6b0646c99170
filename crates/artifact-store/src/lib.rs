//! Filesystem store for finished runs.
//!
//! Each run lives in its own directory under `<root>/runs/<YYYY-MM-DD>/<id>/`: the JSON record,
//! the recording payload and the thumbnail image. Files are written atomically so a crash never
//! leaves a half-written record behind.

pub mod errors;
pub mod fs;
pub mod model;
pub mod store;

pub use errors::{StoreErrKind, StoreError, StoreResult};
pub use model::{RunSummary, StoredFile, StoredRun};
pub use store::{ArtifactStore, SweepStats};
