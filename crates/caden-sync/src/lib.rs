//! Client-side synchronization of remote ledger state.
//!
//! - `SnapshotCache`: latest value per stream with freshness tracking
//! - `FetchDeduplicator`: one in-flight fetch per stream key
//! - `BackoffController`: per-stream exponential backoff on rate limits
//! - `StreamPoller`: periodic, cache-aware refresh of one stream

pub mod backoff;
pub mod cache;
pub mod dedup;
pub mod error;
pub mod poller;

pub use backoff::{BackoffController, BackoffPolicy, BackoffState};
pub use cache::{Snapshot, SnapshotCache};
pub use dedup::FetchDeduplicator;
pub use error::{SyncError, SyncResult};
pub use poller::{
    FetchFn, PollerConfig, PollerPhase, StreamDescriptor, StreamHandle, StreamPoller, StreamState,
};
