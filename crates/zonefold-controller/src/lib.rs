//! Zonefold controller
//!
//! Keeps the served DNS data in step with the declared configuration:
//!
//! - [`ConfigStore`] lists and watches Zone and RecordSet objects;
//!   [`MemoryStore`] is the in-process implementation, with admission
//!   applied on every write.
//! - [`manifest`] loads objects from a directory of YAML/JSON files.
//! - [`compile`] turns a listing into a [`zonefold_dns::Snapshot`].
//! - [`ZoneReconciler`] runs compile passes off a coalescing work queue
//!   and publishes each result to the serving index.

pub mod compiler;
pub mod error;
pub mod manifest;
pub mod queue;
pub mod reconciler;
pub mod store;

pub use compiler::{compile, compile_zone, owning_zone};
pub use error::{CompileError, ControllerError, Result};
pub use manifest::{load_dir, sync_dir, Manifest, SyncReport};
pub use queue::{work_queue, Backoff, WorkQueue, WorkReceiver};
pub use reconciler::{ReconcileEvent, ReconcileStats, ReconcilerConfig, ZoneReconciler};
pub use store::{ConfigEvent, ConfigStore, MemoryStore, WatchAction, WriteOutcome};
