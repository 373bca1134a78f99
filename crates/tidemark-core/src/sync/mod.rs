//! Sync engine: reconciliation, orchestration, and single-flight gating.

mod gate;
mod orchestrator;
mod reconciler;

pub use gate::{SyncGate, SyncPermit};
pub use orchestrator::{SyncEngine, SyncOutcome};
pub use reconciler::{reconcile, ReconcileStats, RemoteCollection};
