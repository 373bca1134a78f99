//! tidemark-core - Core sync engine for Tidemark
//!
//! This crate contains the shared models, local store, remote client, blob
//! transfer service, and the sync orchestration logic used by all Tidemark
//! hosts (CLI, desktop, mobile).

pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{HistoryEvent, Note, Owner, OwnerId, RecordId, Reminder};
