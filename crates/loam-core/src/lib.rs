//! loam-core - Core library for Loam
//!
//! Keeps a local, persistent mirror of records owned by a remote
//! authoritative store in agreement with that store: full reconciliation
//! passes, a single-flight scheduler that coalesces triggers, and a
//! real-time merge path for pushed change events.

pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod schema;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{FieldValue, MirrorRow, RemoteRecord, TranslatedRow};
