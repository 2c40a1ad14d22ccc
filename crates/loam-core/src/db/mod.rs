//! Database layer for Loam

mod connection;
mod migrations;
mod mirror;

pub use connection::Database;
pub use mirror::{MirrorRepository, ReconcileStats};
