//! Synchronization engine: reconciliation pass, single-flight scheduler,
//! and real-time merge.

mod pull;
mod realtime;
mod scheduler;
pub mod translate;

pub use pull::{run_pass, PassSummary};
pub use realtime::RealtimeManager;
pub use scheduler::SyncScheduler;
pub use translate::{parse_remote_timestamp, translate, TranslateError};
