//! Data models for Loam

mod record;
mod row;

pub use record::RemoteRecord;
pub use row::{FieldValue, MirrorRow, TranslatedRow};
