pub mod common;
pub mod list;
pub mod login;
pub mod notes;
pub mod sync;
pub mod watch;
