//! Application-facing services built on the sync primitives.

mod notes;

pub use notes::NotesService;
