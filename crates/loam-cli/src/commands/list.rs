use std::path::Path;

use loam_core::db::MirrorRepository;
use loam_core::schema::NOTES;

use crate::commands::common::{format_note_lines, note_to_list_item, open_database, NoteListItem};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let mut rows = MirrorRepository::new(&db).fetch_all(&NOTES).await?;
    rows.truncate(limit);

    if as_json {
        let json_items = rows
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No notes mirrored yet. Run `loam sync` first.");
        return Ok(());
    }

    for line in format_note_lines(&rows) {
        println!("{line}");
    }
    Ok(())
}
