use livenotes_core::models::note_count_label;

use crate::app::App;
use crate::commands::common::{fetch_notes, format_note_lines, note_to_list_item, NoteListItem};
use crate::error::CliError;

pub async fn run_list(app: &App, limit: Option<usize>, as_json: bool) -> Result<(), CliError> {
    let identity = app.require_identity().await?;
    let mut notes = fetch_notes(app, &identity.id).await?;
    let total = notes.len();
    if let Some(limit) = limit {
        notes.truncate(limit);
    }

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    println!("{}", identity.greeting());
    println!("{}", note_count_label(total));
    if notes.is_empty() {
        println!();
        println!("No notes yet. Add one with `livenotes add <text>`.");
    }
    for line in format_note_lines(&notes) {
        println!("{line}");
    }
    Ok(())
}
