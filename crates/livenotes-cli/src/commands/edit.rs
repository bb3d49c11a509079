use livenotes_core::notify::MSG_UPDATE_NOTE_FAILED;
use livenotes_core::util::normalize_note_text;

use crate::app::App;
use crate::commands::common::{
    capture_editor_input_with_initial, fetch_notes, normalize_note_identifier, resolve_note,
};
use crate::error::CliError;

pub async fn run_edit(app: &App, id: &str, text_parts: &[String]) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let identity = app.require_identity().await?;
    let notes = fetch_notes(app, &identity.id).await?;
    let note = resolve_note(&notes, &normalized_id)?;

    let edited = if text_parts.is_empty() {
        capture_editor_input_with_initial(&note.text)?
    } else {
        normalize_note_text(&text_parts.join(" "))
    };
    let Some(edited) = edited else {
        return Err(CliError::EmptyEditedContent);
    };

    if edited == note.text {
        println!("{}", note.id);
        return Ok(());
    }

    if let Err(error) = app.notes.update_note(&identity.id, &note.id, &edited).await {
        app.report(MSG_UPDATE_NOTE_FAILED);
        return Err(error.into());
    }
    println!("{}", note.id);
    Ok(())
}
