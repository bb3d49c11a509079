use livenotes_core::notify::MSG_DELETE_NOTE_FAILED;

use crate::app::App;
use crate::commands::common::{
    confirm_on_stdin, fetch_notes, normalize_note_identifier, resolve_note,
};
use crate::error::CliError;

pub async fn run_delete(app: &App, id: &str, skip_confirm: bool) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let identity = app.require_identity().await?;
    let notes = fetch_notes(app, &identity.id).await?;
    let note = resolve_note(&notes, &normalized_id)?;

    let prompt = format!("Delete note \"{}\"? This cannot be undone.", note.preview(40));
    if !skip_confirm && !confirm_on_stdin(&prompt)? {
        println!("Cancelled");
        return Ok(());
    }

    if let Err(error) = app.notes.delete_note(&identity.id, &note.id).await {
        app.report(MSG_DELETE_NOTE_FAILED);
        return Err(error.into());
    }
    println!("{}", note.id);
    Ok(())
}
