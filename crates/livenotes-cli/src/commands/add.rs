use livenotes_core::notify::MSG_ADD_NOTE_FAILED;

use crate::app::App;
use crate::commands::common::resolve_note_content;
use crate::error::CliError;

pub async fn run_add(app: &App, text_parts: &[String]) -> Result<(), CliError> {
    let identity = app.require_identity().await?;
    let Some(content) = resolve_note_content(text_parts)? else {
        tracing::debug!("Nothing to add");
        return Ok(());
    };

    match app.notes.add_note(&identity.id, &content).await {
        Ok(Some(id)) => println!("{id}"),
        Ok(None) => {}
        Err(error) => {
            app.report(MSG_ADD_NOTE_FAILED);
            return Err(error.into());
        }
    }
    Ok(())
}
