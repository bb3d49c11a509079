use livenotes_core::models::note_count_label;
use livenotes_core::Identity;
use serde::Serialize;

use crate::app::App;
use crate::commands::common::fetch_notes;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub member_since: String,
    pub note_count: usize,
}

impl ProfileView {
    pub fn new(identity: &Identity, note_count: usize) -> Self {
        Self {
            id: identity.id.to_string(),
            name: identity.display_name_or_default().to_string(),
            email: identity.email.clone(),
            avatar_url: identity.avatar_url.clone(),
            member_since: identity.member_since(),
            note_count,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.name.clone()];
        if let Some(email) = &self.email {
            lines.push(email.clone());
        }
        if let Some(avatar_url) = &self.avatar_url {
            lines.push(format!("Avatar: {avatar_url}"));
        }
        lines.push(format!("Member since {}", self.member_since));
        lines.push(note_count_label(self.note_count));
        lines
    }
}

pub async fn run_profile(app: &App, as_json: bool) -> Result<(), CliError> {
    let identity = app.require_identity().await?;
    let notes = fetch_notes(app, &identity.id).await?;
    let view = ProfileView::new(&identity, notes.len());

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        for line in view.lines() {
            println!("{line}");
        }
    }
    Ok(())
}
