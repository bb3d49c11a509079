use std::env;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use livenotes_core::config::ClientConfig;
use livenotes_core::sync::SnapshotListener;
use livenotes_core::util::normalize_note_text;
use livenotes_core::{IdentityId, Note};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::app::App;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub preview: String,
    pub text: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub date: String,
    pub relative_time: String,
}

/// Forwards the first snapshot (or failure) of a one-shot subscription.
struct FirstSnapshot {
    tx: mpsc::UnboundedSender<Result<Vec<Note>, String>>,
}

impl SnapshotListener for FirstSnapshot {
    fn on_update(&mut self, notes: Vec<Note>) {
        let _ = self.tx.send(Ok(notes));
    }

    fn on_error(&mut self, error: &livenotes_core::Error) {
        let _ = self.tx.send(Err(error.to_string()));
    }
}

/// Current notes of `owner`, newest first.
///
/// Opens a subscription, takes its initial snapshot and closes it again.
pub async fn fetch_notes(app: &App, owner: &IdentityId) -> Result<Vec<Note>, CliError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = app.notes.subscribe(owner, FirstSnapshot { tx }).await?;
    let first = rx.recv().await;
    app.notes.unsubscribe(handle);

    match first {
        Some(Ok(notes)) => Ok(notes),
        Some(Err(reason)) => Err(CliError::SubscriptionFailed(reason)),
        None => Err(CliError::SubscriptionFailed(
            "no snapshot was delivered".to_string(),
        )),
    }
}

/// Find a note by exact id or unique id prefix.
pub fn resolve_note<'a>(notes: &'a [Note], note_query: &str) -> Result<&'a Note, CliError> {
    if let Some(note) = notes.iter().find(|note| note.id.as_str() == note_query) {
        return Ok(note);
    }

    let matching = notes
        .iter()
        .filter(|note| note.id.as_str().starts_with(note_query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::NoteNotFound(note_query.to_string())),
        [note] => Ok(note),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|note| short_id(note))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

fn short_id(note: &Note) -> String {
    note.id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(note);
            let preview = note.preview(40);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            format!("{short_id:<13}  {preview:<40}  {relative_time}")
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        preview: note.preview(80),
        text: note.text.clone(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        date: note.formatted_date(),
        relative_time: format_relative_time(note.updated_at, now_ms),
    }
}

const MINUTE_MS: i64 = 60_000;
const DAY_MS: i64 = 24 * 60 * MINUTE_MS;

/// Largest unit first; anything under a minute is "just now".
const RELATIVE_UNITS: [(i64, &str); 6] = [
    (365 * DAY_MS, "y"),
    (30 * DAY_MS, "mo"),
    (7 * DAY_MS, "w"),
    (DAY_MS, "d"),
    (60 * MINUTE_MS, "h"),
    (MINUTE_MS, "m"),
];

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let elapsed = now_ms.saturating_sub(timestamp_ms);
    RELATIVE_UNITS
        .iter()
        .find(|(unit_ms, _)| elapsed >= *unit_ms)
        .map_or_else(
            || "just now".to_string(),
            |(unit_ms, suffix)| format!("{}{suffix} ago", elapsed / unit_ms),
        )
}

/// Note text from arguments, else piped stdin, else the editor.
///
/// `None` means the user supplied only whitespace.
pub fn resolve_note_content(text_parts: &[String]) -> Result<Option<String>, CliError> {
    if !text_parts.is_empty() {
        return Ok(normalize_note_text(&text_parts.join(" ")));
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(Some(content));
    }

    capture_editor_input_with_initial("")
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_note_text(&buffer))
}

/// Open `$VISUAL`/`$EDITOR` on a scratch file seeded with `initial_content`
/// and return what was saved.
pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let mut scratch = tempfile::Builder::new()
        .prefix("livenotes-note-")
        .suffix(".md")
        .tempfile()?;
    scratch.write_all(initial_content.as_bytes())?;
    scratch.flush()?;

    run_editor(&preferred_editor(), scratch.path())?;
    let saved = std::fs::read_to_string(scratch.path())?;
    Ok(normalize_note_text(&saved))
}

/// Run `editor` on `file_path`; the editor value may carry arguments (`code -w`).
fn run_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let mut words = editor.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| CliError::EditorFailed("empty EDITOR command".to_string()))?;

    let status = Command::new(program).args(words).arg(file_path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!("`{editor}` exited with {status}")))
    }
}

fn preferred_editor() -> String {
    ["VISUAL", "EDITOR"]
        .into_iter()
        .find_map(|key| env::var(key).ok().filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

/// Ask a yes/no question; anything but `y`/`yes` (or end of input) is a no.
pub fn confirm<R, W>(prompt: &str, input: &mut R, output: &mut W) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{prompt} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

pub fn confirm_on_stdin(prompt: &str) -> Result<bool, CliError> {
    let stdin = io::stdin();
    let stderr = io::stderr();
    Ok(confirm(prompt, &mut stdin.lock(), &mut stderr.lock())?)
}

/// Config file from `--config`, else the per-user default; env overrides last.
pub fn load_client_config(cli_config_path: Option<&Path>) -> Result<ClientConfig, CliError> {
    let config = match cli_config_path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            ClientConfig::load_file(path).map_err(CliError::Config)?
        }
        None => match default_config_path() {
            Some(path) => ClientConfig::load_file(&path).map_err(CliError::Config)?,
            None => ClientConfig::default(),
        },
    };
    Ok(config.with_env_overrides())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("livenotes").join("config.json"))
}

/// `--db-path`, else the configured path, else the per-user data directory.
pub fn resolve_db_path(
    cli_db_path: Option<PathBuf>,
    config: &ClientConfig,
) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| config.db_path.clone()) {
        return Ok(path);
    }
    default_db_path()
}

fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("livenotes").join("livenotes.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}
