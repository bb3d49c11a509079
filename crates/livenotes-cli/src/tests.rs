use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap_complete::Shell;
use livenotes_core::auth::{IdentityProvider, ProviderError, SignInResponse};
use livenotes_core::backend::{IdTokenClaims, MemoryBackend};
use livenotes_core::config::ClientConfig;
use livenotes_core::notify::{
    Notice, RecordingNotifier, MSG_DELETE_NOTE_FAILED, MSG_SUBSCRIPTION_FAILED, TITLE_ERROR,
};
use livenotes_core::{Identity, IdentityId, Note, NoteId};
use pretty_assertions::assert_eq;
use tokio::time::timeout;

use crate::app::App;
use crate::commands::add::run_add;
use crate::commands::auth_cmd::{run_login, run_logout};
use crate::commands::common::{
    confirm, default_editor, fetch_notes, format_relative_time, load_client_config,
    normalize_note_identifier, resolve_db_path, resolve_note,
};
use crate::commands::completions::render_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::profile::ProfileView;
use crate::commands::watch::watch_until;
use crate::error::CliError;
use crate::provider::prompt_claims;

/// Provider that signs in as a fixed account, or cancels.
struct FixedProvider {
    claims: Option<IdTokenClaims>,
}

#[async_trait]
impl IdentityProvider for FixedProvider {
    async fn has_prerequisites(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn interactive_sign_in(&self) -> Result<SignInResponse, ProviderError> {
        match &self.claims {
            Some(claims) => Ok(SignInResponse::with_id_token(claims.encode().unwrap())),
            None => Err(ProviderError::Cancelled),
        }
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

async fn test_app(
    backend: &Arc<MemoryBackend>,
    claims: Option<IdTokenClaims>,
) -> (App, RecordingNotifier) {
    let notifier = RecordingNotifier::new();
    let app = App::with_parts(
        &ClientConfig::default(),
        Arc::new(FixedProvider { claims }),
        Arc::clone(backend),
        Arc::new(notifier.clone()),
    )
    .await
    .unwrap();
    (app, notifier)
}

fn signed_in_backend() -> Arc<MemoryBackend> {
    Arc::new(
        MemoryBackend::new()
            .with_signed_in(Identity::new("ada").with_display_name("Ada Lovelace")),
    )
}

async fn once_watching(backend: &MemoryBackend, owner: &IdentityId) {
    while backend.live_query_count(owner) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn note(id: &str, text: &str) -> Note {
    Note {
        id: NoteId::new(id),
        text: text.to_string(),
        created_at: 1_000,
        updated_at: 1_000,
    }
}

fn args(text: &str) -> Vec<String> {
    text.split_whitespace().map(ToString::to_string).collect()
}

#[test]
fn resolve_note_supports_exact_and_prefix_id() {
    let notes = vec![note("0190a1b2-aaaa", "first"), note("0190a1b2-bbbb", "second")];

    assert_eq!(resolve_note(&notes, "0190a1b2-aaaa").unwrap().text, "first");
    assert_eq!(resolve_note(&notes, "0190a1b2-b").unwrap().text, "second");
}

#[test]
fn resolve_note_rejects_ambiguous_prefix() {
    let notes = vec![note("0190a1b2-aaaa", "first"), note("0190a1b2-bbbb", "second")];

    let error = resolve_note(&notes, "0190a1b2").unwrap_err();
    assert!(matches!(error, CliError::AmbiguousNoteId(message) if message.contains("0190a1b2-aaaa")));
}

#[test]
fn resolve_note_rejects_missing_note() {
    let notes = vec![note("0190a1b2-aaaa", "first")];
    assert!(matches!(
        resolve_note(&notes, "ffff"),
        Err(CliError::NoteNotFound(_))
    ));
}

#[test]
fn normalize_note_identifier_rejects_empty() {
    assert!(matches!(
        normalize_note_identifier("   "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(normalize_note_identifier(" abc ").unwrap(), "abc");
}

#[test]
fn format_relative_time_units() {
    let day = 24 * 60 * 60_000;
    let now = 1_000 * day;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now + 5_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * day, now), "3d ago");
    assert_eq!(format_relative_time(now - 15 * day, now), "2w ago");
    assert_eq!(format_relative_time(now - 95 * day, now), "3mo ago");
    assert_eq!(format_relative_time(now - 800 * day, now), "2y ago");
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn confirm_accepts_only_explicit_yes() {
    let ask = |answer: &str| {
        let mut output = Vec::new();
        confirm("Delete?", &mut Cursor::new(answer.as_bytes()), &mut output).unwrap()
    };
    assert!(ask("y\n"));
    assert!(ask("YES\n"));
    assert!(!ask("n\n"));
    assert!(!ask("\n"));
    assert!(!ask(""));
}

#[test]
fn prompt_claims_builds_account_from_answers() {
    let mut input = Cursor::new("  Ada@Example.com \r\n\tAda Lovelace  \n");
    let mut output = Vec::new();

    let claims = prompt_claims(&mut input, &mut output).unwrap();
    assert_eq!(claims.sub, "ada@example.com");
    assert_eq!(claims.email.as_deref(), Some("Ada@Example.com"));
    assert_eq!(claims.name.as_deref(), Some("Ada Lovelace"));
    assert!(String::from_utf8(output).unwrap().contains("Email: "));
}

#[test]
fn prompt_claims_cancels_on_empty_email_or_eof() {
    let mut output = Vec::new();
    assert_eq!(
        prompt_claims(&mut Cursor::new("\n"), &mut output).unwrap_err(),
        ProviderError::Cancelled
    );
    assert_eq!(
        prompt_claims(&mut Cursor::new(""), &mut output).unwrap_err(),
        ProviderError::Cancelled
    );
}

#[test]
fn prompt_claims_rejects_malformed_email() {
    let mut output = Vec::new();
    assert!(matches!(
        prompt_claims(&mut Cursor::new("not-an-email\n"), &mut output),
        Err(ProviderError::Other(_))
    ));
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(matches!(
        load_client_config(Some(path.as_path())),
        Err(CliError::Config(_))
    ));
}

#[test]
fn db_path_prefers_flag_over_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"identity": {"web_client_id": "client-1"}, "db_path": "/tmp/from-config.db"}"#,
    )
    .unwrap();

    let config = load_client_config(Some(path.as_path())).unwrap();
    assert_eq!(config.identity.web_client_id.as_deref(), Some("client-1"));
    assert_eq!(
        resolve_db_path(Some(PathBuf::from("/tmp/flag.db")), &config).unwrap(),
        PathBuf::from("/tmp/flag.db")
    );
    assert_eq!(
        resolve_db_path(None, &config).unwrap(),
        PathBuf::from("/tmp/from-config.db")
    );
}

#[test]
fn completions_name_the_binary() {
    let script = String::from_utf8(render_completions(Shell::Bash)).unwrap();
    assert!(script.contains("livenotes"));
}

#[test]
fn profile_view_lists_account_details() {
    let identity = Identity::new("ada")
        .with_display_name("Ada Lovelace")
        .with_email("ada@example.com");
    let view = ProfileView::new(&identity, 1);

    let lines = view.lines();
    assert_eq!(lines[0], "Ada Lovelace");
    assert_eq!(lines[1], "ada@example.com");
    assert_eq!(lines.last().map(String::as_str), Some("1 note"));
    assert!(lines.contains(&"Member since Unknown".to_string()));
}

#[tokio::test]
async fn note_commands_require_sign_in() {
    let backend = Arc::new(MemoryBackend::new());
    let (app, _) = test_app(&backend, None).await;

    assert!(matches!(
        run_add(&app, &args("buy milk")).await,
        Err(CliError::NotSignedIn)
    ));
    assert_eq!(backend.note_count(&IdentityId::new("ada")), 0);
}

#[tokio::test]
async fn add_edit_delete_round_through_the_channel() {
    let backend = signed_in_backend();
    let owner = IdentityId::new("ada");
    let (app, _) = test_app(&backend, None).await;

    run_add(&app, &args("buy milk")).await.unwrap();
    run_add(&app, &args("call mom")).await.unwrap();
    run_add(&app, &args("   ")).await.unwrap();
    let notes = fetch_notes(&app, &owner).await.unwrap();
    assert_eq!(
        notes.iter().map(|note| note.text.as_str()).collect::<Vec<_>>(),
        vec!["call mom", "buy milk"]
    );

    let milk = notes[1].id.to_string();
    run_edit(&app, &milk, &args("buy oat milk")).await.unwrap();
    let notes = fetch_notes(&app, &owner).await.unwrap();
    assert_eq!(notes[1].text, "buy oat milk");

    run_delete(&app, &milk, true).await.unwrap();
    let notes = fetch_notes(&app, &owner).await.unwrap();
    assert_eq!(
        notes.iter().map(|note| note.text.as_str()).collect::<Vec<_>>(),
        vec!["call mom"]
    );
}

#[tokio::test]
async fn failed_delete_reports_a_notice() {
    let backend = signed_in_backend();
    let (app, notifier) = test_app(&backend, None).await;
    run_add(&app, &args("keep me")).await.unwrap();
    let notes = fetch_notes(&app, &IdentityId::new("ada")).await.unwrap();

    backend.fail_writes(Some("offline"));
    let result = run_delete(&app, notes[0].id.as_str(), true).await;
    assert!(matches!(result, Err(CliError::Core(_))));
    assert_eq!(
        notifier.notices(),
        vec![Notice::error(TITLE_ERROR, MSG_DELETE_NOTE_FAILED)]
    );
}

#[tokio::test]
async fn login_then_logout() {
    let backend = Arc::new(MemoryBackend::new());
    let mut claims = IdTokenClaims::new("grace@example.com");
    claims.name = Some("Grace Hopper".to_string());
    let (app, _) = test_app(&backend, Some(claims)).await;

    run_login(&app).await.unwrap();
    assert_eq!(
        app.require_identity().await.unwrap().id,
        IdentityId::new("grace@example.com")
    );

    run_logout(&app, true).await.unwrap();
    assert!(matches!(
        app.require_identity().await,
        Err(CliError::NotSignedIn)
    ));
}

#[tokio::test]
async fn cancelled_login_keeps_session_signed_out() {
    let backend = Arc::new(MemoryBackend::new());
    let (app, notifier) = test_app(&backend, None).await;

    run_login(&app).await.unwrap();
    assert!(app.session.identity().is_none());
    assert!(notifier.notices().is_empty());
}

#[tokio::test]
async fn watch_stops_when_the_session_signs_out() {
    let backend = signed_in_backend();
    let (app, notifier) = test_app(&backend, None).await;
    let owner = IdentityId::new("ada");

    let (result, ()) = timeout(Duration::from_secs(2), async {
        tokio::join!(watch_until(&app, std::future::pending::<()>()), async {
            once_watching(&backend, &owner).await;
            backend.force_identity(None);
        })
    })
    .await
    .expect("watch ends after sign-out");

    assert!(result.is_ok());
    assert_eq!(
        notifier.notices(),
        vec![Notice::info("Watch", "Signed out; stopped watching")]
    );
}

#[tokio::test]
async fn watch_fails_when_the_live_query_breaks() {
    let backend = signed_in_backend();
    let (app, notifier) = test_app(&backend, None).await;
    let owner = IdentityId::new("ada");

    let (result, ()) = timeout(Duration::from_secs(2), async {
        tokio::join!(watch_until(&app, std::future::pending::<()>()), async {
            once_watching(&backend, &owner).await;
            backend.break_live_queries(&owner, "connection reset");
        })
    })
    .await
    .expect("watch ends after the subscription fails");

    assert!(matches!(
        result,
        Err(CliError::SubscriptionFailed(reason)) if reason.contains("connection reset")
    ));
    assert_eq!(
        notifier.notices(),
        vec![Notice::error(TITLE_ERROR, MSG_SUBSCRIPTION_FAILED)]
    );
}

#[tokio::test]
async fn watch_returns_when_stopped() {
    let backend = signed_in_backend();
    let (app, notifier) = test_app(&backend, None).await;

    let result = timeout(Duration::from_secs(2), watch_until(&app, async {}))
        .await
        .expect("watch ends when stopped");
    assert!(result.is_ok());
    assert!(notifier.notices().is_empty());
}
