use std::future::Future;

use chrono::Local;
use livenotes_core::models::note_count_label;
use livenotes_core::navigation::{resolve_route, Route, RouteDecision};
use livenotes_core::notify::MSG_SUBSCRIPTION_FAILED;
use livenotes_core::sync::SnapshotListener;
use livenotes_core::{Error, Note};
use tokio::sync::mpsc;

use crate::app::App;
use crate::commands::common::format_note_lines;
use crate::error::CliError;

enum WatchEvent {
    Snapshot(Vec<Note>),
    Failed(String),
}

struct WatchListener {
    tx: mpsc::UnboundedSender<WatchEvent>,
}

impl SnapshotListener for WatchListener {
    fn on_update(&mut self, notes: Vec<Note>) {
        let _ = self.tx.send(WatchEvent::Snapshot(notes));
    }

    fn on_error(&mut self, error: &Error) {
        let _ = self.tx.send(WatchEvent::Failed(error.to_string()));
    }
}

/// Print every snapshot until Ctrl-C, sign-out or a failed subscription.
pub async fn run_watch(app: &App) -> Result<(), CliError> {
    watch_until(app, tokio::signal::ctrl_c()).await
}

/// Print every snapshot until `stop` resolves, the session leaves the
/// watched identity or the subscription fails.
pub async fn watch_until<F: Future>(app: &App, stop: F) -> Result<(), CliError> {
    let identity = app.require_identity().await?;
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut handle = app
        .notes
        .subscribe(&identity.id, WatchListener { tx })
        .await?;
    let mut session = app.session.watch();
    tokio::pin!(stop);

    eprintln!("Watching notes of {} (Ctrl-C to stop)", identity.display_name_or_default());
    let result = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(WatchEvent::Snapshot(notes)) => print_snapshot(&notes),
                Some(WatchEvent::Failed(reason)) => {
                    app.report(MSG_SUBSCRIPTION_FAILED);
                    break Err(CliError::SubscriptionFailed(reason));
                }
                None => break Ok(()),
            },
            changed = session.changed() => {
                let state = session.borrow_and_update().clone();
                let still_watching = changed.is_ok()
                    && resolve_route(&state, Route::Notes) == RouteDecision::Stay
                    && state.identity().map(|current| &current.id) == Some(&identity.id);
                if !still_watching {
                    app.inform("Watch", "Signed out; stopped watching");
                    break Ok(());
                }
            }
            _ = &mut stop => break Ok(()),
        }
    };

    handle.close();
    result
}

fn print_snapshot(notes: &[Note]) {
    println!(
        "[{}] {}",
        Local::now().format("%H:%M:%S"),
        note_count_label(notes.len())
    );
    for line in format_note_lines(notes) {
        println!("  {line}");
    }
}
