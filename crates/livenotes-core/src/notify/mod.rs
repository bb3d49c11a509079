//! User-visible notifications.
//!
//! Failures that the user should hear about (but that never abort the app)
//! are reported through a [`Notifier`]. Views decide how to render them.

use std::fmt;
use std::sync::{Arc, Mutex};

pub const TITLE_ERROR: &str = "Error";
pub const TITLE_SIGN_IN_FAILED: &str = "Sign-In Failed";

pub const MSG_PREREQUISITES_UNAVAILABLE: &str = "Google Play Services are not available.";
pub const MSG_SIGN_IN_FAILED: &str = "An error occurred during sign-in. Please try again.";
pub const MSG_SIGN_OUT_FAILED: &str = "Failed to sign out. Please try again.";
pub const MSG_ADD_NOTE_FAILED: &str = "Failed to add note. Please try again.";
pub const MSG_UPDATE_NOTE_FAILED: &str = "Failed to update note. Please try again.";
pub const MSG_DELETE_NOTE_FAILED: &str = "Failed to delete note.";
pub const MSG_SUBSCRIPTION_FAILED: &str = "Live updates stopped. Reopen the list to retry.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A single user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Keeps every notice in memory; handy for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notice::error(TITLE_ERROR, MSG_DELETE_NOTE_FAILED));
        notifier.notify(Notice::info("Signed in", "Welcome back"));

        let notices = notifier.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message, MSG_DELETE_NOTE_FAILED);
        assert_eq!(notices[1].level, NoticeLevel::Info);
    }

    #[test]
    fn notice_display_joins_title_and_message() {
        let notice = Notice::error(TITLE_SIGN_IN_FAILED, MSG_SIGN_IN_FAILED);
        assert_eq!(
            notice.to_string(),
            "Sign-In Failed: An error occurred during sign-in. Please try again."
        );
    }
}
