use livenotes_core::notify::{Notice, NoticeLevel, Notifier};

/// Prints notices on stderr, keeping stdout for command output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => eprintln!("{}", notice.message),
            NoticeLevel::Error => eprintln!("{notice}"),
        }
    }
}
