//! User-facing error notifications.
//!
//! Only user-initiated operations and the unrecoverable closed-storage state
//! notify; background synchronization logs instead.

/// Sink for error toasts.
pub trait Notifier: Send + Sync {
    /// Show an error to the user.
    fn notify_error(&self, title: &str, message: &str);
}

/// Notifier that only logs. Used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, title: &str, message: &str) {
        tracing::error!(title, message, "user notification");
    }
}

/// Title and message shown when the store has been closed.
pub const STORAGE_CLOSED_TITLE: &str = "SDK is closed";
/// See [`STORAGE_CLOSED_TITLE`].
pub const STORAGE_CLOSED_MESSAGE: &str = "please restart Bitkit!";

/// Report an error raised by the storage substrate itself.
///
/// Connection refusals from the DHT relay are replaced by a readable message.
pub fn notify_sdk_error(notifier: &dyn Notifier, error: &str) {
    let message = if error.ends_with("Connection refused") {
        "Couldn't connect to the provided DHT relay"
    } else {
        error
    };
    notifier.notify_error("SlashtagsProvider Error", message);
}
