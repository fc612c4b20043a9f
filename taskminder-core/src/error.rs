//! Error types for the reminder engine.

/// Errors surfaced by the task store and engine.
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    /// Caller-supplied task fields violate a constraint the store owns.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A notifier returned an error (or panicked) while handling an event.
    ///
    /// Only ever logged and counted by the scanner; never returned to callers.
    #[error("notifier failed for task {task_id}: {message}")]
    NotifierFailure {
        /// Task the notification was about.
        task_id: u64,
        /// Rendered failure cause.
        message: String,
    },

    /// The engine was started outside a tokio runtime.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, ReminderError>;
