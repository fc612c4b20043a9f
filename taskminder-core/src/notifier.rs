//! Notification sinks.
//!
//! The scanner calls [`Notifier::notify`] from its own tokio task. Sinks are
//! expected to hand the event off quickly (log it, enqueue it) rather than do
//! slow work inline: a slow sink delays the rest of the tick.

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::task::Task;

pub trait Notifier: Send + Sync {
    fn notify(&self, task: &Task, message: &str) -> Result<()>;
}

impl<F> Notifier for F
where
    F: Fn(&Task, &str) -> Result<()> + Send + Sync,
{
    fn notify(&self, task: &Task, message: &str) -> Result<()> {
        self(task, message)
    }
}

/// Writes every event to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, task: &Task, message: &str) -> Result<()> {
        info!(task_id = task.id(), "{message} -> {task}");
        Ok(())
    }
}

/// One delivered event, detached from the task it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub task_id: u64,
    pub title: String,
    pub due_at: DateTime<Utc>,
    pub message: String,
    pub sent_at_utc: DateTime<Utc>,
}

/// Queues events for a consumer running elsewhere (e.g. a UI loop).
///
/// `sent_at_utc` is read from the notifier's clock; pass the store's clock
/// so it matches the scan that fired the event.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
    clock: Arc<dyn Clock>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Notification>, clock: Arc<dyn Clock>) -> Self {
        Self { tx, clock }
    }

    /// Notifier plus the receiving end of its queue.
    pub fn channel(clock: Arc<dyn Clock>) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, clock), rx)
    }

    /// [`channel`](Self::channel) stamped with the wall clock.
    pub fn system() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        Self::channel(Arc::new(SystemClock::new()))
    }
}

impl fmt::Debug for ChannelNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelNotifier")
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, task: &Task, message: &str) -> Result<()> {
        let note = Notification {
            task_id: task.id(),
            title: task.title().to_string(),
            due_at: task.due_at(),
            message: message.to_string(),
            sent_at_utc: self.clock.now(),
        };
        self.tx
            .send(note)
            .map_err(|_| anyhow!("notification receiver closed"))
    }
}
