//! One pass over the store: detect reminder/deadline crossings and notify.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::ReminderError;
use crate::notifier::Notifier;
use crate::store::TaskStore;
use crate::task::{AlertKind, Task};

/// Counters for a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub reminders: usize,
    pub deadlines: usize,
    pub failures: usize,
}

impl ScanReport {
    pub fn fired(&self) -> usize {
        self.reminders + self.deadlines
    }
}

pub struct Scanner {
    store: Arc<TaskStore>,
    notifier: Arc<dyn Notifier>,
}

impl Scanner {
    pub fn new(store: Arc<TaskStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Scan at the store clock's current time.
    pub fn scan_once(&self) -> ScanReport {
        self.scan_at(self.store.now())
    }

    /// Evaluate every open task against `now`.
    ///
    /// Per task, the reminder is checked before the deadline; both may fire
    /// in the same tick. Each event is claimed before the notifier is called
    /// and settled afterwards, whether or not the notifier succeeded.
    pub fn scan_at(&self, now: DateTime<Utc>) -> ScanReport {
        let mut report = ScanReport::default();

        for task in self.store.all_active() {
            report.scanned += 1;
            for kind in [AlertKind::Reminder, AlertKind::Deadline] {
                if !task.try_claim(kind, now) {
                    continue;
                }

                if let Err(e) = self.dispatch(&task, kind) {
                    warn!("{e}");
                    report.failures += 1;
                }
                task.settle(kind);

                match kind {
                    AlertKind::Reminder => report.reminders += 1,
                    AlertKind::Deadline => report.deadlines += 1,
                }
            }
        }

        if report.fired() > 0 || report.failures > 0 {
            debug!(
                scanned = report.scanned,
                reminders = report.reminders,
                deadlines = report.deadlines,
                failures = report.failures,
                "scan tick"
            );
        }
        report
    }

    fn dispatch(&self, task: &Task, kind: AlertKind) -> Result<(), ReminderError> {
        let message = kind.message();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.notifier.notify(task, message)));

        let failure = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "notifier panicked".to_string()),
        };

        Err(ReminderError::NotifierFailure {
            task_id: task.id(),
            message: failure,
        })
    }
}
