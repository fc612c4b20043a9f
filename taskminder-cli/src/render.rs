//! Text rendering of tasks and notifications.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use taskminder_core::{Notification, Task, TaskStatus};

use crate::time::format_local;

/// Two-line block used by `list`.
pub fn describe(task: &Task, tz: Tz) -> String {
    let mut out = format!("[{}] {}", task.id(), task.title());
    if !task.description().trim().is_empty() {
        out.push_str(" - ");
        out.push_str(task.description());
    }
    let status = match task.status() {
        TaskStatus::Active => "Active",
        TaskStatus::Completed => "Completed",
    };
    out.push_str(&format!(
        "\n   Due: {} | Reminder: {} | Status: {}",
        format_local(task.due_at(), tz),
        format_local(task.reminder_at(), tz),
        status
    ));
    out
}

pub fn reminder_window_line(task: &Task, now: DateTime<Utc>, tz: Tz) -> String {
    format!(
        "[{}] {} -> reminder in {} minutes (due {})",
        task.id(),
        task.title(),
        task.minutes_until_reminder(now),
        format_local(task.due_at(), tz)
    )
}

/// `[sent] message -> [id] title (due ..)`
pub fn notification_line(note: &Notification, tz: Tz) -> String {
    format!(
        "[{}] {} -> [{}] {} (due {})",
        format_local(note.sent_at_utc, tz),
        note.message,
        note.task_id,
        note.title,
        format_local(note.due_at, tz)
    )
}
