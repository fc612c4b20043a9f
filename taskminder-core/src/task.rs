//! Task model for the reminder engine.
//!
//! A task carries immutable schedule fields plus three one-way flags:
//! `completed`, and the reminder/deadline alert latches. All flags live in a
//! single atomic word so that "should this fire?" and "claim it" happen as
//! one step, even against a concurrent `mark_complete`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Title used when the caller supplies an empty or blank one.
pub const DEFAULT_TITLE: &str = "Untitled Task";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Active,
    Completed,
}

/// The two time-based events a task can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// `now` reached `due_at - reminder_lead`.
    Reminder,
    /// `now` reached `due_at`.
    Deadline,
}

impl AlertKind {
    /// Message handed to the notifier for this event.
    pub fn message(self) -> &'static str {
        match self {
            AlertKind::Reminder => "Reminder window reached",
            AlertKind::Deadline => "Deadline reached",
        }
    }

    // (claimed bit, settled bit)
    fn bits(self) -> (u8, u8) {
        match self {
            AlertKind::Reminder => (REMINDER_FIRING, REMINDER_FIRED),
            AlertKind::Deadline => (DEADLINE_FIRING, DEADLINE_FIRED),
        }
    }
}

const COMPLETED: u8 = 0b0_0001;
const REMINDER_FIRING: u8 = 0b0_0010;
const REMINDER_FIRED: u8 = 0b0_0100;
const DEADLINE_FIRING: u8 = 0b0_1000;
const DEADLINE_FIRED: u8 = 0b1_0000;

/// Packed one-way flags. Bits are only ever set, except FIRING which is
/// swapped for FIRED when a claimed alert settles.
#[derive(Debug, Default)]
struct Flags(AtomicU8);

impl Flags {
    fn load(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    fn is_completed(&self) -> bool {
        self.load() & COMPLETED != 0
    }

    fn has_fired(&self, kind: AlertKind) -> bool {
        let (firing, fired) = kind.bits();
        self.load() & (firing | fired) != 0
    }

    fn is_settled(&self, kind: AlertKind) -> bool {
        self.load() & kind.bits().1 != 0
    }

    fn complete(&self) -> bool {
        self.0.fetch_or(COMPLETED, Ordering::AcqRel) & COMPLETED == 0
    }

    /// Armed -> Firing, unless completed or already claimed.
    fn claim(&self, kind: AlertKind) -> bool {
        let (firing, fired) = kind.bits();
        let mut cur = self.load();
        loop {
            if cur & (COMPLETED | firing | fired) != 0 {
                return false;
            }
            match self
                .0
                .compare_exchange_weak(cur, cur | firing, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Any state -> Fired.
    fn settle(&self, kind: AlertKind) {
        let (firing, fired) = kind.bits();
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |f| {
                Some((f & !firing) | fired)
            });
    }
}

/// A single reminder-bearing task.
///
/// Tasks are created by [`TaskStore::add`](crate::TaskStore::add), which
/// assigns the id, and are shared as `Arc<Task>`; every mutation goes
/// through the latch methods below.
#[derive(Debug)]
pub struct Task {
    id: u64,
    title: String,
    description: String,
    due_at: DateTime<Utc>,
    reminder_lead: Duration,
    flags: Flags,
}

impl Task {
    pub fn new(
        id: u64,
        title: impl Into<String>,
        description: impl Into<String>,
        due_at: DateTime<Utc>,
        reminder_lead: Duration,
    ) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            title
        };

        Self {
            id,
            title,
            description: description.into(),
            due_at,
            reminder_lead,
            flags: Flags::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn reminder_lead(&self) -> Duration {
        self.reminder_lead
    }

    /// `due_at - reminder_lead`, never later than `due_at`.
    pub fn reminder_at(&self) -> DateTime<Utc> {
        match self.due_at.checked_sub_signed(self.reminder_lead) {
            Some(t) if t > self.due_at => self.due_at,
            Some(t) => t,
            None => DateTime::<Utc>::MIN_UTC,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.flags.is_completed()
    }

    pub fn status(&self) -> TaskStatus {
        if self.is_completed() {
            TaskStatus::Completed
        } else {
            TaskStatus::Active
        }
    }

    /// True once the reminder alert has been claimed or marked.
    pub fn reminder_fired(&self) -> bool {
        self.flags.has_fired(AlertKind::Reminder)
    }

    /// True once the deadline alert has been claimed or marked.
    pub fn deadline_fired(&self) -> bool {
        self.flags.has_fired(AlertKind::Deadline)
    }

    pub fn should_trigger_reminder(&self, now: DateTime<Utc>) -> bool {
        self.should_trigger(AlertKind::Reminder, now)
    }

    pub fn should_trigger_deadline_alert(&self, now: DateTime<Utc>) -> bool {
        self.should_trigger(AlertKind::Deadline, now)
    }

    pub fn should_trigger(&self, kind: AlertKind, now: DateTime<Utc>) -> bool {
        !self.is_completed() && !self.flags.has_fired(kind) && now >= self.trigger_at(kind)
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        now > self.due_at
    }

    /// Instant at which `kind` becomes due.
    pub fn trigger_at(&self, kind: AlertKind) -> DateTime<Utc> {
        match kind {
            AlertKind::Reminder => self.reminder_at(),
            AlertKind::Deadline => self.due_at,
        }
    }

    /// Atomic `should_trigger` + claim. Exactly one caller ever gets `true`
    /// for a given task and kind; the winner must call [`Task::settle`]
    /// once it has issued the notification.
    pub fn try_claim(&self, kind: AlertKind, now: DateTime<Utc>) -> bool {
        if now < self.trigger_at(kind) {
            return false;
        }
        self.flags.claim(kind)
    }

    pub fn try_claim_reminder(&self, now: DateTime<Utc>) -> bool {
        self.try_claim(AlertKind::Reminder, now)
    }

    pub fn try_claim_deadline(&self, now: DateTime<Utc>) -> bool {
        self.try_claim(AlertKind::Deadline, now)
    }

    /// Finish a claimed alert.
    pub fn settle(&self, kind: AlertKind) {
        self.flags.settle(kind);
    }

    /// Whether the alert for `kind` has fully settled (notify issued).
    pub fn is_settled(&self, kind: AlertKind) -> bool {
        self.flags.is_settled(kind)
    }

    /// One-way. Returns `true` only for the call that flipped the flag.
    pub fn mark_complete(&self) -> bool {
        self.flags.complete()
    }

    pub fn mark_reminder_fired(&self) {
        self.flags.settle(AlertKind::Reminder);
    }

    pub fn mark_deadline_fired(&self) {
        self.flags.settle(AlertKind::Deadline);
    }

    /// Whole minutes until the reminder point, floored at zero.
    pub fn minutes_until_reminder(&self, now: DateTime<Utc>) -> i64 {
        (self.reminder_at() - now).num_minutes().max(0)
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            due_at: self.due_at,
            reminder_lead_secs: self.reminder_lead.num_seconds(),
            reminder_at: self.reminder_at(),
            status: self.status(),
            reminder_fired: self.reminder_fired(),
            deadline_fired: self.deadline_fired(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (due {})",
            self.id,
            self.title,
            self.due_at.format("%Y-%m-%d %H:%M")
        )
    }
}

/// Point-in-time, serializable copy of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub due_at: DateTime<Utc>,
    pub reminder_lead_secs: i64,
    pub reminder_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub reminder_fired: bool,
    pub deadline_fired: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 21, 12, 0, 0).unwrap()
    }

    #[test]
    fn blank_title_falls_back() {
        let t = Task::new(1, "   ", "", due(), Duration::minutes(30));
        assert_eq!(t.title(), DEFAULT_TITLE);

        let t = Task::new(2, "Pay rent", "", due(), Duration::minutes(30));
        assert_eq!(t.title(), "Pay rent");
    }

    #[test]
    fn reminder_at_subtracts_lead() {
        let t = Task::new(1, "a", "", due(), Duration::minutes(30));
        assert_eq!(t.reminder_at(), due() - Duration::minutes(30));
    }

    #[test]
    fn reminder_at_zero_lead_is_due() {
        let t = Task::new(1, "a", "", due(), Duration::zero());
        assert_eq!(t.reminder_at(), due());
    }

    #[test]
    fn reminder_at_never_after_due() {
        // Negative leads are rejected by the store; the clamp still holds here.
        let t = Task::new(1, "a", "", due(), Duration::minutes(-15));
        assert_eq!(t.reminder_at(), due());
    }

    #[test]
    fn triggers_follow_the_clock() {
        let t = Task::new(1, "a", "", due(), Duration::minutes(30));
        let before = due() - Duration::minutes(31);
        let window = due() - Duration::minutes(30);

        assert!(!t.should_trigger_reminder(before));
        assert!(t.should_trigger_reminder(window));
        assert!(!t.should_trigger_deadline_alert(window));
        assert!(t.should_trigger_deadline_alert(due()));

        assert!(!t.is_past_due(due()));
        assert!(t.is_past_due(due() + Duration::seconds(1)));
    }

    #[test]
    fn latches_are_one_way() {
        let t = Task::new(1, "a", "", due(), Duration::minutes(30));
        t.mark_reminder_fired();
        t.mark_reminder_fired();
        assert!(t.reminder_fired());
        assert!(!t.should_trigger_reminder(due()));
        assert!(t.should_trigger_deadline_alert(due()));

        assert!(t.mark_complete());
        assert!(!t.mark_complete());
        assert_eq!(t.status(), TaskStatus::Completed);
        assert!(!t.should_trigger_deadline_alert(due()));
    }

    #[test]
    fn claim_is_won_once() {
        let t = Task::new(1, "a", "", due(), Duration::zero());
        assert!(!t.try_claim_reminder(due() - Duration::seconds(1)));

        assert!(t.try_claim_reminder(due()));
        assert!(t.reminder_fired());
        assert!(!t.is_settled(AlertKind::Reminder));
        assert!(!t.try_claim_reminder(due()));

        t.settle(AlertKind::Reminder);
        assert!(t.is_settled(AlertKind::Reminder));
        assert!(!t.try_claim_reminder(due() + Duration::hours(1)));

        assert!(t.try_claim_deadline(due()));
    }

    #[test]
    fn completed_task_cannot_be_claimed() {
        let t = Task::new(1, "a", "", due(), Duration::minutes(5));
        t.mark_complete();
        assert!(!t.try_claim_reminder(due()));
        assert!(!t.try_claim_deadline(due()));
        assert!(!t.reminder_fired());
    }

    #[test]
    fn concurrent_claims_have_a_single_winner() {
        let t = Task::new(1, "a", "", due(), Duration::minutes(5));
        let winners = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    if t.try_claim_deadline(due()) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn display_is_summary_line() {
        let t = Task::new(7, "Submit report", "", due(), Duration::minutes(30));
        assert_eq!(t.to_string(), "[7] Submit report (due 2026-02-21 12:00)");
    }

    #[test]
    fn snapshot_serializes() {
        let t = Task::new(3, "a", "b", due(), Duration::minutes(30));
        t.mark_reminder_fired();
        let json = serde_json::to_value(t.snapshot()).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["reminder_lead_secs"], 1800);
        assert_eq!(json["status"], "Active");
        assert_eq!(json["reminder_fired"], true);
        assert_eq!(json["deadline_fired"], false);
    }

    #[test]
    fn minutes_until_reminder_floors_at_zero() {
        let t = Task::new(1, "a", "", due(), Duration::minutes(30));
        assert_eq!(t.minutes_until_reminder(due() - Duration::minutes(90)), 60);
        assert_eq!(t.minutes_until_reminder(due()), 0);
    }
}
