//! Concurrent, keyed task collection.
//!
//! Design:
//! - Canonical tasks live in an ordered map (id -> `Arc<Task>`) behind one
//!   `RwLock`. The id counter sits under the same lock, so allocation and
//!   insertion are a single step.
//! - Reads clone the `Arc`s out and release the lock before sorting or
//!   filtering. Callers get a consistent snapshot and never hold the lock.
//! - Ids start at 1 and are never reused, even after removal.
//!
//! Orderings:
//! - `all_sorted_by_due`: due_at ASC, id ASC
//! - `due_within`: reminder_at ASC, id ASC
//! - `all_active`: id ASC

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::{ReminderError, Result};
use crate::task::Task;

#[derive(Debug)]
struct Inner {
    next_id: u64,
    tasks: BTreeMap<u64, Arc<Task>>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            next_id: 1,
            tasks: BTreeMap::new(),
        }
    }
}

pub struct TaskStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    /// Store backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // A poisoned lock only means a panic elsewhere while it was held; the map
    // itself is never left half-written, so keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tasks.is_empty()
    }

    /// Create a task with the next id.
    ///
    /// Fails with [`ReminderError::InvalidInput`] when `reminder_lead` is negative.
    pub fn add(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        due_at: DateTime<Utc>,
        reminder_lead: Duration,
    ) -> Result<Arc<Task>> {
        if reminder_lead < Duration::zero() {
            return Err(ReminderError::InvalidInput(format!(
                "reminder lead cannot be negative (got {}s)",
                reminder_lead.num_seconds()
            )));
        }

        let title = title.into();
        let description = description.into();

        let mut inner = self.write();
        let id = inner.next_id;
        inner.next_id += 1;
        let task = Arc::new(Task::new(id, title, description, due_at, reminder_lead));
        inner.tasks.insert(id, Arc::clone(&task));
        drop(inner);

        info!(task_id = id, due_at = %task.due_at(), "task added");
        Ok(task)
    }

    pub fn get(&self, id: u64) -> Option<Arc<Task>> {
        self.read().tasks.get(&id).cloned()
    }

    /// Mark a task complete. `None` when the id is unknown.
    pub fn mark_complete(&self, id: u64) -> Option<Arc<Task>> {
        let task = self.get(id)?;
        if task.mark_complete() {
            info!(task_id = id, "task completed");
        } else {
            debug!(task_id = id, "task already completed");
        }
        Some(task)
    }

    /// Remove a task. Returns whether it was present.
    pub fn remove(&self, id: u64) -> bool {
        let removed = self.write().tasks.remove(&id).is_some();
        if removed {
            info!(task_id = id, "task removed");
        }
        removed
    }

    fn snapshot(&self) -> Vec<Arc<Task>> {
        self.read().tasks.values().cloned().collect()
    }

    /// Every task, ordered by due time then id.
    pub fn all_sorted_by_due(&self) -> Vec<Arc<Task>> {
        let mut tasks = self.snapshot();
        tasks.sort_by_key(|t| (t.due_at(), t.id()));
        tasks
    }

    /// Open tasks whose reminder point falls in `[now, now + window]`.
    pub fn due_within(&self, window: Duration) -> Vec<Arc<Task>> {
        self.due_within_at(self.now(), window)
    }

    /// [`TaskStore::due_within`] against an explicit `now`.
    ///
    /// Tasks whose reminder point is already behind `now` are excluded even
    /// if their deadline has not passed yet.
    pub fn due_within_at(&self, now: DateTime<Utc>, window: Duration) -> Vec<Arc<Task>> {
        let threshold = now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut out: Vec<Arc<Task>> = self
            .snapshot()
            .into_iter()
            .filter(|t| {
                let reminder_at = t.reminder_at();
                !t.is_completed()
                    && !t.is_past_due(now)
                    && reminder_at >= now
                    && reminder_at <= threshold
            })
            .collect();

        out.sort_by_key(|t| (t.reminder_at(), t.id()));
        out
    }

    /// Point-in-time copy of every open task, in id order, for scanning.
    pub fn all_active(&self) -> Vec<Arc<Task>> {
        self.read()
            .tasks
            .values()
            .filter(|t| !t.is_completed())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 21, 8, 0, 0).unwrap()
    }

    fn store() -> TaskStore {
        TaskStore::with_clock(Arc::new(ManualClock::new(start())))
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let s = store();
        let ids: Vec<u64> = (0..5)
            .map(|i| {
                s.add(format!("t{i}"), "", start() + Duration::hours(1), Duration::zero())
                    .unwrap()
                    .id()
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let s = store();
        let a = s.add("a", "", start(), Duration::zero()).unwrap();
        assert!(s.remove(a.id()));
        let b = s.add("b", "", start(), Duration::zero()).unwrap();
        assert_eq!(b.id(), 2);
    }

    #[test]
    fn negative_lead_is_rejected() {
        let s = store();
        let err = s
            .add("a", "", start(), Duration::minutes(-1))
            .unwrap_err();
        assert!(matches!(err, ReminderError::InvalidInput(_)));
        assert!(s.is_empty());

        // The rejected add must not burn an id.
        let t = s.add("b", "", start(), Duration::zero()).unwrap();
        assert_eq!(t.id(), 1);
    }

    #[test]
    fn concurrent_adds_get_distinct_ids() {
        let s = store();
        let ids = std::sync::Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let t = s.add("x", "", start(), Duration::zero()).unwrap();
                        ids.lock().unwrap().push(t.id());
                    }
                });
            }
        });

        let mut ids = ids.into_inner().unwrap();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&400));
        assert_eq!(s.len(), 400);
    }

    #[test]
    fn mark_complete_unknown_id_is_none() {
        let s = store();
        assert!(s.mark_complete(42).is_none());

        let t = s.add("a", "", start(), Duration::zero()).unwrap();
        let done = s.mark_complete(t.id()).unwrap();
        assert!(done.is_completed());
        assert!(s.get(t.id()).unwrap().is_completed());
    }

    #[test]
    fn removal_is_final() {
        let s = store();
        let a = s.add("a", "", start(), Duration::zero()).unwrap();
        let b = s.add("b", "", start(), Duration::zero()).unwrap();

        assert!(s.remove(a.id()));
        assert!(s.get(a.id()).is_none());
        assert!(!s.remove(a.id()));

        let ids: Vec<u64> = s.all_sorted_by_due().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![b.id()]);
    }

    #[test]
    fn sorted_by_due_breaks_ties_by_id() {
        let s = store();
        let late = s.add("late", "", start() + Duration::hours(3), Duration::zero()).unwrap();
        let tie_a = s.add("tie a", "", start() + Duration::hours(1), Duration::zero()).unwrap();
        let tie_b = s.add("tie b", "", start() + Duration::hours(1), Duration::zero()).unwrap();

        let ids: Vec<u64> = s.all_sorted_by_due().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![tie_a.id(), tie_b.id(), late.id()]);
    }

    #[test]
    fn due_within_keeps_only_the_window() {
        let s = store();
        let now = start();
        let lead = Duration::minutes(30);

        // reminder points at now-10m, now+10m, now+90m
        s.add("past", "", now + Duration::minutes(20), lead).unwrap();
        let inside = s.add("inside", "", now + Duration::minutes(40), lead).unwrap();
        s.add("outside", "", now + Duration::minutes(120), lead).unwrap();

        let ids: Vec<u64> = s
            .due_within(Duration::minutes(60))
            .iter()
            .map(|t| t.id())
            .collect();
        assert_eq!(ids, vec![inside.id()]);
    }

    #[test]
    fn due_within_bounds_are_inclusive() {
        let s = store();
        let now = start();
        let at_now = s.add("now", "", now, Duration::zero()).unwrap();
        let at_edge = s.add("edge", "", now + Duration::minutes(60), Duration::zero()).unwrap();

        let ids: Vec<u64> = s
            .due_within_at(now, Duration::minutes(60))
            .iter()
            .map(|t| t.id())
            .collect();
        assert_eq!(ids, vec![at_now.id(), at_edge.id()]);
    }

    #[test]
    fn due_within_skips_completed_and_orders_by_reminder() {
        let s = store();
        let now = start();
        let a = s.add("a", "", now + Duration::minutes(50), Duration::minutes(10)).unwrap();
        let b = s.add("b", "", now + Duration::minutes(45), Duration::minutes(30)).unwrap();
        let c = s.add("c", "", now + Duration::minutes(20), Duration::zero()).unwrap();
        s.mark_complete(c.id());

        let ids: Vec<u64> = s
            .due_within_at(now, Duration::hours(1))
            .iter()
            .map(|t| t.id())
            .collect();
        assert_eq!(ids, vec![b.id(), a.id()]);
    }

    #[test]
    fn all_active_excludes_completed() {
        let s = store();
        let a = s.add("a", "", start(), Duration::zero()).unwrap();
        let b = s.add("b", "", start(), Duration::zero()).unwrap();
        s.mark_complete(a.id());

        let ids: Vec<u64> = s.all_active().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![b.id()]);
    }

    #[test]
    fn snapshots_survive_concurrent_removal() {
        let s = store();
        let a = s.add("a", "", start(), Duration::zero()).unwrap();
        let snap = s.all_active();
        s.remove(a.id());
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].title(), "a");
    }
}
