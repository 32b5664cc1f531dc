use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Handle identifying one scheduled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

#[derive(Debug, Clone, Copy)]
struct PendingTask {
    handle: TaskHandle,
    deadline: Instant,
}

/// Trailing-edge debouncer with at most one pending run per key.
///
/// Scheduling a key replaces that key's pending run. Nothing fires on its
/// own: the owner drains due runs with [`DebounceScheduler::take_due`] and
/// decides when to call it (a timer, a frame tick, a test).
#[derive(Debug)]
pub struct DebounceScheduler<K> {
    pending: HashMap<K, PendingTask>,
    next_handle: u64,
}

impl<K: Copy + Eq + Hash> DebounceScheduler<K> {
    pub fn new() -> Self {
        Self { pending: HashMap::new(), next_handle: 0 }
    }

    /// Arm `key` to fire `delay` after `now`, cancelling its previous run.
    pub fn schedule(&mut self, key: K, delay: Duration, now: Instant) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.insert(key, PendingTask { handle, deadline: now + delay });
        handle
    }

    /// Cancel the pending run for `key`. Returns false if nothing was pending.
    pub fn cancel(&mut self, key: K) -> bool {
        self.pending.remove(&key).is_some()
    }

    /// Cancel every pending run. Returns the number cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Whether `key` has a run waiting.
    pub fn is_pending(&self, key: K) -> bool {
        self.pending.contains_key(&key)
    }

    /// Handle of the run currently armed for `key`.
    pub fn pending_handle(&self, key: K) -> Option<TaskHandle> {
        self.pending.get(&key).map(|task| task.handle)
    }

    /// Number of keys with a run waiting.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Earliest deadline among pending runs.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|task| task.deadline).min()
    }

    /// Remove and return every run whose deadline is at or before `now`,
    /// earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, TaskHandle)> {
        let mut due: Vec<(K, PendingTask)> = self
            .pending
            .iter()
            .filter(|(_, task)| task.deadline <= now)
            .map(|(key, task)| (*key, *task))
            .collect();
        due.sort_by_key(|(_, task)| (task.deadline, task.handle));

        for (key, _) in &due {
            self.pending.remove(key);
        }
        due.into_iter().map(|(key, task)| (key, task.handle)).collect()
    }
}

impl<K: Copy + Eq + Hash> Default for DebounceScheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_schedule_and_fire() {
        let mut scheduler = DebounceScheduler::new();
        let t0 = Instant::now();
        let handle = scheduler.schedule("main", 100 * MS, t0);

        assert!(scheduler.take_due(t0 + 99 * MS).is_empty());
        assert_eq!(scheduler.take_due(t0 + 100 * MS), vec![("main", handle)]);
        assert!(!scheduler.is_pending("main"));
    }

    #[test]
    fn test_burst_collapses_to_last_trigger() {
        let mut scheduler = DebounceScheduler::new();
        let t0 = Instant::now();

        let mut last = None;
        for i in 0..10 {
            last = Some(scheduler.schedule("main", 100 * MS, t0 + i * 10 * MS));
        }

        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(scheduler.pending_handle("main"), last);
        assert!(scheduler.take_due(t0 + 150 * MS).is_empty());

        let fired = scheduler.take_due(t0 + 190 * MS);
        assert_eq!(fired.len(), 1);
        assert_eq!(Some(fired[0].1), last);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut scheduler = DebounceScheduler::new();
        let t0 = Instant::now();
        scheduler.schedule("main", 100 * MS, t0);
        scheduler.schedule("reasoning", 150 * MS, t0);
        scheduler.schedule("main", 100 * MS, t0 + 20 * MS);

        assert_eq!(scheduler.pending_count(), 2);
        assert_eq!(scheduler.next_deadline(), Some(t0 + 120 * MS));

        let fired: Vec<&str> = scheduler.take_due(t0 + 200 * MS).into_iter().map(|(k, _)| k).collect();
        assert_eq!(fired, vec!["main", "reasoning"]);
    }

    #[test]
    fn test_zero_delay_is_due_immediately() {
        let mut scheduler = DebounceScheduler::new();
        let t0 = Instant::now();
        scheduler.schedule("main", Duration::ZERO, t0);
        assert_eq!(scheduler.take_due(t0).len(), 1);
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = DebounceScheduler::new();
        let t0 = Instant::now();
        scheduler.schedule("main", 100 * MS, t0);
        scheduler.schedule("reasoning", 100 * MS, t0);

        assert!(scheduler.cancel("main"));
        assert!(!scheduler.cancel("main"));
        assert_eq!(scheduler.cancel_all(), 1);
        assert!(scheduler.take_due(t0 + 500 * MS).is_empty());
        assert_eq!(scheduler.next_deadline(), None);
    }
}
