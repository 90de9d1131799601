//! Min-ordered queue of pending callbacks, keyed by absolute fire time.
//!
//! Unlike the reference implementation's callback-function-pointer-plus-
//! void-star-data scheme, dedup here is keyed on an explicit, strongly typed
//! [`TimerKind`] so two independently scheduled intents can never collide by
//! accident.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::debug::Debug;

pub type TimerId = u64;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TimerKind {
    GeneralQuery,
    AgingSweep,
    LastMemberProbe { group: Ipv4Addr },
}

struct Entry {
    id: TimerId,
    fire_time: Instant,
    seq: u64,
    kind: TimerKind,
}

#[derive(Default)]
pub struct TimerQueue {
    entries: Vec<Entry>,
    next_id: TimerId,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `kind` to fire at `now + delay`. If an entry with an equal
    /// `kind` is already pending, returns its id and drops the new request.
    pub fn schedule(
        &mut self,
        now: Instant,
        delay: Duration,
        kind: TimerKind,
    ) -> TimerId {
        if let Some(existing) = self.entries.iter().find(|e| e.kind == kind) {
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        let fire_time = now + delay;

        Debug::TimerScheduled(&kind).log();

        let pos = self
            .entries
            .partition_point(|e| (e.fire_time, e.seq) <= (fire_time, seq));
        self.entries.insert(
            pos,
            Entry {
                id,
                fire_time,
                seq,
                kind,
            },
        );
        id
    }

    /// Removes and returns every entry due at or before `now`, in ascending
    /// `(fire_time, insertion order)`.
    pub fn tick(&mut self, now: Instant) -> Vec<(TimerId, TimerKind)> {
        let split = self.entries.partition_point(|e| e.fire_time <= now);
        self.entries
            .drain(..split)
            .map(|e| {
                Debug::TimerFired(&e.kind).log();
                (e.id, e.kind)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_scheduled(&self, kind: &TimerKind) -> bool {
        self.entries.iter().any(|e| &e.kind == kind)
    }

    pub fn cancel(&mut self, kind: &TimerKind) {
        self.entries.retain(|e| &e.kind != kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_orders_by_fire_time() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        q.schedule(now, Duration::from_secs(5), TimerKind::GeneralQuery);
        q.schedule(now, Duration::from_secs(1), TimerKind::AgingSweep);

        let due = q.tick(now + Duration::from_secs(10));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].1, TimerKind::AgingSweep);
        assert_eq!(due[1].1, TimerKind::GeneralQuery);
    }

    #[test]
    fn tick_only_returns_due_entries() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        q.schedule(now, Duration::from_secs(5), TimerKind::GeneralQuery);

        assert!(q.tick(now + Duration::from_secs(1)).is_empty());
        assert_eq!(q.tick(now + Duration::from_secs(5)).len(), 1);
    }

    #[test]
    fn duplicate_kind_is_deduplicated() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        let id1 = q.schedule(now, Duration::from_secs(5), TimerKind::AgingSweep);
        let id2 = q.schedule(now, Duration::from_secs(1), TimerKind::AgingSweep);

        assert_eq!(id1, id2);
        assert_eq!(q.entries.len(), 1);
    }

    #[test]
    fn clear_discards_everything() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        q.schedule(now, Duration::from_secs(1), TimerKind::GeneralQuery);
        q.clear();
        assert!(q.tick(now + Duration::from_secs(100)).is_empty());
    }

    #[test]
    fn is_scheduled_reflects_pending_state() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        assert!(!q.is_scheduled(&TimerKind::AgingSweep));
        q.schedule(now, Duration::from_secs(1), TimerKind::AgingSweep);
        assert!(q.is_scheduled(&TimerKind::AgingSweep));
        q.tick(now + Duration::from_secs(1));
        assert!(!q.is_scheduled(&TimerKind::AgingSweep));
    }

    #[test]
    fn cancel_removes_pending_entry() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        q.schedule(now, Duration::from_secs(1), TimerKind::AgingSweep);
        q.cancel(&TimerKind::AgingSweep);
        assert!(!q.is_scheduled(&TimerKind::AgingSweep));
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        let probe_a = TimerKind::LastMemberProbe {
            group: "239.1.1.1".parse().unwrap(),
        };
        let probe_b = TimerKind::LastMemberProbe {
            group: "239.1.1.2".parse().unwrap(),
        };
        q.schedule(now, Duration::from_secs(1), probe_a);
        q.schedule(now, Duration::from_secs(1), probe_b);

        let due = q.tick(now + Duration::from_secs(1));
        assert_eq!(due[0].1, probe_a);
        assert_eq!(due[1].1, probe_b);
    }
}
