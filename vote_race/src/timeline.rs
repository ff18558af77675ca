//! A deterministic queue of deferred callbacks on simulated time.
//!
//! Nothing runs in parallel: the owner advances the clock explicitly and
//! receives the callbacks that became due, in deadline order (ties keep the
//! scheduling order). Every callback carries the generation of the owner that
//! scheduled it, so an owner that was reset can recognize and drop callbacks
//! from a previous life even if they were not cancelled.

use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Identity of a scheduled callback.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct TimerId(u64);

/// Identity of one life of a timer owner. Bumped on every reset.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Generation {
        Generation(self.0 + 1)
    }
}

/// A callback that became due.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Fired<E> {
    pub id: TimerId,
    pub generation: Generation,
    pub deadline: Duration,
    pub event: E,
}

#[derive(Debug, Clone)]
pub struct Timeline<E> {
    now: Duration,
    next_id: u64,
    // Keyed by (deadline, id): ids grow, so equal deadlines fire in scheduling order.
    pending: BTreeMap<(Duration, TimerId), (Generation, E)>,
    deadlines: HashMap<TimerId, Duration>,
}

impl<E> Default for Timeline<E> {
    fn default() -> Self {
        Timeline::new()
    }
}

impl<E> Timeline<E> {
    pub fn new() -> Timeline<E> {
        Timeline {
            now: Duration::ZERO,
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedules an event at an absolute time. A deadline in the past fires
    /// on the next advance.
    pub fn schedule_at(&mut self, deadline: Duration, generation: Generation, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((deadline, id), (generation, event));
        self.deadlines.insert(id, deadline);
        id
    }

    pub fn schedule_after(&mut self, delay: Duration, generation: Generation, event: E) -> TimerId {
        self.schedule_at(self.now + delay, generation, event)
    }

    /// Returns true if the callback was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.pending.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    /// Cancels every pending callback of the given generation.
    pub fn cancel_generation(&mut self, generation: Generation) -> usize {
        let ids: Vec<(Duration, TimerId)> = self
            .pending
            .iter()
            .filter(|(_, (g, _))| *g == generation)
            .map(|(k, _)| *k)
            .collect();
        for key in ids.iter() {
            self.pending.remove(key);
            self.deadlines.remove(&key.1);
        }
        debug!(
            "cancel_generation: cancelled {} callbacks of generation {:?}",
            ids.len(),
            generation
        );
        ids.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.deadlines.clear();
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// The pending callbacks, in firing order.
    pub fn iter(&self) -> impl Iterator<Item = (Duration, Generation, &E)> + '_ {
        self.pending.iter().map(|((d, _), (g, e))| (*d, *g, e))
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.keys().next().map(|(d, _)| *d)
    }

    /// Pops the earliest callback due at or before `until`, moving the clock
    /// to its deadline.
    ///
    /// Callbacks scheduled while handling a fired one are seen by the next
    /// call, so handlers can chain work at the same instant.
    pub fn pop_due(&mut self, until: Duration) -> Option<Fired<E>> {
        let key = *self.pending.keys().next()?;
        if key.0 > until {
            return None;
        }
        let (generation, event) = self.pending.remove(&key)?;
        self.deadlines.remove(&key.1);
        self.now = self.now.max(key.0);
        Some(Fired {
            id: key.1,
            generation,
            deadline: key.0,
            event,
        })
    }

    /// Moves the clock forward without firing anything.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}
