//! Cycle counter and alarm queue.
//!
//! The scheduler owns the machine's cycle counter. Chips register alarms
//! against it under an identity of the machine's choosing (usually a small
//! enum), and the CPU advances it after every instruction. Due alarms are
//! handed back to the caller one at a time so it can route each one to the
//! chip that owns it.
//!
//! The counter is a `u32`. Before an advance would push it past
//! [`CLOCK_MAX`], the counter and every pending trigger are shifted down by
//! a common offset in one step. Relative distances are unchanged, so chips
//! that derive their counters from `trigger - now` never notice.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

/// A count of CPU cycles.
pub type Cycle = u32;

/// Highest value the cycle counter may hold between advances.
///
/// Alarm triggers may lie above this, in the headroom up to `u32::MAX`.
pub const CLOCK_MAX: Cycle = u32::MAX - 0x00FF_FFFF;

/// An alarm that has fallen due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alarm<E> {
    /// The cycle the alarm was registered for. Periodic timers schedule
    /// their next expiry from this, not from the current counter.
    pub at: Cycle,
    /// The identity it was registered under.
    pub event: E,
}

/// Alarm scheduler over a wrapping cycle counter.
///
/// Each identity has at most one pending alarm. Registering an identity
/// again moves its alarm. Alarms fire in ascending trigger order and, for
/// equal triggers, in registration order.
pub struct Scheduler<E> {
    now: Cycle,
    queue: BTreeMap<(Cycle, u64), E>,
    pending: HashMap<E, (Cycle, u64)>,
    next_seq: u64,
    /// Cycles removed from the counter by rebasing so far.
    base: u64,
    rebases: u32,
}

impl<E: Copy + Eq + Hash + fmt::Debug> Scheduler<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a scheduler whose counter starts at `now`.
    #[must_use]
    pub fn starting_at(now: Cycle) -> Self {
        assert!(now <= CLOCK_MAX, "cycle counter {now:#X} above CLOCK_MAX");
        Self {
            now,
            queue: BTreeMap::new(),
            pending: HashMap::new(),
            next_seq: 0,
            base: 0,
            rebases: 0,
        }
    }

    /// Current value of the cycle counter.
    #[must_use]
    pub fn now(&self) -> Cycle {
        self.now
    }

    /// Total cycles elapsed since construction, across rebases.
    #[must_use]
    pub fn elapsed(&self) -> u64 {
        self.base + u64::from(self.now)
    }

    /// Number of times the counter has been rebased.
    #[must_use]
    pub fn rebase_count(&self) -> u32 {
        self.rebases
    }

    /// Register `event` to fire once the counter reaches `at`.
    ///
    /// A trigger already in the past fires on the next [`advance`](Self::advance).
    pub fn register_alarm(&mut self, at: Cycle, event: E) {
        if let Some(key) = self.pending.remove(&event) {
            self.queue.remove(&key);
        }
        let key = (at, self.next_seq);
        self.next_seq += 1;
        self.queue.insert(key, event);
        self.pending.insert(event, key);
    }

    /// Register `event` to fire `delay` cycles from now.
    ///
    /// # Panics
    ///
    /// If the trigger cycle does not fit in a [`Cycle`]. That means a chip
    /// computed a nonsensical delay.
    pub fn register_in(&mut self, delay: Cycle, event: E) -> Cycle {
        let Some(at) = self.now.checked_add(delay) else {
            panic!(
                "alarm {event:?}: trigger overflow ({:#X} + {delay:#X})",
                self.now
            );
        };
        self.register_alarm(at, event);
        at
    }

    /// Remove the pending alarm for `event`. Returns whether one existed.
    pub fn cancel_alarm(&mut self, event: E) -> bool {
        match self.pending.remove(&event) {
            Some(key) => {
                self.queue.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Trigger cycle of the pending alarm for `event`.
    #[must_use]
    pub fn trigger_of(&self, event: E) -> Option<Cycle> {
        self.pending.get(&event).map(|&(at, _)| at)
    }

    /// Cycles left until `event` fires, or zero if it is already due.
    #[must_use]
    pub fn cycles_until(&self, event: E) -> Option<Cycle> {
        self.trigger_of(event).map(|at| at.saturating_sub(self.now))
    }

    #[must_use]
    pub fn is_pending(&self, event: E) -> bool {
        self.pending.contains_key(&event)
    }

    /// Trigger cycle of the earliest pending alarm.
    #[must_use]
    pub fn next_trigger(&self) -> Option<Cycle> {
        self.queue.keys().next().map(|&(at, _)| at)
    }

    /// Number of pending alarms.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Remove and return the earliest alarm if it is due.
    pub fn pop_due(&mut self) -> Option<Alarm<E>> {
        let (&(at, seq), _) = self.queue.first_key_value()?;
        if at > self.now {
            return None;
        }
        let event = self.queue.remove(&(at, seq))?;
        self.pending.remove(&event);
        Some(Alarm { at, event })
    }

    /// Advance the counter by `cycles` and fire every alarm that falls due.
    ///
    /// `fire` receives the scheduler back so handlers can register follow-up
    /// alarms. Any of those that are already due fire within this call.
    pub fn advance<F>(&mut self, cycles: Cycle, mut fire: F)
    where
        F: FnMut(&mut Self, Alarm<E>),
    {
        if CLOCK_MAX - self.now < cycles {
            // Alarms left behind the counter would pin the rebase offset.
            while let Some(alarm) = self.pop_due() {
                fire(self, alarm);
            }
            self.rebase();
            assert!(
                CLOCK_MAX - self.now >= cycles,
                "cannot advance {cycles} cycles: counter stuck at {:#X} by a stale alarm",
                self.now
            );
        }
        self.now += cycles;
        while let Some(alarm) = self.pop_due() {
            fire(self, alarm);
        }
    }

    /// Shift the counter and every pending trigger down by a common offset.
    ///
    /// The offset is the smaller of the counter and the earliest trigger, so
    /// nothing underflows. Returns the offset.
    pub fn rebase(&mut self) -> Cycle {
        let offset = self.next_trigger().map_or(self.now, |at| at.min(self.now));
        if offset == 0 {
            return 0;
        }
        self.now -= offset;
        let queue = std::mem::take(&mut self.queue);
        self.queue = queue
            .into_iter()
            .map(|((at, seq), event)| ((at - offset, seq), event))
            .collect();
        for key in self.pending.values_mut() {
            key.0 -= offset;
        }
        self.base += u64::from(offset);
        self.rebases += 1;
        log::debug!(
            "scheduler rebased by {offset:#X} cycles ({} alarms pending)",
            self.queue.len()
        );
        offset
    }
}

impl<E: Copy + Eq + Hash + fmt::Debug> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: fmt::Debug> fmt::Debug for Scheduler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("base", &self.base)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
