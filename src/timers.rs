/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Arming of the block timer and the round timer.
//!
//! The consensus core never waits on a timer itself. Instead, it asks a [`Scheduler`] to arm a timer,
//! and the scheduler is expected to deliver a single expiry event per armed timer back to the
//! [`Controller`](crate::ibft::controller::Controller). Timers are never cancelled: an expiry for a
//! round that is no longer current is recognized and discarded by the controller.
//!
//! [`DeadlineScheduler`] is the scheduler used by [`Replica`](crate::replica::Replica). It records
//! deadlines, and the processor thread polls it for [expired](DeadlineScheduler::pop_expired) ones.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use crate::types::data_types::RoundIdentifier;

pub trait Scheduler: Send {
    /// Arm a timer that expires after `timeout`, raising a round expiry for `round`.
    fn start_round_timer(&mut self, round: RoundIdentifier, timeout: Duration);

    /// Arm a timer that expires at `expiry`, raising a block timer expiry for `round`.
    fn start_block_timer(&mut self, round: RoundIdentifier, expiry: SystemTime);
}

// Stands in for deadlines too far away to be represented as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// An expired timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerExpiry {
    BlockTimer(RoundIdentifier),
    RoundTimer(RoundIdentifier),
}

/// A [`Scheduler`] that records deadlines in memory. Clones share the same deadlines.
#[derive(Clone, Default)]
pub struct DeadlineScheduler {
    // Keyed by deadline and then by the order timers were armed in, so that timers with the same
    // deadline expire in the order they were armed.
    deadlines: Arc<Mutex<BTreeMap<(Instant, u64), TimerExpiry>>>,
    armed: Arc<Mutex<u64>>,
}

impl DeadlineScheduler {
    pub fn new() -> DeadlineScheduler {
        DeadlineScheduler::default()
    }

    /// Remove and return the timer with the earliest deadline, if that deadline is at or before `now`.
    pub fn pop_expired(&self, now: Instant) -> Option<TimerExpiry> {
        let mut deadlines = lock(&self.deadlines);
        match deadlines.first_key_value() {
            Some(((deadline, _), _)) if *deadline <= now => {
                deadlines.pop_first().map(|(_, expiry)| expiry)
            }
            _ => None,
        }
    }

    /// Get the earliest deadline among the armed timers.
    pub fn next_deadline(&self) -> Option<Instant> {
        lock(&self.deadlines)
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    fn arm(&self, deadline: Instant, expiry: TimerExpiry) {
        let mut armed = lock(&self.armed);
        *armed += 1;
        lock(&self.deadlines).insert((deadline, *armed), expiry);
    }
}

impl Scheduler for DeadlineScheduler {
    fn start_round_timer(&mut self, round: RoundIdentifier, timeout: Duration) {
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);
        self.arm(deadline, TimerExpiry::RoundTimer(round))
    }

    fn start_block_timer(&mut self, round: RoundIdentifier, expiry: SystemTime) {
        let delay = expiry
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);
        self.arm(Instant::now() + delay, TimerExpiry::BlockTimer(round))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_types::{BlockHeight, Round};

    #[test]
    fn pop_expired_returns_only_elapsed_deadlines_in_order() {
        let mut scheduler = DeadlineScheduler::new();
        let round_0 = RoundIdentifier::new(BlockHeight::new(1), Round::new(0));
        let round_1 = RoundIdentifier::new(BlockHeight::new(1), Round::new(1));

        scheduler.start_block_timer(round_0, SystemTime::now());
        scheduler.start_round_timer(round_0, Duration::ZERO);
        scheduler.start_round_timer(round_1, Duration::from_secs(3600));

        let now = Instant::now() + Duration::from_millis(1);
        assert_eq!(
            scheduler.pop_expired(now),
            Some(TimerExpiry::BlockTimer(round_0))
        );
        assert_eq!(
            scheduler.pop_expired(now),
            Some(TimerExpiry::RoundTimer(round_0))
        );
        assert_eq!(scheduler.pop_expired(now), None);
        assert!(scheduler.next_deadline().is_some());
    }
}
