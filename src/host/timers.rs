// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Timer queue behind `set_timeout` / `clear_timeout`.
//!
//! Scheduling returns a token immediately; the run loop later pops due
//! entries and invokes their closures as fresh top-level entries. Cancelling
//! is idempotent: an unknown, fired or already cancelled token is a no-op.
//! Each queued timer holds one closure reference, which the caller takes on
//! schedule and gives back on fire or cancel.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::time::Instant;

use crate::bridge::closure::ClosureId;

/// Cancellation token handed to the module. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTimer {
    pub token: TimerToken,
    pub closure: ClosureId,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    queue: BTreeMap<(Instant, u64), DueTimer>,
    by_token: HashMap<TimerToken, (Instant, u64)>,
    next_token: u32,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, closure: ClosureId, delay: Duration, now: Instant) -> TimerToken {
        self.next_token = self.next_token.checked_add(1).unwrap_or(1);
        let token = TimerToken(self.next_token);
        self.seq += 1;
        let key = (now + delay, self.seq);
        self.queue.insert(key, DueTimer { token, closure });
        self.by_token.insert(token, key);
        token
    }

    /// Removes a pending timer, returning the closure whose reference the
    /// caller must release. `None` for tokens that are not pending.
    pub fn cancel(&mut self, token: TimerToken) -> Option<ClosureId> {
        let key = self.by_token.remove(&token)?;
        self.queue.remove(&key).map(|due| due.closure)
    }

    /// Pops every timer due at `now`, earliest first; ties keep scheduling order.
    pub fn pop_due(&mut self, now: Instant) -> Vec<DueTimer> {
        let mut due = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let timer = entry.remove();
            self.by_token.remove(&timer.token);
            due.push(timer);
        }
        due
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(at, _)| *at)
    }

    /// Removes every pending timer.
    pub fn drain(&mut self) -> Vec<DueTimer> {
        self.by_token.clear();
        std::mem::take(&mut self.queue).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_timers_pop_in_deadline_order() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        let late = q.schedule(ClosureId(1), Duration::from_millis(50), now);
        let early = q.schedule(ClosureId(2), Duration::from_millis(10), now);
        let tie = q.schedule(ClosureId(3), Duration::from_millis(10), now);

        assert_eq!(q.next_deadline(), Some(now + Duration::from_millis(10)));
        assert!(q.pop_due(now).is_empty());

        let due = q.pop_due(now + Duration::from_millis(20));
        let tokens: Vec<TimerToken> = due.iter().map(|d| d.token).collect();
        assert_eq!(tokens, vec![early, tie]);

        let rest = q.pop_due(now + Duration::from_secs(1));
        assert_eq!(rest[0].token, late);
        assert!(q.is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        let token = q.schedule(ClosureId(7), Duration::from_millis(5), now);

        assert_eq!(q.cancel(token), Some(ClosureId(7)));
        assert_eq!(q.cancel(token), None);
        assert_eq!(q.cancel(TimerToken(999)), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        let token = q.schedule(ClosureId(1), Duration::ZERO, now);
        assert_eq!(q.pop_due(now).len(), 1);
        assert_eq!(q.cancel(token), None);
    }

    #[test]
    fn test_tokens_are_unique_and_nonzero() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        let a = q.schedule(ClosureId(1), Duration::ZERO, now);
        let b = q.schedule(ClosureId(1), Duration::ZERO, now);
        assert_ne!(a, b);
        assert_ne!(a.0, 0);
        assert_eq!(q.drain().len(), 2);
        assert_eq!(q.next_deadline(), None);
    }
}
