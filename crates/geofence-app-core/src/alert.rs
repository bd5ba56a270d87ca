// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Operator-facing alert queue with TTL + dedupe.
//!
//! Only validation problems are meant for the operator; network and feed
//! failures are logged and, at most, shown as low-key notes.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// What raised the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// A form was submitted with missing or invalid fields.
    Validation,
    /// A lookup or write failed in transit.
    Network,
    /// The live feed reported an error or desynced.
    Feed,
}

/// Identifier for an alert entry.
pub type AlertId = u64;

/// Alert stored in the queue.
#[derive(Debug, Clone)]
pub struct Alert {
    /// Stable identifier.
    pub id: AlertId,
    /// Origin of the alert.
    pub kind: AlertKind,
    /// One-line message.
    pub message: String,
    /// Time-to-live duration.
    pub ttl: Duration,
    /// Creation (or last refresh) time.
    pub raised: Instant,
}

impl Alert {
    fn live_at(&self, now: Instant) -> bool {
        now.duration_since(self.raised) < self.ttl
    }
}

/// Bounded in-memory alert queue.
pub struct AlertQueue {
    queue: VecDeque<Alert>,
    max: usize,
    dedupe_window: Duration,
    next_id: AlertId,
}

impl AlertQueue {
    /// Create a queue holding at most `max` alerts.
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Raise an alert; an identical one raised within the dedupe window is
    /// refreshed instead of duplicated.
    pub fn raise<M>(&mut self, kind: AlertKind, message: M, ttl: Duration, now: Instant) -> AlertId
    where
        M: Into<String>,
    {
        let message = message.into();
        if let Some(existing) = self.queue.iter_mut().find(|a| {
            a.kind == kind
                && a.message == message
                && now.duration_since(a.raised) <= self.dedupe_window
        }) {
            existing.raised = now;
            existing.ttl = ttl;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Alert {
            id,
            kind,
            message,
            ttl,
            raised: now,
        });
        id
    }

    /// Drop a specific alert (e.g. the form was fixed and resubmitted).
    pub fn dismiss(&mut self, id: AlertId) {
        self.queue.retain(|a| a.id != id);
    }

    /// Drop expired alerts (call once per tick).
    pub fn retain_live(&mut self, now: Instant) {
        self.queue.retain(|a| a.live_at(now));
    }

    /// Alerts still live at `now`, oldest first.
    pub fn live(&self, now: Instant) -> Vec<&Alert> {
        self.queue.iter().filter(|a| a.live_at(now)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_alerts_within_window_are_merged() {
        let mut q = AlertQueue::new(4);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(5);
        let a = q.raise(AlertKind::Validation, "fill in all fields", ttl, t0);
        let b = q.raise(
            AlertKind::Validation,
            "fill in all fields",
            ttl,
            t0 + Duration::from_millis(100),
        );
        assert_eq!(a, b);
        assert_eq!(q.live(t0 + Duration::from_millis(100)).len(), 1);
    }

    #[test]
    fn expired_alerts_are_dropped_and_queue_is_bounded() {
        let mut q = AlertQueue::new(2);
        let t0 = Instant::now();
        q.raise(AlertKind::Network, "one", Duration::from_secs(1), t0);
        q.raise(AlertKind::Network, "two", Duration::from_secs(10), t0);
        q.raise(AlertKind::Feed, "three", Duration::from_secs(10), t0);
        let live: Vec<_> = q.live(t0).iter().map(|a| a.message.clone()).collect();
        assert_eq!(live, vec!["two".to_string(), "three".to_string()]);

        q.retain_live(t0 + Duration::from_secs(11));
        assert!(q.live(t0 + Duration::from_secs(11)).is_empty());
    }

    #[test]
    fn dismiss_removes_by_id() {
        let mut q = AlertQueue::new(4);
        let t0 = Instant::now();
        let id = q.raise(AlertKind::Validation, "x", Duration::from_secs(5), t0);
        q.dismiss(id);
        assert!(q.live(t0).is_empty());
    }
}
