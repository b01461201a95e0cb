//! Liveness probing of established connections.

use std::time::{Duration, Instant};

/// Payload of the Echo-Requests sent as probes.
pub const ECHO_PAYLOAD: &[u8] = b"ofcore";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Time between two probes.
    pub interval: Duration,
    /// How long a probe may go without any frame arriving.
    pub timeout: Duration,
}

/// What the keepalive task should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Send an Echo-Request now.
    Probe,
    /// Nothing due for this long.
    Wait(Duration),
    /// A probe went unanswered for the whole timeout.
    Expired,
}

/// Tracks probes and activity of one connection. Any incoming frame counts as an
/// answer, not only Echo-Replies.
#[derive(Debug, Clone)]
pub struct KeepaliveTracker {
    config: KeepaliveConfig,
    next_probe: Instant,
    /// First probe sent since the last activity.
    unanswered_since: Option<Instant>,
    last_activity: Instant,
    probes_sent: u64,
}

impl KeepaliveTracker {
    pub fn new(config: KeepaliveConfig, now: Instant) -> KeepaliveTracker {
        KeepaliveTracker {
            config,
            next_probe: now + config.interval,
            unanswered_since: None,
            last_activity: now,
            probes_sent: 0,
        }
    }

    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
        self.unanswered_since = None;
    }

    pub fn record_probe(&mut self, now: Instant) {
        self.probes_sent += 1;
        self.next_probe = now + self.config.interval;
        if self.unanswered_since.is_none() {
            self.unanswered_since = Some(now);
        }
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn probes_sent(&self) -> u64 {
        self.probes_sent
    }

    pub fn poll(&self, now: Instant) -> KeepaliveAction {
        let deadline = self.unanswered_since.map(|since| since + self.config.timeout);
        if let Some(deadline) = deadline {
            if now >= deadline {
                return KeepaliveAction::Expired;
            }
        }
        if now >= self.next_probe {
            return KeepaliveAction::Probe;
        }
        let wake = match deadline {
            Some(deadline) if deadline < self.next_probe => deadline,
            _ => self.next_probe,
        };
        KeepaliveAction::Wait(wake - now)
    }
}
