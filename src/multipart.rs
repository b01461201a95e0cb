//! Reassembly of statistics replies split over several messages.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::connection::ConnectionId;
use crate::interface::PortDescription;
use crate::ofp_header::Xid;
use crate::stats::{FlowStats, PortStats};

/// One multipart exchange per connection and transaction id.
pub type ExchangeKey = (ConnectionId, Xid);

struct Accumulator<T> {
    parts: Vec<T>,
    updated: Instant,
}

/// Collects the fragments of each exchange until the one without the "more" flag.
pub struct MultipartAggregator<T> {
    name: &'static str,
    pending: DashMap<ExchangeKey, Accumulator<T>>,
    // exchanges purged as stale; their late fragments are dropped
    purged: DashMap<ExchangeKey, Instant>,
}

impl<T> MultipartAggregator<T> {
    pub fn new(name: &'static str) -> MultipartAggregator<T> {
        MultipartAggregator { name, pending: DashMap::new(), purged: DashMap::new() }
    }

    /// Add one fragment. Returns the whole reply, in arrival order, once the final
    /// fragment is in. A final fragment with nothing before it is a reply of its own,
    /// unless its exchange was purged as stale.
    pub fn push(&self, key: ExchangeKey, items: Vec<T>, more: bool, now: Instant) -> Option<Vec<T>> {
        if self.purged.contains_key(&key) {
            if more {
                self.purged.insert(key, now);
            } else {
                self.purged.remove(&key);
            }
            debug!("Dropping late {} fragment on connection {} xid {}", self.name, key.0, key.1);
            return None;
        }
        if more {
            let mut acc = self
                .pending
                .entry(key)
                .or_insert_with(|| Accumulator { parts: vec![], updated: now });
            acc.parts.extend(items);
            acc.updated = now;
            trace!("{} reply {} xid {}: {} items so far", self.name, key.0, key.1, acc.parts.len());
            return None;
        }
        match self.pending.remove(&key) {
            Some((_, mut acc)) => {
                acc.parts.extend(items);
                Some(acc.parts)
            }
            None => Some(items),
        }
    }

    pub fn is_pending(&self, key: &ExchangeKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn was_purged(&self, key: &ExchangeKey) -> bool {
        self.purged.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every exchange of a closed connection.
    pub fn discard_connection(&self, id: ConnectionId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|&(conn, _), _| conn != id);
        self.purged.retain(|&(conn, _), _| conn != id);
        before.saturating_sub(self.pending.len())
    }

    /// Drop exchanges that saw no fragment for longer than `timeout`. Their late
    /// fragments are dropped until the final one arrives or another `timeout` passes.
    pub fn purge_stale(&self, now: Instant, timeout: Duration) -> Vec<ExchangeKey> {
        self.purged.retain(|_, since| now.saturating_duration_since(*since) <= timeout);
        let stale: Vec<ExchangeKey> = self
            .pending
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.value().updated) > timeout)
            .map(|entry| *entry.key())
            .collect();
        let mut purged = vec![];
        for key in stale {
            let removed = self
                .pending
                .remove_if(&key, |_, acc| now.saturating_duration_since(acc.updated) > timeout);
            if let Some((_, acc)) = removed {
                warn!("Discarding incomplete {} reply on connection {} xid {} ({} items)",
                      self.name, key.0, key.1, acc.parts.len());
                self.purged.insert(key, now);
                purged.push(key);
            }
        }
        purged
    }
}

/// The aggregators of every multipart reply type the controller reassembles.
pub struct MultipartExchanges {
    pub flow_stats: MultipartAggregator<FlowStats>,
    pub port_stats: MultipartAggregator<PortStats>,
    pub port_descs: MultipartAggregator<PortDescription>,
}

impl Default for MultipartExchanges {
    fn default() -> Self {
        MultipartExchanges {
            flow_stats: MultipartAggregator::new("flow stats"),
            port_stats: MultipartAggregator::new("port stats"),
            port_descs: MultipartAggregator::new("port description"),
        }
    }
}

impl MultipartExchanges {
    pub fn new() -> MultipartExchanges {
        MultipartExchanges::default()
    }

    pub fn discard_connection(&self, id: ConnectionId) -> usize {
        self.flow_stats.discard_connection(id)
            + self.port_stats.discard_connection(id)
            + self.port_descs.discard_connection(id)
    }

    pub fn purge_stale(&self, now: Instant, timeout: Duration) -> usize {
        self.flow_stats.purge_stale(now, timeout).len()
            + self.port_stats.purge_stale(now, timeout).len()
            + self.port_descs.purge_stale(now, timeout).len()
    }
}
