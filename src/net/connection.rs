//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track each connection through the handling pipeline
//! - Count in-flight connections for best-effort drain on shutdown

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough; only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a client connection is in the handling pipeline.
///
/// ```text
/// Accepted → Parsing → Blocked    ─┐
///                    → CacheHit   ─┼→ Responding → Closed
///                    → Forwarding ─┘
///            Parsing → Closed   (malformed: nothing is sent)
/// Accepted → Closed              (client sent nothing)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Parsing,
    Blocked,
    CacheHit,
    Forwarding,
    Responding,
    Closed,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Accepted, Parsing)
                | (Accepted, Closed)
                | (Parsing, Blocked)
                | (Parsing, CacheHit)
                | (Parsing, Forwarding)
                | (Parsing, Closed)
                | (Blocked, Responding)
                | (CacheHit, Responding)
                | (Forwarding, Responding)
                | (Responding, Closed)
        )
    }
}

/// Per-connection bookkeeping owned by a single handler.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    state: ConnectionState,
}

impl Connection {
    pub fn new(id: ConnectionId, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            state: ConnectionState::Accepted,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`. An illegal transition is logged and still applied so
    /// the connection always reaches `Closed`.
    pub fn advance(&mut self, next: ConnectionState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(connection_id = %self.id, from = ?self.state, to = ?next, "Unexpected connection transition");
        } else {
            tracing::trace!(connection_id = %self.id, from = ?self.state, to = ?next, "Connection transition");
        }
        self.state = next;
    }
}

/// Tracks active connections for drain on shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(active);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until no connection is active, or `limit` elapses.
    /// Returns true if everything drained.
    pub async fn wait_for_drain(&self, limit: Duration) -> bool {
        let drained = tokio::time::timeout(limit, async {
            while self.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        drained.is_ok()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_active_connections(active);
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(guard1.id(), guard2.id());

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);
        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn drain_waits_for_guards() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();
        assert!(!tracker.wait_for_drain(Duration::from_millis(100)).await);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });
        assert!(tracker.wait_for_drain(Duration::from_secs(2)).await);
    }

    #[test]
    fn pipeline_transitions() {
        use ConnectionState::*;
        assert!(Accepted.can_advance_to(Parsing));
        assert!(Parsing.can_advance_to(Closed));
        assert!(Parsing.can_advance_to(CacheHit));
        assert!(Forwarding.can_advance_to(Responding));
        assert!(!Parsing.can_advance_to(Responding));
        assert!(!Blocked.can_advance_to(Forwarding));
        assert!(!CacheHit.can_advance_to(Forwarding));
        assert!(!Blocked.can_advance_to(Closed));
        assert!(!Closed.can_advance_to(Closed));
    }

    #[test]
    fn connection_walks_to_closed() {
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let mut conn = Connection::new(ConnectionId::new(), peer);
        assert_eq!(conn.state(), ConnectionState::Accepted);
        for next in [
            ConnectionState::Parsing,
            ConnectionState::Blocked,
            ConnectionState::Responding,
            ConnectionState::Closed,
        ] {
            conn.advance(next);
        }
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.peer(), peer);
    }
}
