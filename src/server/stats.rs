//! Connection counters.

use http::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every connection task.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    connections_accepted: AtomicU64,
    requests_handled: AtomicU64,
    responses_2xx: AtomicU64,
    responses_4xx: AtomicU64,
    responses_5xx: AtomicU64,
    upgrades_succeeded: AtomicU64,
    upgrades_failed: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    messages_received: AtomicU64,
}

impl ConnectionStats {
    /// Record an accepted socket.
    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a parsed HTTP request.
    pub fn request_handled(&self) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a response by status class.
    pub fn response_sent(&self, status: StatusCode) {
        let counter = if status.is_success() {
            &self.responses_2xx
        } else if status.is_client_error() {
            &self.responses_4xx
        } else if status.is_server_error() {
            &self.responses_5xx
        } else {
            return;
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed WebSocket handshake.
    pub fn upgrade_succeeded(&self) {
        self.upgrades_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an aborted WebSocket handshake.
    pub fn upgrade_failed(&self) {
        self.upgrades_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session entering its read loop.
    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished session and the frames it dispatched.
    pub fn session_closed(&self, messages: u64) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
        self.messages_received
            .fetch_add(messages, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
            responses_2xx: self.responses_2xx.load(Ordering::Relaxed),
            responses_4xx: self.responses_4xx.load(Ordering::Relaxed),
            responses_5xx: self.responses_5xx.load(Ordering::Relaxed),
            upgrades_succeeded: self.upgrades_succeeded.load(Ordering::Relaxed),
            upgrades_failed: self.upgrades_failed.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Sockets accepted on any listener.
    pub connections_accepted: u64,
    /// HTTP requests parsed.
    pub requests_handled: u64,
    /// 2xx responses written.
    pub responses_2xx: u64,
    /// 4xx responses written.
    pub responses_4xx: u64,
    /// 5xx responses written.
    pub responses_5xx: u64,
    /// Handshakes completed.
    pub upgrades_succeeded: u64,
    /// Handshakes aborted.
    pub upgrades_failed: u64,
    /// Sessions started.
    pub sessions_opened: u64,
    /// Sessions finished.
    pub sessions_closed: u64,
    /// Frames dispatched by finished sessions.
    pub messages_received: u64,
}
