//! Server-side session registry (§4.2).
//!
//! A single mutex guards both the session map and the outbound sequence
//! counter, so that allocating a reply sequence number is part of the same
//! critical section as the record mutation that produced it. Per-session
//! ordering still comes from sharding packets by `session_id mod N` before
//! they ever reach a worker (§4.4) — this lock only protects the shared
//! map itself, which is touched by every shard and by the cleaner.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use parking_lot::Mutex;

/// One active peer's server-side session state (§3).
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub address: SocketAddr,
    pub expected_seq: u32,
    pub last_seen: Instant,
    pub logical_clock: u64,
    pub total_latency_ns: u128,
    pub packet_count: u64,
}

impl SessionRecord {
    fn new(address: SocketAddr, logical_clock: u64) -> Self {
        SessionRecord {
            address,
            expected_seq: 1,
            last_seen: Instant::now(),
            logical_clock,
            total_latency_ns: 0,
            packet_count: 0,
        }
    }

    /// Record a one-way latency sample (§4.4); ignored if `sent_ns` is 0
    /// (the sender did not stamp a timestamp, or it predates the epoch).
    pub fn record_latency(&mut self, sent_ns: u64, received_ns: u128) {
        if sent_ns == 0 {
            return;
        }
        let sent_ns = sent_ns as u128;
        if received_ns >= sent_ns {
            self.total_latency_ns += received_ns - sent_ns;
            self.packet_count += 1;
        }
    }
}

struct Inner {
    sessions: HashMap<u32, SessionRecord>,
    server_seq_num: u32,
}

/// Thread-safe registry of active server sessions plus the shared outbound
/// sequence counter (§3, §4.2).
///
/// Cheaply `Clone`-able (an `Arc` underneath) so the receiver, every worker
/// shard, and the cleaner can each hold their own handle.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            inner: std::sync::Arc::new(Mutex::new(Inner {
                sessions: HashMap::new(),
                server_seq_num: 0,
            })),
        }
    }

    /// Create a new session record for `session_id`, replacing any existing
    /// one (callers are expected to have already checked `get`).
    pub fn insert(&self, session_id: u32, address: SocketAddr, logical_clock: u64) {
        let mut inner = self.inner.lock();
        inner
            .sessions
            .insert(session_id, SessionRecord::new(address, logical_clock));
    }

    /// Run `f` against the session record for `session_id`, if present,
    /// while holding the registry lock.
    pub fn with_session<R>(&self, session_id: u32, f: impl FnOnce(&mut SessionRecord) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        inner.sessions.get_mut(&session_id).map(f)
    }

    /// Whether a session currently exists for `session_id`.
    pub fn contains(&self, session_id: u32) -> bool {
        self.inner.lock().sessions.contains_key(&session_id)
    }

    /// Remove and return the session record for `session_id`, if any.
    pub fn remove(&self, session_id: u32) -> Option<SessionRecord> {
        self.inner.lock().sessions.remove(&session_id)
    }

    /// Allocate the next outbound sequence number for a server-sent packet.
    pub fn next_server_seq(&self) -> u32 {
        let mut inner = self.inner.lock();
        let seq = inner.server_seq_num;
        inner.server_seq_num += 1;
        seq
    }

    /// Snapshot of `(session_id, address)` for every active session, used by
    /// the cleaner sweep and by shutdown's GOODBYE broadcast.
    pub fn snapshot_addresses(&self) -> Vec<(u32, SocketAddr)> {
        self.inner
            .lock()
            .sessions
            .iter()
            .map(|(sid, record)| (*sid, record.address))
            .collect()
    }

    /// Remove every session whose `last_seen` is older than `idle_timeout`,
    /// returning their `(session_id, address)` pairs for GOODBYE delivery.
    pub fn sweep_expired(&self, idle_timeout: std::time::Duration) -> Vec<(u32, SocketAddr)> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let expired: Vec<u32> = inner
            .sessions
            .iter()
            .filter(|(_, record)| now.duration_since(record.last_seen) > idle_timeout)
            .map(|(sid, _)| *sid)
            .collect();

        expired
            .into_iter()
            .filter_map(|sid| inner.sessions.remove(&sid).map(|record| (sid, record.address)))
            .collect()
    }

    /// Number of active sessions (diagnostics only).
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
