//! `SessionRegistry` (C11): the server's per-connection session table.
//!
//! Each worker owns its own connection state exclusively (§5); the
//! registry exists only so a background sweeper can observe `last_activity`
//! across connections and evict idle ones without reaching into worker-
//! local memory. Guarded by a single mutex, since the session set is small.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;
use std::time::SystemTime;

use sha2::Digest;
use sha2::Sha256;
use tokio::sync::Notify;

use crate::clock::Clock;
use crate::clock::SystemClock;

/// Idle threshold past which a session is evicted (§4.11, §8.8).
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

struct Entry {
    session_id: [u8; 32],
    authenticated: bool,
    current_repo: Option<String>,
    last_activity: Instant,
    evict: Arc<Notify>,
}

/// A worker's handle into its own registry entry, returned by
/// [`SessionRegistry::register`].
pub struct SessionHandle {
    pub conn_id: u64,
    pub evict: Arc<Notify>,
}

pub struct SessionRegistry {
    entries: Mutex<HashMap<u64, Entry>>,
    next_conn_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Builds a registry driven by a caller-supplied clock, so idle
    /// eviction can be exercised deterministically in tests by advancing
    /// a `FakeClock` instead of sleeping for real.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            clock,
        })
    }

    /// Registers a freshly accepted connection, pre-authentication.
    pub fn register(&self, peer_addr: &str) -> SessionHandle {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let evict = Arc::new(Notify::new());
        let mut entries_guard = self.entries.lock().expect("session registry mutex poisoned");
        entries_guard.insert(
            conn_id,
            Entry {
                session_id: deterministic_session_id(conn_id, peer_addr),
                authenticated: false,
                current_repo: None,
                last_activity: self.clock.now(),
                evict: evict.clone(),
            },
        );
        SessionHandle { conn_id, evict }
    }

    pub fn touch(&self, conn_id: u64) {
        if let Some(entry) = self.entries.lock().expect("session registry mutex poisoned").get_mut(&conn_id) {
            entry.last_activity = self.clock.now();
        }
    }

    pub fn authenticate(&self, conn_id: u64) -> [u8; 32] {
        let mut entries = self.entries.lock().expect("session registry mutex poisoned");
        let entry = entries.get_mut(&conn_id).expect("session must be registered");
        entry.authenticated = true;
        entry.session_id
    }

    pub fn is_authenticated(&self, conn_id: u64) -> bool {
        self.entries
            .lock()
            .expect("session registry mutex poisoned")
            .get(&conn_id)
            .is_some_and(|e| e.authenticated)
    }

    pub fn set_current_repo(&self, conn_id: u64, repo: Option<String>) {
        if let Some(entry) = self.entries.lock().expect("session registry mutex poisoned").get_mut(&conn_id) {
            entry.current_repo = repo;
        }
    }

    pub fn current_repo(&self, conn_id: u64) -> Option<String> {
        self.entries
            .lock()
            .expect("session registry mutex poisoned")
            .get(&conn_id)
            .and_then(|e| e.current_repo.clone())
    }

    pub fn remove(&self, conn_id: u64) {
        self.entries.lock().expect("session registry mutex poisoned").remove(&conn_id);
    }

    /// Evicts every session idle for at least `timeout`, notifying each
    /// worker through its `evict` handle so it can close its socket
    /// before any further dispatch (§8.8, S7).
    pub fn sweep(&self, timeout: Duration) {
        let mut entries = self.entries.lock().expect("session registry mutex poisoned");
        let now = self.clock.now();
        entries.retain(|_, entry| {
            let idle = now.duration_since(entry.last_activity) >= timeout;
            if idle {
                entry.evict.notify_one();
            }
            !idle
        });
    }
}

/// Deterministic hash of a monotonic connection counter and the peer's
/// socket identifier (§4.11) — not cryptographically meaningful, just
/// unique enough per connection to hand back as an opaque session id.
fn deterministic_session_id(conn_id: u64, peer_addr: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(conn_id.to_le_bytes());
    hasher.update(peer_addr.as_bytes());
    hasher.update(SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_nanos().to_le_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_authenticate_then_lookup() {
        let registry = SessionRegistry::new();
        let handle = registry.register("127.0.0.1:1");
        assert!(!registry.is_authenticated(handle.conn_id));
        registry.authenticate(handle.conn_id);
        assert!(registry.is_authenticated(handle.conn_id));
    }

    #[test]
    fn current_repo_round_trips() {
        let registry = SessionRegistry::new();
        let handle = registry.register("127.0.0.1:1");
        registry.set_current_repo(handle.conn_id, Some("demo".to_owned()));
        assert_eq!(registry.current_repo(handle.conn_id), Some("demo".to_owned()));
    }

    #[test]
    fn sweep_evicts_idle_sessions_and_notifies() {
        let clock = Arc::new(crate::clock::FakeClock::new());
        let registry = SessionRegistry::with_clock(clock.clone());
        let handle = registry.register("127.0.0.1:1");

        // not yet idle: the sweep leaves the session alone.
        registry.sweep(IDLE_TIMEOUT);
        assert!(registry.current_repo(handle.conn_id).is_none());
        assert!(!registry.is_authenticated(handle.conn_id));
        registry.authenticate(handle.conn_id);
        assert!(registry.is_authenticated(handle.conn_id));

        // advancing the fake clock past the timeout, with no real sleep,
        // makes the next sweep evict it.
        clock.advance(IDLE_TIMEOUT + Duration::from_secs(1));
        registry.sweep(IDLE_TIMEOUT);
        assert!(!registry.is_authenticated(handle.conn_id));
        assert_eq!(registry.current_repo(handle.conn_id), None);
    }

    #[test]
    fn remove_drops_the_entry() {
        let registry = SessionRegistry::new();
        let handle = registry.register("127.0.0.1:1");
        registry.remove(handle.conn_id);
        assert!(!registry.is_authenticated(handle.conn_id));
    }
}
