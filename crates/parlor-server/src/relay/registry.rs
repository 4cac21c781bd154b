//! The set of open relay connections.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use parlor_core::ConnectionId;

use super::connection::RelayConnection;

/// Concurrent map of connection id to connection.
///
/// Fan-out iterates a [`snapshot`](Self::snapshot), so the lock is never
/// held while frames are queued.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<RelayConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection. Returns `false` and keeps the existing entry if
    /// the id is already present.
    pub fn add(&self, conn: Arc<RelayConnection>) -> bool {
        let mut connections = self.connections.write();
        if connections.contains_key(&conn.id) {
            return false;
        }
        let _ = connections.insert(conn.id.clone(), conn);
        true
    }

    /// Insert a connection unless the registry already holds `limit`
    /// entries or the id is taken. The size check and the insert happen
    /// under one write lock.
    pub fn add_within(&self, conn: Arc<RelayConnection>, limit: usize) -> bool {
        let mut connections = self.connections.write();
        if connections.len() >= limit || connections.contains_key(&conn.id) {
            return false;
        }
        let _ = connections.insert(conn.id.clone(), conn);
        true
    }

    /// Remove a connection. Only one of several concurrent callers gets it.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<RelayConnection>> {
        self.connections.write().remove(id)
    }

    /// Look up a connection.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<RelayConnection>> {
        self.connections.read().get(id).cloned()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Point-in-time copy of the registered connections.
    pub fn snapshot(&self) -> Vec<Arc<RelayConnection>> {
        self.connections.read().values().cloned().collect()
    }

    /// Ids of the registered connections.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.read().keys().cloned().collect()
    }

    /// Remove and return every connection.
    pub fn drain(&self) -> Vec<Arc<RelayConnection>> {
        self.connections.write().drain().map(|(_, conn)| conn).collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn make_conn(id: &str) -> Arc<RelayConnection> {
        let (tx, _rx) = mpsc::channel(1);
        Arc::new(RelayConnection::new(
            ConnectionId::from_raw(id),
            tx,
            CancellationToken::new(),
        ))
    }

    #[test]
    fn add_and_remove() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.add(make_conn("a")));
        assert!(registry.add(make_conn("b")));
        assert_eq!(registry.len(), 2);

        let removed = registry.remove(&ConnectionId::from_raw("a")).unwrap();
        assert_eq!(removed.id.as_str(), "a");
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains(&ConnectionId::from_raw("a")));
    }

    #[test]
    fn duplicate_add_keeps_first() {
        let registry = ConnectionRegistry::new();
        let first = make_conn("a");
        assert!(registry.add(Arc::clone(&first)));
        assert!(!registry.add(make_conn("a")));
        assert_eq!(registry.len(), 1);
        let kept = registry.get(&ConnectionId::from_raw("a")).unwrap();
        assert!(Arc::ptr_eq(&kept, &first));
    }

    #[test]
    fn remove_missing_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.remove(&ConnectionId::from_raw("ghost")).is_none());
    }

    #[test]
    fn snapshot_is_detached_from_later_changes() {
        let registry = ConnectionRegistry::new();
        let _ = registry.add(make_conn("a"));
        let _ = registry.add(make_conn("b"));
        let snapshot = registry.snapshot();
        let _ = registry.remove(&ConnectionId::from_raw("a"));
        let _ = registry.add(make_conn("c"));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn drain_empties_registry() {
        let registry = ConnectionRegistry::new();
        let _ = registry.add(make_conn("a"));
        let _ = registry.add(make_conn("b"));
        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_remove_yields_one_winner() {
        let registry = Arc::new(ConnectionRegistry::new());
        let _ = registry.add(make_conn("a"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.remove(&ConnectionId::from_raw("a")).is_some())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_adds_and_snapshots() {
        let registry = Arc::new(ConnectionRegistry::new());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let _ = registry.add(make_conn(&format!("t{t}_{i}")));
                    }
                })
            })
            .collect();
        let reader = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let snapshot = registry.snapshot();
                    assert!(snapshot.len() <= 200);
                }
            })
        };
        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(registry.len(), 200);
        assert_eq!(registry.ids().len(), 200);
    }

    #[test]
    fn add_within_stops_at_limit() {
        let registry = ConnectionRegistry::new();
        assert!(registry.add_within(make_conn("a"), 2));
        assert!(!registry.add_within(make_conn("a"), 2));
        assert!(registry.add_within(make_conn("b"), 2));
        assert!(!registry.add_within(make_conn("c"), 2));
        assert_eq!(registry.len(), 2);

        let _ = registry.remove(&ConnectionId::from_raw("a"));
        assert!(registry.add_within(make_conn("c"), 2));
        assert!(!registry.add_within(make_conn("d"), 0));
    }

    #[test]
    fn concurrent_add_within_never_exceeds_limit() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.add_within(make_conn(&format!("c{i}")), 3))
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 3);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn snapshots_during_concurrent_add_and_remove_are_consistent() {
        const BASE: usize = 100;
        const ADDED: usize = 100;
        const REMOVED: usize = 50;

        let registry = Arc::new(ConnectionRegistry::new());
        for i in 0..BASE {
            assert!(registry.add(make_conn(&format!("base_{i}"))));
        }

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut taken = 0usize;
                while !done.load(Ordering::Acquire) || taken == 0 {
                    let snapshot = registry.snapshot();
                    let unique: HashSet<_> = snapshot.iter().map(|c| c.id.clone()).collect();
                    assert_eq!(unique.len(), snapshot.len(), "duplicate id in snapshot");
                    assert!(
                        (BASE - REMOVED..=BASE + ADDED).contains(&snapshot.len()),
                        "snapshot size {} outside mutation window",
                        snapshot.len()
                    );
                    // ids from before the window that are never removed
                    for i in REMOVED..BASE {
                        assert!(unique.contains(&ConnectionId::from_raw(format!("base_{i}"))));
                    }
                    taken += 1;
                }
                taken
            })
        };

        let adder = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 0..ADDED {
                    assert!(registry.add(make_conn(&format!("new_{i}"))));
                }
            })
        };
        let remover = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 0..REMOVED {
                    assert!(registry.remove(&ConnectionId::from_raw(format!("base_{i}"))).is_some());
                }
            })
        };

        adder.join().unwrap();
        remover.join().unwrap();
        done.store(true, Ordering::Release);
        assert!(reader.join().unwrap() > 0);

        assert_eq!(registry.len(), BASE - REMOVED + ADDED);
        let ids: HashSet<_> = registry.ids().into_iter().collect();
        assert_eq!(ids.len(), BASE - REMOVED + ADDED);
        assert!(!ids.contains(&ConnectionId::from_raw("base_0")));
        assert!(ids.contains(&ConnectionId::from_raw("new_0")));
    }
}
