//! In-memory broadcast store
//!
//! Serves as the hosted relay behind the WebSocket endpoint and as the
//! transport for in-process sessions (bots, tests).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::sync::transport::{under_prefix, Change, ChangeKind, Subscription, Transport};

/// Last-write-wins key-value store with change fan-out
pub struct MemoryRelay {
    entries: RwLock<BTreeMap<String, Value>>,
    changes: broadcast::Sender<Change>,
    next_event: AtomicU64,
    /// session id -> keys removed when it disconnects
    disconnect_hooks: DashMap<String, Vec<String>>,
}

impl MemoryRelay {
    pub fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: RwLock::new(BTreeMap::new()),
            changes,
            next_event: AtomicU64::new(1),
            disconnect_hooks: DashMap::new(),
        }
    }

    /// Number of stored entries across all paths
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Entries stored under `prefix`
    pub fn count_under(&self, prefix: &str) -> usize {
        self.entries
            .read()
            .keys()
            .filter(|key| under_prefix(prefix, key))
            .count()
    }

    /// Snapshot of the entries under `prefix`, in key order
    pub fn entries_under(&self, prefix: &str) -> Vec<(String, Value)> {
        self.entries
            .read()
            .iter()
            .filter(|(key, _)| under_prefix(prefix, key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Sessions with registered disconnect cleanup
    pub fn session_count(&self) -> usize {
        self.disconnect_hooks.len()
    }

    /// Run a session's disconnect cleanup. Returns the number of keys removed.
    pub fn disconnect(&self, session_id: &str) -> usize {
        let Some((_, keys)) = self.disconnect_hooks.remove(session_id) else {
            return 0;
        };

        let mut removed = 0;
        for key in &keys {
            if self.remove_entry(key) {
                removed += 1;
            }
        }
        info!(session_id, removed, "Ran disconnect cleanup");
        removed
    }

    fn remove_entry(&self, key: &str) -> bool {
        let mut entries = self.entries.write();
        if entries.remove(key).is_none() {
            return false;
        }
        let _ = self.changes.send(Change {
            key: key.to_string(),
            kind: ChangeKind::Removed,
            value: None,
        });
        true
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl Transport for MemoryRelay {
    fn publish(&self, key: &str, value: Value) {
        let mut entries = self.entries.write();
        let kind = match entries.insert(key.to_string(), value.clone()) {
            Some(_) => ChangeKind::Changed,
            None => ChangeKind::Added,
        };
        // Sending under the write lock keeps fan-out in store order
        let _ = self.changes.send(Change {
            key: key.to_string(),
            kind,
            value: Some(value),
        });
    }

    fn remove(&self, key: &str) {
        self.remove_entry(key);
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn subscribe(&self, prefix: &str) -> Subscription {
        let entries = self.entries.read();
        let rx = self.changes.subscribe();
        let backlog = entries
            .iter()
            .filter(|(key, _)| under_prefix(prefix, key))
            .map(|(key, value)| Change {
                key: key.clone(),
                kind: ChangeKind::Added,
                value: Some(value.clone()),
            })
            .collect();
        debug!(prefix, "New subscription");
        Subscription::new(prefix, backlog, rx)
    }

    fn append_event(&self, stream: &str, value: Value) -> String {
        // Zero padded so ids sort in append order
        let event_id = format!("{:016}", self.next_event.fetch_add(1, Ordering::Relaxed));
        self.publish(&format!("{stream}/{event_id}"), value);
        event_id
    }

    fn delete_event(&self, stream: &str, event_id: &str) {
        self.remove_entry(&format!("{stream}/{event_id}"));
    }

    fn on_disconnect(&self, session_id: &str, key: &str) {
        let mut keys = self.disconnect_hooks.entry(session_id.to_string()).or_default();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }

    fn cancel_disconnect(&self, session_id: &str) {
        if self.disconnect_hooks.remove(session_id).is_some() {
            debug!(session_id, "Disconnect cleanup cancelled");
        }
    }
}
