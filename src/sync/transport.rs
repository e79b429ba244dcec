//! Broadcast key-value transport contract
//!
//! The transport is an opaque last-write-wins store: keyed entries under
//! path prefixes, append-only event streams, change notifications, and
//! cleanup hooks that fire when a session disconnects. Notifications are
//! queued per subscription and drained by the frame loop, so nothing in the
//! core runs inside a transport callback.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::warn;

/// Kind of change seen by a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// A change to one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Full path, e.g. `players/abc` or `hits/0000000000000042`
    pub key: String,
    pub kind: ChangeKind,
    /// Absent for removals
    pub value: Option<Value>,
}

impl Change {
    /// Last path segment (player id or event id)
    pub fn child_key(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Whether `key` lives directly or indirectly under `prefix`
pub fn under_prefix(prefix: &str, key: &str) -> bool {
    key.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

/// Operations the sync service needs from the hosted store
pub trait Transport: Send + Sync {
    /// Last-write-wins set
    fn publish(&self, key: &str, value: Value);

    /// Delete an entry; subscribers see a removal
    fn remove(&self, key: &str);

    /// Read one entry
    fn get(&self, key: &str) -> Option<Value>;

    /// Subscribe to everything under `prefix`. Existing entries are replayed as additions.
    fn subscribe(&self, prefix: &str) -> Subscription;

    /// Append to an ordered stream, returning the new event id
    fn append_event(&self, stream: &str, value: Value) -> String;

    /// Delete one event from a stream
    fn delete_event(&self, stream: &str, event_id: &str);

    /// Remove `key` when `session_id` disconnects, gracefully or not
    fn on_disconnect(&self, session_id: &str, key: &str);

    /// Drop every cleanup registered by `session_id` without running it
    fn cancel_disconnect(&self, session_id: &str);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn publish(&self, key: &str, value: Value) {
        (**self).publish(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }

    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn subscribe(&self, prefix: &str) -> Subscription {
        (**self).subscribe(prefix)
    }

    fn append_event(&self, stream: &str, value: Value) -> String {
        (**self).append_event(stream, value)
    }

    fn delete_event(&self, stream: &str, event_id: &str) {
        (**self).delete_event(stream, event_id)
    }

    fn on_disconnect(&self, session_id: &str, key: &str) {
        (**self).on_disconnect(session_id, key)
    }

    fn cancel_disconnect(&self, session_id: &str) {
        (**self).cancel_disconnect(session_id)
    }
}

/// Bounded queue of changes under one prefix.
///
/// Backed by a broadcast receiver; a subscriber that falls more than the
/// channel capacity behind loses the oldest changes and logs it.
pub struct Subscription {
    prefix: String,
    backlog: VecDeque<Change>,
    rx: broadcast::Receiver<Change>,
}

impl Subscription {
    pub fn new(prefix: &str, backlog: Vec<Change>, rx: broadcast::Receiver<Change>) -> Self {
        Self {
            prefix: prefix.to_string(),
            backlog: backlog.into(),
            rx,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Take every queued change without waiting
    pub fn drain(&mut self) -> Vec<Change> {
        let mut changes: Vec<Change> = self.backlog.drain(..).collect();

        loop {
            match self.rx.try_recv() {
                Ok(change) => {
                    if under_prefix(&self.prefix, &change.key) {
                        changes.push(change);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(prefix = %self.prefix, skipped, "Subscription lagged, changes lost");
                }
            }
        }

        changes
    }

    /// Wait for the next change. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Change> {
        if let Some(change) = self.backlog.pop_front() {
            return Some(change);
        }

        loop {
            match self.rx.recv().await {
                Ok(change) => {
                    if under_prefix(&self.prefix, &change.key) {
                        return Some(change);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(prefix = %self.prefix, skipped, "Subscription lagged, changes lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
