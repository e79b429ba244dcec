//! WebSocket protocol message definitions
//! These are the wire types between remote clients and the relay

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::transport::Change;

/// Messages sent from client to relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Last-write-wins set of one entry
    Publish { key: String, value: Value },

    /// Delete one entry
    Remove { key: String },

    /// Stream every change under a path prefix, starting with what exists now
    Subscribe { prefix: String },

    /// Append to an event stream
    Append { stream: String, value: Value },

    /// Delete one event from a stream
    DeleteEvent { stream: String, event_id: String },

    /// Remove `key` when this connection closes
    OnDisconnect { key: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from relay to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { session_id: String, server_time: u64 },

    /// A change under a subscribed prefix
    Change { prefix: String, change: Change },

    /// Id assigned to an appended event
    Appended { stream: String, event_id: String },

    /// Request rejected
    Error { code: String, message: String },

    /// Pong response to ping
    Pong { t: u64 },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Keys and prefixes are `/`-separated paths with no empty segments
pub fn is_valid_path(path: &str) -> bool {
    !path.is_empty() && path.len() <= 256 && path.split('/').all(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::transport::ChangeKind;

    #[test]
    fn client_messages_are_tagged() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"delete_event","stream":"hits","event_id":"0000000000000003"}"#)
                .unwrap();
        assert!(matches!(msg, ClientMsg::DeleteEvent { ref stream, .. } if stream == "hits"));
    }

    #[test]
    fn change_messages_carry_kind() {
        let msg = ServerMsg::Change {
            prefix: "players".into(),
            change: Change {
                key: "players/a".into(),
                kind: ChangeKind::Removed,
                value: None,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "change");
        assert_eq!(json["change"]["kind"], "removed");
    }

    #[test]
    fn path_validation() {
        assert!(is_valid_path("players/abc"));
        assert!(is_valid_path("hits"));
        assert!(!is_valid_path(""));
        assert!(!is_valid_path("players/"));
        assert!(!is_valid_path("/players"));
        assert!(!is_valid_path("a//b"));
    }
}
