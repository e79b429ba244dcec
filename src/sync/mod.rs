//! Peer state synchronization over the broadcast store

pub mod protocol;
pub mod service;
pub mod transport;

pub use service::{InboundEvent, PlayerRecord, SyncConfig, SyncService};
pub use transport::{Change, ChangeKind, Subscription, Transport};
