//! Per-client sync service
//!
//! Publishes the local pose, appends fire/hit/kill events, and folds the
//! changes it receives into a table of remote players plus a bounded queue
//! of inbound events for the frame loop to drain.

use std::collections::{HashMap, VecDeque};

use glam::Vec3;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::protocol::{
    decode, encode, player_key, BulletFired, HitReported, KillReported, PoseUpdate, Validate,
    BULLETS_STREAM, HITS_STREAM, KILLS_STREAM, PLAYERS_PATH,
};
use super::transport::{Change, ChangeKind, Subscription, Transport};
use crate::game::flight::Pose;
use crate::game::projectile::ProjectileKind;

/// Sync tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote players silent for longer than this are evicted
    pub staleness_window_ms: u64,
    /// Events older than this are deleted from the store by every client
    /// that saw them
    pub event_ttl_ms: u64,
    /// Inbound events kept before the oldest are dropped
    pub max_inbound_events: usize,
    /// Broadcast capacity of the in-memory relay
    pub relay_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            staleness_window_ms: 10_000,
            event_ttl_ms: 10_000,
            max_inbound_events: 256,
            relay_capacity: 4096,
        }
    }
}

/// Last known state of another client
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: String,
    pub position: Vec3,
    pub heading: f32,
    pub pitch: f32,
    pub bank: f32,
    pub health: f32,
    pub last_update: u64,
}

impl PlayerRecord {
    fn from_update(id: &str, update: PoseUpdate) -> Self {
        Self {
            id: id.to_string(),
            position: update.position,
            heading: update.heading,
            pitch: update.pitch,
            bank: update.bank,
            health: update.health,
            last_update: update.timestamp,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }
}

/// Event delivered to the frame loop
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    BulletFired(BulletFired),
    HitReported(HitReported),
    KillReported(KillReported),
}

/// Event record awaiting deletion once it ages past the TTL
#[derive(Debug, Clone)]
struct SeenEvent {
    stream: &'static str,
    event_id: String,
    timestamp: u64,
}

pub struct SyncService<T: Transport> {
    transport: T,
    config: SyncConfig,
    session_id: String,
    session_start: u64,
    players: HashMap<String, PlayerRecord>,
    poses: Subscription,
    bullets: Subscription,
    hits: Subscription,
    kills: Subscription,
    inbound: VecDeque<InboundEvent>,
    seen_events: VecDeque<SeenEvent>,
}

impl<T: Transport> SyncService<T> {
    /// Subscribe to every shared path and register the disconnect cleanup
    /// for this session's pose record.
    pub fn connect(transport: T, session_id: impl Into<String>, now: u64, config: SyncConfig) -> Self {
        let session_id = session_id.into();

        let poses = transport.subscribe(PLAYERS_PATH);
        let bullets = transport.subscribe(BULLETS_STREAM);
        let hits = transport.subscribe(HITS_STREAM);
        let kills = transport.subscribe(KILLS_STREAM);
        transport.on_disconnect(&session_id, &player_key(&session_id));

        info!(
            session_id = %session_id,
            started_at = %chrono::DateTime::from_timestamp_millis(now as i64).unwrap_or_default(),
            "Sync session connected"
        );

        Self {
            transport,
            config,
            session_id,
            session_start: now,
            players: HashMap::new(),
            poses,
            bullets,
            hits,
            kills,
            inbound: VecDeque::new(),
            seen_events: VecDeque::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_start(&self) -> u64 {
        self.session_start
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Overwrite this client's pose record
    pub fn publish_pose(&self, pose: &Pose, bank: f32, health: f32, now: u64) {
        let update = PoseUpdate {
            position: pose.position,
            heading: pose.heading(),
            pitch: pose.pitch(),
            bank,
            health,
            timestamp: now,
        };
        match encode(&update) {
            Ok(value) => self.transport.publish(&player_key(&self.session_id), value),
            Err(e) => warn!(error = %e, "Failed to encode pose"),
        }
    }

    /// Announce a locally fired projectile
    pub fn announce_fire(&self, origin: &Pose, kind: ProjectileKind, now: u64) {
        let event = BulletFired {
            shooter_id: self.session_id.clone(),
            kind,
            position: origin.position,
            rotation: origin.rotation(),
            timestamp: now,
        };
        self.append(BULLETS_STREAM, &event);
    }

    /// Claim a hit scored by a local projectile
    pub fn report_hit(&self, victim_id: &str, kind: ProjectileKind, damage: f32, now: u64) {
        let event = HitReported {
            shooter_id: self.session_id.clone(),
            victim_id: victim_id.to_string(),
            kind,
            damage,
            timestamp: now,
        };
        self.append(HITS_STREAM, &event);
    }

    /// Confirm that `killer_id` emptied this client's health
    pub fn report_kill(&self, killer_id: &str, now: u64) {
        let event = KillReported {
            killer_id: killer_id.to_string(),
            victim_id: self.session_id.clone(),
            timestamp: now,
        };
        self.append(KILLS_STREAM, &event);
    }

    fn append<R: Serialize>(&self, stream: &str, record: &R) {
        match encode(record) {
            Ok(value) => {
                let event_id = self.transport.append_event(stream, value);
                debug!(stream, event_id = %event_id, "Event appended");
            }
            Err(e) => warn!(stream, error = %e, "Failed to encode event"),
        }
    }

    /// Fold every queued change into local state
    pub fn poll(&mut self, now: u64) {
        for change in self.poses.drain() {
            self.apply_pose_change(change, now);
        }

        for change in self.bullets.drain() {
            if let Some(event) = self.accept_event::<BulletFired>(BULLETS_STREAM, &change, now, |e| e.timestamp) {
                if event.shooter_id != self.session_id {
                    self.push_inbound(InboundEvent::BulletFired(event));
                }
            }
        }

        for change in self.hits.drain() {
            if let Some(event) = self.accept_event::<HitReported>(HITS_STREAM, &change, now, |e| e.timestamp) {
                self.push_inbound(InboundEvent::HitReported(event));
            }
        }

        for change in self.kills.drain() {
            if let Some(event) = self.accept_event::<KillReported>(KILLS_STREAM, &change, now, |e| e.timestamp) {
                self.push_inbound(InboundEvent::KillReported(event));
            }
        }

        self.expire_events(now);
    }

    /// Take all queued inbound events in arrival order
    pub fn drain_events(&mut self) -> Vec<InboundEvent> {
        self.inbound.drain(..).collect()
    }

    /// Remote players, after evicting the stale ones from both the local
    /// table and the store.
    pub fn remote_players(&mut self, now: u64) -> impl Iterator<Item = &PlayerRecord> + '_ {
        self.evict_stale(now);
        self.players.values()
    }

    pub fn player(&self, id: &str) -> Option<&PlayerRecord> {
        self.players.get(id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Graceful leave: stop listening, delete this client's pose record and
    /// drop its disconnect cleanup
    pub fn shutdown(self) {
        let Self {
            transport,
            session_id,
            poses,
            bullets,
            hits,
            kills,
            ..
        } = self;
        drop((poses, bullets, hits, kills));
        transport.remove(&player_key(&session_id));
        transport.cancel_disconnect(&session_id);
        info!(session_id = %session_id, "Sync session closed");
    }

    fn apply_pose_change(&mut self, change: Change, now: u64) {
        let id = change.child_key().to_string();
        if id == self.session_id {
            return;
        }

        match change.kind {
            ChangeKind::Removed => {
                if self.players.remove(&id).is_some() {
                    debug!(player_id = %id, "Remote player left");
                }
            }
            ChangeKind::Added | ChangeKind::Changed => {
                let Some(value) = change.value.as_ref() else {
                    return;
                };
                let update: PoseUpdate = match decode(value) {
                    Ok(update) => update,
                    Err(e) => {
                        debug!(player_id = %id, error = %e, "Dropping invalid pose record");
                        return;
                    }
                };

                if self.is_stale(update.timestamp, now) {
                    debug!(player_id = %id, "Evicting abandoned pose record");
                    self.players.remove(&id);
                    self.transport.remove(&change.key);
                    return;
                }

                if let Some(existing) = self.players.get(&id) {
                    if update.timestamp < existing.last_update {
                        return;
                    }
                }

                if !self.players.contains_key(&id) {
                    debug!(player_id = %id, "Remote player joined");
                }
                self.players.insert(id.clone(), PlayerRecord::from_update(&id, update));
            }
        }
    }

    /// Decode an event addition, deleting it from the store when expired and
    /// skipping anything that predates this session. Fresh records are
    /// remembered so `expire_events` can delete them later.
    fn accept_event<R: DeserializeOwned + Validate>(
        &mut self,
        stream: &'static str,
        change: &Change,
        now: u64,
        timestamp: impl Fn(&R) -> u64,
    ) -> Option<R> {
        if change.kind != ChangeKind::Added {
            return None;
        }
        let value = change.value.as_ref()?;
        let event: R = match decode(value) {
            Ok(event) => event,
            Err(e) => {
                debug!(stream, error = %e, "Dropping invalid event");
                return None;
            }
        };

        let at = timestamp(&event);
        if now.saturating_sub(at) > self.config.event_ttl_ms {
            self.transport.delete_event(stream, change.child_key());
        } else {
            self.seen_events.push_back(SeenEvent {
                stream,
                event_id: change.child_key().to_string(),
                timestamp: at,
            });
        }
        if at < self.session_start {
            return None;
        }
        Some(event)
    }

    /// Delete every remembered event record older than the TTL
    fn expire_events(&mut self, now: u64) {
        let ttl = self.config.event_ttl_ms;
        let transport = &self.transport;
        let before = self.seen_events.len();

        self.seen_events.retain(|seen| {
            let expired = now.saturating_sub(seen.timestamp) > ttl;
            if expired {
                transport.delete_event(seen.stream, &seen.event_id);
            }
            !expired
        });

        let deleted = before - self.seen_events.len();
        if deleted > 0 {
            debug!(session_id = %self.session_id, deleted, "Expired event records deleted");
        }
    }

    fn push_inbound(&mut self, event: InboundEvent) {
        if self.inbound.len() >= self.config.max_inbound_events {
            self.inbound.pop_front();
            warn!(
                session_id = %self.session_id,
                capacity = self.config.max_inbound_events,
                "Inbound event queue full, dropping oldest"
            );
        }
        self.inbound.push_back(event);
    }

    fn is_stale(&self, last_update: u64, now: u64) -> bool {
        now.saturating_sub(last_update) > self.config.staleness_window_ms
    }

    fn evict_stale(&mut self, now: u64) {
        let window = self.config.staleness_window_ms;
        let stale: Vec<String> = self
            .players
            .values()
            .filter(|p| now.saturating_sub(p.last_update) > window)
            .map(|p| p.id.clone())
            .collect();

        for id in stale {
            self.players.remove(&id);
            self.transport.remove(&player_key(&id));
            info!(player_id = %id, "Evicted stale remote player");
        }
    }
}
