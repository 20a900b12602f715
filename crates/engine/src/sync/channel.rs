use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::record::{MessageBody, PeerMessage, PeerRecord};
use super::store::{validate_key, SharedStore, StoreError};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_STALE_THRESHOLD_MS: u64 = 5_000;
pub const DEFAULT_MAX_MESSAGES: usize = 10;
pub const DEFAULT_NAMESPACE: &str = "peers";
const MAX_PENDING_REPORTS: usize = 64;

static SYNC_HANDLE_POISON_WARNED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub poll_interval_ms: u64,
    pub stale_threshold_ms: u64,
    pub max_messages: usize,
    pub namespace: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            stale_threshold_ms: DEFAULT_STALE_THRESHOLD_MS,
            max_messages: DEFAULT_MAX_MESSAGES,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalPeerState {
    pub x: f32,
    pub y: f32,
    pub health: u32,
    pub max_health: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerView {
    pub peer_id: String,
    pub x: f32,
    pub y: f32,
    pub health: u32,
    pub max_health: u32,
    pub timestamp: u64,
}

/// Result of one poll: the complete fresh peer set plus anything new.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollReport {
    pub polled_at_ms: u64,
    pub peers: Vec<PeerView>,
    pub joined: Vec<String>,
    pub left: Vec<String>,
    pub messages: Vec<PeerMessage>,
    pub evicted_stale: usize,
}

pub struct PeerSyncChannel {
    peer_id: String,
    store: Box<dyn SharedStore>,
    clock: Box<dyn Clock>,
    config: SyncConfig,
    record: PeerRecord,
    known_peers: BTreeSet<String>,
    cursors: HashMap<String, SenderCursor>,
    next_seq: u64,
    started_at_ms: u64,
}

/// Last message consumed from one sender's queue.
#[derive(Debug, Clone, Copy, Default)]
struct SenderCursor {
    seq: u64,
    timestamp: u64,
}

impl SenderCursor {
    /// Unnumbered messages fall back to the timestamp.
    fn is_new(&self, message: &PeerMessage) -> bool {
        if message.seq > 0 {
            message.seq > self.seq
        } else {
            message.timestamp > self.timestamp
        }
    }

    fn advance(&mut self, message: &PeerMessage) {
        self.seq = self.seq.max(message.seq);
        self.timestamp = self.timestamp.max(message.timestamp);
    }
}

impl PeerSyncChannel {
    pub fn start(
        store: Box<dyn SharedStore>,
        clock: Box<dyn Clock>,
        config: SyncConfig,
    ) -> Result<Self, StoreError> {
        let peer_id = rand::thread_rng().gen_range(0..1_000_000u32).to_string();
        Self::start_with_peer_id(peer_id, store, clock, config)
    }

    pub fn start_with_peer_id(
        peer_id: String,
        store: Box<dyn SharedStore>,
        clock: Box<dyn Clock>,
        config: SyncConfig,
    ) -> Result<Self, StoreError> {
        validate_key(&peer_id)?;
        let started_at_ms = clock.now_ms();
        let mut channel = Self {
            peer_id,
            store,
            clock,
            config,
            record: PeerRecord::default(),
            known_peers: BTreeSet::new(),
            cursors: HashMap::new(),
            next_seq: 0,
            started_at_ms,
        };
        let evicted_stale = channel.evict_stale(started_at_ms)?;
        channel.refresh()?;
        info!(
            peer_id = channel.peer_id.as_str(),
            namespace = channel.config.namespace.as_str(),
            evicted_stale,
            "peer_sync_started"
        );
        Ok(channel)
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn heartbeat(&mut self, state: LocalPeerState) -> Result<(), StoreError> {
        self.record.x = state.x;
        self.record.y = state.y;
        self.record.health = state.health;
        self.record.max_health = state.max_health;
        self.refresh()
    }

    /// Rewrites the own record with a fresh timestamp.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.record.timestamp = self.clock.now_ms();
        self.write_own()
    }

    pub fn broadcast(&mut self, body: &MessageBody) -> Result<(), StoreError> {
        self.broadcast_all(std::slice::from_ref(body))
    }

    /// Queues every body and writes the own record once.
    pub fn broadcast_all(&mut self, bodies: &[MessageBody]) -> Result<(), StoreError> {
        let now_ms = self.clock.now_ms();
        let max_messages = self.config.max_messages.max(1);
        for body in bodies {
            self.next_seq = self.next_seq.saturating_add(1);
            let message =
                PeerMessage::new(body, now_ms, self.peer_id.clone()).with_seq(self.next_seq);
            self.record.push_message(message, max_messages);
        }
        self.record.timestamp = now_ms;
        self.write_own()
    }

    pub fn poll(&mut self) -> Result<PollReport, StoreError> {
        let now_ms = self.clock.now_ms();
        let entries = self.store.list()?;
        let mut report = PollReport {
            polled_at_ms: now_ms,
            ..PollReport::default()
        };
        let mut fresh = BTreeSet::new();

        for (key, bytes) in entries {
            if key == self.peer_id {
                continue;
            }
            let record = match PeerRecord::decode(&bytes) {
                Ok(record) => record,
                Err(error) => {
                    warn!(peer_id = key.as_str(), error = %error, "peer_record_malformed");
                    continue;
                }
            };
            if record.is_stale(now_ms, self.config.stale_threshold_ms) {
                self.remove_stale(&key, record.age_ms(now_ms));
                report.evicted_stale = report.evicted_stale.saturating_add(1);
                continue;
            }
            if record.age_ms(now_ms) >= self.config.stale_threshold_ms {
                continue;
            }

            // First sighting skips backlog queued before this channel started.
            let first_sighting = !self.cursors.contains_key(&key);
            let cursor = self.cursors.entry(key.clone()).or_default();
            let previous = *cursor;
            for message in &record.messages {
                let fresh_message = if first_sighting {
                    message.timestamp >= self.started_at_ms
                } else {
                    previous.is_new(message)
                };
                cursor.advance(message);
                if fresh_message && message.sender_id != self.peer_id {
                    report.messages.push(message.clone());
                }
            }

            if !self.known_peers.contains(&key) {
                report.joined.push(key.clone());
            }
            report.peers.push(PeerView {
                peer_id: key.clone(),
                x: record.x,
                y: record.y,
                health: record.health,
                max_health: record.max_health,
                timestamp: record.timestamp,
            });
            fresh.insert(key);
        }

        report.left = self.known_peers.difference(&fresh).cloned().collect();
        for peer_id in &report.left {
            self.cursors.remove(peer_id);
        }
        self.known_peers = fresh;
        report.messages.sort_by_key(|message| message.timestamp);

        debug!(
            peer_id = self.peer_id.as_str(),
            fresh = report.peers.len(),
            joined = report.joined.len(),
            left = report.left.len(),
            evicted_stale = report.evicted_stale,
            messages = report.messages.len(),
            "peer_poll"
        );
        Ok(report)
    }

    /// One poller cycle: push the latest local state and queued broadcasts,
    /// then poll and hand the report back to the simulation.
    pub fn exchange(&mut self, handle: &SyncHandle) -> Result<PollReport, StoreError> {
        let (local, outbox) = handle.take_outbound();
        match local {
            Some(state) => self.heartbeat(state)?,
            None => self.refresh()?,
        }
        if !outbox.is_empty() {
            self.broadcast_all(&outbox)?;
        }
        let report = self.poll()?;
        handle.push_report(report.clone());
        Ok(report)
    }

    /// Removes the own record so peers drop this instance without waiting
    /// for it to go stale.
    pub fn leave(self) -> Result<(), StoreError> {
        self.store.remove(&self.peer_id)?;
        info!(peer_id = self.peer_id.as_str(), "peer_sync_left");
        Ok(())
    }

    fn write_own(&self) -> Result<(), StoreError> {
        let bytes = self.record.encode().map_err(|source| StoreError::Encode {
            key: self.peer_id.clone(),
            source,
        })?;
        self.store.set(&self.peer_id, &bytes)
    }

    fn evict_stale(&self, now_ms: u64) -> Result<usize, StoreError> {
        let mut evicted = 0usize;
        for (key, bytes) in self.store.list()? {
            if key == self.peer_id {
                continue;
            }
            let Ok(record) = PeerRecord::decode(&bytes) else {
                continue;
            };
            if record.is_stale(now_ms, self.config.stale_threshold_ms) {
                self.remove_stale(&key, record.age_ms(now_ms));
                evicted = evicted.saturating_add(1);
            }
        }
        Ok(evicted)
    }

    fn remove_stale(&self, key: &str, age_ms: u64) {
        match self.store.remove(key) {
            Ok(()) => debug!(peer_id = key, age_ms, "stale_peer_evicted"),
            Err(error) => warn!(peer_id = key, error = %error, "stale_peer_evict_failed"),
        }
    }
}

#[derive(Debug, Default)]
struct SyncShared {
    peer_id: Option<String>,
    local: Option<LocalPeerState>,
    outbox: Vec<MessageBody>,
    reports: Vec<PollReport>,
}

/// Exchange point between the simulation thread and the sync poller.
#[derive(Debug, Clone, Default)]
pub struct SyncHandle {
    shared: Arc<Mutex<SyncShared>>,
}

impl SyncHandle {
    fn lock(&self) -> MutexGuard<'_, SyncShared> {
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                if SYNC_HANDLE_POISON_WARNED
                    .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    warn!("sync handle lock poisoned; recovered inner value");
                }
                poisoned.into_inner()
            }
        }
    }

    pub fn set_peer_id(&self, peer_id: &str) {
        self.lock().peer_id = Some(peer_id.to_string());
    }

    pub fn peer_id(&self) -> Option<String> {
        self.lock().peer_id.clone()
    }

    pub fn publish_local(&self, state: LocalPeerState) {
        self.lock().local = Some(state);
    }

    pub fn queue_broadcast(&self, body: MessageBody) {
        self.lock().outbox.push(body);
    }

    pub fn take_outbound(&self) -> (Option<LocalPeerState>, Vec<MessageBody>) {
        let mut shared = self.lock();
        let outbox = std::mem::take(&mut shared.outbox);
        (shared.local, outbox)
    }

    pub fn push_report(&self, report: PollReport) {
        let mut shared = self.lock();
        shared.reports.push(report);
        if shared.reports.len() > MAX_PENDING_REPORTS {
            let excess = shared.reports.len() - MAX_PENDING_REPORTS;
            shared.reports.drain(..excess);
            warn!(dropped = excess, "sync_reports_dropped");
        }
    }

    pub fn drain_reports(&self) -> Vec<PollReport> {
        std::mem::take(&mut self.lock().reports)
    }
}
