use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::sync::PollReport;
use crate::world::ChunkStore;

static STATS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

/// Rates and world population over the last closed stats window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub ticks_per_sec: f32,
    pub frame_time_ms: f32,
    pub peer_polls_per_sec: f32,
    pub remote_messages: usize,
    pub peers_online: usize,
    pub chunks_loaded: usize,
    pub entities_loaded: usize,
}

/// Read side for whoever displays the stats; the loop is the only writer.
#[derive(Clone, Debug, Default)]
pub struct SessionStatsHandle {
    latest: Arc<RwLock<SessionStats>>,
}

impl SessionStatsHandle {
    pub fn latest(&self) -> SessionStats {
        match self.latest.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_poisoned("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn store(&self, stats: SessionStats) {
        match self.latest.write() {
            Ok(mut guard) => *guard = stats,
            Err(poisoned) => {
                warn_poisoned("write");
                *poisoned.into_inner() = stats;
            }
        }
    }
}

fn warn_poisoned(operation: &'static str) {
    if STATS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "session stats lock poisoned; recovered inner value");
    }
}

/// Counts loop activity until `span` has elapsed, then closes into a
/// [`SessionStats`] and starts over. `peers_online` carries across windows.
#[derive(Debug)]
pub(crate) struct StatsWindow {
    opened_at: Instant,
    span: Duration,
    frames: u32,
    frame_time_total: Duration,
    ticks: u32,
    peer_polls: u32,
    remote_messages: usize,
    peers_online: usize,
}

impl StatsWindow {
    pub(crate) fn open(opened_at: Instant, span: Duration) -> Self {
        Self {
            opened_at,
            span,
            frames: 0,
            frame_time_total: Duration::ZERO,
            ticks: 0,
            peer_polls: 0,
            remote_messages: 0,
            peers_online: 0,
        }
    }

    pub(crate) fn frame_presented(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_total = self.frame_time_total.saturating_add(frame_dt);
    }

    pub(crate) fn tick_ran(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    pub(crate) fn peer_report_applied(&mut self, report: &PollReport) {
        self.peer_polls = self.peer_polls.saturating_add(1);
        self.remote_messages = self.remote_messages.saturating_add(report.messages.len());
        self.peers_online = report.peers.len();
    }

    pub(crate) fn close_if_due(
        &mut self,
        now: Instant,
        chunks: &ChunkStore,
    ) -> Option<SessionStats> {
        let elapsed = now.saturating_duration_since(self.opened_at);
        if elapsed < self.span {
            return None;
        }

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match self.frames {
            0 => 0.0,
            frames => self.frame_time_total.as_secs_f32() * 1000.0 / frames as f32,
        };
        let stats = SessionStats {
            ticks_per_sec: self.ticks as f32 / seconds,
            frame_time_ms,
            peer_polls_per_sec: self.peer_polls as f32 / seconds,
            remote_messages: self.remote_messages,
            peers_online: self.peers_online,
            chunks_loaded: chunks.len(),
            entities_loaded: chunks.chunks().map(|chunk| chunk.entity_count()).sum(),
        };

        *self = Self {
            peers_online: self.peers_online,
            ..Self::open(now, self.span)
        };
        Some(stats)
    }
}
