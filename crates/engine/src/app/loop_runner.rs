use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::sync::{PeerSyncChannel, StoreError, SyncHandle};
use crate::world::{ConfigError, Notify, WorldState};
use crate::StartupError;

use super::input::InputSnapshot;
use super::session_stats::{SessionStatsHandle, StatsWindow};

pub const POLLER_THREAD_NAME: &str = "peer-sync";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub stats_log_interval: Duration,
    pub run_for: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            stats_log_interval: Duration::from_secs(1),
            run_for: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("invalid world config: {0}")]
    Config(#[from] ConfigError),
    #[error("shared store failed: {0}")]
    Store(#[from] StoreError),
    #[error("failed to spawn {name} thread: {source}")]
    SpawnThread {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

/// The collaborator side of the loop: input, presentation and the notify
/// channel.
pub trait Host: Notify {
    fn sample_input(&mut self, world: &WorldState) -> InputSnapshot;

    /// Runs after every tick; scripted hosts drive respawns and trades here.
    fn after_tick(&mut self, _world: &mut WorldState) {}

    fn present(&mut self, world: &WorldState);

    fn should_quit(&self) -> bool {
        false
    }
}

pub fn run_app(
    config: LoopConfig,
    world: WorldState,
    sync: Option<PeerSyncChannel>,
    host: &mut dyn Host,
) -> Result<(), AppError> {
    run_app_with_stats(config, world, sync, host, SessionStatsHandle::default())
}

pub fn run_app_with_stats(
    config: LoopConfig,
    mut world: WorldState,
    sync: Option<PeerSyncChannel>,
    host: &mut dyn Host,
    stats: SessionStatsHandle,
) -> Result<(), AppError> {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let stats_log_interval =
        normalize_non_zero_duration(config.stats_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        stats_log_interval_ms = stats_log_interval.as_millis() as u64,
        run_for_ms = config.run_for.map(|limit| limit.as_millis() as u64),
        sync_enabled = sync.is_some(),
        "loop_config"
    );

    let poller = match sync {
        Some(channel) => {
            world.set_local_peer_id(channel.peer_id());
            Some(spawn_sync_poller(channel, world.local_peer_state())?)
        }
        None => None,
    };

    let started = Instant::now();
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = started;
    let mut stats_window = StatsWindow::open(started, stats_log_interval);
    let mut quit_reason = None;

    while quit_reason.is_none() {
        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
        accumulator = accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            let input = host.sample_input(&world);
            if let Some(poller) = &poller {
                for report in poller.handle.drain_reports() {
                    stats_window.peer_report_applied(&report);
                    world.queue_peer_report(report);
                }
            }

            world.tick(fixed_dt_seconds, &input);
            host.after_tick(&mut world);
            world.flush_notices(host);

            if let Some(poller) = &poller {
                poller.handle.publish_local(world.local_peer_state());
                for body in world.drain_outbox() {
                    poller.handle.queue_broadcast(body);
                }
            }
            stats_window.tick_ran();

            if input.quit_requested() {
                quit_reason = Some("quit_input");
                break;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        host.present(&world);
        stats_window.frame_presented(raw_frame_dt);

        if let Some(latest) = stats_window.close_if_due(now, world.chunks()) {
            stats.store(latest);
            info!(
                ticks_per_sec = latest.ticks_per_sec,
                frame_time_ms = latest.frame_time_ms,
                peer_polls_per_sec = latest.peer_polls_per_sec,
                remote_messages = latest.remote_messages,
                peers_online = latest.peers_online,
                chunks_loaded = latest.chunks_loaded,
                entities_loaded = latest.entities_loaded,
                "session_stats"
            );
        }

        if quit_reason.is_none() && host.should_quit() {
            quit_reason = Some("host");
        }
        if quit_reason.is_none()
            && config
                .run_for
                .is_some_and(|limit| started.elapsed() >= limit)
        {
            quit_reason = Some("run_duration_elapsed");
        }

        let frame_sleep = compute_frame_sleep(Instant::now().saturating_duration_since(now), fixed_dt);
        if quit_reason.is_none() && frame_sleep > Duration::ZERO {
            thread::sleep(frame_sleep);
        }
    }

    info!(reason = quit_reason.unwrap_or("unknown"), "shutdown_requested");
    if let Some(poller) = poller {
        poller.stop();
    }
    info!(ticks = world.tick_count(), "shutdown");
    Ok(())
}

struct SyncPoller {
    handle: SyncHandle,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl SyncPoller {
    fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.thread.join().is_err() {
            warn!("sync poller thread panicked");
        }
    }
}

fn spawn_sync_poller(
    mut channel: PeerSyncChannel,
    initial: crate::sync::LocalPeerState,
) -> Result<SyncPoller, AppError> {
    let handle = SyncHandle::default();
    handle.set_peer_id(channel.peer_id());
    handle.publish_local(initial);

    let stop = Arc::new(AtomicBool::new(false));
    let poll_interval = Duration::from_millis(channel.config().poll_interval_ms.max(1));
    let thread_handle = handle.clone();
    let thread_stop = Arc::clone(&stop);
    let thread = thread::Builder::new()
        .name(POLLER_THREAD_NAME.to_string())
        .spawn(move || {
            info!(
                peer_id = channel.peer_id(),
                poll_interval_ms = poll_interval.as_millis() as u64,
                "sync_poller_started"
            );
            while !thread_stop.load(Ordering::Relaxed) {
                if let Err(error) = channel.exchange(&thread_handle) {
                    warn!(error = %error, "peer_poll_failed");
                }
                thread::sleep(poll_interval);
            }
            if let Err(error) = channel.leave() {
                warn!(error = %error, "peer_leave_failed");
            }
        })
        .map_err(|source| AppError::SpawnThread {
            name: POLLER_THREAD_NAME,
            source,
        })?;

    Ok(SyncPoller {
        handle,
        stop,
        thread,
    })
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_frame_sleep(elapsed: Duration, frame_target: Duration) -> Duration {
    frame_target.saturating_sub(elapsed)
}
