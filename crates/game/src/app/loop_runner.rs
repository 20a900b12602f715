use std::process::ExitCode;

use hollow_engine::sync::{FileStore, PeerSyncChannel, SystemClock};
use hollow_engine::world::WorldState;
use hollow_engine::{run_app, AppError};
use tracing::{error, info, warn};

use super::autopilot::AutopilotHost;
use super::bootstrap::AppWiring;
use super::settings::save_settings;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let (world, sync) = match prepare(&app) {
        Ok(prepared) => prepared,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let mut host = AutopilotHost::new(app.settings.control_mode, app.game.summary_every_frames);
    if let Err(err) = run_app(app.loop_config.clone(), world, sync, &mut host) {
        error!(error = %err, "run_failed");
        return ExitCode::FAILURE;
    }
    info!(notices = host.notices_seen(), "autopilot_finished");

    if let Err(err) = save_settings(&app.paths.settings_path, &app.settings) {
        warn!(error = %err, "settings_save_failed");
    }
    ExitCode::SUCCESS
}

fn prepare(app: &AppWiring) -> Result<(WorldState, Option<PeerSyncChannel>), AppError> {
    let world = WorldState::new(app.game.world.clone())?;

    let sync = if app.game.sync_enabled {
        let store = FileStore::open(&app.paths.store_dir, &app.game.sync.namespace)?;
        let channel = PeerSyncChannel::start(
            Box::new(store),
            Box::new(SystemClock),
            app.game.sync.clone(),
        )?;
        info!(peer_id = channel.peer_id(), "peer_joined");
        Some(channel)
    } else {
        None
    };
    Ok((world, sync))
}
