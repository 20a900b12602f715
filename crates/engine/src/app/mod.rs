mod input;
mod loop_runner;
mod session_stats;

pub use input::{ActionStates, InputAction, InputSnapshot, InputSource, ALL_ACTIONS};
pub use loop_runner::{
    run_app, run_app_with_stats, AppError, Host, LoopConfig, POLLER_THREAD_NAME,
};
pub use session_stats::{SessionStats, SessionStatsHandle};
