mod autopilot;
pub(crate) mod bootstrap;
mod keymap;
pub(crate) mod loop_runner;
mod settings;
