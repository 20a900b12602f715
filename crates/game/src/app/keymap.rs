use hollow_engine::app::{InputAction, InputSnapshot};

use super::settings::ControlMode;

const INTERACT_KEYS: &[&str] = &["e", "E"];
const ATTACK_KEYS: &[&str] = &[" "];
const QUIT_KEYS: &[&str] = &["Escape"];

/// Key names follow the DOM `KeyboardEvent.key` spelling.
pub(crate) fn action_for_key(mode: ControlMode, key: &str) -> Option<InputAction> {
    let movement = match mode {
        ControlMode::Laptop => match key {
            "ArrowUp" => Some(InputAction::MoveUp),
            "ArrowDown" => Some(InputAction::MoveDown),
            "ArrowLeft" => Some(InputAction::MoveLeft),
            "ArrowRight" => Some(InputAction::MoveRight),
            _ => None,
        },
        ControlMode::Desktop => match key {
            "w" | "W" => Some(InputAction::MoveUp),
            "s" | "S" => Some(InputAction::MoveDown),
            "a" | "A" => Some(InputAction::MoveLeft),
            "d" | "D" => Some(InputAction::MoveRight),
            _ => None,
        },
    };
    if movement.is_some() {
        return movement;
    }

    if ATTACK_KEYS.contains(&key) {
        Some(InputAction::Attack)
    } else if INTERACT_KEYS.contains(&key) {
        Some(InputAction::Interact)
    } else if QUIT_KEYS.contains(&key) {
        Some(InputAction::Quit)
    } else {
        None
    }
}

/// The primary key bound to `action` under `mode`.
pub(crate) fn key_for(mode: ControlMode, action: InputAction) -> &'static str {
    match (mode, action) {
        (ControlMode::Laptop, InputAction::MoveUp) => "ArrowUp",
        (ControlMode::Laptop, InputAction::MoveDown) => "ArrowDown",
        (ControlMode::Laptop, InputAction::MoveLeft) => "ArrowLeft",
        (ControlMode::Laptop, InputAction::MoveRight) => "ArrowRight",
        (ControlMode::Desktop, InputAction::MoveUp) => "w",
        (ControlMode::Desktop, InputAction::MoveDown) => "s",
        (ControlMode::Desktop, InputAction::MoveLeft) => "a",
        (ControlMode::Desktop, InputAction::MoveRight) => "d",
        (_, InputAction::Attack) => ATTACK_KEYS[0],
        (_, InputAction::Interact) => INTERACT_KEYS[0],
        (_, InputAction::Quit) => QUIT_KEYS[0],
    }
}

/// Builds the per-tick input from the set of keys currently held. Keys
/// that mean nothing under `mode` are ignored.
pub(crate) fn snapshot_from_keys<'a>(
    mode: ControlMode,
    held: impl IntoIterator<Item = &'a str>,
) -> InputSnapshot {
    let mut snapshot = InputSnapshot::default();
    for key in held {
        if let Some(action) = action_for_key(mode, key) {
            snapshot.set(action, true);
        }
    }
    snapshot
}
