#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Attack,
    Interact,
    Quit,
}

const ACTION_COUNT: usize = 7;

pub const ALL_ACTIONS: [InputAction; ACTION_COUNT] = [
    InputAction::MoveUp,
    InputAction::MoveDown,
    InputAction::MoveLeft,
    InputAction::MoveRight,
    InputAction::Attack,
    InputAction::Interact,
    InputAction::Quit,
];

/// Polled by the world once per tick. Implemented by whatever owns the
/// keyboard, or by scripted hosts.
pub trait InputSource {
    fn is_held(&self, action: InputAction) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    actions: ActionStates,
}

impl InputSnapshot {
    pub fn with_action_down(mut self, action: InputAction) -> Self {
        self.actions.set(action, true);
        self
    }

    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.actions.set(action, is_down);
    }

    pub fn quit_requested(&self) -> bool {
        self.actions.is_down(InputAction::Quit)
    }
}

impl InputSource for InputSnapshot {
    fn is_held(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Attack => 4,
            InputAction::Interact => 5,
            InputAction::Quit => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tracks_each_action_independently() {
        let mut snapshot = InputSnapshot::default()
            .with_action_down(InputAction::MoveLeft)
            .with_action_down(InputAction::Attack);
        for action in ALL_ACTIONS {
            let expected = matches!(action, InputAction::MoveLeft | InputAction::Attack);
            assert_eq!(snapshot.is_held(action), expected, "{action:?}");
        }

        snapshot.set(InputAction::Attack, false);
        assert!(!snapshot.is_held(InputAction::Attack));
        assert!(!snapshot.quit_requested());
    }
}
