use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn distance(self, other: Vec2) -> f32 {
        self.distance_sq(other).sqrt()
    }

    pub fn offset(self, dx: f32, dy: f32) -> Vec2 {
        Vec2 {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Moves `current` toward `target` by at most `max_step`. Returns the new
/// position and whether the target was reached.
pub fn step_toward(current: Vec2, target: Vec2, max_step: f32) -> (Vec2, bool) {
    let dx = target.x - current.x;
    let dy = target.y - current.y;
    let distance_sq = dx * dx + dy * dy;
    if distance_sq <= f32::EPSILON {
        return (target, true);
    }

    let distance = distance_sq.sqrt();
    if max_step >= distance {
        return (target, true);
    }

    let inv_distance = distance.recip();
    (
        Vec2 {
            x: current.x + dx * inv_distance * max_step,
            y: current.y + dy * inv_distance * max_step,
        },
        false,
    )
}

/// Unit-length direction from held axes, zero when nothing is held.
pub fn normalized_axes(x: f32, y: f32) -> Vec2 {
    let len_sq = x * x + y * y;
    if len_sq <= 0.0 {
        return Vec2::ZERO;
    }
    let inv_len = len_sq.sqrt().recip();
    Vec2 {
        x: x * inv_len,
        y: y * inv_len,
    }
}
