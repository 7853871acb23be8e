//! Per-event movement toward a target point

use super::model::WorldParams;

/// Below this distance a player counts as already at the target
pub const ARRIVAL_EPSILON: f64 = 0.0001;

pub fn clamp(v: f64, min: f64, max: f64) -> f64 {
    v.max(min).min(max)
}

impl WorldParams {
    /// Pull a point back inside the world rectangle
    pub fn clamp_point(&self, x: f64, y: f64) -> (f64, f64) {
        (clamp(x, 0.0, self.width), clamp(y, 0.0, self.height))
    }
}

/// Advance `from` toward `target` by at most `world.speed`.
///
/// The target is clamped into the world first. Returns `None` when the player
/// is already within [`ARRIVAL_EPSILON`] of the clamped target, in which case
/// nothing should be broadcast.
pub fn step_toward(world: &WorldParams, from: (f64, f64), target: (f64, f64)) -> Option<(f64, f64)> {
    let (tx, ty) = world.clamp_point(target.0, target.1);
    let dx = tx - from.0;
    let dy = ty - from.1;
    let dist = dx.hypot(dy);

    if dist <= ARRIVAL_EPSILON {
        return None;
    }

    let step = world.speed.min(dist);
    let x = from.0 + (dx / dist) * step;
    let y = from.1 + (dy / dist) * step;

    Some(world.clamp_point(x, y))
}
