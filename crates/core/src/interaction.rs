//! Interaction Field
//!
//! Turns raw pointer samples into a smoothed world-space influence point and
//! a decaying strength scalar. Pointer events only write the target and reset
//! the strength; the per-frame [`InteractionField::tick`] is the only place
//! the smoothed point and the decay advance, so the frame loop always reads a
//! consistent snapshot.

use crate::core_types::Vec3;

/// Snapshot of the field consumed by the particle store and the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Influence {
    /// Smoothed world-space influence point.
    pub point: Vec3,
    /// Interaction strength in `0..=1`.
    pub strength: f32,
}

impl Default for Influence {
    fn default() -> Self {
        Self {
            point: Vec3::zeros(),
            strength: 0.0,
        }
    }
}

/// Convert a screen-space sample to normalized device coordinates.
///
/// X maps `0..width` to `-1..1`; Y is inverted so the top of the viewport is
/// `+1`, matching a right-handed world with +Y up. Returns `None` for a
/// degenerate viewport or a non-finite sample.
#[must_use]
pub fn to_ndc(screen_x: f32, screen_y: f32, width: f32, height: f32) -> Option<(f32, f32)> {
    let finite = [screen_x, screen_y, width, height]
        .iter()
        .all(|v| v.is_finite());
    if !finite || width <= 0.0 || height <= 0.0 {
        return None;
    }
    let x = (screen_x / width) * 2.0 - 1.0;
    let y = -((screen_y / height) * 2.0 - 1.0);
    Some((x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0)))
}

/// Smoothed pointer influence with multiplicative strength decay.
#[derive(Debug, Clone)]
pub struct InteractionField {
    world_extents: Vec3,
    smoothing: f32,
    decay: f32,
    /// Target in normalized device coordinates.
    target: (f32, f32),
    current: Vec3,
    strength: f32,
}

impl InteractionField {
    /// `world_extents` scales NDC into world space (X and Y; the influence
    /// point always lies on the Z = 0 plane).
    #[must_use]
    pub fn new(world_extents: Vec3, smoothing: f32, decay: f32) -> Self {
        Self {
            world_extents,
            smoothing,
            decay,
            target: (0.0, 0.0),
            current: Vec3::zeros(),
            strength: 0.0,
        }
    }

    /// Record a pointer sample. Degenerate viewports and non-finite samples
    /// are ignored.
    pub fn on_pointer_move(&mut self, screen_x: f32, screen_y: f32, width: f32, height: f32) {
        if let Some(ndc) = to_ndc(screen_x, screen_y, width, height) {
            self.set_target_ndc(ndc.0, ndc.1);
        }
    }

    /// Record a sample already expressed in NDC (clamped to `-1..=1`).
    /// Non-finite samples are dropped.
    pub fn set_target_ndc(&mut self, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.target = (x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0));
        self.strength = 1.0;
    }

    /// Pointer left the surface: ease back toward the centre. Strength is not
    /// reset and keeps decaying.
    pub fn on_pointer_leave(&mut self) {
        self.target = (0.0, 0.0);
    }

    /// Advance by `dt` ticks and return the snapshot for this frame.
    pub fn tick(&mut self, dt: f32) -> Influence {
        let goal = self.target_world();
        // Exponential easing: close `smoothing` of the remaining gap per tick
        let blend = 1.0 - (1.0 - self.smoothing).powf(dt);
        self.current += (goal - self.current) * blend;

        self.strength = (self.strength * self.decay.powf(dt)).max(0.0);

        self.influence()
    }

    /// Current snapshot without advancing.
    #[must_use]
    pub fn influence(&self) -> Influence {
        Influence {
            point: self.current,
            strength: self.strength,
        }
    }

    #[must_use]
    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Target in normalized device coordinates.
    #[must_use]
    pub fn target(&self) -> (f32, f32) {
        self.target
    }

    /// Target mapped into world space.
    #[must_use]
    pub fn target_world(&self) -> Vec3 {
        Vec3::new(
            self.target.0 * self.world_extents.x,
            self.target.1 * self.world_extents.y,
            0.0,
        )
    }

    /// Smoothed world-space point.
    #[must_use]
    pub fn current(&self) -> Vec3 {
        self.current
    }
}
