//! Perspective camera that leans toward the influence point.

use crate::core_types::Vec3;
use nalgebra::{Isometry3, Matrix4, Perspective3, Point3};

/// Maps OpenGL clip depth `[-1, 1]` onto the `[0, 1]` range wgpu expects.
#[rustfmt::skip]
fn depth_correction() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Perspective camera looking at the origin from +Z.
#[derive(Debug, Clone)]
pub struct Camera {
    eye: Vec3,
    distance: f32,
    parallax: f32,
    fov_y: f32,
    near: f32,
    far: f32,
    aspect: f32,
}

impl Camera {
    pub const DEFAULT_FOV_Y: f32 = std::f32::consts::FRAC_PI_4;

    /// Camera at `(0, 0, distance)`. `parallax` scales how far the eye
    /// follows the influence point in X and Y.
    #[must_use]
    pub fn new(distance: f32, parallax: f32, width: u32, height: u32) -> Self {
        let mut camera = Self {
            eye: Vec3::new(0.0, 0.0, distance),
            distance,
            parallax,
            fov_y: Self::DEFAULT_FOV_Y,
            near: 0.1,
            far: distance * 4.0,
            aspect: 1.0,
        };
        camera.set_viewport(width, height);
        camera
    }

    /// Recompute the aspect ratio. Zero-sized viewports keep the old one.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    /// Ease the eye toward the parallax position for `target`, closing
    /// `smoothing` of the remaining gap.
    pub fn follow(&mut self, target: Vec3, smoothing: f32) {
        let goal = self.goal_for(target);
        self.eye += (goal - self.eye) * smoothing.clamp(0.0, 1.0);
    }

    /// Where the eye settles for a given influence point.
    #[must_use]
    pub fn goal_for(&self, target: Vec3) -> Vec3 {
        Vec3::new(
            target.x * self.parallax,
            target.y * self.parallax,
            self.distance,
        )
    }

    #[must_use]
    pub fn view(&self) -> Matrix4<f32> {
        Isometry3::look_at_rh(
            &Point3::from(self.eye),
            &Point3::origin(),
            &Vec3::y(),
        )
        .to_homogeneous()
    }

    #[must_use]
    pub fn projection(&self) -> Matrix4<f32> {
        let perspective = Perspective3::new(self.aspect, self.fov_y, self.near, self.far);
        depth_correction() * perspective.as_matrix()
    }

    /// Combined matrix in wgpu clip conventions (depth in `0..=1`).
    #[must_use]
    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection() * self.view()
    }

    #[must_use]
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.aspect
    }
}
