use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::{camera::Camera, config::OrbitConfig};

const MIN_POLAR: f32 = 1e-4;

/// Orbits the camera around its target. Zoom and pan are not supported, the
/// radius stays at whatever the camera started with.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    radius: f32,
    polar: f32,
    azimuth: f32,
    dragging: bool,
    last_cursor: Option<(f32, f32)>,
}

impl OrbitControls {
    pub fn new(camera: &Camera, config: &OrbitConfig) -> Self {
        let offset = camera.eye - camera.target;
        let radius = offset.length();
        let (polar, azimuth) = if radius > 0.0 {
            (
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
                offset.x.atan2(offset.z),
            )
        } else {
            (PI / 2.0, 0.0)
        };

        Self {
            target: camera.target,
            auto_rotate: config.auto_rotate,
            auto_rotate_speed: config.auto_rotate_speed,
            radius,
            polar,
            azimuth,
            dragging: false,
            last_cursor: None,
        }
    }

    #[cfg(test)]
    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    #[cfg(test)]
    pub fn polar(&self) -> f32 {
        self.polar
    }

    #[cfg(test)]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.azimuth -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.polar = (self.polar - angle).clamp(MIN_POLAR, PI - MIN_POLAR);
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
        if !dragging {
            self.last_cursor = None;
        }
    }

    /// Feeds a cursor position in physical pixels. Rotates only while a drag
    /// is active, a full viewport height of travel is one turn.
    pub fn cursor_moved(&mut self, x: f32, y: f32, viewport_height: f32) {
        if self.dragging && viewport_height > 0.0 {
            if let Some((last_x, last_y)) = self.last_cursor {
                self.rotate_left(TAU * (x - last_x) / viewport_height);
                self.rotate_up(TAU * (y - last_y) / viewport_height);
            }
        }
        self.last_cursor = Some((x, y));
    }

    /// Applies auto-rotation for `dt` seconds and writes the resulting eye
    /// position into the camera.
    pub fn update(&mut self, camera: &mut Camera, dt: f32) {
        if self.auto_rotate && !self.dragging {
            // One revolution per 60 / speed seconds.
            self.rotate_left(TAU / 60.0 * self.auto_rotate_speed * dt);
        }

        let sin_polar = self.polar.sin();
        let offset = Vec3::new(
            self.radius * sin_polar * self.azimuth.sin(),
            self.radius * self.polar.cos(),
            self.radius * sin_polar * self.azimuth.cos(),
        );

        camera.target = self.target;
        camera.eye = self.target + offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShowcaseConfig;

    fn setup() -> (Camera, OrbitControls) {
        let config = ShowcaseConfig::default();
        let camera = Camera::new(&config.camera, 1.0);
        let controls = OrbitControls::new(&camera, &config.orbit);
        (camera, controls)
    }

    #[test]
    fn starts_from_camera_position() {
        let (mut camera, mut controls) = setup();
        assert!((controls.radius() - 2.0).abs() < 1e-6);
        assert!((controls.polar() - PI / 2.0).abs() < 1e-6);
        assert!(controls.azimuth().abs() < 1e-6);

        controls.auto_rotate = false;
        controls.update(&mut camera, 1.0);
        assert!(camera.eye.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5));
    }

    #[test]
    fn auto_rotate_completes_a_turn_in_thirty_seconds() {
        let (mut camera, mut controls) = setup();

        for _ in 0..30 * 60 {
            controls.update(&mut camera, 1.0 / 60.0);
        }

        assert!((controls.azimuth() + TAU).abs() < 1e-3);
        assert!(camera.eye.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-2));
        assert!(((camera.eye - camera.target).length() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn drag_rotates_and_clamps_polar() {
        let (mut camera, mut controls) = setup();
        controls.auto_rotate = false;

        // Cursor motion without a drag only records the position.
        controls.cursor_moved(100.0, 100.0, 800.0);
        assert!(controls.azimuth().abs() < 1e-6);

        controls.set_dragging(true);
        controls.cursor_moved(100.0, 100.0, 800.0);
        controls.cursor_moved(300.0, 100.0, 800.0);
        assert!((controls.azimuth() + TAU * 200.0 / 800.0).abs() < 1e-5);

        controls.cursor_moved(300.0, 10_000.0, 800.0);
        assert!(controls.polar() >= MIN_POLAR);
        controls.update(&mut camera, 0.0);
        assert!(camera.eye.y > 1.99);
    }
}
