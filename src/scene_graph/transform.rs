use std::cell::Cell;

use glam::{Mat4, Quat, Vec3};

/// Local translation/rotation/scale with lazily rebuilt local and world
/// matrices. The matrices live in cells so the scene can refresh them while
/// only holding shared references to its objects.
#[derive(Debug, Clone)]
pub struct Transform {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,

    local_matrix: Cell<Mat4>,
    world_matrix: Cell<Mat4>,
    normal_matrix: Cell<Mat4>,
    local_dirty: Cell<bool>,
    world_dirty: Cell<bool>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_translation(Vec3::ZERO)
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            local_matrix: Cell::new(Mat4::IDENTITY),
            world_matrix: Cell::new(Mat4::IDENTITY),
            normal_matrix: Cell::new(Mat4::IDENTITY),
            local_dirty: Cell::new(true),
            world_dirty: Cell::new(true),
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        if self.local_dirty.get() {
            self.local_matrix.set(Mat4::from_scale_rotation_translation(
                self.scale,
                self.rotation,
                self.translation,
            ));
            self.local_dirty.set(false);
        }

        self.local_matrix.get()
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix.get()
    }

    /// Inverse transpose of the world matrix, for transforming normals.
    pub fn normal_matrix(&self) -> Mat4 {
        self.normal_matrix.get()
    }

    pub fn set_world_matrix(&self, world_matrix: Mat4) {
        self.world_matrix.set(world_matrix);
        self.normal_matrix.set(world_matrix.inverse().transpose());
        self.world_dirty.set(false);
    }

    pub fn invalidate_world(&self) {
        self.world_dirty.set(true);
    }

    pub fn is_world_dirty(&self) -> bool {
        self.world_dirty.get()
    }

    fn invalidate_local(&self) {
        self.local_dirty.set(true);
        self.world_dirty.set(true);
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.invalidate_local();
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.invalidate_local();
    }

    pub fn set_transform(&mut self, translation: Vec3, rotation: Quat, scale: Vec3) {
        self.translation = translation;
        self.rotation = rotation;
        self.scale = scale;
        self.invalidate_local();
    }

    #[cfg(test)]
    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    #[cfg(test)]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_matrix_tracks_changes() {
        let mut transform = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(
            transform.local_matrix(),
            Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
        );

        transform.set_rotation(Quat::from_rotation_y(1.0));
        assert!(transform.is_world_dirty());
        let rotated = transform.local_matrix().transform_point3(Vec3::ZERO);
        assert!(rotated.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
    }

    #[test]
    fn world_matrix_clears_dirty_flag() {
        let transform = Transform::default();
        assert!(transform.is_world_dirty());
        transform.set_world_matrix(Mat4::from_scale(Vec3::splat(2.0)));
        assert!(!transform.is_world_dirty());
        assert_eq!(
            transform.normal_matrix(),
            Mat4::from_scale(Vec3::splat(0.5))
        );
    }
}
