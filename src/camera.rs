use glam::{Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::config::CameraConfig;

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Mat4,
}

impl Camera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Self {
            eye: config.position,
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: config.fov_y_degrees.to_radians(),
            aspect,
            near: config.near,
            far: config.far,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
        self.update_projection_matrix();
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
    }

    #[cfg(test)]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Camera-to-world transform, used to place objects parented to the camera.
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    pub fn get_vp_matrix(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
    // w is unused
    eye: Vec4,
}

impl CameraUniform {
    pub fn update(&mut self, camera: &Camera) {
        self.view_proj = camera.get_vp_matrix();
        self.eye = camera.eye.extend(1.0);
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn update_buffer(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[*self]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShowcaseConfig;

    #[test]
    fn viewport_sets_exact_aspect_ratio() {
        let config = ShowcaseConfig::default();
        let mut camera = Camera::new(&config.camera, 1.0);

        camera.set_viewport(1920, 1080);
        assert_eq!(camera.aspect, 1920.0 / 1080.0);

        camera.set_viewport(733, 1201);
        assert_eq!(camera.aspect, 733.0 / 1201.0);

        let expected = Mat4::perspective_rh(75f32.to_radians(), 733.0 / 1201.0, 0.1, 1000.0);
        assert_eq!(camera.projection_matrix(), expected);
    }

    #[test]
    fn zero_sized_viewport_is_ignored() {
        let config = ShowcaseConfig::default();
        let mut camera = Camera::new(&config.camera, 2.0);
        camera.set_viewport(0, 600);
        assert_eq!(camera.aspect, 2.0);
    }

    #[test]
    fn world_matrix_places_camera_at_eye() {
        let config = ShowcaseConfig::default();
        let camera = Camera::new(&config.camera, 1.0);
        let origin = camera.world_matrix().transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5));
    }
}
