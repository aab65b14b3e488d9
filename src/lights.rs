use glam::{Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::config::{hex_to_rgb, DirectionalLightConfig, LightsConfig};

#[derive(Debug, Clone)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Position relative to the camera the light is attached to.
    pub local_position: Vec3,
    pub target: Vec3,
}

impl DirectionalLight {
    fn from_config(config: &DirectionalLightConfig) -> Self {
        Self {
            color: hex_to_rgb(config.color),
            intensity: config.intensity,
            local_position: config.position,
            target: Vec3::ZERO,
        }
    }

    /// World-space direction the light travels in.
    pub fn direction(&self, camera_world: &Mat4) -> Vec3 {
        let position = camera_world.transform_point3(self.local_position);
        (self.target - position).normalize_or(Vec3::NEG_Z)
    }
}

/// The rig rides along with the camera, so the model is always lit from the
/// viewer's side no matter where the orbit puts the camera.
#[derive(Debug, Clone)]
pub struct CameraLightRig {
    pub ambient: Vec3,
    pub directional: [DirectionalLight; MAX_DIRECTIONAL_LIGHTS],
}

pub const MAX_DIRECTIONAL_LIGHTS: usize = 3;

impl CameraLightRig {
    pub fn new(config: &LightsConfig) -> Self {
        Self {
            ambient: hex_to_rgb(config.ambient),
            directional: [
                DirectionalLight::from_config(&config.key),
                DirectionalLight::from_config(&config.fill),
                DirectionalLight::from_config(&config.back),
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
struct DirectionalLightUniform {
    // w is unused
    direction: Vec4,
    // rgb premultiplied by intensity
    color: Vec4,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct LightsUniform {
    ambient: Vec4,
    directional: [DirectionalLightUniform; MAX_DIRECTIONAL_LIGHTS],
}

impl LightsUniform {
    pub fn update(&mut self, rig: &CameraLightRig, camera_world: &Mat4) {
        self.ambient = rig.ambient.extend(1.0);
        for (uniform, light) in self.directional.iter_mut().zip(rig.directional.iter()) {
            uniform.direction = light.direction(camera_world).extend(0.0);
            uniform.color = (light.color * light.intensity).extend(1.0);
        }
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Uniform Buffer"),
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
    fn key_light_follows_the_camera() {
        let rig = CameraLightRig::new(&ShowcaseConfig::default().lights);
        let key = &rig.directional[0];

        let at_front = Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0));
        let direction = key.direction(&at_front);
        let expected = (Vec3::ZERO - Vec3::new(-1.0, 1.0, 5.0)).normalize();
        assert!(direction.abs_diff_eq(expected, 1e-6));

        // Half an orbit later the light comes from the other side.
        let behind = Mat4::from_rotation_y(std::f32::consts::PI) * at_front;
        assert!(key.direction(&behind).z > 0.0);
    }

    #[test]
    fn uniform_premultiplies_intensity() {
        let rig = CameraLightRig::new(&ShowcaseConfig::default().lights);
        let mut uniform = LightsUniform::default();
        uniform.update(&rig, &Mat4::IDENTITY);

        assert_eq!(uniform.directional[1].color, Vec4::new(0.5, 0.5, 0.5, 1.0));
        assert!((uniform.ambient.x - 64.0 / 255.0).abs() < 1e-6);
    }
}
