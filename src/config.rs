use std::{path::PathBuf, time::Duration};

use glam::Vec3;

#[derive(Debug, Clone)]
pub struct ShowcaseConfig {
    pub model_path: PathBuf,
    pub background: wgpu::Color,

    pub camera: CameraConfig,
    pub lights: LightsConfig,
    pub effect: EffectConfig,
    pub orbit: OrbitConfig,
    pub reveal: RevealConfig,

    /// Radians of scroll group rotation per pixel of page scroll.
    pub scroll_rotation_factor: f32,
    /// Pixels scrolled per wheel "line".
    pub wheel_line_height: f32,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

#[derive(Debug, Clone)]
pub struct DirectionalLightConfig {
    pub color: u32,
    pub intensity: f32,
    /// Camera-space position. The light aims at the world origin.
    pub position: Vec3,
}

#[derive(Debug, Clone)]
pub struct LightsConfig {
    pub ambient: u32,
    pub key: DirectionalLightConfig,
    pub fill: DirectionalLightConfig,
    pub back: DirectionalLightConfig,
}

#[derive(Debug, Clone)]
pub struct EffectConfig {
    pub damping: f32,
    pub debounce: Duration,
}

#[derive(Debug, Clone)]
pub struct OrbitConfig {
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RevealStep {
    pub delay: Duration,
    pub duration: Duration,
}

impl RevealStep {
    const fn new(delay_ms: u64, duration_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            duration: Duration::from_millis(duration_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RevealConfig {
    /// Where the load group starts before dropping into place.
    pub load_group_start_y: f32,
    pub load_group: RevealStep,
    pub loader: RevealStep,
    pub new_drop: RevealStep,
    pub header: RevealStep,
    pub content: RevealStep,
    /// Vertical offset in pixels that header and new drop slide in from.
    pub slide_offset: f32,
}

impl Default for ShowcaseConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/sneaker.glb"),
            background: wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0,
            },
            camera: CameraConfig {
                fov_y_degrees: 75.0,
                near: 0.1,
                far: 1000.0,
                position: Vec3::new(0.0, 0.0, 2.0),
            },
            lights: LightsConfig {
                ambient: 0x404040,
                key: DirectionalLightConfig {
                    color: 0xffffff,
                    intensity: 1.0,
                    position: Vec3::new(-1.0, 1.0, 3.0),
                },
                fill: DirectionalLightConfig {
                    color: 0xffffff,
                    intensity: 0.5,
                    position: Vec3::new(1.0, 1.0, 3.0),
                },
                back: DirectionalLightConfig {
                    color: 0xffffff,
                    intensity: 1.0,
                    position: Vec3::new(-1.0, 3.0, -1.0),
                },
            },
            effect: EffectConfig {
                damping: 0.01,
                debounce: Duration::from_millis(300),
            },
            orbit: OrbitConfig {
                auto_rotate: true,
                auto_rotate_speed: 2.0,
            },
            reveal: RevealConfig {
                load_group_start_y: -10.0,
                load_group: RevealStep::new(1000, 2000),
                loader: RevealStep::new(1000, 1000),
                new_drop: RevealStep::new(2000, 1000),
                header: RevealStep::new(2500, 1000),
                content: RevealStep::new(1000, 1000),
                slide_offset: -100.0,
            },
            scroll_rotation_factor: 0.001,
            wheel_line_height: 40.0,
        }
    }
}

/// Splits a 0xRRGGBB color into float components.
pub fn hex_to_rgb(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_split_into_channels() {
        let ambient = hex_to_rgb(0x404040);
        assert!((ambient.x - 64.0 / 255.0).abs() < 1e-6);
        assert_eq!(ambient.x, ambient.y);
        assert_eq!(ambient.y, ambient.z);

        assert_eq!(hex_to_rgb(0xffffff), Vec3::ONE);
        assert_eq!(hex_to_rgb(0xff0000), Vec3::X);
    }

    #[test]
    fn reveal_schedule_matches_page_timing() {
        let reveal = ShowcaseConfig::default().reveal;
        assert_eq!(reveal.load_group.delay, Duration::from_secs(1));
        assert_eq!(reveal.load_group.duration, Duration::from_secs(2));
        assert_eq!(reveal.header.delay, Duration::from_millis(2500));
        assert_eq!(reveal.new_drop.delay, Duration::from_secs(2));
    }

    #[test]
    fn model_path_points_at_binary_gltf() {
        let config = ShowcaseConfig::default();
        assert_eq!(
            config.model_path.extension().and_then(|ext| ext.to_str()),
            Some("glb")
        );
        assert_eq!(config.model_path.display().to_string(), "assets/sneaker.glb");
    }
}
