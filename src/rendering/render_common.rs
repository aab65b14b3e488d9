use std::sync::RwLock;

use wgpu::SurfaceConfiguration;
use winit::dpi::PhysicalSize;

use crate::{
    rendering::{
        global_uniform::{GlobalUniform, GlobalUniformState},
        texture::Texture,
    },
    showcase::NoiseParams,
};

/// GPU state shared by every pass.
pub struct RenderCommon {
    pub output_surface_config: RwLock<SurfaceConfiguration>,
    pub clear_color: wgpu::Color,
    pub camera_uniform_buffer: wgpu::Buffer,
    pub lights_uniform_buffer: wgpu::Buffer,
    pub global_uniform: GlobalUniform,
    pub material_bind_group_layout: wgpu::BindGroupLayout,
    pub white_texture: Texture,
}

impl RenderCommon {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        adapter: &wgpu::Adapter,
        surface: &wgpu::Surface,
        size: PhysicalSize<u32>,
        clear_color: wgpu::Color,
        camera_uniform_buffer: wgpu::Buffer,
        lights_uniform_buffer: wgpu::Buffer,
    ) -> Self {
        let surface_caps = surface.get_capabilities(adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let output_surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(device, &output_surface_config);

        let global_uniform = GlobalUniform::new(
            device,
            GlobalUniformState::new(
                size,
                NoiseParams {
                    time: 0.0,
                    effect: 0.0,
                    aspect_ratio: size.width as f32 / size.height.max(1) as f32,
                },
            ),
        );

        let material_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Material bind group layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let white_texture = Texture::white(device, queue);

        Self {
            output_surface_config: RwLock::new(output_surface_config),
            clear_color,
            camera_uniform_buffer,
            lights_uniform_buffer,
            global_uniform,
            material_bind_group_layout,
            white_texture,
        }
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.output_surface_config
            .read()
            .map(|config| config.format)
            .unwrap_or_else(|poisoned| poisoned.into_inner().format)
    }
}
