use std::sync::Arc;

use wgpu::{
    Device, MultisampleState, PipelineCompilationOptions, RenderPass, RenderPassDescriptor,
    ShaderSource,
};

use crate::rendering::{
    passes::pass::Pass,
    render_common::RenderCommon,
    shader_loader::{PipelineCache, PipelineCacheBuilder, PipelineId, ShaderDefinition},
};

const NOISE_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Noise",
    path: "noise.wgsl",
};

/// Fullscreen pass that copies the scene to the output while applying the
/// scroll-driven distortion and grain.
pub struct NoisePass {
    pipeline_id: PipelineId,
    common: Arc<RenderCommon>,
    source_bind_group_layout: wgpu::BindGroupLayout,
    source_bind_group: Option<wgpu::BindGroup>,
}

pub struct NoiseTextureViews<'v> {
    pub output: &'v wgpu::TextureView,
}

impl NoisePass {
    /// Binds the texture the pass reads from. Must be called again whenever
    /// the source is recreated.
    pub fn set_source(&mut self, device: &Device, view: &wgpu::TextureView, sampler: &wgpu::Sampler) {
        self.source_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Noise source bind group"),
            layout: &self.source_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        }));
    }
}

impl Pass for NoisePass {
    type TextureViews<'v> = NoiseTextureViews<'v>;

    fn create(
        device: &Device,
        common: Arc<RenderCommon>,
        cache_builder: &mut PipelineCacheBuilder,
    ) -> anyhow::Result<Self> {
        let source_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Noise source bind group layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Noise pipeline layout"),
            bind_group_layouts: &[
                &common.global_uniform.bind_group_layout,
                &source_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let output_format = common.surface_format();

        let pipeline_id = cache_builder.add_shader(
            NOISE_SHADER,
            Box::new(
                move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
                    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(shader_def.name),
                        source: ShaderSource::Wgsl(source.into()),
                    });

                    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some("Noise pipeline"),
                        layout: Some(&pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &shader,
                            entry_point: Some("vs_main"),
                            buffers: &[],
                            compilation_options: PipelineCompilationOptions::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &shader,
                            entry_point: Some("fs_main"),
                            targets: &[Some(wgpu::ColorTargetState {
                                format: output_format,
                                blend: Some(wgpu::BlendState::REPLACE),
                                write_mask: wgpu::ColorWrites::ALL,
                            })],
                            compilation_options: PipelineCompilationOptions::default(),
                        }),
                        primitive: wgpu::PrimitiveState {
                            topology: wgpu::PrimitiveTopology::TriangleList,
                            strip_index_format: None,
                            front_face: wgpu::FrontFace::Ccw,
                            cull_mode: None,
                            polygon_mode: wgpu::PolygonMode::Fill,
                            unclipped_depth: false,
                            conservative: false,
                        },
                        depth_stencil: None,
                        multisample: MultisampleState::default(),
                        multiview: None,
                        cache: None,
                    });

                    Ok(pipeline)
                },
            ),
        );

        Ok(Self {
            pipeline_id,
            common,
            source_bind_group_layout,
            source_bind_group: None,
        })
    }

    fn render<'a, F>(
        &self,
        texture_views: &Self::TextureViews<'_>,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_cache: &PipelineCache,
        render_callback: F,
    ) where
        F: FnOnce(&mut RenderPass) + 'a,
    {
        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Noise pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: texture_views.output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let (Some(pipeline), Some(source_bind_group)) =
            (pipeline_cache.get(self.pipeline_id), &self.source_bind_group)
        else {
            return;
        };

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.common.global_uniform.bind_group, &[]);
        render_pass.set_bind_group(1, source_bind_group, &[]);
        render_callback(&mut render_pass);
        render_pass.draw(0..3, 0..1);
    }
}
