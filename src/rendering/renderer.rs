use std::sync::Arc;

use anyhow::Context;
use id_arena::Arena;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    camera::CameraUniform,
    lights::LightsUniform,
    rendering::{
        global_uniform::GlobalUniformState,
        imgui_renderer::ImguiRendererState,
        passes::{
            noise_pass::{NoisePass, NoiseTextureViews},
            pass::Pass,
            scene_pass::{ScenePass, SceneTextureViews},
        },
        render_common::RenderCommon,
        render_model::{render_model_instances, RenderModel},
        shader_loader::{PipelineCacheBuilder, ShaderLoader},
        texture::{DepthTexture, RenderTarget},
    },
    showcase::ShowcaseState,
};

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,

    common: Arc<RenderCommon>,
    depth_texture: DepthTexture,
    scene_color: RenderTarget,
    render_models: Arena<RenderModel>,

    camera_uniform: CameraUniform,
    lights_uniform: LightsUniform,

    shader_loader: ShaderLoader,

    scene_pass: ScenePass,
    noise_pass: NoisePass,
    imgui: ImguiRendererState,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        state: &ShowcaseState,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        log::info!("Using adapter {:?}", adapter.get_info().name);

        let mut camera_uniform = CameraUniform::default();
        camera_uniform.update(&state.camera);
        let mut lights_uniform = LightsUniform::default();
        lights_uniform.update(&state.lights, &state.camera.world_matrix());

        let common = Arc::new(RenderCommon::new(
            &device,
            &queue,
            &adapter,
            &surface,
            size,
            state.config.background,
            camera_uniform.create_buffer(&device),
            lights_uniform.create_buffer(&device),
        ));

        let depth_texture = DepthTexture::new(&device, size, "Depth texture");
        let scene_color = RenderTarget::new(
            &device,
            size,
            common.surface_format(),
            None,
            "Scene color",
        );

        let mut cache_builder = PipelineCacheBuilder::new();

        let scene_pass = ScenePass::create(&device, common.clone(), &mut cache_builder)?;
        let mut noise_pass = NoisePass::create(&device, common.clone(), &mut cache_builder)?;
        noise_pass.set_source(&device, scene_color.view(), scene_color.sampler());

        let shader_loader = ShaderLoader::new(device.clone(), cache_builder)?;

        let imgui = ImguiRendererState::new(&device, &queue, common.surface_format(), imgui_context);

        Ok(Self {
            window,
            size,
            surface,
            device,
            queue,
            common,
            depth_texture,
            scene_color,
            render_models: Arena::new(),
            camera_uniform,
            lights_uniform,
            shader_loader,
            scene_pass,
            noise_pass,
            imgui,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        {
            let mut config = self
                .common
                .output_surface_config
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            config.width = new_size.width;
            config.height = new_size.height;
            self.surface.configure(&self.device, &config);
        }

        self.depth_texture.resize(&self.device, new_size);
        self.scene_color.resize(&self.device, new_size);
        self.noise_pass.set_source(
            &self.device,
            self.scene_color.view(),
            self.scene_color.sampler(),
        );
    }

    /// Uploads models that arrived since the last frame and refreshes every
    /// per-frame buffer from the showcase state.
    pub fn prepare(&mut self, state: &mut ShowcaseState) {
        self.shader_loader.load_pending_shaders();

        for (_, scene_model) in state.scene.models.iter_mut() {
            let render_model_id = match scene_model.render_model {
                Some(id) => id,
                None => {
                    let render_model = RenderModel::from_model(
                        &self.device,
                        &self.queue,
                        &self.common,
                        &scene_model.model,
                    );
                    log::debug!(
                        "Uploaded model {} with {} primitives",
                        scene_model.model.name,
                        render_model.primitives.len()
                    );
                    let id = self.render_models.alloc(render_model);
                    scene_model.render_model = Some(id);
                    id
                }
            };

            if let Some(render_model) = self.render_models.get_mut(render_model_id) {
                render_model.write_instances(&self.device, &self.queue, scene_model.instances());
            }
        }

        self.camera_uniform.update(&state.camera);
        self.camera_uniform
            .update_buffer(&self.queue, &self.common.camera_uniform_buffer);

        self.lights_uniform
            .update(&state.lights, &state.camera.world_matrix());
        self.lights_uniform
            .update_buffer(&self.queue, &self.common.lights_uniform_buffer);

        self.common.global_uniform.update(
            &self.queue,
            GlobalUniformState::new(self.size, state.noise_params()),
        );
    }

    /// Renders the scene, then the noise pass to the surface, then the
    /// overlay on top.
    pub fn render(&mut self, imgui_context: &mut imgui::Context) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render encoder"),
            });

        let pipeline_cache = &self.shader_loader.cache;
        let render_models = &self.render_models;

        self.scene_pass.render(
            &SceneTextureViews {
                color: self.scene_color.view(),
                depth: self.depth_texture.view(),
            },
            &mut encoder,
            pipeline_cache,
            |render_pass| {
                for (_, render_model) in render_models.iter() {
                    if render_model.should_render() {
                        render_model_instances(render_pass, render_model);
                    }
                }
            },
        );

        self.noise_pass.render(
            &NoiseTextureViews { output: &view },
            &mut encoder,
            pipeline_cache,
            |_| {},
        );

        if let Err(error) = self.imgui.render(
            &view,
            imgui_context,
            &self.device,
            &self.queue,
            &mut encoder,
        ) {
            log::error!("{error:?}");
        }

        self.queue.submit([encoder.finish()]);
        output.present();

        Ok(())
    }
}
