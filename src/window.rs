use std::{sync::Arc, time::Instant};

use anyhow::Context;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::{
    asset_loader::AssetLoader, config::ShowcaseConfig, rendering::renderer::Renderer,
    showcase::ShowcaseState,
};

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

/// Everything that only exists once the window is up.
struct Running {
    renderer: Renderer,
    state: ShowcaseState,
    imgui: ImguiState,
    _loader: AssetLoader,
}

struct App {
    config: Option<ShowcaseConfig>,
    running: Option<Running>,
    last_frame: Instant,
}

impl App {
    fn new(config: ShowcaseConfig) -> Self {
        Self {
            config: Some(config),
            running: None,
            last_frame: Instant::now(),
        }
    }

    fn setup_imgui(window: &Window) -> ImguiState {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        let font_size = (16.0 * window.scale_factor()) as f32;
        context.io_mut().font_global_scale = (1.0 / window.scale_factor()) as f32;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        // The published imgui writes an ini file next to the binary otherwise
        context.set_ini_filename(None);

        ImguiState { context, platform }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let config = self
            .config
            .take()
            .context("Showcase was already started")?;

        let window_attributes = Window::default_attributes().with_title("Sneaker showcase");
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("Failed to create window")?,
        );

        let mut imgui = Self::setup_imgui(&window);

        let size = window.inner_size();
        let model_path = config.model_path.clone();
        let mut state = ShowcaseState::new(config, size.width, size.height, window.scale_factor());

        let renderer = pollster::block_on(Renderer::new(
            window.clone(),
            &state,
            &mut imgui.context,
        ))?;

        let loader = AssetLoader::new()?;
        log::info!("Loading {}", model_path.display());
        state.begin_loading(loader.load_gltf(model_path));

        self.last_frame = Instant::now();
        self.running = Some(Running {
            renderer,
            state,
            imgui,
            _loader: loader,
        });

        window.request_redraw();
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }

        if let Err(error) = self.start(event_loop) {
            log::error!("Failed to start showcase: {error:?}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(Running {
            renderer,
            state,
            imgui,
            ..
        }) = self.running.as_mut()
        else {
            return;
        };

        imgui.platform.handle_event::<()>(
            imgui.context.io_mut(),
            &renderer.window,
            &Event::WindowEvent {
                window_id,
                event: event.clone(),
            },
        );

        match event {
            WindowEvent::CloseRequested => state.stop(),
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                state.stop();
            }
            WindowEvent::Resized(new_size) => {
                renderer.resize(new_size);
                state.on_resize(
                    new_size.width,
                    new_size.height,
                    renderer.window.scale_factor(),
                );
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * state.config.wheel_line_height,
                    MouseScrollDelta::PixelDelta(position) => {
                        -(position.y / renderer.window.scale_factor()) as f32
                    }
                };
                state.on_scroll(delta_y, state.elapsed());
            }
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => {
                state
                    .controls
                    .set_dragging(button_state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                state.controls.cursor_moved(
                    position.x as f32,
                    position.y as f32,
                    renderer.size.height as f32,
                );
            }
            WindowEvent::RedrawRequested => {
                if !state.is_running() {
                    event_loop.exit();
                    return;
                }

                let now = Instant::now();
                imgui
                    .context
                    .io_mut()
                    .update_delta_time(now - self.last_frame);
                self.last_frame = now;

                state.update(state.elapsed());

                if let Err(error) = imgui
                    .platform
                    .prepare_frame(imgui.context.io_mut(), &renderer.window)
                {
                    log::error!("Failed to prepare imgui frame: {error}");
                }

                let ui = imgui.context.new_frame();
                state.overlay.draw(ui, state.scroll_y());
                imgui.platform.prepare_render(ui, &renderer.window);

                renderer.prepare(state);

                match renderer.render(&mut imgui.context) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        renderer.resize(renderer.size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of memory");
                        event_loop.exit();
                        return;
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        log::warn!("Surface timeout");
                    }
                    Err(other) => {
                        log::error!("Unexpected surface error: {:?}", other);
                    }
                }

                renderer.window.request_redraw();
            }
            _ => (),
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(ShowcaseConfig::default());
    event_loop.run_app(&mut app)?;

    Ok(())
}
