use std::time::{Duration, Instant};

use glam::{Quat, Vec3};

use crate::{
    animation::{Animator, Tween},
    asset_loader::{GltfAsset, LoadEvent, PendingLoad},
    camera::Camera,
    config::ShowcaseConfig,
    effect::EffectController,
    lights::CameraLightRig,
    orbit::OrbitControls,
    overlay::{Element, Overlay, StyleProperty},
    scene_graph::{Object3D, ObjectId, Scene},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationChannel {
    LoadGroupY,
    Style(Element, StyleProperty),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
    Failed,
}

/// Values the noise pass needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseParams {
    pub time: f32,
    pub effect: f32,
    pub aspect_ratio: f32,
}

pub struct ShowcaseState {
    pub config: ShowcaseConfig,
    pub camera: Camera,
    pub controls: OrbitControls,
    pub lights: CameraLightRig,
    pub scene: Scene,
    pub effect: EffectController,
    pub overlay: Overlay,
    animator: Animator<AnimationChannel>,
    scroll_group: ObjectId,
    load_group: ObjectId,
    scroll_y: f32,
    load_state: LoadState,
    pending_load: Option<PendingLoad>,
    start_time: Instant,
    last_update: Option<Duration>,
    noise: NoiseParams,
    running: bool,
}

impl ShowcaseState {
    pub fn new(config: ShowcaseConfig, width: u32, height: u32, scale_factor: f64) -> Self {
        let camera = Camera::new(&config.camera, aspect_ratio(width, height));
        let controls = OrbitControls::new(&camera, &config.orbit);
        let lights = CameraLightRig::new(&config.lights);

        let mut scene = Scene::new();
        let scroll_group = scene.add_object(Object3D::named("Scroll group"), None);
        let load_group = scene.add_object(Object3D::named("Load group"), Some(scroll_group));
        scene.set_object_translation(
            load_group,
            Vec3::new(0.0, config.reveal.load_group_start_y, 0.0),
        );

        let effect = EffectController::new(&config.effect);
        let overlay = Overlay::new(&config.reveal);

        let mut state = Self {
            noise: NoiseParams {
                time: 0.0,
                effect: 0.0,
                aspect_ratio: camera.aspect,
            },
            config,
            camera,
            controls,
            lights,
            scene,
            effect,
            overlay,
            animator: Animator::new(),
            scroll_group,
            load_group,
            scroll_y: 0.0,
            load_state: LoadState::Loading,
            pending_load: None,
            start_time: Instant::now(),
            last_update: None,
            running: true,
        };
        state.on_resize(width, height, scale_factor);
        state
    }

    /// Time since the showcase started. All scheduling is relative to this.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn scroll_y(&self) -> f32 {
        self.scroll_y
    }

    #[cfg(test)]
    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    #[cfg(test)]
    pub fn load_group(&self) -> ObjectId {
        self.load_group
    }

    #[cfg(test)]
    pub fn scroll_group(&self) -> ObjectId {
        self.scroll_group
    }

    pub fn noise_params(&self) -> NoiseParams {
        self.noise
    }

    pub fn begin_loading(&mut self, pending: PendingLoad) {
        self.load_state = LoadState::Loading;
        self.pending_load = Some(pending);
    }

    /// Scrolls the virtual page by `delta` logical pixels. Like a page, it only
    /// counts as a scroll when the offset actually changes.
    pub fn on_scroll(&mut self, delta: f32, now: Duration) {
        let scroll_y = (self.scroll_y + delta).clamp(0.0, self.overlay.max_scroll().max(0.0));
        if scroll_y == self.scroll_y {
            return;
        }
        self.scroll_y = scroll_y;
        self.effect.on_scroll(now);
    }

    pub fn on_resize(&mut self, width: u32, height: u32, scale_factor: f64) {
        if width == 0 || height == 0 {
            return;
        }

        self.camera.set_viewport(width, height);
        self.noise.aspect_ratio = aspect_ratio(width, height);

        let scale_factor = scale_factor as f32;
        self.overlay
            .set_viewport(width as f32 / scale_factor, height as f32 / scale_factor);
        self.scroll_y = self.scroll_y.min(self.overlay.max_scroll().max(0.0));
    }

    pub fn handle_load_event(&mut self, event: LoadEvent, now: Duration) {
        if self.load_state != LoadState::Loading {
            log::warn!("Ignoring load event after the load finished");
            return;
        }

        match event {
            LoadEvent::Progress(progress) => {
                log::debug!("Model progress: {:?}", progress.percent());
                self.overlay.set_progress(progress);
            }
            LoadEvent::Loaded(asset) => match self.attach_model(&asset) {
                Ok(()) => {
                    log::info!(
                        "Loaded {} with {} meshes",
                        asset.path.display(),
                        self.scene.model_count()
                    );
                    self.load_state = LoadState::Loaded;
                    self.schedule_reveal(now);
                }
                Err(error) => self.fail_load(error),
            },
            LoadEvent::Failed(error) => self.fail_load(error),
        }
    }

    fn fail_load(&mut self, error: anyhow::Error) {
        log::error!("Failed to load model: {error:?}");
        self.load_state = LoadState::Failed;
    }

    fn attach_model(&mut self, asset: &GltfAsset) -> anyhow::Result<()> {
        self.scene
            .spawn_gltf_scene(
                &asset.document,
                &asset.buffers,
                &asset.images,
                self.load_group,
            )
            .map(|_| ())
    }

    fn schedule_reveal(&mut self, now: Duration) {
        let reveal = &self.config.reveal;

        let tweens = [
            Tween::new(AnimationChannel::LoadGroupY, reveal.load_group_start_y, 0.0)
                .scheduled(now, reveal.load_group),
            Tween::new(
                AnimationChannel::Style(Element::Loader, StyleProperty::OffsetYPercent),
                0.0,
                -100.0,
            )
            .scheduled(now, reveal.loader),
            Tween::new(
                AnimationChannel::Style(Element::NewDrop, StyleProperty::OffsetY),
                reveal.slide_offset,
                0.0,
            )
            .scheduled(now, reveal.new_drop),
            Tween::new(
                AnimationChannel::Style(Element::NewDrop, StyleProperty::Opacity),
                0.0,
                1.0,
            )
            .scheduled(now, reveal.new_drop),
            Tween::new(
                AnimationChannel::Style(Element::Header, StyleProperty::OffsetY),
                reveal.slide_offset,
                0.0,
            )
            .scheduled(now, reveal.header),
            Tween::new(
                AnimationChannel::Style(Element::Header, StyleProperty::Opacity),
                0.0,
                1.0,
            )
            .scheduled(now, reveal.header),
        ];

        for tween in tweens {
            self.animator.add(tween);
        }
    }

    fn reveal_content(&mut self, now: Duration) {
        let from = self.overlay.style(Element::Content).opacity;
        self.animator.add(
            Tween::new(
                AnimationChannel::Style(Element::Content, StyleProperty::Opacity),
                from,
                1.0,
            )
            .scheduled(now, self.config.reveal.content),
        );
    }

    fn poll_loader(&mut self, now: Duration) {
        let Some(mut pending) = self.pending_load.take() else {
            return;
        };

        while let Some(event) = pending.try_next() {
            self.handle_load_event(event, now);
        }

        if !pending.is_finished() {
            self.pending_load = Some(pending);
        }
    }

    /// Advances everything by one frame.
    pub fn update(&mut self, now: Duration) {
        let dt = self
            .last_update
            .map_or(0.0, |last| now.saturating_sub(last).as_secs_f32());
        self.last_update = Some(now);

        self.poll_loader(now);

        self.controls.update(&mut self.camera, dt);

        self.scene.set_object_rotation(
            self.scroll_group,
            Quat::from_rotation_y(self.scroll_y * self.config.scroll_rotation_factor),
        );

        self.effect.on_frame(now);
        self.noise.time = now.as_secs_f32();
        self.noise.effect = self.effect.strength();

        if self.overlay.update_in_view(self.scroll_y) {
            self.reveal_content(now);
        }

        let Self {
            animator,
            scene,
            overlay,
            load_group,
            ..
        } = self;
        animator.update(now, |channel, value| match channel {
            AnimationChannel::LoadGroupY => {
                scene.set_object_translation(*load_group, Vec3::new(0.0, value, 0.0))
            }
            AnimationChannel::Style(element, property) => {
                overlay.set_style(element, property, value)
            }
        });

        self.scene.late_update();
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        return 1.0;
    }
    width as f32 / height as f32
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::asset_loader::{LoadProgress, TRIANGLE_GLTF};

    fn state() -> ShowcaseState {
        ShowcaseState::new(ShowcaseConfig::default(), 1280, 720, 1.0)
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn triangle_asset() -> GltfAsset {
        let (document, buffers, images) =
            gltf::import_slice(TRIANGLE_GLTF.as_bytes()).unwrap();
        GltfAsset {
            path: "triangle.gltf".into(),
            document,
            buffers,
            images,
        }
    }

    #[test]
    fn scroll_rotation_follows_scroll_offset() {
        let mut state = state();

        for (step, delta) in [120.0, 40.0, -80.0, 300.0].into_iter().enumerate() {
            let now = ms(step as u64 * 16);
            state.on_scroll(delta, now);
            state.update(now);

            let rotation = state
                .scene
                .get_object(state.scroll_group())
                .unwrap()
                .transform
                .rotation();
            let expected = Quat::from_rotation_y(state.scroll_y() * 0.001);
            assert!(rotation.abs_diff_eq(expected, 1e-6));
        }

        // Rotation does not ease, so it is exact even while the effect is
        // still ramping up.
        assert!(state.effect.strength() < 0.5);
        assert_eq!(state.scroll_y(), 380.0);
    }

    #[test]
    fn scroll_is_clamped_to_the_page() {
        let mut state = state();
        state.on_scroll(-50.0, ms(0));
        assert_eq!(state.scroll_y(), 0.0);
        assert_eq!(state.effect.aim(), 0.0, "no movement means no scroll event");

        state.on_scroll(10_000.0, ms(0));
        assert_eq!(state.scroll_y(), 720.0);
        assert_eq!(state.effect.aim(), 1.0);
    }

    #[test]
    fn effect_returns_to_idle_after_scrolling_stops() {
        let mut state = state();
        state.on_scroll(100.0, ms(0));
        state.update(ms(0));
        state.on_scroll(100.0, ms(200));
        state.update(ms(200));

        state.update(ms(499));
        assert_eq!(state.effect.aim(), 1.0);
        state.update(ms(500));
        assert_eq!(state.effect.aim(), 0.0);
        assert_eq!(state.noise_params().effect, state.effect.strength());
    }

    #[test]
    fn resize_updates_camera_and_noise_aspect() {
        let mut state = state();
        state.on_resize(1000, 400, 2.0);

        assert_eq!(state.camera.aspect, 1000.0 / 400.0);
        assert_eq!(state.noise_params().aspect_ratio, 1000.0 / 400.0);
        // 200 logical pixels tall, so the page scrolls one viewport.
        assert_eq!(state.overlay.max_scroll(), 200.0);
    }

    #[test]
    fn progress_events_drive_loader_text() {
        let mut state = state();
        let mut shown = Vec::new();
        for loaded in [50, 100] {
            state.handle_load_event(
                LoadEvent::Progress(LoadProgress { loaded, total: 100 }),
                ms(0),
            );
            shown.push(state.overlay.loader_text().to_string());
        }
        assert_eq!(shown, ["50%", "100%"]);
    }

    #[test]
    fn failed_load_leaves_scene_empty_and_keeps_running() {
        let mut state = state();
        let (sender, receiver) = mpsc::channel();
        state.begin_loading(PendingLoad::new(receiver));
        sender
            .send(LoadEvent::Failed(anyhow::anyhow!("404")))
            .unwrap();

        for frame in 0..10 {
            state.update(ms(frame * 16));
        }

        assert_eq!(state.load_state(), LoadState::Failed);
        assert_eq!(state.scene.model_count(), 0);
        assert!(state.is_running());
        assert_eq!(state.overlay.style(Element::Loader).offset_y_percent, 0.0);
    }

    #[test]
    fn loaded_model_drops_into_place_on_schedule() {
        let mut state = state();
        state.update(ms(0));
        state.handle_load_event(LoadEvent::Loaded(Box::new(triangle_asset())), ms(1000));

        assert_eq!(state.load_state(), LoadState::Loaded);
        assert_eq!(state.scene.model_count(), 1);
        let shoe = state.scene.get_object_by_name("Shoe").unwrap();
        assert_eq!(
            state.scene.get_object(shoe).unwrap().parent_id,
            Some(state.load_group())
        );

        let load_group_y = |state: &ShowcaseState| {
            state
                .scene
                .get_object(state.load_group())
                .unwrap()
                .transform
                .translation()
                .y
        };

        // Nothing moves during the one second delay.
        state.update(ms(1900));
        assert_eq!(load_group_y(&state), -10.0);
        assert_eq!(state.overlay.style(Element::Loader).offset_y_percent, 0.0);

        state.update(ms(3000));
        let halfway = load_group_y(&state);
        assert!(halfway > -10.0 && halfway < 0.0);
        assert_eq!(state.overlay.style(Element::Loader).offset_y_percent, -100.0);
        assert_eq!(state.overlay.style(Element::NewDrop).opacity, 0.0);

        state.update(ms(3500));
        assert!(state.overlay.style(Element::NewDrop).opacity > 0.0);
        assert_eq!(state.overlay.style(Element::Header).opacity, 0.0);

        state.update(ms(5000));
        assert_eq!(load_group_y(&state), 0.0);
        assert_eq!(state.overlay.style(Element::Header).opacity, 1.0);
        assert_eq!(state.overlay.style(Element::Header).offset_y, 0.0);
        assert_eq!(state.overlay.style(Element::NewDrop).offset_y, 0.0);

        let world = state.scene.world_matrix(shoe).unwrap();
        assert!(world.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::ZERO, 1e-5));
        let model = state.scene.models.iter().next().unwrap().1;
        assert_eq!(model.instances().len(), 1);
    }

    const TEXTURED_SECOND_NODE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 1] }],
        "nodes": [
            { "name": "Shoe", "mesh": 0 },
            { "name": "Laces", "mesh": 1 }
        ],
        "meshes": [
            { "primitives": [{ "attributes": { "POSITION": 0 } }] },
            { "primitives": [{ "attributes": { "POSITION": 0 }, "material": 0 }] }
        ],
        "materials": [{
            "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } }
        }],
        "textures": [{ "source": 0 }],
        "images": [{ "uri": "laces.png" }],
        "buffers": [{
            "byteLength": 36,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
        }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }]
    }"#;

    #[test]
    fn failed_attach_leaves_no_partial_model() {
        let gltf = gltf::Gltf::from_slice(TEXTURED_SECOND_NODE_GLTF.as_bytes()).unwrap();
        let buffers = gltf::import_buffers(&gltf.document, None, None).unwrap();
        // Too few bytes for a 2x2 RGB image, so the second node fails to convert.
        let images = vec![gltf::image::Data {
            pixels: vec![0; 5],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 2,
        }];
        let asset = GltfAsset {
            path: "laces.gltf".into(),
            document: gltf.document,
            buffers,
            images,
        };

        let mut state = state();
        state.handle_load_event(LoadEvent::Loaded(Box::new(asset)), ms(0));
        state.update(ms(16));

        assert_eq!(state.load_state(), LoadState::Failed);
        assert_eq!(state.scene.model_count(), 0);
        assert!(state.scene.get_object_by_name("Shoe").is_none());
        assert!(state
            .scene
            .get_object(state.load_group())
            .unwrap()
            .child_ids
            .is_empty());
    }

    #[test]
    fn content_fades_in_after_scrolling_into_view() {
        let mut state = state();
        state.update(ms(0));
        assert_eq!(state.overlay.style(Element::Content).opacity, 0.0);

        state.on_scroll(200.0, ms(100));
        state.update(ms(100));
        state.update(ms(1000));
        assert_eq!(state.overlay.style(Element::Content).opacity, 0.0);

        state.update(ms(2100));
        assert_eq!(state.overlay.style(Element::Content).opacity, 1.0);
    }

    #[test]
    fn events_after_a_finished_load_are_ignored() {
        let mut state = state();
        state.handle_load_event(LoadEvent::Failed(anyhow::anyhow!("404")), ms(0));
        state.handle_load_event(LoadEvent::Loaded(Box::new(triangle_asset())), ms(16));

        assert_eq!(state.load_state(), LoadState::Failed);
        assert_eq!(state.scene.model_count(), 0);
    }

    #[test]
    fn stop_clears_running_flag() {
        let mut state = state();
        assert!(state.is_running());
        state.stop();
        assert!(!state.is_running());
    }
}
