// viewer.rs - the panorama viewer: input, resize, frames and teardown for one mounted instance

use crate::backend::{FrameState, HudSnapshot, RenderBackend, RenderOutcome, SurfaceSize, Viewport};
use crate::camera::{Camera, CameraOrientation, ZoomDirection};
use crate::config::ViewerConfig;
use crate::error::{ConfigError, ViewerError};
use crate::frame_loop::{FrameLoop, FrameScheduler};
use crate::input::{zoom_from_scroll, CursorAffordance, DragState, PinchAccumulator};
use crate::texture::{fit_equirect, placeholder_image, LoadState, TextureLoader};
use glam::Mat4;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Mounted into a zero-sized area; waits for a usable size before the loop starts.
    AwaitingSize,
    Mounted,
    Unmounted,
}

/// One interactive 360° view. All state is owned by the instance, so several can coexist.
///
/// Dropping the viewer tears it down the same way [`PanoramaViewer::unmount`] does.
pub struct PanoramaViewer<B: RenderBackend, S: FrameScheduler> {
    config: ViewerConfig,
    camera: Camera,
    drag: DragState,
    pinch: PinchAccumulator,
    sphere_rotation: f32,
    frame_loop: FrameLoop,
    loader: TextureLoader,
    load_state: LoadState,
    hud_visible: bool,
    surface: Option<SurfaceSize>,
    phase: Phase,
    backend: B,
    scheduler: S,
}

impl<B: RenderBackend, S: FrameScheduler> PanoramaViewer<B, S> {
    pub fn mount(
        config: ViewerConfig,
        mut backend: B,
        scheduler: S,
        viewport: Viewport,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        backend.upload_texture(&placeholder_image());
        let mut loader = TextureLoader::new();
        loader.start(config.image_source.clone());

        let mut viewer = Self {
            camera: Camera::new(config.initial_fov, 1.0),
            drag: DragState::default(),
            pinch: PinchAccumulator::default(),
            sphere_rotation: 0.0,
            frame_loop: FrameLoop::new(config.frame_timing),
            loader,
            load_state: LoadState::Pending,
            hud_visible: config.show_hud,
            surface: None,
            phase: Phase::AwaitingSize,
            backend,
            scheduler,
            config,
        };

        if viewport.is_empty() {
            log::warn!(
                "viewer mounted into an empty {}x{} area, waiting for a resize",
                viewport.width,
                viewport.height
            );
        } else {
            viewer.resize(viewport);
        }
        Ok(viewer)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn orientation(&self) -> CameraOrientation {
        self.camera.orientation
    }

    pub fn sphere_rotation(&self) -> f32 {
        self.sphere_rotation
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn cursor(&self) -> CursorAffordance {
        self.drag.cursor()
    }

    pub fn surface_size(&self) -> Option<SurfaceSize> {
        self.surface
    }

    pub fn is_running(&self) -> bool {
        self.frame_loop.is_running()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    fn attached(&self) -> bool {
        self.phase != Phase::Unmounted
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if self.attached() {
            self.drag.press(x, y);
        }
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if !self.attached() {
            return;
        }
        if let Some((dx, dy)) = self.drag.move_to(x, y) {
            self.camera
                .orientation
                .rotate_by_drag(dx as f32, dy as f32, self.config.sensitivity);
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag.release();
    }

    /// Positive `scroll_y` zooms in, negative zooms out; each event moves one step.
    pub fn wheel(&mut self, scroll_y: f32) {
        if let Some(direction) = zoom_from_scroll(scroll_y) {
            self.zoom(direction);
        }
    }

    /// Touchpad magnification, accumulated into zoom steps.
    pub fn pinch(&mut self, delta: f64) {
        if !self.attached() {
            return;
        }
        let steps = self.pinch.feed(delta, self.steps_across_fov_range());
        let direction = if steps > 0 {
            ZoomDirection::In
        } else {
            ZoomDirection::Out
        };
        for _ in 0..steps.unsigned_abs() {
            self.zoom(direction);
        }
    }

    /// Zoom steps needed to go from one end of the FOV range to the other.
    fn steps_across_fov_range(&self) -> u32 {
        let c = &self.config;
        let steps = ((c.max_fov - c.min_fov) / c.zoom_step).ceil();
        if steps.is_finite() {
            steps as u32
        } else {
            0
        }
    }

    pub fn zoom(&mut self, direction: ZoomDirection) {
        if !self.attached() {
            return;
        }
        let c = &self.config;
        self.camera
            .orientation
            .zoom(direction, c.zoom_step, c.min_fov, c.max_fov);
        self.camera.update_projection();
    }

    /// Camera aspect and render target follow the new size in one step. Empty sizes are ignored.
    pub fn resize(&mut self, viewport: Viewport) {
        if !self.attached() {
            return;
        }
        let Some(aspect) = viewport.aspect() else {
            log::debug!("ignoring resize to {}x{}", viewport.width, viewport.height);
            return;
        };

        let size = viewport.surface_size(self.config.max_pixel_ratio);
        self.camera.set_aspect(aspect);
        self.backend.resize(size);
        self.surface = Some(size);
        log::debug!(
            "viewer resized to {}x{} (render target {}x{})",
            viewport.width,
            viewport.height,
            size.width,
            size.height
        );

        if self.phase == Phase::AwaitingSize {
            self.phase = Phase::Mounted;
            self.frame_loop.start(&mut self.scheduler);
            log::info!("viewer mounted, showing {}", self.config.image_source.display());
        }
    }

    pub fn reset_view(&mut self) {
        self.camera.orientation = CameraOrientation::new(self.config.initial_fov);
        self.camera.update_projection();
    }

    pub fn toggle_hud(&mut self) {
        self.hud_visible = !self.hud_visible;
    }

    /// Show a different panorama. The sphere falls back to the placeholder until it decodes.
    pub fn replace_source(&mut self, path: PathBuf) {
        if !self.attached() {
            return;
        }
        self.backend.upload_texture(&placeholder_image());
        self.load_state = LoadState::Pending;
        self.loader.start(path.clone());
        self.config.image_source = path;
    }

    /// Run one frame. Returns `Ok(None)` when the loop is not running.
    pub fn frame(&mut self, now: Instant) -> Result<Option<RenderOutcome>, ViewerError> {
        let Some(dt) = self.frame_loop.begin(now) else {
            return Ok(None);
        };

        self.poll_texture();

        if self.config.auto_rotate {
            self.sphere_rotation += self.config.auto_rotate_speed * dt;
        }

        let state = self.frame_state();
        let outcome = self.backend.render(&state)?;
        self.frame_loop.end(&mut self.scheduler);
        Ok(Some(outcome))
    }

    pub fn frame_state(&self) -> FrameState {
        let model = Mat4::from_rotation_y(self.sphere_rotation);
        let o = self.camera.orientation;
        FrameState {
            view_projection: self.camera.view_projection() * model,
            sphere_rotation: self.sphere_rotation,
            hud: HudSnapshot {
                visible: self.hud_visible,
                load_state: self.load_state.clone(),
                yaw_deg: o.yaw.to_degrees(),
                pitch_deg: o.pitch.to_degrees(),
                fov_deg: o.fov,
                auto_rotate: self.config.auto_rotate,
            },
        }
    }

    fn poll_texture(&mut self) {
        match self.loader.poll() {
            Some(Ok(img)) => {
                let img = fit_equirect(img, self.backend.max_texture_dimension());
                let (width, height) = img.dimensions();
                self.backend.upload_texture(&img);
                self.load_state = LoadState::Loaded { width, height };
            }
            Some(Err(e)) => {
                log::warn!("panorama unavailable, keeping placeholder: {e}");
                self.load_state = LoadState::Failed(e.to_string());
            }
            None => {}
        }
    }

    /// Cancel the render loop, detach input, then release every GPU resource. Safe to call twice.
    pub fn unmount(&mut self) {
        if self.phase == Phase::Unmounted {
            return;
        }
        self.frame_loop.cancel(&mut self.scheduler);
        self.phase = Phase::Unmounted;
        self.drag.release();
        self.pinch.reset();
        self.loader.cancel();
        self.backend.release();
        log::info!(
            "viewer unmounted after {} frames",
            self.frame_loop.frames()
        );
    }
}

impl<B: RenderBackend, S: FrameScheduler> Drop for PanoramaViewer<B, S> {
    fn drop(&mut self) {
        self.unmount();
    }
}
