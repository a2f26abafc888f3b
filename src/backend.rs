// backend.rs - what the viewer needs from a GPU backend

use crate::texture::LoadState;
use glam::Mat4;
use image::RgbaImage;

/// Logical size of the area the viewer fills, plus the display's pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale_factor: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, scale_factor: f64) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width >= 1.0 && self.height >= 1.0)
    }

    /// Width over height, `None` for an empty viewport.
    pub fn aspect(&self) -> Option<f32> {
        (!self.is_empty()).then(|| (self.width / self.height) as f32)
    }

    /// Pixel size of the render target: logical size times the pixel ratio, capped at `max_ratio`.
    pub fn surface_size(&self, max_ratio: f32) -> SurfaceSize {
        let ratio = self.scale_factor.clamp(1.0, f64::from(max_ratio).max(1.0));
        SurfaceSize {
            width: (self.width * ratio).round().max(1.0) as u32,
            height: (self.height * ratio).round().max(1.0) as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

/// Read-outs for the status bar.
#[derive(Debug, Clone, PartialEq)]
pub struct HudSnapshot {
    pub visible: bool,
    pub load_state: LoadState,
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub fov_deg: f32,
    pub auto_rotate: bool,
}

/// Everything one frame needs.
#[derive(Debug, Clone)]
pub struct FrameState {
    /// projection * view * sphere model
    pub view_projection: Mat4,
    pub sphere_rotation: f32,
    pub hud: HudSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Presented,
    /// Surface was lost or out of date; it has been reconfigured and the frame dropped.
    Skipped,
}

/// GPU side of one viewer: sphere geometry, material, texture and render surface.
///
/// Created by the caller (acquisition fails fast there); the viewer owns it afterwards and calls
/// [`RenderBackend::release`] exactly once, after the render loop has been cancelled.
pub trait RenderBackend {
    /// Largest texture side the device accepts.
    fn max_texture_dimension(&self) -> u32;

    /// Resize the render target. Called together with the camera aspect update.
    fn resize(&mut self, size: SurfaceSize);

    /// Replace the sphere's texture.
    fn upload_texture(&mut self, image: &RgbaImage);

    fn render(&mut self, frame: &FrameState) -> Result<RenderOutcome, crate::error::ViewerError>;

    /// Dispose geometry, material, texture and render surface.
    fn release(&mut self);
}
