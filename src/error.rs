// error.rs - error types for the viewer, its config and image loading

use std::path::PathBuf;
use thiserror::Error;

/// Failures while acquiring or driving the rendering resources.
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create rendering surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("failed to request GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("rendering surface reports no supported {0}")]
    UnsupportedSurface(&'static str),

    #[error("rendering surface ran out of memory")]
    OutOfMemory,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("image source must not be empty")]
    EmptySource,

    #[error("field-of-view range is invalid: min {min}, max {max}")]
    InvalidFovRange { min: f32, max: f32 },

    #[error("initial field-of-view {fov} lies outside [{min}, {max}]")]
    FovOutOfRange { fov: f32, min: f32, max: f32 },

    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidNumber { name: &'static str, value: f32 },

    #[error("sphere radius {radius} must lie between the clip planes ({near}, {far})")]
    SphereRadius { radius: f32, near: f32, far: f32 },

    #[error("max pixel ratio must be at least 1 (got {0})")]
    InvalidPixelRatio(f32),

    #[error("sphere needs at least 3 width and 2 height segments")]
    TooFewSegments,

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while reading or decoding a panorama image.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
