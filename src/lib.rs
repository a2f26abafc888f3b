//! Interactive 360° viewer for BedahGang design-module panoramas.
//!
//! An equirectangular image is painted on the inside of a large sphere; the camera sits at its
//! centre, turns with pointer drags and zooms by narrowing its field-of-view. [`PanoramaViewer`]
//! holds all interaction state for one instance and drives a [`RenderBackend`] through an explicit
//! render loop that is cancelled before any GPU resource is released.

pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
pub mod frame_loop;
pub mod input;
pub mod mesh;
pub mod renderer;
pub mod texture;
pub mod viewer;

pub use backend::{FrameState, RenderBackend, RenderOutcome, SurfaceSize, Viewport};
pub use camera::{CameraOrientation, ZoomDirection};
pub use config::{FrameTiming, ViewerConfig};
pub use error::{ConfigError, LoadError, ViewerError};
pub use frame_loop::{FrameScheduler, RedrawScheduler};
pub use texture::LoadState;
pub use viewer::{PanoramaViewer, Phase};
