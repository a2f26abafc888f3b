// texture.rs - background image decoding and equirectangular fitting
//
// Decoding runs on a worker thread; the render loop polls for the result and never blocks on it.

use crate::error::LoadError;
use image::io::Reader as ImageReader;
use image::{GenericImage, GenericImageView, Rgba, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

/// Colour shown on the sphere until the panorama arrives, or if it never does.
pub const PLACEHOLDER_RGBA: [u8; 4] = [128, 128, 128, 255];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded { width: u32, height: u32 },
    Failed(String),
}

pub fn placeholder_image() -> RgbaImage {
    RgbaImage::from_pixel(1, 1, Rgba(PLACEHOLDER_RGBA))
}

struct LoadResult {
    generation: u64,
    result: Result<RgbaImage, LoadError>,
}

/// Hands decoded images back to the render thread. Results of superseded loads are dropped.
pub struct TextureLoader {
    tx: Sender<LoadResult>,
    rx: Receiver<LoadResult>,
    generation: u64,
}

impl TextureLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx, generation: 0 }
    }

    /// Start decoding `path`; any load still in flight is superseded.
    pub fn start(&mut self, path: PathBuf) {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();

        log::info!("loading panorama {} in background", path.display());
        thread::spawn(move || {
            let result = decode(&path);
            // The receiver is gone once the viewer has been torn down.
            let _ = tx.send(LoadResult { generation, result });
        });
    }

    /// Newest finished result of the current load, if any.
    pub fn poll(&mut self) -> Option<Result<RgbaImage, LoadError>> {
        let mut latest = None;
        while let Ok(done) = self.rx.try_recv() {
            if done.generation == self.generation {
                latest = Some(done.result);
            } else {
                log::debug!("dropping superseded panorama load #{}", done.generation);
            }
        }
        latest
    }

    /// Stop accepting results from loads already started.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn decode(path: &Path) -> Result<RgbaImage, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let img = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|mut r| {
            r.no_limits();
            r.decode()
        })
        .map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let (w, h) = img.dimensions();
    log::info!("decoded panorama {} ({w}x{h})", path.display());
    Ok(img.to_rgba8())
}

/// Make an image uploadable as an equirectangular texture:
/// - downscale so neither side exceeds `max_dimension`
/// - pad the top with black when the image is flatter than 2:1, keeping it at the bottom
pub fn fit_equirect(img: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();

    let img = if src_w > max_dimension || src_h > max_dimension {
        let scale = (max_dimension as f32 / src_w.max(src_h) as f32).min(1.0);
        let new_w = ((src_w as f32 * scale) as u32).clamp(1, max_dimension);
        let new_h = ((src_h as f32 * scale) as u32).clamp(1, max_dimension);
        log::warn!(
            "panorama {src_w}x{src_h} exceeds GPU limit {max_dimension}, scaling to {new_w}x{new_h}"
        );
        image::DynamicImage::ImageRgba8(img)
            .resize_exact(new_w, new_h, image::imageops::FilterType::Lanczos3)
            .to_rgba8()
    } else {
        img
    };

    let (w, h) = img.dimensions();
    let target_h = w / 2;
    if target_h > 0 && h < target_h {
        let mut canvas = RgbaImage::from_pixel(w, target_h, Rgba([0, 0, 0, 255]));
        // fits: same width, target_h > h
        if canvas.copy_from(&img, 0, target_h - h).is_ok() {
            return canvas;
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for(loader: &mut TextureLoader) -> Result<RgbaImage, LoadError> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(r) = loader.poll() {
                return r;
            }
            assert!(Instant::now() < deadline, "load timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn oversized_images_are_scaled_to_the_limit() {
        let img = RgbaImage::from_pixel(4096, 2048, Rgba([10, 20, 30, 255]));
        let out = fit_equirect(img, 1024);
        assert_eq!(out.dimensions(), (1024, 512));
    }

    #[test]
    fn flat_images_are_padded_at_the_top() {
        let img = RgbaImage::from_pixel(400, 100, Rgba([255, 255, 255, 255]));
        let out = fit_equirect(img, 8192);
        assert_eq!(out.dimensions(), (400, 200));
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(out.get_pixel(0, 199), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn proper_equirect_is_untouched() {
        let img = RgbaImage::from_pixel(64, 32, Rgba([1, 2, 3, 255]));
        let out = fit_equirect(img.clone(), 8192);
        assert_eq!(out, img);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let mut loader = TextureLoader::new();
        loader.start(PathBuf::from("definitely/not/here/panorama.jpg"));
        assert!(matches!(wait_for(&mut loader), Err(LoadError::Io { .. })));
    }

    #[test]
    fn decodes_png_from_disk() {
        let path = std::env::temp_dir().join(format!("pano_loader_{}.png", std::process::id()));
        RgbaImage::from_pixel(8, 4, Rgba([9, 9, 9, 255])).save(&path).unwrap();

        let mut loader = TextureLoader::new();
        loader.start(path.clone());
        let img = wait_for(&mut loader).unwrap();
        assert_eq!(img.dimensions(), (8, 4));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn cancelled_loads_are_discarded() {
        let mut loader = TextureLoader::new();
        loader.start(PathBuf::from("nope.jpg"));
        loader.cancel();
        thread::sleep(Duration::from_millis(100));
        assert!(loader.poll().is_none());
    }
}
