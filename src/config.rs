// config.rs - viewer options, resolved from CLI flags, PANORAMA_* env vars and an optional JSON file
//
// Resolution order (later wins):
// - built-in defaults
// - JSON file from --config <file> or PANORAMA_CONFIG
// - CLI flags
// The image comes from the positional argument (or PANORAMA_IMAGE), --module-dir <dir>
// (<dir>/panorama.jpg), or the JSON file, in that order.

use crate::camera::{FAR_PLANE, NEAR_PLANE};
use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name every design module ships its panorama under.
pub const MODULE_PANORAMA_FILE: &str = "panorama.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameTiming {
    /// Advance auto-rotation by an assumed ~60 fps frame interval.
    #[default]
    Fixed,
    /// Advance auto-rotation by the measured time between frames.
    Measured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub image_source: PathBuf,
    /// Vertical field-of-view in degrees at mount.
    pub initial_fov: f32,
    pub min_fov: f32,
    pub max_fov: f32,
    /// Degrees per wheel notch or pinch step.
    pub zoom_step: f32,
    /// Radians per pointer pixel.
    pub sensitivity: f32,
    pub auto_rotate: bool,
    /// Radians per second.
    pub auto_rotate_speed: f32,
    pub max_pixel_ratio: f32,
    pub frame_timing: FrameTiming,
    pub sphere_radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub show_hud: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            image_source: PathBuf::new(),
            initial_fov: 75.0,
            min_fov: 30.0,
            max_fov: 100.0,
            zoom_step: 2.0,
            sensitivity: 0.0025,
            auto_rotate: false,
            auto_rotate_speed: 0.15,
            max_pixel_ratio: 2.0,
            frame_timing: FrameTiming::Fixed,
            sphere_radius: 500.0,
            width_segments: 64,
            height_segments: 48,
            show_hud: true,
        }
    }
}

impl ViewerConfig {
    pub fn with_source(source: impl Into<PathBuf>) -> Self {
        Self {
            image_source: source.into(),
            ..Self::default()
        }
    }

    /// Panorama path of a design module whose assets live under `base`.
    pub fn module_panorama(base: impl AsRef<Path>) -> PathBuf {
        base.as_ref().join(MODULE_PANORAMA_FILE)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image_source.as_os_str().is_empty() {
            return Err(ConfigError::EmptySource);
        }
        if !(self.min_fov > 0.0 && self.min_fov < self.max_fov && self.max_fov < 180.0) {
            return Err(ConfigError::InvalidFovRange {
                min: self.min_fov,
                max: self.max_fov,
            });
        }
        if !(self.min_fov..=self.max_fov).contains(&self.initial_fov) {
            return Err(ConfigError::FovOutOfRange {
                fov: self.initial_fov,
                min: self.min_fov,
                max: self.max_fov,
            });
        }
        for (name, value) in [
            ("zoom_step", self.zoom_step),
            ("sensitivity", self.sensitivity),
            ("auto_rotate_speed", self.auto_rotate_speed),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidNumber { name, value });
            }
        }
        // outside the clip range the sphere is cut away and only the clear colour shows
        if !(self.sphere_radius > NEAR_PLANE && self.sphere_radius < FAR_PLANE) {
            return Err(ConfigError::SphereRadius {
                radius: self.sphere_radius,
                near: NEAR_PLANE,
                far: FAR_PLANE,
            });
        }
        if !(self.max_pixel_ratio >= 1.0) {
            return Err(ConfigError::InvalidPixelRatio(self.max_pixel_ratio));
        }
        if self.width_segments < 3 || self.height_segments < 2 {
            return Err(ConfigError::TooFewSegments);
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve from the process arguments and environment. Argument errors print usage and exit.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    /// Layer parsed arguments over the JSON file (if any) and the defaults.
    pub fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };

        if let Some(image) = cli.image {
            config.image_source = image;
        } else if let Some(dir) = cli.module_dir {
            config.image_source = Self::module_panorama(dir);
        }

        if let Some(fov) = cli.fov {
            config.initial_fov = fov;
        }
        if cli.autorotate {
            config.auto_rotate = true;
        }
        if let Some(speed) = cli.autorotate_speed {
            config.auto_rotate_speed = speed;
        }
        if cli.measured_timing {
            config.frame_timing = FrameTiming::Measured;
        }
        if cli.no_hud {
            config.show_hud = false;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Interactive 360° viewer for BedahGang design-module panoramas
#[derive(Parser, Debug, Default)]
#[command(name = "bedahgang-panorama", version)]
pub struct CliArgs {
    /// Equirectangular panorama to show
    #[arg(env = "PANORAMA_IMAGE", value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// Design module directory; shows <DIR>/panorama.jpg
    #[arg(long, value_name = "DIR")]
    pub module_dir: Option<PathBuf>,

    /// JSON file with viewer options
    #[arg(long, env = "PANORAMA_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Initial vertical field-of-view in degrees
    #[arg(long, value_name = "DEG")]
    pub fov: Option<f32>,

    /// Slowly turn the panorama
    #[arg(long)]
    pub autorotate: bool,

    /// Auto-rotation speed in radians per second
    #[arg(long, value_name = "RAD_PER_S")]
    pub autorotate_speed: Option<f32>,

    /// Advance auto-rotation by measured frame time instead of a fixed 1/60 s
    #[arg(long)]
    pub measured_timing: bool,

    /// Start with the status bar hidden
    #[arg(long)]
    pub no_hud: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn cli(list: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("bedahgang-panorama").chain(list.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_the_design_module_viewer() {
        let c = ViewerConfig::default();
        assert_eq!(c.initial_fov, 75.0);
        assert_eq!((c.min_fov, c.max_fov), (30.0, 100.0));
        assert_eq!(c.zoom_step, 2.0);
        assert!(!c.auto_rotate);
        assert_eq!(c.auto_rotate_speed, 0.15);
        assert_eq!(c.max_pixel_ratio, 2.0);
        assert_eq!(c.frame_timing, FrameTiming::Fixed);
    }

    #[test]
    fn empty_source_is_rejected() {
        let err = ViewerConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::EmptySource));
    }

    #[test]
    fn initial_fov_must_lie_in_range() {
        let mut c = ViewerConfig::with_source("pano.jpg");
        c.initial_fov = 120.0;
        assert!(matches!(c.validate(), Err(ConfigError::FovOutOfRange { .. })));
        c.initial_fov = 75.0;
        c.min_fov = 110.0;
        assert!(matches!(c.validate(), Err(ConfigError::InvalidFovRange { .. })));
    }

    #[test]
    fn negative_speed_is_rejected() {
        let mut c = ViewerConfig::with_source("pano.jpg");
        c.auto_rotate_speed = -1.0;
        assert!(matches!(
            c.validate(),
            Err(ConfigError::InvalidNumber { name: "auto_rotate_speed", .. })
        ));
    }

    #[test]
    fn sphere_radius_must_sit_between_the_clip_planes() {
        let mut c = ViewerConfig::with_source("pano.jpg");
        for radius in [0.0, NEAR_PLANE, FAR_PLANE, 2000.0, f32::NAN] {
            c.sphere_radius = radius;
            assert!(
                matches!(c.validate(), Err(ConfigError::SphereRadius { .. })),
                "radius {radius} accepted"
            );
        }
        c.sphere_radius = 500.0;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn cli_flags_override_defaults() {
        let c = ViewerConfig::resolve(cli(&[
            "pano.jpg",
            "--fov",
            "60",
            "--autorotate",
            "--autorotate-speed",
            "0.3",
            "--measured-timing",
            "--no-hud",
        ]))
        .unwrap();
        assert_eq!(c.image_source, PathBuf::from("pano.jpg"));
        assert_eq!(c.initial_fov, 60.0);
        assert!(c.auto_rotate);
        assert_eq!(c.auto_rotate_speed, 0.3);
        assert_eq!(c.frame_timing, FrameTiming::Measured);
        assert!(!c.show_hud);
    }

    #[test]
    fn module_dir_resolves_to_module_panorama() {
        let c = ViewerConfig::resolve(CliArgs {
            module_dir: Some(PathBuf::from("modules/A1")),
            ..CliArgs::default()
        })
        .unwrap();
        assert_eq!(c.image_source, Path::new("modules/A1").join("panorama.jpg"));
    }

    #[test]
    fn image_and_config_can_come_from_the_environment() {
        let cmd = CliArgs::command();
        let env_of = |id: &str| {
            cmd.get_arguments()
                .find(|a| a.get_id() == id)
                .and_then(|a| a.get_env())
                .map(|e| e.to_os_string())
        };
        assert_eq!(env_of("image"), Some("PANORAMA_IMAGE".into()));
        assert_eq!(env_of("config"), Some("PANORAMA_CONFIG".into()));
    }

    #[test]
    fn out_of_range_fov_flag_fails_validation() {
        let err = ViewerConfig::resolve(CliArgs {
            image: Some(PathBuf::from("x.jpg")),
            fov: Some(150.0),
            ..CliArgs::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::FovOutOfRange { .. }));
    }

    #[test]
    fn bad_flags_are_rejected_by_the_parser() {
        let parse = |list: &[&str]| {
            CliArgs::try_parse_from(std::iter::once("bedahgang-panorama").chain(list.iter().copied()))
        };
        let err = parse(&["x.jpg", "--fov", "wide"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        let err = parse(&["x.jpg", "--wat"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert!(parse(&["x.jpg", "--fov"]).is_err());
        assert!(parse(&["a.jpg", "b.jpg"]).is_err());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = ViewerConfig::resolve(CliArgs {
            image: Some(PathBuf::from("x.jpg")),
            config: Some(PathBuf::from("does/not/exist.json")),
            ..CliArgs::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: ViewerConfig =
            serde_json::from_str(r#"{ "image_source": "a.jpg", "auto_rotate": true, "frame_timing": "measured" }"#)
                .unwrap();
        assert!(c.auto_rotate);
        assert_eq!(c.frame_timing, FrameTiming::Measured);
        assert_eq!(c.initial_fov, 75.0);
        assert!(c.validate().is_ok());
    }
}
