//! Sketch settings, loaded from a RON file.
//!
//! Every field falls back to its default, so a settings file only needs to mention what it changes:
//!
//! ```ron
//! (
//! 	sketch: (duration: 8.0),
//! 	scene: (surface: (twist: 3.0)),
//! )
//! ```

use std::{
	env, fs,
	path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::ecs;

/// Environment variable pointing to a settings file, takes precedence over [`DEFAULT_SETTINGS_FILE`]
pub const SETTINGS_ENV_VAR: &str = "HELICOID_SETTINGS";
pub const DEFAULT_SETTINGS_FILE: &str = "sketch.ron";

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(ecs::Resource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
	pub sketch: SketchSettings,
	pub window: WindowSettings,
	pub scene: SceneSettings,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SketchSettings {
	/// Length of the animation loop in seconds
	pub duration: f32,
	pub animate: bool,
	/// Frame rate cap, renders as often as possible when `None`
	pub fps: Option<u32>,
	/// Fixed update rate
	pub ups: u32,
	pub clear_color: [f64; 4],
	/// Where captured frames are written
	pub export_dir: PathBuf,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WindowSettings {
	pub title: String,
	pub width: u32,
	pub height: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SceneSettings {
	pub surface: SurfaceSettings,
	pub balls: BallSettings,
	pub material: MaterialSettings,
	pub lights: LightSettings,
	pub camera: CameraSettings,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SurfaceSettings {
	pub slices: u32,
	pub stacks: u32,
	/// How many full turns the surface makes around its axis
	pub twist: f32,
	pub height_scale: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BallSettings {
	pub radius: f32,
	pub detail: u32,
	pub orbit_radius: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MaterialSettings {
	pub color: [f32; 3],
	pub roughness: f32,
	pub metalness: f32,
	pub clearcoat: f32,
	pub clearcoat_roughness: f32,
	pub palette: PaletteSettings,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PaletteSettings {
	pub enabled: bool,
	pub a: [f32; 3],
	pub b: [f32; 3],
	pub c: [f32; 3],
	pub d: [f32; 3],
	/// How much the playhead shifts the palette phase
	pub playhead_weight: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LightSettings {
	pub ambient_color: [f32; 3],
	pub ambient_intensity: f32,
	pub directional_color: [f32; 3],
	pub directional_intensity: f32,
	pub position: [f32; 3],
	pub target: [f32; 3],
	pub shadow: ShadowSettings,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ShadowSettings {
	pub enabled: bool,
	pub map_size: u32,
	/// Half-size of the orthographic shadow camera
	pub extent: f32,
	pub near: f32,
	pub far: f32,
	pub bias: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
	pub fov_y_degrees: f32,
	pub near: f32,
	pub far: f32,
	pub position: [f32; 3],
	pub target: [f32; 3],
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

impl Default for SketchSettings {
	fn default() -> Self {
		Self {
			duration: 5.0,
			animate: true,
			fps: None,
			ups: 60,
			clear_color: [0.0, 0.0, 0.0, 1.0],
			export_dir: PathBuf::from("output"),
		}
	}
}

impl Default for WindowSettings {
	fn default() -> Self {
		Self {
			title: "Helicoid".to_string(),
			width: 1080,
			height: 1080,
		}
	}
}

impl Default for SurfaceSettings {
	fn default() -> Self {
		Self {
			slices: 100,
			stacks: 100,
			twist: 5.0,
			height_scale: 1.5,
		}
	}
}

impl Default for BallSettings {
	fn default() -> Self {
		Self {
			radius: 0.26,
			detail: 5,
			orbit_radius: 0.5,
		}
	}
}

impl Default for MaterialSettings {
	fn default() -> Self {
		Self {
			// #ffffcc
			color: [1.0, 1.0, 0.8],
			roughness: 0.0,
			metalness: 0.5,
			clearcoat: 1.0,
			clearcoat_roughness: 0.4,
			palette: PaletteSettings::default(),
		}
	}
}

impl Default for PaletteSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			a: [0.5, 0.5, 0.5],
			b: [0.5, 0.5, 0.5],
			c: [1.0, 1.0, 1.0],
			d: [0.0, 0.1, 0.2],
			playhead_weight: 0.0,
		}
	}
}

impl Default for LightSettings {
	fn default() -> Self {
		Self {
			ambient_color: [1.0, 1.0, 1.0],
			ambient_intensity: 1.0,
			directional_color: [1.0, 1.0, 1.0],
			directional_intensity: 1.0,
			position: [1.0, 0.0, 1.0],
			target: [0.0, 0.0, 0.0],
			shadow: ShadowSettings::default(),
		}
	}
}

impl Default for ShadowSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			map_size: 2048,
			extent: 2.0,
			near: 0.5,
			far: 500.0,
			bias: 0.00001,
		}
	}
}

impl Default for CameraSettings {
	fn default() -> Self {
		Self {
			fov_y_degrees: 50.0,
			near: 0.01,
			far: 100.0,
			position: [0.0, 0.0, 4.0],
			target: [0.0, 0.0, 0.0],
		}
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

impl Settings {
	/// Loads the settings file named by [`SETTINGS_ENV_VAR`], or [`DEFAULT_SETTINGS_FILE`] if it exists in the
	/// working directory. Falls back to the defaults otherwise.
	pub fn load() -> Result<Self> {
		if let Some(path) = env::var_os(SETTINGS_ENV_VAR) {
			return Self::from_file(path);
		}

		if Path::new(DEFAULT_SETTINGS_FILE).is_file() {
			return Self::from_file(DEFAULT_SETTINGS_FILE);
		}

		debug!("No settings file found, using defaults");
		let settings = Self::default();
		settings.validate()?;
		Ok(settings)
	}

	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let contents =
			fs::read_to_string(path).with_context(|| format!("Couldn't read settings file `{}`", path.display()))?;

		info!("Loading settings from `{}`", path.display());
		Self::from_ron(&contents).with_context(|| format!("Invalid settings file `{}`", path.display()))
	}

	pub fn from_ron(source: &str) -> Result<Self> {
		let settings: Self = ron::from_str(source)?;
		settings.validate()?;
		Ok(settings)
	}

	pub fn validate(&self) -> Result<()> {
		let Self { sketch, window, scene } = self;

		if !(sketch.duration > 0.0) {
			bail!("sketch.duration must be positive, got {}", sketch.duration);
		}
		if sketch.ups == 0 {
			bail!("sketch.ups must be at least 1");
		}
		if sketch.fps == Some(0) {
			bail!("sketch.fps must be at least 1 when set");
		}
		if window.width == 0 || window.height == 0 {
			bail!("window size must be non-zero, got {}x{}", window.width, window.height);
		}
		if scene.surface.slices == 0 || scene.surface.stacks == 0 {
			bail!(
				"surface resolution must be non-zero, got {}x{}",
				scene.surface.slices,
				scene.surface.stacks
			);
		}
		if !(scene.balls.radius > 0.0) {
			bail!("balls.radius must be positive, got {}", scene.balls.radius);
		}
		if !(scene.balls.orbit_radius > 0.0) {
			bail!("balls.orbit_radius must be positive, got {}", scene.balls.orbit_radius);
		}
		let shadow = &scene.lights.shadow;
		if !(shadow.extent > 0.0) {
			bail!("shadow.extent must be positive, got {}", shadow.extent);
		}
		if !(shadow.far > shadow.near) {
			bail!("shadow planes must satisfy near < far, got {} and {}", shadow.near, shadow.far);
		}
		if !scene.lights.shadow.map_size.is_power_of_two() {
			bail!(
				"shadow.map_size must be a power of two, got {}",
				scene.lights.shadow.map_size
			);
		}
		if !(scene.camera.near > 0.0 && scene.camera.far > scene.camera.near) {
			bail!("camera planes must satisfy 0 < near < far");
		}

		Ok(())
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		Settings::default().validate().unwrap();
	}

	#[test]
	fn empty_file_gives_defaults() {
		assert_eq!(Settings::from_ron("()").unwrap(), Settings::default());
	}

	#[test]
	fn partial_file_overrides_only_named_fields() {
		let settings = Settings::from_ron(
			r#"(
				sketch: (duration: 8.0, fps: Some(30)),
				scene: (surface: (twist: 3.0)),
			)"#,
		)
		.unwrap();

		assert_eq!(settings.sketch.duration, 8.0);
		assert_eq!(settings.sketch.fps, Some(30));
		assert!(settings.sketch.animate);
		assert_eq!(settings.scene.surface.twist, 3.0);
		assert_eq!(settings.scene.surface.slices, 100);
		assert_eq!(settings.scene.balls, BallSettings::default());
	}

	#[test]
	fn rejects_non_positive_duration() {
		assert!(Settings::from_ron("(sketch: (duration: 0.0))").is_err());
		assert!(Settings::from_ron("(sketch: (duration: -1.0))").is_err());
	}

	#[test]
	fn rejects_zero_resolution() {
		assert!(Settings::from_ron("(scene: (surface: (slices: 0)))").is_err());
	}

	#[test]
	fn rejects_non_positive_radii() {
		assert!(Settings::from_ron("(scene: (balls: (radius: 0.0)))").is_err());
		assert!(Settings::from_ron("(scene: (balls: (radius: -0.2)))").is_err());
		assert!(Settings::from_ron("(scene: (balls: (orbit_radius: 0.0)))").is_err());
		assert!(Settings::from_ron("(scene: (balls: (orbit_radius: -1.0)))").is_err());
	}

	#[test]
	fn rejects_degenerate_shadow_camera() {
		assert!(Settings::from_ron("(scene: (lights: (shadow: (extent: 0.0))))").is_err());
		assert!(Settings::from_ron("(scene: (lights: (shadow: (near: 5.0, far: 1.0))))").is_err());
		assert!(Settings::from_ron("(scene: (lights: (shadow: (near: 2.0, far: 2.0))))").is_err());
	}

	#[test]
	fn rejects_unknown_syntax() {
		assert!(Settings::from_ron("(sketch: (duration: \"long\"))").is_err());
	}

	#[test]
	fn round_trips_through_ron() {
		let settings = Settings::default();
		let source = ron::ser::to_string_pretty(&settings, ron::ser::PrettyConfig::default()).unwrap();
		assert_eq!(Settings::from_ron(&source).unwrap(), settings);
	}
}
