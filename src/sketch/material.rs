use glam::{Vec3, Vec4};
use helicoid_sketch_derive::ShaderStruct;

use super::palette::{Palette, PALETTE_PHASE};
use crate::{
	config::MaterialSettings,
	core::{
		buffer::struct_definitions,
		shader::{Shader, ShaderBuilder},
	},
	ecs,
};

/// Marker in `physical.wgsl`, right after the base diffuse color is set up
pub const DIFFUSE_COLOR_HOOK: &str = "// #hook diffuse_color";

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Physical material parameters, as uploaded to the material bind group
#[repr(C)]
#[derive(ShaderStruct, bytemuck::Pod, bytemuck::Zeroable, ecs::Component, Copy, Clone, Debug, Default, PartialEq)]
pub struct MaterialUniform {
	pub base_color: Vec4,
	/// Roughness, metalness, clearcoat, clearcoat roughness
	pub pbr: Vec4,
	pub palette_a: Vec4,
	pub palette_b: Vec4,
	pub palette_c: Vec4,
	/// w is the playhead weight
	pub palette_d: Vec4,
	/// x is the playhead
	pub playhead: Vec4,
}

impl MaterialUniform {
	pub fn new(settings: &MaterialSettings) -> Self {
		let [palette_a, palette_b, palette_c, palette_d] = Palette::from(&settings.palette).coefficients();

		Self {
			base_color: Vec3::from(settings.color).extend(1.0),
			pbr: Vec4::new(
				settings.roughness,
				settings.metalness,
				settings.clearcoat,
				settings.clearcoat_roughness,
			),
			palette_a,
			palette_b,
			palette_c,
			palette_d,
			playhead: Vec4::ZERO,
		}
	}

	pub fn set_playhead(&mut self, playhead: f32) {
		self.playhead.x = playhead;
	}
}

/// Entities whose material follows the playback playhead
#[derive(ecs::Component, Copy, Clone, Debug, Default)]
pub struct PlayheadDriven;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// The physical material shader, recolored with the cosine palette when it's enabled
pub fn material_shader(settings: &MaterialSettings, definitions: &[Option<String>]) -> ShaderBuilder {
	let mut builder = ShaderBuilder::new();

	builder
		.include_path("physical.wgsl")
		.prepend(struct_definitions(definitions));

	if settings.palette.enabled {
		builder
			.prepend(format!("const PALETTE_FREQUENCY: f32 = {:?};", 2.0 * PALETTE_PHASE))
			.inject(DIFFUSE_COLOR_HOOK, Shader::path("palette.wgsl"));
	}

	builder
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		core::{buffer::ShaderType, rendering::camera_view::CameraView},
		sketch::{lights::LightUniform, model::ModelUniform},
		ShaderAssets,
	};

	fn definitions() -> Vec<Option<String>> {
		vec![
			CameraView::struct_definition(),
			LightUniform::struct_definition(),
			ModelUniform::struct_definition(),
			MaterialUniform::struct_definition(),
		]
	}

	#[test]
	fn uniform_from_settings() {
		let uniform = MaterialUniform::new(&MaterialSettings::default());

		assert_eq!(uniform.base_color, Vec4::new(1.0, 1.0, 0.8, 1.0));
		assert_eq!(uniform.pbr, Vec4::new(0.0, 0.5, 1.0, 0.4));
		assert_eq!(uniform.palette_d, Vec4::new(0.0, 0.1, 0.2, 0.0));
		assert_eq!(uniform.playhead, Vec4::ZERO);
	}

	#[test]
	fn palette_is_injected_before_the_hook() {
		let source = material_shader(&MaterialSettings::default(), &definitions())
			.build_source::<ShaderAssets>()
			.unwrap();

		let snippet = source.find("let diff = dot(vec3(1.0), v_normal);").unwrap();
		let hook = source.find(DIFFUSE_COLOR_HOOK).unwrap();
		let base = source.find("var diffuse_color = material.base_color;").unwrap();

		assert!(base < snippet && snippet < hook);
		assert!(source.contains("const PALETTE_FREQUENCY: f32 = 6.303184;"));
		assert!(source.contains("struct MaterialUniform {"));
		assert!(!source.contains("#include"));
		assert!(!source.contains("PCF_RADIUS"));
	}

	#[test]
	fn shadow_bias_pushes_the_receiver_away_from_the_light() {
		let source = material_shader(&MaterialSettings::default(), &definitions())
			.build_source::<ShaderAssets>()
			.unwrap();

		assert!(source.contains("let depth = ndc.z + light.shadow.x;"));
	}

	#[test]
	fn plain_material_without_palette() {
		let mut settings = MaterialSettings::default();
		settings.palette.enabled = false;

		let source = material_shader(&settings, &definitions())
			.build_source::<ShaderAssets>()
			.unwrap();

		assert!(source.contains(DIFFUSE_COLOR_HOOK));
		assert!(!source.contains("PALETTE_FREQUENCY"));
		assert!(!source.contains("let diff ="));
	}
}
