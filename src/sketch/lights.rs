use std::sync::Arc;

use anyhow::{ensure, Result};
use derive_more::Deref;
use glam::{Mat4, Vec3, Vec4};
use helicoid_sketch_derive::ShaderStruct;
use log::debug;
use wgpu::{BindGroupLayout, ShaderStages};

use crate::{
	config::{LightSettings, Settings},
	core::{
		buffer::{self, UniformBuffer},
		gpu::Gpu,
	},
	ecs::{self, App, Plugin},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct LightsPlugin;

impl Plugin for LightsPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let settings = app.world.resource::<Settings>().scene.lights.clone();
		let gpu = app.world.resource::<Gpu>();

		let uniform = LightUniform::new(&settings)?;
		let layout = UniformBuffer::<LightUniform>::create_layout(&gpu.device, ShaderStages::VERTEX_FRAGMENT);
		let light_buffer = UniformBuffer::<LightUniform>::new(&gpu.device, "Directional Light", layout.clone());

		debug!("Directional light towards {:?}", uniform.direction.truncate());

		app.world.spawn((DirectionalLight, uniform, light_buffer));
		app.insert_resource(LightLayout(layout));

		// Static for now, but kept in sync like every other uniform
		buffer::register_uniform::<LightUniform>(app);

		Ok(())
	}
}

/// Bind group layout of the light on its own, as the shadow pass uses it
#[derive(ecs::Resource, Deref)]
pub struct LightLayout(pub Arc<BindGroupLayout>);

/// The one shadow-casting light of the scene
#[derive(ecs::Component, Copy, Clone, Debug, Default)]
pub struct DirectionalLight;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[repr(C)]
#[derive(ShaderStruct, bytemuck::Pod, bytemuck::Zeroable, ecs::Component, Copy, Clone, Debug, Default, PartialEq)]
pub struct LightUniform {
	/// Orthographic shadow camera
	pub view_proj: Mat4,
	/// Ambient color premultiplied by its intensity
	pub ambient: Vec4,
	/// Unit vector from the surface towards the light
	pub direction: Vec4,
	pub color: Vec4,
	/// Bias, texel size, enabled flag
	pub shadow: Vec4,
}

impl LightUniform {
	pub fn new(settings: &LightSettings) -> Result<Self> {
		let position = Vec3::from(settings.position);
		let target = Vec3::from(settings.target);
		let towards_light = position - target;

		ensure!(
			towards_light.length_squared() > 0.0,
			"directional light position and target must differ"
		);

		let shadow = &settings.shadow;

		Ok(Self {
			view_proj: shadow_view_proj(settings),
			ambient: (Vec3::from(settings.ambient_color) * settings.ambient_intensity).extend(1.0),
			direction: towards_light.normalize().extend(0.0),
			color: (Vec3::from(settings.directional_color) * settings.directional_intensity).extend(1.0),
			shadow: Vec4::new(
				shadow.bias,
				1.0 / shadow.map_size as f32,
				if shadow.enabled { 1.0 } else { 0.0 },
				0.0,
			),
		})
	}
}

fn shadow_view_proj(settings: &LightSettings) -> Mat4 {
	let position = Vec3::from(settings.position);
	let target = Vec3::from(settings.target);
	let shadow = &settings.shadow;

	// Looking straight up or down needs another up vector
	let up = if (position - target).normalize().cross(Vec3::Y).length_squared() < 1e-6 {
		Vec3::Z
	} else {
		Vec3::Y
	};

	let view = Mat4::look_at_rh(position, target, up);
	let proj = Mat4::orthographic_rh(
		-shadow.extent,
		shadow.extent,
		-shadow.extent,
		shadow.extent,
		shadow.near,
		shadow.far,
	);

	proj * view
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;

	use super::*;

	#[test]
	fn default_light_points_from_the_side() {
		let uniform = LightUniform::new(&LightSettings::default()).unwrap();
		let expected = Vec3::new(1.0, 0.0, 1.0).normalize();

		assert_relative_eq!(uniform.direction.x, expected.x, epsilon = 1e-6);
		assert_relative_eq!(uniform.direction.z, expected.z, epsilon = 1e-6);
		assert_eq!(uniform.ambient, Vec4::ONE);
		assert_eq!(uniform.color, Vec4::ONE);
		assert_eq!(uniform.shadow, Vec4::new(0.00001, 1.0 / 2048.0, 1.0, 0.0));
	}

	#[test]
	fn shadow_camera_covers_its_extent() {
		let settings = LightSettings::default();
		let view_proj = LightUniform::new(&settings).unwrap().view_proj;

		// A point 5 units away from the light along its axis, at the edge of the extent
		let forward = -Vec3::from(settings.position).normalize();
		let up = Vec3::Y;
		let point = Vec3::from(settings.position) + forward * 5.0 + up * 2.0;

		let ndc = view_proj.project_point3(point);
		assert_relative_eq!(ndc.y, 1.0, epsilon = 1e-5);
		assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-5);
		assert!(ndc.z > 0.0 && ndc.z < 1.0);
	}

	#[test]
	fn disabled_shadows_clear_the_flag() {
		let mut settings = LightSettings::default();
		settings.shadow.enabled = false;
		assert_eq!(LightUniform::new(&settings).unwrap().shadow.z, 0.0);
	}

	#[test]
	fn vertical_light_is_supported() {
		let settings = LightSettings {
			position: [0.0, 3.0, 0.0],
			..Default::default()
		};
		let uniform = LightUniform::new(&settings).unwrap();
		assert!(uniform.view_proj.is_finite());
	}

	#[test]
	fn rejects_light_at_its_target() {
		let settings = LightSettings {
			position: [0.0; 3],
			..Default::default()
		};
		assert!(LightUniform::new(&settings).is_err());
	}
}
