use std::sync::Arc;

use anyhow::{Context, Result};
use bevy_ecs::{
	entity::Entity,
	query::With,
	schedule::IntoSystemConfigs,
	system::{Query, Res},
};
use derive_more::Deref;
use glam::{Mat4, Vec4};
use helicoid_sketch_derive::ShaderStruct;
use wgpu::{BindGroupLayout, ShaderStages};

use crate::{
	core::{
		buffer::{self, UniformBuffer, UploadUniforms},
		camera::{Camera, CameraControl, MainCamera},
		gameloop::PreRender,
		gpu::Gpu,
		render_target::RenderTarget,
	},
	ecs::{self, App, Plugin},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct CameraViewPlugin;

impl Plugin for CameraViewPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let gpu = app.world.resource::<Gpu>();

		let layout = UniformBuffer::<CameraView>::create_layout(&gpu.device, ShaderStages::VERTEX_FRAGMENT);
		let camera_view_buffer = UniformBuffer::<CameraView>::new(&gpu.device, "Camera View", layout.clone());

		let camera_entity = app
			.world
			.query_filtered::<Entity, With<MainCamera>>()
			.get_single(&app.world)
			.context("CameraViewPlugin needs exactly one main camera, is the CameraPlugin missing?")?;

		app.world
			.entity_mut(camera_entity)
			.insert(CameraView::default())
			.insert(camera_view_buffer);

		app.insert_resource(CameraViewLayout(layout));

		buffer::register_uniform::<CameraView>(app);

		app.add_systems(
			PreRender,
			update_view.after(CameraControl).before(UploadUniforms),
		);

		Ok(())
	}
}

/// Bind group layout of the camera uniform, for pipelines to build against
#[derive(ecs::Resource, Deref)]
pub struct CameraViewLayout(pub Arc<BindGroupLayout>);

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[repr(C)]
#[derive(ShaderStruct, bytemuck::Pod, bytemuck::Zeroable, ecs::Component, Copy, Clone, Debug, Default, PartialEq)]
pub struct CameraView {
	pub view_proj: Mat4,
	pub view: Mat4,
	/// World space, w is 1
	pub position: Vec4,
}

impl CameraView {
	pub fn new(camera: &Camera, aspect_ratio: f32) -> Self {
		let view = camera.view_matrix();

		Self {
			view_proj: camera.projection_matrix(aspect_ratio) * view,
			view,
			position: camera.position.extend(1.0),
		}
	}
}

fn update_view(render_target: Res<RenderTarget<'static>>, mut q: Query<(&Camera, &mut CameraView)>) {
	// Aspect ratio follows the render target, so resizes never stretch the image
	let aspect_ratio = render_target.aspect_ratio();

	for (camera, mut view) in q.iter_mut() {
		*view = CameraView::new(camera, aspect_ratio);
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;
	use glam::Vec3;

	use super::*;
	use crate::{config::CameraSettings, core::buffer::ShaderType};

	#[test]
	fn target_projects_to_screen_center() {
		let camera = Camera::from_settings(&CameraSettings::default());
		let view = CameraView::new(&camera, 1.0);

		let clip = view.view_proj * Vec4::new(0.0, 0.0, 0.0, 1.0);
		let ndc = clip.truncate() / clip.w;

		assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-6);
		assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-6);
		assert!(ndc.z > 0.0 && ndc.z < 1.0);
	}

	#[test]
	fn wide_viewport_squeezes_x() {
		let camera = Camera::from_settings(&CameraSettings::default());
		let square = CameraView::new(&camera, 1.0).view_proj;
		let wide = CameraView::new(&camera, 2.0).view_proj;

		let point = Vec3::new(1.0, 1.0, 0.0);
		let square = square.project_point3(point);
		let wide = wide.project_point3(point);

		assert_relative_eq!(wide.x, square.x / 2.0, epsilon = 1e-6);
		assert_relative_eq!(wide.y, square.y, epsilon = 1e-6);
	}

	#[test]
	fn struct_definition_matches_layout() {
		assert!(CameraView::struct_definition()
			.unwrap()
			.contains("view_proj: mat4x4<f32>"));
		assert_eq!(std::mem::size_of::<CameraView>(), 144);
	}
}
