//! The helicoid sketch: a twisted surface with two balls orbiting it.

pub mod animation;
pub mod helicoid;
pub mod icosahedron;
pub mod lights;
pub mod material;
pub mod mesh;
pub mod model;
pub mod palette;
pub mod parametric;

use std::sync::Arc;

use anyhow::Result;
use derive_more::Deref;
use log::debug;
use wgpu::{BindGroupLayout, ShaderStages};

use self::{
	animation::{Playback, BALL_PHASES},
	helicoid::helicoid_mesh,
	icosahedron::icosphere,
	material::{MaterialUniform, PlayheadDriven},
	mesh::MeshHandle,
	model::{ModelUniform, ShadowFlags, Transform},
};
use crate::{
	config::Settings,
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

pub struct SketchPlugin;

impl Plugin for SketchPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let settings = app.world.resource::<Settings>().clone();
		let scene = &settings.scene;
		let gpu = app.world.resource::<Gpu>();

		let model_layout = UniformBuffer::<ModelUniform>::create_layout(&gpu.device, ShaderStages::VERTEX_FRAGMENT);
		let material_layout = UniformBuffer::<MaterialUniform>::create_layout(&gpu.device, ShaderStages::FRAGMENT);

		let surface = helicoid_mesh(&scene.surface)?;
		let ball = icosphere(scene.balls.radius, scene.balls.detail);
		debug!(
			"Helicoid has {} triangles, balls have {} each",
			surface.triangle_count(),
			ball.triangle_count()
		);

		let surface_mesh = MeshHandle(Arc::new(surface.upload(&gpu.device, "Helicoid")));
		// Both balls draw the same buffers
		let ball_mesh = MeshHandle(Arc::new(ball.upload(&gpu.device, "Ball")));

		let material = MaterialUniform::new(&scene.material);

		let helicoid_shadows = ShadowFlags {
			cast: true,
			receive: true,
		};
		let helicoid = SceneObjectBundle {
			mesh: surface_mesh,
			transform: Transform::default(),
			shadows: helicoid_shadows,
			model: ModelUniform::new(&Transform::default(), &helicoid_shadows),
			model_buffer: UniformBuffer::new(&gpu.device, "Helicoid Model", model_layout.clone()),
			material,
			material_buffer: UniformBuffer::new(&gpu.device, "Helicoid Material", material_layout.clone()),
		};

		let balls = BALL_PHASES.map(|phase| {
			let shadows = ShadowFlags {
				cast: true,
				receive: false,
			};
			let ball = Ball {
				phase,
				orbit_radius: scene.balls.orbit_radius,
			};
			let transform = Transform::from_translation(animation::ball_position(0.0, phase, ball.orbit_radius));

			(
				ball,
				SceneObjectBundle {
					mesh: ball_mesh.clone(),
					transform,
					shadows,
					model: ModelUniform::new(&transform, &shadows),
					model_buffer: UniformBuffer::new(&gpu.device, "Ball Model", model_layout.clone()),
					material,
					material_buffer: UniformBuffer::new(&gpu.device, "Ball Material", material_layout.clone()),
				},
			)
		});

		app.world.spawn((Helicoid, PlayheadDriven, helicoid));
		app.world.spawn_batch(balls);

		app.insert_resource(Playback::new(&settings.sketch));
		app.insert_resource(ModelLayout(model_layout));
		app.insert_resource(MaterialLayout(material_layout));

		buffer::register_uniform::<ModelUniform>(app);
		buffer::register_uniform::<MaterialUniform>(app);
		animation::register_animation(app);

		Ok(())
	}
}

#[derive(ecs::Resource, Deref)]
pub struct ModelLayout(pub Arc<BindGroupLayout>);

#[derive(ecs::Resource, Deref)]
pub struct MaterialLayout(pub Arc<BindGroupLayout>);

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(ecs::Component, Copy, Clone, Debug, Default)]
pub struct Helicoid;

#[derive(ecs::Component, Copy, Clone, Debug, PartialEq)]
pub struct Ball {
	/// Offset along the orbit, in radians
	pub phase: f32,
	pub orbit_radius: f32,
}

/// Everything the shadow and scene passes need to draw an entity
#[derive(ecs::Bundle)]
pub struct SceneObjectBundle {
	pub mesh: MeshHandle,
	pub transform: Transform,
	pub shadows: ShadowFlags,
	pub model: ModelUniform,
	pub model_buffer: UniformBuffer<ModelUniform>,
	pub material: MaterialUniform,
	pub material_buffer: UniformBuffer<MaterialUniform>,
}
