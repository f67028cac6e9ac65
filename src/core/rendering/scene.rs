use anyhow::{Context, Result};
use bevy_ecs::{
	query::With,
	schedule::IntoSystemConfigs,
	system::{Query, Res, ResMut},
};
use wgpu::{
	BlendState, Color, ColorTargetState, ColorWrites, CommandEncoderDescriptor, CompareFunction, DepthBiasState,
	DepthStencilState, FragmentState, FrontFace, IndexFormat, LoadOp, MultisampleState, Operations,
	PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, RenderPassColorAttachment,
	RenderPassDepthStencilAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, StencilState,
	StoreOp, VertexState,
};

use super::{
	camera_view::{CameraView, CameraViewLayout},
	shadow::ShadowMap,
};
use crate::{
	config::Settings,
	core::{
		buffer::{ShaderType, UniformBuffer},
		camera::MainCamera,
		gameloop::Render,
		gpu::Gpu,
		render_target::{RenderTarget, DEPTH_FORMAT},
	},
	ecs::{self, App, Plugin},
	sketch::{
		lights::LightUniform,
		material::{material_shader, MaterialUniform},
		mesh::{MeshHandle, Vertex},
		model::ModelUniform,
		MaterialLayout, ModelLayout,
	},
	ShaderAssets,
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct SceneRendererPlugin;

impl Plugin for SceneRendererPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let settings = app.world.resource::<Settings>();
		let gpu = app.world.resource::<Gpu>();
		let render_target = app
			.world
			.get_resource::<RenderTarget<'static>>()
			.context("SceneRendererPlugin needs a render target")?;

		let scene_renderer = SceneRenderer::new(
			gpu,
			render_target,
			settings,
			app.world.resource::<CameraViewLayout>(),
			app.world.resource::<ShadowMap>(),
			app.world.resource::<ModelLayout>(),
			app.world.resource::<MaterialLayout>(),
		)?;

		app.insert_resource(scene_renderer);

		app.add_systems(Render, render.in_set(SceneRenderPass));

		Ok(())
	}
}

#[derive(ecs::SystemSet, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SceneRenderPass;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(ecs::Resource)]
pub struct SceneRenderer {
	render_pipeline: RenderPipeline,
	clear_color: Color,
}

impl SceneRenderer {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		gpu: &Gpu,
		render_target: &RenderTarget,
		settings: &Settings,
		camera_layout: &wgpu::BindGroupLayout,
		shadow_map: &ShadowMap,
		model_layout: &wgpu::BindGroupLayout,
		material_layout: &wgpu::BindGroupLayout,
	) -> Result<Self> {
		let shader = material_shader(
			&settings.scene.material,
			&[
				CameraView::struct_definition(),
				LightUniform::struct_definition(),
				ModelUniform::struct_definition(),
				MaterialUniform::struct_definition(),
			],
		)
		.build::<ShaderAssets>(&gpu.device, "Physical Material Shader")?;

		// Contains the bind group layouts that are needed in the pipeline
		let render_pipeline_layout = gpu.device.create_pipeline_layout(&PipelineLayoutDescriptor {
			label: Some("Scene Pipeline Layout"),
			bind_group_layouts: &[
				camera_layout,
				&shadow_map.lighting_layout,
				model_layout,
				material_layout,
			],
			push_constant_ranges: &[],
		});

		let render_pipeline = gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
			label: Some("Scene Render Pipeline"),
			layout: Some(&render_pipeline_layout),
			vertex: VertexState {
				module: &shader,
				entry_point: "vs_main",
				buffers: &[Vertex::layout()],
			},
			fragment: Some(FragmentState {
				module: &shader,
				entry_point: "fs_main",
				targets: &[Some(ColorTargetState {
					format: render_target.config.format,
					blend: Some(BlendState::REPLACE),
					write_mask: ColorWrites::ALL,
				})],
			}),
			primitive: PrimitiveState {
				topology: PrimitiveTopology::TriangleList,
				strip_index_format: None,
				front_face: FrontFace::Ccw,
				// Double sided material
				cull_mode: None,
				polygon_mode: PolygonMode::Fill,
				unclipped_depth: false,
				conservative: false,
			},
			depth_stencil: Some(DepthStencilState {
				format: DEPTH_FORMAT,
				depth_write_enabled: true,
				depth_compare: CompareFunction::Less,
				stencil: StencilState::default(),
				bias: DepthBiasState::default(),
			}),
			multisample: MultisampleState::default(),
			multiview: None,
		});

		let [r, g, b, a] = settings.sketch.clear_color;

		Ok(Self {
			render_pipeline,
			clear_color: Color { r, g, b, a },
		})
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

fn render(
	scene_renderer: Res<SceneRenderer>,
	shadow_map: Res<ShadowMap>,
	mut render_target: ResMut<RenderTarget<'static>>,
	gpu: Res<Gpu>,
	q_camera: Query<&UniformBuffer<CameraView>, With<MainCamera>>,
	q_objects: Query<(&MeshHandle, &UniformBuffer<ModelUniform>, &UniformBuffer<MaterialUniform>)>,
) {
	let Ok(camera) = q_camera.get_single() else {
		return;
	};

	// A command encoder takes multiple draw commands that can then be encoded into a command buffer to be submitted
	// to the queue
	let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
		label: Some("SceneRenderer Command Encoder"),
	});

	{
		// InnerRenderPass only runs when the view is available
		let Some(render_view) = render_target.current_view.as_ref() else {
			return;
		};

		let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
			label: Some("Scene Pass"),
			color_attachments: &[Some(RenderPassColorAttachment {
				view: render_view,
				resolve_target: None,
				ops: Operations {
					load: LoadOp::Clear(scene_renderer.clear_color),
					store: StoreOp::Store,
				},
			})],
			depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
				view: &render_target.depth_view,
				depth_ops: Some(Operations {
					load: LoadOp::Clear(1.0),
					store: StoreOp::Store,
				}),
				stencil_ops: None,
			}),
			occlusion_query_set: None,
			timestamp_writes: None,
		});

		render_pass.set_pipeline(&scene_renderer.render_pipeline);
		render_pass.set_bind_group(0, &camera.bind_group, &[]);
		render_pass.set_bind_group(1, &shadow_map.lighting_bind_group, &[]);

		for (mesh, model, material) in q_objects.iter() {
			render_pass.set_bind_group(2, &model.bind_group, &[]);
			render_pass.set_bind_group(3, &material.bind_group, &[]);
			render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
			render_pass.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
			render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
		}
	}
	// Extra scope here to make sure render_pass is dropped, otherwise encoder.finish() can't be called

	render_target.command_queue.push(encoder.finish());
}
