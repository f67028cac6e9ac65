//! Depth-only pass rendering the shadow casters from the directional light.

use anyhow::{Context, Result};
use bevy_ecs::{
	query::With,
	schedule::IntoSystemConfigs,
	system::{Query, Res, ResMut},
};
use log::debug;
use wgpu::{
	AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
	BindGroupLayoutEntry, BindingResource, BindingType, CommandEncoderDescriptor, CompareFunction, DepthBiasState,
	DepthStencilState, Extent3d, FilterMode, FrontFace, IndexFormat, LoadOp, MultisampleState, Operations,
	PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, RenderPassDepthStencilAttachment,
	RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, Sampler, SamplerBindingType, SamplerDescriptor,
	ShaderStages, StencilState, StoreOp, Texture, TextureDescriptor, TextureDimension, TextureSampleType,
	TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension, VertexState,
};

use crate::{
	config::Settings,
	core::{
		buffer::{struct_definitions, ShaderType, UniformBuffer},
		gameloop::Render,
		gpu::Gpu,
		render_target::{RenderTarget, DEPTH_FORMAT},
		shader::ShaderBuilder,
	},
	ecs::{self, App, Plugin},
	sketch::{
		lights::{DirectionalLight, LightLayout, LightUniform},
		mesh::{MeshHandle, Vertex},
		model::{ModelUniform, ShadowFlags},
		ModelLayout,
	},
	ShaderAssets,
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct ShadowRendererPlugin;

impl Plugin for ShadowRendererPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let settings = app.world.resource::<Settings>().scene.lights.shadow.clone();

		let light_buffer = app
			.world
			.query_filtered::<&UniformBuffer<LightUniform>, With<DirectionalLight>>()
			.get_single(&app.world)
			.context("ShadowRendererPlugin needs the LightsPlugin to be added first")?;

		let gpu = app.world.resource::<Gpu>();
		let light_layout = app.world.resource::<LightLayout>();
		let model_layout = app.world.resource::<ModelLayout>();

		let shadow_map = ShadowMap::new(gpu, settings.map_size, light_buffer);
		let shadow_renderer = ShadowRenderer::new(gpu, light_layout, model_layout)?;

		debug!(
			"Shadow map is {0}x{0}, {1}",
			settings.map_size,
			if settings.enabled { "enabled" } else { "disabled" }
		);

		app.insert_resource(shadow_map);
		app.insert_resource(shadow_renderer);

		app.add_systems(Render, render.in_set(ShadowRenderPass));

		Ok(())
	}
}

#[derive(ecs::SystemSet, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShadowRenderPass;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub const SHADOW_FORMAT: wgpu::TextureFormat = DEPTH_FORMAT;

/// The shadow depth texture, and the bind group the scene pass reads the light and the shadow through
#[derive(ecs::Resource)]
pub struct ShadowMap {
	pub texture: Texture,
	pub view: TextureView,
	pub sampler: Sampler,
	pub lighting_layout: BindGroupLayout,
	pub lighting_bind_group: BindGroup,
}

impl ShadowMap {
	pub fn new(gpu: &Gpu, size: u32, light_buffer: &UniformBuffer<LightUniform>) -> Self {
		let texture = gpu.device.create_texture(&TextureDescriptor {
			label: Some("Shadow Map"),
			size: Extent3d {
				width: size,
				height: size,
				depth_or_array_layers: 1,
			},
			mip_level_count: 1,
			sample_count: 1,
			dimension: TextureDimension::D2,
			format: SHADOW_FORMAT,
			usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
			view_formats: &[],
		});

		let view = texture.create_view(&TextureViewDescriptor::default());

		// Linear filtering on a comparison sampler blends the four nearest comparisons
		let sampler = gpu.device.create_sampler(&SamplerDescriptor {
			label: Some("Shadow Sampler"),
			address_mode_u: AddressMode::ClampToEdge,
			address_mode_v: AddressMode::ClampToEdge,
			address_mode_w: AddressMode::ClampToEdge,
			mag_filter: FilterMode::Linear,
			min_filter: FilterMode::Linear,
			mipmap_filter: FilterMode::Nearest,
			compare: Some(CompareFunction::LessEqual),
			..Default::default()
		});

		let lighting_layout = gpu.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
			label: Some("Lighting Bindgroup Layout"),
			entries: &[
				UniformBuffer::<LightUniform>::layout_entry(0, ShaderStages::VERTEX_FRAGMENT),
				BindGroupLayoutEntry {
					binding: 1,
					visibility: ShaderStages::FRAGMENT,
					ty: BindingType::Texture {
						sample_type: TextureSampleType::Depth,
						view_dimension: TextureViewDimension::D2,
						multisampled: false,
					},
					count: None,
				},
				BindGroupLayoutEntry {
					binding: 2,
					visibility: ShaderStages::FRAGMENT,
					ty: BindingType::Sampler(SamplerBindingType::Comparison),
					count: None,
				},
			],
		});

		let lighting_bind_group = gpu.device.create_bind_group(&BindGroupDescriptor {
			label: Some("Lighting Bindgroup"),
			layout: &lighting_layout,
			entries: &[
				BindGroupEntry {
					binding: 0,
					resource: light_buffer.buffer.as_entire_binding(),
				},
				BindGroupEntry {
					binding: 1,
					resource: BindingResource::TextureView(&view),
				},
				BindGroupEntry {
					binding: 2,
					resource: BindingResource::Sampler(&sampler),
				},
			],
		});

		Self {
			texture,
			view,
			sampler,
			lighting_layout,
			lighting_bind_group,
		}
	}
}

#[derive(ecs::Resource)]
pub struct ShadowRenderer {
	render_pipeline: RenderPipeline,
}

impl ShadowRenderer {
	pub fn new(gpu: &Gpu, light_layout: &BindGroupLayout, model_layout: &BindGroupLayout) -> Result<Self> {
		let shader = ShaderBuilder::new()
			.include_path("shadow.wgsl")
			.prepend(struct_definitions(&[
				LightUniform::struct_definition(),
				ModelUniform::struct_definition(),
			]))
			.build::<ShaderAssets>(&gpu.device, "Shadow Shader")?;

		let render_pipeline_layout = gpu.device.create_pipeline_layout(&PipelineLayoutDescriptor {
			label: Some("Shadow Pipeline Layout"),
			bind_group_layouts: &[light_layout, model_layout],
			push_constant_ranges: &[],
		});

		let render_pipeline = gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
			label: Some("Shadow Render Pipeline"),
			layout: Some(&render_pipeline_layout),
			vertex: VertexState {
				module: &shader,
				entry_point: "vs_main",
				buffers: &[Vertex::layout()],
			},
			// Depth only
			fragment: None,
			primitive: PrimitiveState {
				topology: PrimitiveTopology::TriangleList,
				strip_index_format: None,
				front_face: FrontFace::Ccw,
				// The helicoid is an open surface, both of its sides cast
				cull_mode: None,
				polygon_mode: PolygonMode::Fill,
				unclipped_depth: false,
				conservative: false,
			},
			depth_stencil: Some(DepthStencilState {
				format: SHADOW_FORMAT,
				depth_write_enabled: true,
				depth_compare: CompareFunction::LessEqual,
				stencil: StencilState::default(),
				bias: DepthBiasState::default(),
			}),
			multisample: MultisampleState::default(),
			multiview: None,
		});

		Ok(Self { render_pipeline })
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

fn render(
	shadow_renderer: Res<ShadowRenderer>,
	shadow_map: Res<ShadowMap>,
	settings: Res<Settings>,
	mut render_target: ResMut<RenderTarget<'static>>,
	gpu: Res<Gpu>,
	q_light: Query<&UniformBuffer<LightUniform>, With<DirectionalLight>>,
	q_casters: Query<(&MeshHandle, &UniformBuffer<ModelUniform>, &ShadowFlags)>,
) {
	let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
		label: Some("ShadowRenderer Command Encoder"),
	});

	{
		// Always cleared, so that a disabled shadow never shows stale depth
		let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
			label: Some("Shadow Pass"),
			color_attachments: &[],
			depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
				view: &shadow_map.view,
				depth_ops: Some(Operations {
					load: LoadOp::Clear(1.0),
					store: StoreOp::Store,
				}),
				stencil_ops: None,
			}),
			occlusion_query_set: None,
			timestamp_writes: None,
		});

		if settings.scene.lights.shadow.enabled {
			render_pass.set_pipeline(&shadow_renderer.render_pipeline);

			for light in q_light.iter() {
				render_pass.set_bind_group(0, &light.bind_group, &[]);

				for (mesh, model, _) in q_casters.iter().filter(|(_, _, flags)| flags.cast) {
					render_pass.set_bind_group(1, &model.bind_group, &[]);
					render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
					render_pass.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
					render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
				}
			}
		}
	}

	render_target.command_queue.push(encoder.finish());
}
