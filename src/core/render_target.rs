use anyhow::{Context, Result};
use bevy_ecs::{
	event::EventReader,
	schedule::{IntoSystemConfigs, IntoSystemSetConfigs},
	system::{Res, ResMut},
};
use glam::UVec2;
use log::{debug, warn};
use wgpu::{
	CommandBuffer, Device, Extent3d, PresentMode, Surface, SurfaceConfiguration, SurfaceError, SurfaceTexture,
	Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView, TextureViewDescriptor,
};

use super::{
	event_processing::{EventReaderProcessor, ProcessedChangeEvents},
	events::WindowResizedEvent,
	gameloop::{Render, Update},
	gpu::{Gpu, WindowSurface},
};
use crate::{
	core::display::AppWindow,
	ecs::{self, App, Plugin},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct WindowRenderTargetPlugin;

impl Plugin for WindowRenderTargetPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let WindowSurface(surface) = app
			.world
			.remove_resource::<WindowSurface>()
			.context("WindowRenderTargetPlugin needs the GpuPlugin to be added first")?;

		let app_window = app.world.resource::<AppWindow>();
		let gpu = app.world.resource::<Gpu>();

		let inner_size = app_window.winit_window.inner_size();
		let render_target = RenderTarget::new(surface, UVec2::new(inner_size.width, inner_size.height), gpu)?;

		app.insert_resource(render_target);

		app.add_systems(Update, resize);
		app.add_systems(
			Render,
			(
				prepare_render_pass.in_set(PreRenderPass),
				finish_render_pass.in_set(PostRenderPass),
			)
				.chain()
				.in_set(RenderPass),
		);
		app.configure_sets(Render, InnerRenderPass.run_if(is_render_pass_valid));

		Ok(())
	}
}

#[derive(ecs::SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPass;

#[derive(ecs::SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreRenderPass;

#[derive(ecs::SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct InnerRenderPass;

#[derive(ecs::SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostRenderPass;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

#[derive(ecs::Resource)]
pub struct RenderTarget<'a> {
	pub surface: Surface<'a>,
	pub size: UVec2,
	pub config: SurfaceConfiguration,

	pub depth_texture: Texture,
	pub depth_view: TextureView,

	pub command_queue: Vec<CommandBuffer>,

	current_texture: Option<SurfaceTexture>,
	pub current_view: Option<TextureView>,
}

impl<'a> RenderTarget<'a> {
	fn new(surface: Surface<'a>, size: UVec2, gpu: &Gpu) -> Result<Self> {
		// Describes what the surface is compatible with on the given adapter
		let capabilities = surface.get_capabilities(&gpu.adapter);

		// Colors are written out as computed, so prefer a non-sRGB format
		let surface_format = *capabilities
			.formats
			.iter()
			.find(|format| !format.is_srgb())
			.or(capabilities.formats.first())
			.context("Surface isn't supported by the adapter")?;

		let present_mode = if capabilities.present_modes.contains(&PresentMode::Mailbox) {
			PresentMode::Mailbox
		} else {
			PresentMode::AutoVsync
		};

		// Frame capture copies out of the surface texture
		let usage = if capabilities.usages.contains(TextureUsages::COPY_SRC) {
			TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC
		} else {
			TextureUsages::RENDER_ATTACHMENT
		};

		let config = SurfaceConfiguration {
			usage,
			format: surface_format,
			width: size.x.max(1),
			height: size.y.max(1),
			present_mode,
			desired_maximum_frame_latency: 2,
			alpha_mode: capabilities.alpha_modes[0],
			view_formats: vec![],
		};

		debug!("Configuring surface as {:?} {:?}, {}x{}", surface_format, present_mode, config.width, config.height);
		surface.configure(&gpu.device, &config);

		let (depth_texture, depth_view) = create_depth_texture(&gpu.device, size);

		Ok(Self {
			surface,
			size,
			config,
			depth_texture,
			depth_view,
			command_queue: vec![],
			current_texture: None,
			current_view: None,
		})
	}

	pub fn aspect_ratio(&self) -> f32 {
		self.size.x.max(1) as f32 / self.size.y.max(1) as f32
	}

	pub fn supports_copy(&self) -> bool {
		self.config.usage.contains(TextureUsages::COPY_SRC)
	}

	/// The texture acquired for the frame currently being rendered
	pub fn current_texture(&self) -> Option<&Texture> {
		self.current_texture.as_ref().map(|output| &output.texture)
	}

	fn reconfigure(&mut self, size: UVec2, device: &Device) {
		self.size = size;
		self.config.width = size.x;
		self.config.height = size.y;
		self.surface.configure(device, &self.config);

		(self.depth_texture, self.depth_view) = create_depth_texture(device, size);
	}
}

fn create_depth_texture(device: &Device, size: UVec2) -> (Texture, TextureView) {
	let texture = device.create_texture(&TextureDescriptor {
		label: Some("Depth Texture"),
		size: Extent3d {
			width: size.x.max(1),
			height: size.y.max(1),
			depth_or_array_layers: 1,
		},
		mip_level_count: 1,
		sample_count: 1,
		dimension: TextureDimension::D2,
		format: DEPTH_FORMAT,
		usage: TextureUsages::RENDER_ATTACHMENT,
		view_formats: &[],
	});

	let view = texture.create_view(&TextureViewDescriptor::default());
	(texture, view)
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

fn is_render_pass_valid(render_target: Res<RenderTarget<'static>>) -> bool {
	render_target.current_view.is_some()
}

fn prepare_render_pass(mut render_target: ResMut<RenderTarget<'static>>, gpu: Res<Gpu>) {
	// Get the output texture to render to and create a view for it
	let output = match render_target.surface.get_current_texture() {
		Ok(output) => Some(output),
		Err(SurfaceError::Lost | SurfaceError::Outdated) => {
			// Skip this frame, the surface will be usable again on the next one
			warn!("Surface lost or outdated, reconfiguring");
			let size = render_target.size;
			render_target.reconfigure(size, &gpu.device);
			None
		}
		Err(err) => {
			warn!("Couldn't acquire surface texture: {err}");
			None
		}
	};

	let view = output
		.as_ref()
		.map(|output| output.texture.create_view(&TextureViewDescriptor::default()));

	render_target.current_texture = output;
	render_target.current_view = view;
}

fn finish_render_pass(mut render_target: ResMut<RenderTarget<'static>>, gpu: Res<Gpu>) {
	// Submit the encoded command buffers to the queue and clear the queue at the same time
	gpu.queue.submit(render_target.command_queue.drain(..));

	// Swap the draw buffers and show what we rendered to the screen
	render_target.current_view = None;
	if let Some(output) = render_target.current_texture.take() {
		output.present();
	}
}

fn resize(
	mut render_target: ResMut<RenderTarget<'static>>,
	gpu: Res<Gpu>,
	window_events: EventReader<WindowResizedEvent>,
) {
	if let Some(size) = window_events.process().latest() {
		debug!("Resizing render target to {}x{}", size.x, size.y);
		render_target.reconfigure(size, &gpu.device);
	}
}
