pub mod config;
pub mod core;
pub mod ecs;
pub mod sketch;

use anyhow::Result;
use bevy_ecs::schedule::IntoSystemSetConfigs;
use config::Settings;
use log::info;
use rust_embed::Embed;
use sketch::{animation::Animate, lights::LightsPlugin, SketchPlugin};

use crate::core::{
	buffer::UploadUniforms,
	camera::{CameraControl, CameraPlugin},
	display::DisplayPlugin,
	event_processing::EventProcessingPlugin,
	events::EventsPlugin,
	gameloop::{GameloopPlugin, PreRender, Render},
	gpu::GpuPlugin,
	render_target::{InnerRenderPass, PostRenderPass, PreRenderPass, RenderPass, WindowRenderTargetPlugin},
	rendering::{
		camera_view::CameraViewPlugin,
		capture::{CapturePass, FrameCapturePlugin},
		scene::{SceneRenderPass, SceneRendererPlugin},
		shadow::{ShadowRenderPass, ShadowRendererPlugin},
	},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(Embed)]
#[folder = "src/shader/"]
#[prefix = "/"]
pub struct ShaderAssets;

/// The default `EventLoop` type to avoid having to add the extra unit type
type EventLoop = winit::event_loop::EventLoop<()>;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub fn run() -> Result<()> {
	let settings = Settings::load()?;
	info!(
		"Starting a {}s loop at {}x{}",
		settings.sketch.duration, settings.window.width, settings.window.height
	);

	let mut app = ecs::App::new();
	app.insert_resource(settings);

	app
		// Core plugins
		.add_plugin(EventsPlugin)?
		.add_plugin(EventProcessingPlugin)?
		.add_plugin(GameloopPlugin)?
		.add_plugin(DisplayPlugin)?
		.add_plugin(GpuPlugin)?
		.add_plugin(WindowRenderTargetPlugin)?
		.add_plugin(CameraPlugin)?
		.add_plugin(CameraViewPlugin)?
		// Sketch
		.add_plugin(LightsPlugin)?
		.add_plugin(SketchPlugin)?
		// Rendering plugins
		.add_plugin(ShadowRendererPlugin)?
		.add_plugin(SceneRendererPlugin)?
		.add_plugin(FrameCapturePlugin)?;

	// The scene moves first, then the camera follows the input, then everything is uploaded
	app.configure_sets(PreRender, (Animate, CameraControl, UploadUniforms).chain());

	// Configure Renderpass order
	app.configure_sets(
		Render,
		((
			PreRenderPass,
			(ShadowRenderPass, SceneRenderPass, CapturePass)
				.chain()
				.in_set(InnerRenderPass),
			PostRenderPass,
		)
			.chain()
			.in_set(RenderPass),),
	);

	app.run()
}
