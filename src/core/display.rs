use std::sync::Arc;

use anyhow::{Context, Result};
use winit::{dpi::PhysicalSize, window::WindowBuilder};

use crate::{
	config::{Settings, WindowSettings},
	ecs::{self, App, Plugin},
	EventLoop,
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct DisplayPlugin;

impl Plugin for DisplayPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let window_settings = app.world.resource::<Settings>().window.clone();

		let event_loop = EventLoop::new().context("Couldn't create winit event_loop")?;
		let app_window = AppWindow::new(&event_loop, &window_settings)?;

		app.world.insert_non_send_resource(event_loop);
		app.insert_resource(app_window);

		Ok(())
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(ecs::Resource)]
pub struct AppWindow {
	// Window needs to be an arc so that a surface can be created from it safely
	pub winit_window: Arc<winit::window::Window>,
}

impl AppWindow {
	pub fn new(event_loop: &EventLoop, settings: &WindowSettings) -> Result<Self> {
		let window = WindowBuilder::new()
			.with_title(&settings.title)
			.with_inner_size(PhysicalSize::new(settings.width, settings.height))
			.build(event_loop)
			.context("Couldn't build winit window from event loop")?;

		// Center the window
		if let Some(monitor) = window.current_monitor() {
			let screen_size = monitor.size();
			let window_size = window.outer_size();

			window.set_outer_position(winit::dpi::PhysicalPosition {
				x: f64::from(screen_size.width.saturating_sub(window_size.width)) / 2.
					+ f64::from(monitor.position().x),
				y: f64::from(screen_size.height.saturating_sub(window_size.height)) / 2.
					+ f64::from(monitor.position().y),
			});
		}

		Ok(Self {
			winit_window: Arc::new(window),
		})
	}
}
