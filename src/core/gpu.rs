use anyhow::{Context, Result};
use log::info;
use wgpu::{
	Adapter, Backends, Device, DeviceDescriptor, Features, Instance, InstanceDescriptor, InstanceFlags, Limits,
	PowerPreference, Queue, RequestAdapterOptions, Surface,
};

use super::display::AppWindow;
use crate::ecs::{self, App, Plugin};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct GpuPlugin;

impl Plugin for GpuPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let window = app
			.world
			.get_resource::<AppWindow>()
			.context("GpuPlugin needs the DisplayPlugin to be added first")?
			.winit_window
			.clone();

		let instance = create_instance();

		// Create the rendering surface on which wgpu will render, window is an arc so that this can be done safely
		let surface = instance
			.create_surface(window)
			.context("Couldn't create surface from window")?;

		let gpu = pollster::block_on(Gpu::new(instance, Some(&surface)))?;

		app.insert_resource(WindowSurface(surface));
		app.insert_resource(gpu);

		Ok(())
	}
}

/// The window surface, waiting to be configured into a render target
#[derive(ecs::Resource)]
pub struct WindowSurface(pub Surface<'static>);

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(ecs::Resource)]
pub struct Gpu {
	pub instance: Instance,
	pub adapter: Adapter,
	pub device: Device,
	pub queue: Queue,
}

fn create_instance() -> Instance {
	// Instance is the instance of wgpu which serves as entrypoint for everything wgpu-related
	#[cfg(debug_assertions)]
	// Not running in --release mode, activate validation and debug info for wgpu
	let instance = Instance::new(InstanceDescriptor {
		backends: Backends::PRIMARY,
		flags: InstanceFlags::VALIDATION | InstanceFlags::DEBUG,
		..Default::default()
	});

	#[cfg(not(debug_assertions))]
	// Running in --release mode, don't activate debugging infos for wgpu
	let instance = Instance::new(InstanceDescriptor {
		backends: Backends::PRIMARY,
		..Default::default()
	});

	instance
}

impl Gpu {
	async fn new(instance: Instance, compatible_surface: Option<&Surface<'_>>) -> Result<Self> {
		// Adapter essentially represents the physical GPU + the Backend, e.g. GTX1080_VK; GTX1080_DX12; etc
		let adapter = instance
			.request_adapter(&RequestAdapterOptions {
				power_preference: PowerPreference::HighPerformance,
				compatible_surface,
				force_fallback_adapter: false,
			})
			.await
			.context("Couldn't request compatible adapter")?;

		let adapter_info = adapter.get_info();
		info!("Using {} ({:?})", adapter_info.name, adapter_info.backend);

		// Device esentially acts like a logical connection to the selected adapter in an application-isolated way.
		// Queue is the message queue / command buffer for the GPU, anything that the GPU needs to do should be
		// requested into that queue (i.e. rendering, uploading buffer data, etc)
		let (device, queue) = adapter
			.request_device(
				&(DeviceDescriptor {
					required_features: Features::empty(),
					required_limits: Limits::default().using_resolution(adapter.limits()),
					label: None,
				}),
				None,
			)
			.await
			.context("Couldn't request device")?;

		Ok(Self {
			instance,
			adapter,
			device,
			queue,
		})
	}
}
