//! Saves the presented frame as a PNG when `S` is pressed.

use std::{
	fs,
	path::{Path, PathBuf},
	sync::mpsc,
	time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, bail, Context, Result};
use bevy_ecs::{
	event::EventReader,
	schedule::IntoSystemConfigs,
	system::{Res, ResMut},
};
use glam::UVec2;
use image::RgbaImage;
use log::{error, info, warn};
use wgpu::{
	Buffer, BufferDescriptor, BufferUsages, CommandEncoderDescriptor, Extent3d, ImageCopyBuffer, ImageCopyTexture,
	ImageDataLayout, Maintain, MapMode, Origin3d, TextureAspect, TextureFormat, COPY_BYTES_PER_ROW_ALIGNMENT,
};
use winit::keyboard::KeyCode;

use crate::{
	config::Settings,
	core::{
		event_processing::{EventReaderProcessor, ProcessedInputEvents},
		events::KeyboardInputEvent,
		gameloop::{Render, Update},
		gpu::Gpu,
		render_target::{PostRenderPass, RenderPass, RenderTarget},
	},
	ecs::{self, App, Plugin},
	sketch::animation::Playback,
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct FrameCapturePlugin;

impl Plugin for FrameCapturePlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let export_dir = app.world.resource::<Settings>().sketch.export_dir.clone();

		app.insert_resource(FrameCapture {
			export_dir,
			requested: false,
			in_flight: None,
		});

		app.add_systems(Update, request_capture);
		app.add_systems(
			Render,
			(
				copy_frame.in_set(CapturePass),
				save_frame.after(PostRenderPass),
			)
				.in_set(RenderPass),
		);

		Ok(())
	}
}

/// Copies the frame out of the surface, after everything else was drawn to it
#[derive(ecs::SystemSet, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CapturePass;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(ecs::Resource)]
pub struct FrameCapture {
	pub export_dir: PathBuf,
	requested: bool,
	in_flight: Option<PendingCapture>,
}

/// A frame copied out of the surface, waiting for the GPU to be done with it
struct PendingCapture {
	buffer: Buffer,
	size: UVec2,
	padded_bytes_per_row: u32,
	swizzle: bool,
	frame: u64,
}

const BYTES_PER_PIXEL: u32 = 4;

/// Rows of a texture copy have to be aligned to [`COPY_BYTES_PER_ROW_ALIGNMENT`]
pub fn padded_bytes_per_row(width: u32) -> u32 {
	let unpadded = width * BYTES_PER_PIXEL;
	unpadded.div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT) * COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Strips the row padding and turns the pixels into RGBA
pub fn unpad_rows(data: &[u8], size: UVec2, padded_bytes_per_row: u32, swizzle: bool) -> Vec<u8> {
	let row_bytes = (size.x * BYTES_PER_PIXEL) as usize;

	let mut pixels = Vec::with_capacity(row_bytes * size.y as usize);
	for row in data.chunks(padded_bytes_per_row as usize).take(size.y as usize) {
		pixels.extend_from_slice(&row[..row_bytes]);
	}

	if swizzle {
		for pixel in pixels.chunks_exact_mut(BYTES_PER_PIXEL as usize) {
			pixel.swap(0, 2);
		}
	}

	pixels
}

/// Whether frames in `format` can be captured, and if their red and blue channels need swapping
fn capture_layout(format: TextureFormat) -> Option<bool> {
	match format {
		TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => Some(false),
		TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb => Some(true),
		_ => None,
	}
}

fn capture_path(export_dir: &Path, frame: u64) -> PathBuf {
	let timestamp = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|duration| duration.as_secs())
		.unwrap_or_default();

	export_dir.join(format!("{timestamp}-{frame}.png"))
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

fn request_capture(mut capture: ResMut<FrameCapture>, keyboard_events: EventReader<KeyboardInputEvent>) {
	if keyboard_events.process().has_pressed(KeyCode::KeyS) {
		capture.requested = true;
	}
}

fn copy_frame(
	mut capture: ResMut<FrameCapture>,
	mut render_target: ResMut<RenderTarget<'static>>,
	gpu: Res<Gpu>,
	playback: Res<Playback>,
) {
	if !capture.requested || capture.in_flight.is_some() {
		return;
	}
	capture.requested = false;

	if !render_target.supports_copy() {
		warn!("The surface can't be copied from on this platform, frame capture is unavailable");
		return;
	}

	let Some(swizzle) = capture_layout(render_target.config.format) else {
		warn!("Can't capture frames in {:?}", render_target.config.format);
		return;
	};

	let Some(texture) = render_target.current_texture() else {
		return;
	};

	let size = render_target.size;
	let padded_bytes_per_row = padded_bytes_per_row(size.x);

	let buffer = gpu.device.create_buffer(&BufferDescriptor {
		label: Some("Frame Capture Buffer"),
		size: (padded_bytes_per_row * size.y) as u64,
		usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
		mapped_at_creation: false,
	});

	let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
		label: Some("FrameCapture Command Encoder"),
	});

	encoder.copy_texture_to_buffer(
		ImageCopyTexture {
			texture,
			mip_level: 0,
			origin: Origin3d::ZERO,
			aspect: TextureAspect::All,
		},
		ImageCopyBuffer {
			buffer: &buffer,
			layout: ImageDataLayout {
				offset: 0,
				bytes_per_row: Some(padded_bytes_per_row),
				rows_per_image: Some(size.y),
			},
		},
		Extent3d {
			width: size.x,
			height: size.y,
			depth_or_array_layers: 1,
		},
	);

	render_target.command_queue.push(encoder.finish());

	capture.in_flight = Some(PendingCapture {
		buffer,
		size,
		padded_bytes_per_row,
		swizzle,
		frame: playback.frame,
	});
}

fn save_frame(mut capture: ResMut<FrameCapture>, gpu: Res<Gpu>) {
	// The copy was submitted with the rest of the frame in PostRenderPass
	let Some(pending) = capture.in_flight.take() else {
		return;
	};

	let path = capture_path(&capture.export_dir, pending.frame);

	match read_back(&gpu, &pending).and_then(|image| write_png(&path, image)) {
		Ok(()) => info!("Saved frame to `{}`", path.display()),
		Err(err) => error!("Couldn't capture frame: {err:#}"),
	}
}

fn read_back(gpu: &Gpu, pending: &PendingCapture) -> Result<RgbaImage> {
	let slice = pending.buffer.slice(..);

	let (sender, receiver) = mpsc::channel();
	slice.map_async(MapMode::Read, move |result| {
		let _ = sender.send(result);
	});

	gpu.device.poll(Maintain::Wait);

	receiver
		.recv()
		.context("Frame capture buffer was dropped before mapping")?
		.map_err(|err| anyhow!("Couldn't map frame capture buffer: {err}"))?;

	let pixels = {
		let data = slice.get_mapped_range();
		unpad_rows(&data, pending.size, pending.padded_bytes_per_row, pending.swizzle)
	};
	pending.buffer.unmap();

	let Some(image) = RgbaImage::from_raw(pending.size.x, pending.size.y, pixels) else {
		bail!("Captured frame doesn't match its size");
	};

	Ok(image)
}

fn write_png(path: &Path, image: RgbaImage) -> Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).with_context(|| format!("Couldn't create `{}`", parent.display()))?;
	}

	image
		.save(path)
		.with_context(|| format!("Couldn't write `{}`", path.display()))
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rows_are_padded_to_alignment() {
		assert_eq!(padded_bytes_per_row(64), 256);
		assert_eq!(padded_bytes_per_row(65), 512);
		assert_eq!(padded_bytes_per_row(1080), 4352);
		assert_eq!(padded_bytes_per_row(1), 256);
	}

	#[test]
	fn unpadding_drops_the_tail_of_each_row() {
		let size = UVec2::new(2, 2);
		let padded = 12;

		#[rustfmt::skip]
		let data = [
			1, 2, 3, 4,  5, 6, 7, 8,  0, 0, 0, 0,
			9, 10, 11, 12,  13, 14, 15, 16,  0, 0, 0, 0,
		];

		assert_eq!(
			unpad_rows(&data, size, padded, false),
			(1..=16).collect::<Vec<u8>>()
		);
	}

	#[test]
	fn bgra_is_swizzled() {
		let data = [30, 20, 10, 255];
		assert_eq!(unpad_rows(&data, UVec2::new(1, 1), 4, true), vec![10, 20, 30, 255]);
	}

	#[test]
	fn only_8_bit_formats_are_captured() {
		assert_eq!(capture_layout(TextureFormat::Bgra8Unorm), Some(true));
		assert_eq!(capture_layout(TextureFormat::Rgba8Unorm), Some(false));
		assert_eq!(capture_layout(TextureFormat::Rgba16Float), None);
	}

	#[test]
	fn captures_are_named_after_their_frame() {
		let path = capture_path(Path::new("output"), 42);
		let name = path.file_name().unwrap().to_str().unwrap();

		assert!(path.starts_with("output"));
		assert!(name.ends_with("-42.png"));
	}
}
