use std::{
	cmp::min,
	time::{Duration, Instant},
};

use anyhow::{Context, Result};
use bevy_ecs::{schedule::ScheduleLabel, world::World};
use glam::{UVec2, Vec2};
use log::{debug, trace};
use winit::{
	dpi::{PhysicalPosition, PhysicalSize},
	event::{ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent},
	event_loop::ControlFlow,
	keyboard::{KeyCode, PhysicalKey},
};

use crate::{
	config::Settings,
	core::{
		display::AppWindow,
		events::{CursorMotionEvent, KeyboardInputEvent, MouseInputEvent, MouseWheelEvent, WindowResizedEvent},
	},
	ecs::{self, App, Plugin},
	EventLoop,
};

/// How many pixels of a touchpad scroll count as one wheel line
const PIXELS_PER_LINE: f32 = 40.0;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct GameloopPlugin;

impl Plugin for GameloopPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let settings = &app.world.resource::<Settings>().sketch;

		let time = Time {
			target_ups: settings.ups,
			target_fps: settings.fps,
			..Default::default()
		};

		app.insert_resource(time);
		app.set_runner(run);

		Ok(())
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// A schedule that runs at every iteration of the event loop, but before [`IterStep`]. It is meant to be used
/// by the core of the app, to keep track of when the event queues should be cleared.
#[derive(ScheduleLabel, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventsCore;

/// The schedule that runs at every iteration of the event loop.
/// (To be more precise every time a redraw is requested)
#[derive(ScheduleLabel, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IterStep;

/// The schedule that runs at a fixed timestep, meant for input handling and surface management
#[derive(ScheduleLabel, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Update;

/// The schedule that runs right before rendering, once per frame: the per-frame sketch update
#[derive(ScheduleLabel, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PreRender;

/// The schedule that runs once per frame, meant for rendering
#[derive(ScheduleLabel, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Render;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(ecs::Resource, Debug, Copy, Clone)]
pub struct Time {
	start_time: Instant,
	pub current_time: Duration,

	pub target_ups: u32,
	pub target_fps: Option<u32>,

	last_iteration_time: Instant,
	last_update_time: Instant,
	last_render_time: Instant,

	pub dt_u: Duration,
	pub dt_f: Duration,

	update_accumulator: Duration,
	render_accumulator: Duration,

	pub counter_update: u64,
	pub counter_frame: u64,

	pub fps: f32,
	pub smooth_fps: f32,
}

impl Time {
	const SMOOTH_RESPONSIVENESS: f32 = 0.05;

	pub fn smoothed(&self, smoothed: f32, raw: f32) -> f32 {
		let response = (Self::SMOOTH_RESPONSIVENESS * self.target_ups as f32 * self.dt_u.as_secs_f32()).min(1.0);
		(1.0 - response) * smoothed + response * raw
	}
}

impl Default for Time {
	fn default() -> Self {
		let now = Instant::now();

		Self {
			start_time: now,
			current_time: Default::default(),
			target_ups: 60,
			target_fps: None,
			last_iteration_time: now,
			last_update_time: now,
			last_render_time: now,
			dt_u: Default::default(),
			dt_f: Default::default(),
			update_accumulator: Default::default(),
			render_accumulator: Default::default(),
			counter_update: Default::default(),
			counter_frame: Default::default(),
			fps: Default::default(),
			smooth_fps: Default::default(),
		}
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub fn run(mut app: App) -> Result<()> {
	trace!("Starting event loop");

	let event_loop = app
		.world
		.remove_non_send_resource::<EventLoop>()
		.context("Tried starting the gameloop without a winit eventloop available")?;

	// Animated sketch, so never wait for events
	event_loop.set_control_flow(ControlFlow::Poll);

	// Reset the clocks, setup might have taken a while
	app.world.insert_resource(Time {
		start_time: Instant::now(),
		last_iteration_time: Instant::now(),
		last_update_time: Instant::now(),
		last_render_time: Instant::now(),
		..*app.world.resource::<Time>()
	});

	let world = &mut app.world;
	let mut last_cursor_position: Option<PhysicalPosition<f64>> = None;

	event_loop
		.run(move |event, target| {
			let Event::WindowEvent { event, .. } = event else {
				return;
			};

			match event {
				WindowEvent::CloseRequested => {
					trace!("Winit event: Event::WindowEvent::CloseRequested");
					target.exit();
				}

				WindowEvent::KeyboardInput {
					event: KeyEvent {
						state,
						physical_key,
						repeat,
						..
					},
					..
				} => {
					if state == ElementState::Pressed && physical_key == PhysicalKey::Code(KeyCode::Escape) {
						debug!("Escape pressed, exiting");
						target.exit();
						return;
					}

					let event_out = KeyboardInputEvent {
						state,
						physical_key,
						repeat,
					};
					trace!("Event out: {event_out:?}");
					world.send_event(event_out);
				}

				WindowEvent::MouseInput { state, button, .. } => {
					let event_out = MouseInputEvent { state, button };
					trace!("Event out: {event_out:?}");
					world.send_event(event_out);
				}

				WindowEvent::CursorMoved { position, .. } => {
					if let Some(last) = last_cursor_position {
						let delta = Vec2::new((position.x - last.x) as f32, (position.y - last.y) as f32);
						world.send_event(CursorMotionEvent { delta });
					}
					last_cursor_position = Some(position);
				}

				WindowEvent::CursorLeft { .. } => {
					last_cursor_position = None;
				}

				WindowEvent::MouseWheel { delta, .. } => {
					let lines = match delta {
						MouseScrollDelta::LineDelta(_, y) => y,
						MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_LINE,
					};
					let event_out = MouseWheelEvent { lines };
					trace!("Event out: {event_out:?}");
					world.send_event(event_out);
				}

				WindowEvent::Resized(physical_size) => {
					if let Some(event_out) = resized_event(physical_size) {
						trace!("Event out: {event_out:?}");
						world.send_event(event_out);
					}
				}

				WindowEvent::RedrawRequested => {
					schedule_game_iteration(world);
					world.resource::<AppWindow>().winit_window.request_redraw();
				}

				_ => {}
			}
		})
		.context("Event loop terminated with an error")?;

	debug!("Event loop exited");
	Ok(())
}

/// Minimized windows report a zero size, which the surface can't be configured with
fn resized_event(size: PhysicalSize<u32>) -> Option<WindowResizedEvent> {
	(size.width > 0 && size.height > 0).then(|| WindowResizedEvent {
		size: UVec2::new(size.width, size.height),
	})
}

fn schedule_game_iteration(world: &mut World) {
	// Inspired by https://gafferongames.com/post/fix_your_timestep/

	// Call the fast-looping schedules at the beginning, so they don't delay delta_iteration in case they take
	// longer than they should
	let _ = world.try_run_schedule(EventsCore);
	let _ = world.try_run_schedule(IterStep);

	// Due to mut borrows clashing with time when running schedules, copy here and re-insert time before running
	// schedules
	let mut time = *world.resource::<Time>();
	let now = Instant::now();

	let delta_iteration = now - time.last_iteration_time;

	// dt_f is either "constant" or basically equal to delta_iteration
	if let Some(target_fps) = time.target_fps {
		time.dt_f = Duration::from_secs_f32(1. / target_fps as f32);
		time.render_accumulator += delta_iteration;
	} else {
		time.dt_f = now - time.last_render_time;
	}

	// dt_u is "constant"
	time.dt_u = Duration::from_secs_f32(1. / time.target_ups as f32);
	time.update_accumulator += delta_iteration;

	// Run update systems
	let num_updates = time.update_accumulator.as_nanos() / time.dt_u.as_nanos();
	for _ in 0..num_updates {
		world.insert_resource(time);
		let _ = world.try_run_schedule(Update);

		time.update_accumulator -= time.dt_u;
		time.counter_update += 1;
	}

	if num_updates >= 1 {
		time.last_update_time = now;
	}

	time.current_time = now - time.start_time;

	// Run render systems
	let should_render = if time.target_fps.is_some() {
		// Only render once the accumulator has produced enough time
		let ready = time.render_accumulator >= time.dt_f;
		if ready {
			time.render_accumulator -= time.dt_f;

			// In case FPS is consistently under the target, don't let the accumulator build up
			time.render_accumulator = min(time.render_accumulator, time.dt_f * 2);
		}
		ready
	} else {
		true
	};

	if should_render {
		world.insert_resource(time);
		let _ = world.try_run_schedule(PreRender);
		let _ = world.try_run_schedule(Render);

		time.fps = 1. / (now - time.last_render_time).as_secs_f32().max(f32::EPSILON);
		time.smooth_fps = time.smoothed(time.smooth_fps, time.fps);

		time.last_render_time = now;
		time.counter_frame += 1;

		if time.counter_frame % 600 == 0 {
			debug!("{:.1} fps", time.smooth_fps);
		}
	}

	// Finish up
	time.last_iteration_time = now;
	world.insert_resource(time);
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
	fn resize_keeps_the_new_size() {
		assert_eq!(
			resized_event(PhysicalSize::new(1280, 720)),
			Some(WindowResizedEvent {
				size: UVec2::new(1280, 720)
			})
		);
	}

	#[test]
	fn zero_sized_resizes_are_dropped() {
		assert_eq!(resized_event(PhysicalSize::new(0, 720)), None);
		assert_eq!(resized_event(PhysicalSize::new(1280, 0)), None);
		assert_eq!(resized_event(PhysicalSize::new(0, 0)), None);
	}
}
