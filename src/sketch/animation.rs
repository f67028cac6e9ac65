//! Looping playback and the per-frame motion it drives.

use std::f32::consts::{PI, TAU};

use bevy_ecs::{
	event::EventReader,
	query::With,
	schedule::IntoSystemConfigs,
	system::{Query, Res, ResMut},
};
use glam::{Quat, Vec3};
use log::info;
use winit::keyboard::KeyCode;

use super::{
	material::{MaterialUniform, PlayheadDriven},
	model::{ModelUniform, ShadowFlags, Transform},
	Ball, Helicoid,
};
use crate::{
	config::SketchSettings,
	core::{
		event_processing::{EventReaderProcessor, ProcessedInputEvents},
		events::KeyboardInputEvent,
		gameloop::{PreRender, Time, Update},
	},
	ecs::{self, App},
};

/// Everything that moves the scene, at the start of [`PreRender`]
#[derive(ecs::SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Animate;

pub fn register_animation(app: &mut App) {
	app.add_systems(Update, toggle_pause);
	app.add_systems(
		PreRender,
		(
			advance_playback,
			(animate_helicoid, animate_balls, drive_material),
			update_models,
		)
			.chain()
			.in_set(Animate),
	);
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(ecs::Resource, Copy, Clone, Debug, PartialEq)]
pub struct Playback {
	/// Seconds of playback, paused time excluded
	pub elapsed: f64,
	pub duration: f64,
	pub animate: bool,
	pub paused: bool,
	pub frame: u64,
}

impl Playback {
	pub fn new(settings: &SketchSettings) -> Self {
		Self {
			elapsed: 0.0,
			duration: settings.duration as f64,
			animate: settings.animate,
			paused: false,
			frame: 0,
		}
	}

	/// Position in the loop, in `[0, 1)`
	pub fn playhead(&self) -> f32 {
		if !self.animate || self.duration <= 0.0 {
			return 0.0;
		}

		let playhead = (self.elapsed.rem_euclid(self.duration) / self.duration) as f32;

		// Rounding can land right on the end of the loop
		if playhead >= 1.0 {
			0.0
		} else {
			playhead
		}
	}

	pub fn advance(&mut self, dt: f64) {
		if self.animate && !self.paused {
			self.elapsed += dt;
		}
		self.frame += 1;
	}

	pub fn toggle_pause(&mut self) {
		self.paused = !self.paused;
	}
}

/// Where a ball orbiting the Y axis is at, `phase` offsets it along the orbit
pub fn ball_position(playhead: f32, phase: f32, orbit_radius: f32) -> Vec3 {
	let theta = playhead * TAU + phase;
	Vec3::new(orbit_radius * theta.sin(), 0.0, orbit_radius * theta.cos())
}

/// The helicoid does exactly one turn per loop
pub fn helicoid_rotation(playhead: f32) -> Quat {
	Quat::from_rotation_y(playhead * TAU)
}

/// Phases of the two balls, on opposite sides of the orbit
pub const BALL_PHASES: [f32; 2] = [0.0, PI];

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

fn toggle_pause(mut playback: ResMut<Playback>, keyboard_events: EventReader<KeyboardInputEvent>) {
	if keyboard_events.process().has_pressed(KeyCode::Space) {
		playback.toggle_pause();
		info!("Playback {}", if playback.paused { "paused" } else { "resumed" });
	}
}

fn advance_playback(mut playback: ResMut<Playback>, time: Res<Time>) {
	playback.advance(time.dt_f.as_secs_f64());
}

fn animate_helicoid(playback: Res<Playback>, mut q: Query<&mut Transform, With<Helicoid>>) {
	let rotation = helicoid_rotation(playback.playhead());

	for mut transform in q.iter_mut() {
		transform.rotation = rotation;
	}
}

fn animate_balls(playback: Res<Playback>, mut q: Query<(&Ball, &mut Transform)>) {
	let playhead = playback.playhead();

	for (ball, mut transform) in q.iter_mut() {
		transform.translation = ball_position(playhead, ball.phase, ball.orbit_radius);
	}
}

fn drive_material(playback: Res<Playback>, mut q: Query<&mut MaterialUniform, With<PlayheadDriven>>) {
	let playhead = playback.playhead();

	for mut material in q.iter_mut() {
		material.set_playhead(playhead);
	}
}

fn update_models(mut q: Query<(&Transform, &ShadowFlags, &mut ModelUniform)>) {
	for (transform, shadows, mut model) in q.iter_mut() {
		*model = ModelUniform::new(transform, shadows);
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
	use bevy_ecs::{schedule::Schedule, world::World};
	use glam::Vec4;

	use super::*;
	use crate::config::MaterialSettings;

	fn playback() -> Playback {
		Playback::new(&SketchSettings::default())
	}

	#[test]
	fn playhead_wraps_around_the_loop() {
		let mut playback = playback();
		assert_eq!(playback.playhead(), 0.0);

		playback.advance(1.25);
		assert_relative_eq!(playback.playhead(), 0.25, epsilon = 1e-6);

		playback.advance(5.0);
		assert_relative_eq!(playback.playhead(), 0.25, epsilon = 1e-6);

		playback.advance(3.75);
		assert_relative_eq!(playback.playhead(), 0.0, epsilon = 1e-6);
		assert!(playback.playhead() < 1.0);
		assert_eq!(playback.frame, 3);
	}

	#[test]
	fn paused_playback_holds_still() {
		let mut playback = playback();
		playback.advance(1.0);
		playback.toggle_pause();
		playback.advance(1.0);

		assert_relative_eq!(playback.playhead(), 0.2, epsilon = 1e-6);
		assert_eq!(playback.frame, 2);

		playback.toggle_pause();
		playback.advance(1.0);
		assert_relative_eq!(playback.playhead(), 0.4, epsilon = 1e-6);
	}

	#[test]
	fn static_sketch_stays_at_zero() {
		let mut playback = Playback::new(&SketchSettings {
			animate: false,
			..Default::default()
		});
		playback.advance(2.0);
		assert_eq!(playback.playhead(), 0.0);
	}

	#[test]
	fn balls_orbit_on_opposite_sides() {
		for playhead in [0.0, 0.1, 0.375, 0.9] {
			let a = ball_position(playhead, BALL_PHASES[0], 0.5);
			let b = ball_position(playhead, BALL_PHASES[1], 0.5);

			assert_relative_eq!(a.length(), 0.5, epsilon = 1e-6);
			assert_relative_eq!((a + b).length(), 0.0, epsilon = 1e-6);
			assert_eq!(a.y, 0.0);
		}

		let start = ball_position(0.0, 0.0, 0.5);
		assert_relative_eq!(start.z, 0.5);
		let quarter = ball_position(0.25, 0.0, 0.5);
		assert_relative_eq!(quarter.x, 0.5, epsilon = 1e-6);
	}

	#[test]
	fn helicoid_turns_once_per_loop() {
		let half = helicoid_rotation(0.5) * Vec3::X;
		assert_relative_eq!(half.x, -1.0, epsilon = 1e-6);
	}

	#[test]
	fn systems_move_the_scene() {
		let mut world = World::new();
		let mut playback = playback();
		playback.advance(1.25);
		world.insert_resource(playback);

		let flags = ShadowFlags { cast: true, receive: true };
		let helicoid = world
			.spawn((
				Helicoid,
				Transform::default(),
				flags,
				ModelUniform::default(),
				MaterialUniform::new(&MaterialSettings::default()),
				PlayheadDriven,
			))
			.id();
		let ball = world
			.spawn((
				Ball {
					phase: PI,
					orbit_radius: 0.5,
				},
				Transform::default(),
				flags,
				ModelUniform::default(),
				MaterialUniform::new(&MaterialSettings::default()),
			))
			.id();

		let mut schedule = Schedule::default();
		schedule.add_systems(
			(
				(animate_helicoid, animate_balls, drive_material),
				update_models,
			)
				.chain(),
		);
		schedule.run(&mut world);

		assert_relative_eq!(world.get::<MaterialUniform>(helicoid).unwrap().playhead.x, 0.25, epsilon = 1e-6);
		assert_eq!(world.get::<MaterialUniform>(ball).unwrap().playhead, Vec4::ZERO);

		let ball_transform = world.get::<Transform>(ball).unwrap();
		assert_relative_eq!(ball_transform.translation.x, -0.5, epsilon = 1e-6);

		let model = world.get::<ModelUniform>(ball).unwrap();
		assert_relative_eq!(model.model.w_axis.x, -0.5, epsilon = 1e-6);
		assert_eq!(model.flags.x, 1.0);
	}
}
