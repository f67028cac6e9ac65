//! Perspective camera with orbit controls.
//!
//! Left drag orbits around the target, right drag pans in the view plane, the wheel zooms. Dragging across the
//! full height of the window rotates by a full turn.

use std::f32::consts::{PI, TAU};

use anyhow::Result;
use bevy_ecs::{
	event::EventReader,
	query::With,
	schedule::IntoSystemConfigs,
	system::{Query, Res},
};
use glam::{Mat4, Vec2, Vec3};
use winit::event::{ElementState, MouseButton};

use super::{
	event_processing::{EventReaderProcessor, ProcessedInputEvents, ProcessedMotionEvents},
	events::{CursorMotionEvent, MouseInputEvent, MouseWheelEvent},
	gameloop::PreRender,
	render_target::RenderTarget,
};
use crate::{
	config::{CameraSettings, Settings},
	ecs::{self, App, Plugin},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		let settings = app.world.resource::<Settings>().scene.camera.clone();

		app.add_systems(
			PreRender,
			(process_mouse, update_camera).chain().in_set(CameraControl),
		);

		app.world.spawn(CameraBundle {
			label: MainCamera,
			camera: Camera::from_settings(&settings),
			controller: OrbitController::default(),
		});

		Ok(())
	}
}

#[derive(ecs::SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraControl;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(ecs::Component)]
pub struct MainCamera;

#[derive(ecs::Bundle)]
struct CameraBundle {
	label: MainCamera,
	camera: Camera,
	controller: OrbitController,
}

#[derive(ecs::Component, Copy, Clone, Debug, PartialEq)]
pub struct Camera {
	pub position: Vec3,
	pub target: Vec3,
	pub up: Vec3,
	/// Vertical field of view in radians
	pub fov_y: f32,
	pub z_near: f32,
	pub z_far: f32,
}

impl Camera {
	pub fn from_settings(settings: &CameraSettings) -> Self {
		Self {
			position: Vec3::from(settings.position),
			target: Vec3::from(settings.target),
			up: Vec3::Y,
			fov_y: settings.fov_y_degrees.to_radians(),
			z_near: settings.near,
			z_far: settings.far,
		}
	}

	pub fn view_matrix(&self) -> Mat4 {
		Mat4::look_at_rh(self.position, self.target, self.up)
	}

	/// Maps depth to `[0, 1]` as wgpu expects
	pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
		Mat4::perspective_rh(self.fov_y, aspect_ratio, self.z_near, self.z_far)
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Spherical coordinates around the Y axis: `theta` is the azimuth measured from +Z towards +X, `phi` the polar
/// angle measured from +Y.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Spherical {
	pub radius: f32,
	pub theta: f32,
	pub phi: f32,
}

impl Spherical {
	pub fn from_offset(offset: Vec3) -> Self {
		let radius = offset.length();

		if radius == 0.0 {
			return Self {
				radius,
				theta: 0.0,
				phi: 0.0,
			};
		}

		Self {
			radius,
			theta: offset.x.atan2(offset.z),
			phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
		}
	}

	pub fn to_offset(self) -> Vec3 {
		let sin_phi_radius = self.phi.sin() * self.radius;

		Vec3::new(
			sin_phi_radius * self.theta.sin(),
			self.phi.cos() * self.radius,
			sin_phi_radius * self.theta.cos(),
		)
	}
}

#[derive(ecs::Component, Copy, Clone, Debug, PartialEq)]
pub struct OrbitController {
	pub rotate_speed: f32,
	pub zoom_speed: f32,
	pub pan_speed: f32,
	pub min_distance: f32,
	pub max_distance: f32,
	pub min_polar_angle: f32,
	pub max_polar_angle: f32,

	rotating: bool,
	panning: bool,

	theta_delta: f32,
	phi_delta: f32,
	scale: f32,
	pan_offset: Vec3,
}

impl Default for OrbitController {
	fn default() -> Self {
		Self {
			rotate_speed: 1.0,
			zoom_speed: 1.0,
			pan_speed: 1.0,
			min_distance: 0.0,
			max_distance: f32::INFINITY,
			min_polar_angle: 0.0,
			max_polar_angle: PI,
			rotating: false,
			panning: false,
			theta_delta: 0.0,
			phi_delta: 0.0,
			scale: 1.0,
			pan_offset: Vec3::ZERO,
		}
	}
}

impl OrbitController {
	/// Keeps the camera from flipping over the poles
	const POLAR_EPSILON: f32 = 0.000001;

	fn zoom_scale(&self) -> f32 {
		0.95_f32.powf(self.zoom_speed)
	}

	/// Orbit by a cursor drag of `delta` pixels in a viewport `viewport_height` pixels tall
	pub fn rotate(&mut self, delta: Vec2, viewport_height: f32) {
		let height = viewport_height.max(1.0);

		self.theta_delta -= TAU * delta.x / height * self.rotate_speed;
		self.phi_delta -= TAU * delta.y / height * self.rotate_speed;
	}

	/// Zoom by `lines` wheel steps, positive moves closer
	pub fn zoom(&mut self, lines: f32) {
		self.scale *= self.zoom_scale().powf(lines);
	}

	/// Pan the target by a cursor drag of `delta` pixels, so that the point under the cursor follows it
	pub fn pan(&mut self, delta: Vec2, viewport_height: f32, camera: &Camera) {
		let height = viewport_height.max(1.0);
		let offset = camera.position - camera.target;

		// Half of the fov is center to top of screen
		let target_distance = offset.length() * (camera.fov_y / 2.0).tan();

		let forward = (-offset).normalize_or_zero();
		let right = forward.cross(camera.up).normalize_or_zero();
		let up = right.cross(forward);

		let pan_x = 2.0 * delta.x * target_distance / height * self.pan_speed;
		let pan_y = 2.0 * delta.y * target_distance / height * self.pan_speed;

		self.pan_offset += -right * pan_x + up * pan_y;
	}

	/// Applies the accumulated deltas to `camera` and resets them
	pub fn update(&mut self, camera: &mut Camera) {
		let mut spherical = Spherical::from_offset(camera.position - camera.target);

		spherical.theta += self.theta_delta;
		spherical.phi += self.phi_delta;

		let min_phi = self.min_polar_angle.max(Self::POLAR_EPSILON);
		let max_phi = self.max_polar_angle.min(PI - Self::POLAR_EPSILON);
		spherical.phi = spherical.phi.clamp(min_phi, max_phi);

		spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

		camera.target += self.pan_offset;
		camera.position = camera.target + spherical.to_offset();

		self.theta_delta = 0.0;
		self.phi_delta = 0.0;
		self.scale = 1.0;
		self.pan_offset = Vec3::ZERO;
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

fn process_mouse(
	mut q: Query<(&mut OrbitController, &Camera), With<MainCamera>>,
	button_events: EventReader<MouseInputEvent>,
	motion_events: EventReader<CursorMotionEvent>,
	wheel_events: EventReader<MouseWheelEvent>,
	render_target: Res<RenderTarget<'static>>,
) {
	let buttons = button_events.process();
	let motion = motion_events.process().delta_sum();
	let wheel = wheel_events.process().delta_sum();
	let viewport_height = render_target.size.y as f32;

	for (mut controller, camera) in q.iter_mut() {
		// Motion first, a press in the same frame only starts dragging from the next motion on
		if controller.rotating {
			controller.rotate(motion, viewport_height);
		}
		if controller.panning {
			controller.pan(motion, viewport_height, camera);
		}

		if let Some(state) = buttons.latest_state(MouseButton::Left) {
			controller.rotating = state == ElementState::Pressed;
		}
		if let Some(state) = buttons.latest_state(MouseButton::Right) {
			controller.panning = state == ElementState::Pressed;
		}

		if wheel != 0.0 {
			controller.zoom(wheel);
		}
	}
}

fn update_camera(mut q: Query<(&mut OrbitController, &mut Camera), With<MainCamera>>) {
	for (mut controller, mut camera) in q.iter_mut() {
		controller.update(&mut camera);
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

	use super::*;

	fn camera() -> Camera {
		Camera::from_settings(&CameraSettings::default())
	}

	#[test]
	fn defaults_look_at_origin_from_z() {
		let camera = camera();
		assert_eq!(camera.position, Vec3::new(0.0, 0.0, 4.0));
		assert_relative_eq!(camera.fov_y, 50_f32.to_radians());

		let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
		assert_relative_eq!(origin_in_view.z, -4.0, epsilon = 1e-6);
	}

	#[test]
	fn spherical_round_trip() {
		let offset = Vec3::new(1.0, 2.0, -3.0);
		let back = Spherical::from_offset(offset).to_offset();
		assert_relative_eq!(back.x, offset.x, epsilon = 1e-5);
		assert_relative_eq!(back.y, offset.y, epsilon = 1e-5);
		assert_relative_eq!(back.z, offset.z, epsilon = 1e-5);
	}

	#[test]
	fn update_without_input_keeps_position() {
		let mut camera = camera();
		let mut controller = OrbitController::default();

		controller.update(&mut camera);

		assert_relative_eq!(camera.position.z, 4.0, epsilon = 1e-5);
		assert_relative_eq!(camera.position.x, 0.0, epsilon = 1e-5);
	}

	#[test]
	fn full_height_drag_is_a_full_turn() {
		let mut camera = camera();
		let mut controller = OrbitController::default();

		controller.rotate(Vec2::new(500.0, 0.0), 1000.0);
		controller.update(&mut camera);

		// Half a turn around Y
		assert_relative_eq!(camera.position.z, -4.0, epsilon = 1e-4);
		assert_relative_eq!(camera.position.length(), 4.0, epsilon = 1e-4);
	}

	#[test]
	fn rotation_is_clamped_at_the_poles() {
		let mut camera = camera();
		let mut controller = OrbitController::default();

		// Dragging down moves the camera up, way past the pole
		controller.rotate(Vec2::new(0.0, 10_000.0), 100.0);
		controller.update(&mut camera);

		assert!(camera.position.y > 3.99);
		assert!(camera.position.y <= 4.0);
		assert_relative_eq!(camera.position.length(), 4.0, epsilon = 1e-4);
	}

	#[test]
	fn wheel_zooms_in_and_out() {
		let mut camera = camera();
		let mut controller = OrbitController::default();

		controller.zoom(1.0);
		controller.update(&mut camera);
		assert_relative_eq!(camera.position.length(), 4.0 * 0.95, epsilon = 1e-5);

		controller.zoom(-1.0);
		controller.update(&mut camera);
		assert_relative_eq!(camera.position.length(), 4.0, epsilon = 1e-5);
	}

	#[test]
	fn zoom_respects_distance_limits() {
		let mut camera = camera();
		let mut controller = OrbitController {
			min_distance: 3.0,
			..Default::default()
		};

		controller.zoom(100.0);
		controller.update(&mut camera);
		assert_relative_eq!(camera.position.length(), 3.0, epsilon = 1e-5);
	}

	#[test]
	fn pan_moves_target_and_position_together() {
		let mut camera = camera();
		let mut controller = OrbitController::default();

		// Dragging right moves the scene right, so the target moves left (-X)
		controller.pan(Vec2::new(100.0, 0.0), 1000.0, &camera);
		controller.update(&mut camera);

		assert!(camera.target.x < 0.0);
		assert_relative_eq!(camera.position.x, camera.target.x, epsilon = 1e-5);
		assert_relative_eq!(camera.position.z - camera.target.z, 4.0, epsilon = 1e-5);
	}
}
