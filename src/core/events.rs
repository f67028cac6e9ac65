use anyhow::Result;
use bevy_ecs::event::Event;
use glam::{UVec2, Vec2};

use super::event_processing::add_event;
use crate::ecs::{App, Plugin};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct EventsPlugin;

impl Plugin for EventsPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		// Register all events
		add_event::<KeyboardInputEvent>(app);
		add_event::<MouseInputEvent>(app);
		add_event::<CursorMotionEvent>(app);
		add_event::<MouseWheelEvent>(app);
		add_event::<WindowResizedEvent>(app);

		Ok(())
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Event for keyboard inputs.
///
/// The fields are taken directly from the corresponding [`winit::event::WindowEvent::KeyboardInput`].
/// [`Self::physical_key`] is how the physical keyboard sent the key, so without any keyboard layout information.
/// Keys are named after their physical position on a US keyboard layout.
#[derive(Event, Clone, Debug, PartialEq, Eq)]
pub struct KeyboardInputEvent {
	pub state: winit::event::ElementState,
	pub physical_key: winit::keyboard::PhysicalKey,
	pub repeat: bool,
}

#[derive(Event, Clone, Debug, PartialEq, Eq)]
pub struct MouseInputEvent {
	pub state: winit::event::ElementState,
	pub button: winit::event::MouseButton,
}

/// Event for cursor movement inside the window, in physical pixels.
///
/// Derived from consecutive [`winit::event::WindowEvent::CursorMoved`] positions, so that dragging maps to the
/// window's pixel grid rather than to raw device motion.
#[derive(Event, Clone, Debug, PartialEq)]
pub struct CursorMotionEvent {
	pub delta: Vec2,
}

/// Event for mouse wheel motion, in lines. Positive is scrolling away from the user.
#[derive(Event, Clone, Debug, PartialEq)]
pub struct MouseWheelEvent {
	pub lines: f32,
}

/// Event for when the window was resized.
///
/// Careful, might fire many times in a row when the window is currently being drag-resized.
/// Corresponds to [`winit::event::WindowEvent::Resized`], zero-sized resizes are never sent.
#[derive(Event, Clone, Debug, PartialEq, Eq)]
pub struct WindowResizedEvent {
	pub size: UVec2,
}
