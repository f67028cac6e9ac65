use std::{marker::PhantomData, slice::Iter};

use anyhow::Result;
use bevy_ecs::{
	event::{Event, EventReader, Events},
	schedule::{IntoSystemConfigs, ScheduleLabel},
	system::{Res, ResMut},
	world::World,
};
use glam::{UVec2, Vec2};
use winit::{
	event::{ElementState, MouseButton},
	keyboard::{KeyCode, PhysicalKey},
};

use crate::{
	core::{
		events::{CursorMotionEvent, KeyboardInputEvent, MouseInputEvent, MouseWheelEvent, WindowResizedEvent},
		gameloop::{EventsCore, IterStep, Render, Update},
	},
	ecs::{self, App, Plugin},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub struct EventProcessingPlugin;

impl Plugin for EventProcessingPlugin {
	fn build(&self, app: &mut App) -> Result<()> {
		// Signal into the dedicated resource when the schedule was run
		app.init_resource::<ScheduleSignal<IterStep>>();
		app.init_resource::<ScheduleSignal<Update>>();
		app.init_resource::<ScheduleSignal<Render>>();
		app.add_systems(IterStep, signal_schedule::<IterStep>);
		app.add_systems(Update, signal_schedule::<Update>);
		app.add_systems(Render, signal_schedule::<Render>);

		// Signal that events should be cleared
		app.init_resource::<ClearEvents>();

		// Order of operation:
		// * check_signals
		// * if check passed
		// * 	clear_events (for each event type)
		// *	reset_signals
		app.add_systems(EventsCore, (check_signals, reset_signals).chain());

		Ok(())
	}
}

#[derive(ecs::Resource)]
pub struct ScheduleSignal<S> {
	counter: usize,
	_marker: PhantomData<S>,
}

#[derive(ecs::Resource, Default)]
pub struct ClearEvents {
	clear: bool,
}

impl<S> Default for ScheduleSignal<S> {
	fn default() -> Self {
		Self {
			counter: 0,
			_marker: Default::default(),
		}
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Setup the world to manage events of type `E`.
///
/// The event queue is only cleared once every schedule had the chance to read it, see [`check_signals`].
pub fn add_event<E: Event>(app: &mut App) {
	if !app.world.contains_resource::<Events<E>>() {
		app.world.init_resource::<Events<E>>();
		app.add_systems(
			EventsCore,
			try_clear_events::<E>
				.after(check_signals)
				.before(reset_signals),
		);
	}
}

/// This function should be run from a specific schedule that matches type `S`.
/// This signals that schedule `S` was indeed called
pub fn signal_schedule<S: ScheduleLabel>(mut schedule_signal: ResMut<ScheduleSignal<S>>) {
	schedule_signal.counter += 1;
}

/// Checks whether all schedule signals are set (thus all schedules were run),
/// if yes signal the events to be cleared
pub fn check_signals(world: &mut World) {
	let signal_iterstep = world.resource::<ScheduleSignal<IterStep>>();
	let signal_update = world.resource::<ScheduleSignal<Update>>();
	let signal_render = world.resource::<ScheduleSignal<Render>>();

	// The event queues are double-buffered, so every schedule has to have run at least twice since the last
	// clearing for all of them to have seen every event.
	if signal_iterstep.counter >= 2 && signal_update.counter >= 2 && signal_render.counter >= 2 {
		world.resource_mut::<ClearEvents>().clear = true;
	}
}

/// Clear the specific event type `E` if the `ClearEvents` signal was set
pub fn try_clear_events<E: Event>(clear_events: Res<ClearEvents>, mut events: ResMut<Events<E>>) {
	if clear_events.clear {
		// update() swaps the double buffer instead of truly clearing
		events.update();
	}
}

/// After clearing events, reset the schedule signals + `ClearEvents` signal.
/// This needs to be done in two steps to make sure ALL events types get cleared before resetting the counters.
pub fn reset_signals(world: &mut World) {
	if world.resource::<ClearEvents>().clear {
		world.resource_mut::<ScheduleSignal<IterStep>>().counter = 0;
		world.resource_mut::<ScheduleSignal<Update>>().counter = 0;
		world.resource_mut::<ScheduleSignal<Render>>().counter = 0;
		world.resource_mut::<ClearEvents>().clear = false;
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// The events an [`EventReader`] had pending, collected so that they can be queried in several ways
pub struct ProcessedEventReader<E: Event> {
	events: Vec<E>,
}

impl<E: Event> ProcessedEventReader<E> {
	fn iter(&self) -> Iter<E> {
		self.events.iter()
	}
}

pub trait EventReaderProcessor<E: Event> {
	// Taking ownership of self on purpose here; since process() will read() and thus consume the iterator behind
	// EventReader, making sure the EventReader can't be used anymore afterwards prevents reading twice
	fn process(self) -> ProcessedEventReader<E>;
}

impl<E: Event + Clone> EventReaderProcessor<E> for EventReader<'_, '_, E> {
	fn process(mut self) -> ProcessedEventReader<E> {
		ProcessedEventReader {
			events: self.read().cloned().collect(),
		}
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub trait ProcessedInputEvents {
	type KeyType;

	fn has_pressed(&self, key: Self::KeyType) -> bool;
	fn latest_state(&self, key: Self::KeyType) -> Option<ElementState>;
}

impl ProcessedInputEvents for ProcessedEventReader<KeyboardInputEvent> {
	type KeyType = KeyCode;

	/// Key repeats are not counted as presses
	fn has_pressed(&self, keycode: KeyCode) -> bool {
		self.iter()
			.any(|kb| kb.state.is_pressed() && !kb.repeat && kb.physical_key == PhysicalKey::Code(keycode))
	}

	fn latest_state(&self, keycode: KeyCode) -> Option<ElementState> {
		self.iter()
			.filter(|kb| kb.physical_key == PhysicalKey::Code(keycode))
			.last()
			.map(|kb| kb.state)
	}
}

impl ProcessedInputEvents for ProcessedEventReader<MouseInputEvent> {
	type KeyType = MouseButton;

	fn has_pressed(&self, button: MouseButton) -> bool {
		self.iter().any(|b| b.state.is_pressed() && b.button == button)
	}

	fn latest_state(&self, button: MouseButton) -> Option<ElementState> {
		self.iter().filter(|b| b.button == button).last().map(|b| b.state)
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub trait ProcessedChangeEvents {
	type ItemType;

	fn latest(&self) -> Option<Self::ItemType>;
}

impl ProcessedChangeEvents for ProcessedEventReader<WindowResizedEvent> {
	type ItemType = UVec2;

	fn latest(&self) -> Option<Self::ItemType> {
		self.events.last().map(|w| w.size)
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub trait ProcessedMotionEvents {
	type MotionType;

	fn delta_sum(&self) -> Self::MotionType;
}

impl ProcessedMotionEvents for ProcessedEventReader<CursorMotionEvent> {
	type MotionType = Vec2;

	fn delta_sum(&self) -> Self::MotionType {
		self.iter().fold(Vec2::ZERO, |acc, m| acc + m.delta)
	}
}

impl ProcessedMotionEvents for ProcessedEventReader<MouseWheelEvent> {
	type MotionType = f32;

	fn delta_sum(&self) -> Self::MotionType {
		self.iter().map(|w| w.lines).sum()
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;

	fn key(code: KeyCode, state: ElementState, repeat: bool) -> KeyboardInputEvent {
		KeyboardInputEvent {
			state,
			physical_key: PhysicalKey::Code(code),
			repeat,
		}
	}

	#[test]
	fn key_repeats_are_not_presses() {
		let processed = ProcessedEventReader {
			events: vec![key(KeyCode::Space, ElementState::Pressed, true)],
		};
		assert!(!processed.has_pressed(KeyCode::Space));

		let processed = ProcessedEventReader {
			events: vec![
				key(KeyCode::KeyS, ElementState::Released, false),
				key(KeyCode::Space, ElementState::Pressed, false),
			],
		};
		assert!(processed.has_pressed(KeyCode::Space));
		assert!(!processed.has_pressed(KeyCode::KeyS));
	}

	#[test]
	fn latest_mouse_state_wins() {
		let processed = ProcessedEventReader {
			events: vec![
				MouseInputEvent {
					state: ElementState::Pressed,
					button: MouseButton::Left,
				},
				MouseInputEvent {
					state: ElementState::Pressed,
					button: MouseButton::Right,
				},
				MouseInputEvent {
					state: ElementState::Released,
					button: MouseButton::Left,
				},
			],
		};

		assert_eq!(processed.latest_state(MouseButton::Left), Some(ElementState::Released));
		assert_eq!(processed.latest_state(MouseButton::Right), Some(ElementState::Pressed));
		assert_eq!(processed.latest_state(MouseButton::Middle), None);
	}

	#[test]
	fn motion_and_wheel_are_summed() {
		let motion = ProcessedEventReader {
			events: vec![
				CursorMotionEvent { delta: Vec2::new(1.0, 2.0) },
				CursorMotionEvent { delta: Vec2::new(-3.0, 0.5) },
			],
		};
		assert_eq!(motion.delta_sum(), Vec2::new(-2.0, 2.5));

		let wheel = ProcessedEventReader {
			events: vec![MouseWheelEvent { lines: 1.0 }, MouseWheelEvent { lines: 2.0 }],
		};
		assert_eq!(wheel.delta_sum(), 3.0);
	}

	#[test]
	fn latest_resize_wins() {
		let processed = ProcessedEventReader {
			events: vec![
				WindowResizedEvent { size: UVec2::new(10, 10) },
				WindowResizedEvent { size: UVec2::new(20, 30) },
			],
		};
		assert_eq!(processed.latest(), Some(UVec2::new(20, 30)));
	}
}
