//! A small plugin-based app container on top of [`bevy_ecs`].
//!
//! Plugins populate the [`World`] once during setup; the runner then drives the schedules (see
//! [`crate::core::gameloop`]).

use anyhow::{anyhow, Result};
pub use bevy_ecs::{bundle::Bundle, component::Component, schedule::SystemSet, system::Resource};
use bevy_ecs::{
	schedule::{IntoSystemConfigs, IntoSystemSetConfigs, Schedule, ScheduleLabel, Schedules},
	world::{FromWorld, World},
};
use log::debug;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

pub trait Plugin {
	fn build(&self, app: &mut App) -> Result<()>;

	fn name(&self) -> &str {
		std::any::type_name::<Self>()
	}
}

type Runner = Box<dyn FnOnce(App) -> Result<()>>;

pub struct App {
	pub world: World,
	runner: Option<Runner>,
}

impl Default for App {
	fn default() -> Self {
		Self::new()
	}
}

impl App {
	pub fn new() -> Self {
		let mut world = World::new();
		world.init_resource::<Schedules>();

		Self { world, runner: None }
	}

	pub fn add_plugin<P: Plugin>(&mut self, plugin: P) -> Result<&mut Self> {
		debug!("Building plugin {}", plugin.name());

		plugin.build(self)?;
		Ok(self)
	}

	pub fn add_systems<M>(&mut self, schedule: impl ScheduleLabel, systems: impl IntoSystemConfigs<M>) -> &mut Self {
		self.edit_schedule(schedule, |schedule| {
			schedule.add_systems(systems);
		})
	}

	pub fn configure_sets(&mut self, schedule: impl ScheduleLabel, sets: impl IntoSystemSetConfigs) -> &mut Self {
		self.edit_schedule(schedule, |schedule| {
			schedule.configure_sets(sets);
		})
	}

	/// Runs `edit` on the schedule with the given label, creating it first if needed
	pub fn edit_schedule(&mut self, label: impl ScheduleLabel, edit: impl FnOnce(&mut Schedule)) -> &mut Self {
		let label = label.intern();
		let mut schedules = self.world.resource_mut::<Schedules>();

		if schedules.get(label).is_none() {
			schedules.insert(Schedule::new(label));
		}
		if let Some(schedule) = schedules.get_mut(label) {
			edit(schedule);
		}

		self
	}

	pub fn init_resource<R: Resource + FromWorld>(&mut self) -> &mut Self {
		self.world.init_resource::<R>();
		self
	}

	pub fn insert_resource<R: Resource>(&mut self, resource: R) -> &mut Self {
		self.world.insert_resource(resource);
		self
	}

	pub fn set_runner(&mut self, runner: impl FnOnce(App) -> Result<()> + 'static) -> &mut Self {
		self.runner = Some(Box::new(runner));
		self
	}

	/// Hands the app over to its runner. Fails if no plugin installed one.
	pub fn run(&mut self) -> Result<()> {
		let runner = self
			.runner
			.take()
			.ok_or_else(|| anyhow!("No runner was set, is the gameloop plugin missing?"))?;

		let app = std::mem::take(self);
		runner(app)
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use bevy_ecs::{schedule::ScheduleLabel, system::ResMut};

	use super::*;

	#[derive(ScheduleLabel, Clone, Debug, PartialEq, Eq, Hash)]
	struct TestSchedule;

	#[derive(Resource, Default)]
	struct Counter(u32);

	struct CounterPlugin;

	impl Plugin for CounterPlugin {
		fn build(&self, app: &mut App) -> Result<()> {
			app.init_resource::<Counter>();
			app.add_systems(TestSchedule, |mut counter: ResMut<Counter>| counter.0 += 1);
			Ok(())
		}
	}

	struct FailingPlugin;

	impl Plugin for FailingPlugin {
		fn build(&self, _app: &mut App) -> Result<()> {
			Err(anyhow!("nope"))
		}
	}

	#[test]
	fn plugin_systems_run_in_their_schedule() {
		let mut app = App::new();
		app.add_plugin(CounterPlugin).unwrap();

		app.world.run_schedule(TestSchedule);
		app.world.run_schedule(TestSchedule);

		assert_eq!(app.world.resource::<Counter>().0, 2);
	}

	#[test]
	fn systems_and_sets_share_one_schedule() {
		#[derive(SystemSet, Clone, Debug, PartialEq, Eq, Hash)]
		struct First;

		#[derive(SystemSet, Clone, Debug, PartialEq, Eq, Hash)]
		struct Second;

		#[derive(Resource, Default)]
		struct Order(Vec<u32>);

		let mut app = App::new();
		app.init_resource::<Order>();
		app.add_systems(TestSchedule, (|mut order: ResMut<Order>| order.0.push(2)).in_set(Second));
		app.add_systems(TestSchedule, (|mut order: ResMut<Order>| order.0.push(1)).in_set(First));
		app.configure_sets(TestSchedule, (First, Second).chain());

		assert!(app.world.resource::<Schedules>().get(TestSchedule).is_some());

		app.world.run_schedule(TestSchedule);
		assert_eq!(app.world.resource::<Order>().0, vec![1, 2]);
	}

	#[test]
	fn failing_plugin_propagates_error() {
		let mut app = App::new();
		assert!(app.add_plugin(FailingPlugin).is_err());
	}

	#[test]
	fn run_without_runner_fails() {
		assert!(App::new().run().is_err());
	}

	#[test]
	fn run_hands_world_to_runner() {
		let mut app = App::new();
		app.add_plugin(CounterPlugin).unwrap();
		app.set_runner(|mut app| {
			app.world.run_schedule(TestSchedule);
			assert_eq!(app.world.resource::<Counter>().0, 1);
			Ok(())
		});

		app.run().unwrap();
	}
}
