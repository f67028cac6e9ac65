use std::{marker::PhantomData, mem, sync::Arc};

use bevy_ecs::{
	schedule::IntoSystemConfigs,
	system::{Query, Res},
};
use wgpu::{
	BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
	BindingType, Buffer, BufferBindingType, BufferDescriptor, BufferUsages, Device, ShaderStages,
};

use super::{gameloop::PreRender, gpu::Gpu};
use crate::ecs::{self, App};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Maps a Rust type to its WGSL counterpart. Structs get it through `#[derive(ShaderStruct)]`, which also
/// provides the WGSL struct declaration.
pub trait ShaderType {
	fn type_name() -> String;
	fn struct_definition() -> Option<String> {
		None
	}
}

#[rustfmt::skip] impl ShaderType for f32        {fn type_name() -> String {"f32".to_string()}}
#[rustfmt::skip] impl ShaderType for glam::Vec4 {fn type_name() -> String {"vec4<f32>".to_string()}}
#[rustfmt::skip] impl ShaderType for glam::Mat4 {fn type_name() -> String {"mat4x4<f32>".to_string()}}

#[rustfmt::skip] impl<E: ShaderType, const N: usize> ShaderType for [E; N] {fn type_name() -> String {format!("array<{},{}>", E::type_name(), N)}}

// No glam::Vec3, it is 12 bytes on the CPU but 16-byte aligned in WGSL uniforms

/// Uniform data that lives on an entity next to its [`UniformBuffer`], uploaded every frame
pub trait Uniform: ecs::Component + ShaderType + bytemuck::Pod + Send + Sync {}
impl<T> Uniform for T where T: ecs::Component + ShaderType + bytemuck::Pod + Send + Sync {}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// The system set all uniform uploads run in, at the end of [`PreRender`]
#[derive(ecs::SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadUniforms;

#[derive(ecs::Component, Debug)]
pub struct UniformBuffer<T>
where
	T: Sized + bytemuck::Pod,
{
	pub buffer: Buffer,
	pub bind_group_layout: Arc<BindGroupLayout>,
	pub bind_group: Arc<BindGroup>,
	_marker: PhantomData<T>,
}

impl<T> UniformBuffer<T>
where
	T: Sized + bytemuck::Pod,
{
	/// A single-binding layout for `T`, to be shared between every buffer of that type
	pub fn create_layout(device: &Device, visibility: ShaderStages) -> Arc<BindGroupLayout> {
		let name = std::any::type_name::<T>();

		Arc::new(device.create_bind_group_layout(&BindGroupLayoutDescriptor {
			entries: &[Self::layout_entry(0, visibility)],
			label: Some(&format!("{name} Bindgroup Layout")),
		}))
	}

	pub fn layout_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
		BindGroupLayoutEntry {
			binding,
			visibility,
			ty: BindingType::Buffer {
				ty: BufferBindingType::Uniform,
				has_dynamic_offset: false,
				min_binding_size: None,
			},
			count: None,
		}
	}

	pub fn new(device: &Device, label: &str, layout: Arc<BindGroupLayout>) -> Self {
		// In wgpu, uniforms need to be explicitly created as buffers
		let buffer = device.create_buffer(&BufferDescriptor {
			label: Some(&format!("{label} Buffer")),
			size: mem::size_of::<T>() as u64,
			usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
			mapped_at_creation: false,
		});

		let bind_group = device.create_bind_group(&BindGroupDescriptor {
			layout: &layout,
			entries: &[BindGroupEntry {
				binding: 0,
				resource: buffer.as_entire_binding(),
			}],
			label: Some(&format!("{label} Bindgroup")),
		});

		UniformBuffer::<T> {
			buffer,
			bind_group_layout: layout,
			bind_group: Arc::new(bind_group),
			_marker: Default::default(),
		}
	}

	pub fn upload(&self, gpu: &Gpu, data: &T) {
		gpu.queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(data));
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Uploads every `T` next to a [`UniformBuffer<T>`] at the end of [`PreRender`]
pub fn register_uniform<T: Uniform>(app: &mut App) {
	app.add_systems(PreRender, upload_buffers::<T>.in_set(UploadUniforms));
}

fn upload_buffers<T: Uniform>(gpu: Res<Gpu>, q: Query<(&T, &UniformBuffer<T>)>) {
	for (uniform, uniform_buffer) in q.iter() {
		uniform_buffer.upload(&gpu, uniform);
	}
}

/// Concatenated WGSL declarations of the given struct definitions
pub fn struct_definitions(definitions: &[Option<String>]) -> String {
	definitions.iter().flatten().cloned().collect::<Vec<_>>().join("\n")
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use glam::{Mat4, Vec4};
	use helicoid_sketch_derive::ShaderStruct;

	use super::*;

	#[repr(C)]
	#[derive(ShaderStruct, bytemuck::Pod, bytemuck::Zeroable, Copy, Clone)]
	struct Tinted {
		transform: Mat4,
		tint: Vec4,
		weights: [f32; 4],
	}

	#[test]
	fn primitive_type_names() {
		assert_eq!(f32::type_name(), "f32");
		assert_eq!(Vec4::type_name(), "vec4<f32>");
		assert_eq!(Mat4::type_name(), "mat4x4<f32>");
		assert_eq!(<[Vec4; 3]>::type_name(), "array<vec4<f32>,3>");
		assert_eq!(f32::struct_definition(), None);
	}

	#[test]
	fn derived_struct_definition() {
		assert_eq!(Tinted::type_name(), "Tinted");
		assert_eq!(
			Tinted::struct_definition().unwrap(),
			"struct Tinted {\n\ttransform: mat4x4<f32>,\n\ttint: vec4<f32>,\n\tweights: array<f32,4>,\n}\n"
		);
	}

	#[test]
	fn struct_definitions_skip_primitives() {
		let source = struct_definitions(&[Tinted::struct_definition(), f32::struct_definition()]);
		assert_eq!(source, Tinted::struct_definition().unwrap());
	}
}
