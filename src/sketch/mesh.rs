use std::{mem, sync::Arc};

use derive_more::Deref;
use glam::Vec3;
use wgpu::{
	util::{BufferInitDescriptor, DeviceExt},
	Buffer, BufferAddress, BufferUsages, Device, VertexAttribute, VertexBufferLayout, VertexStepMode,
};

use crate::ecs;

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[repr(C)]
#[derive(bytemuck::Pod, bytemuck::Zeroable, Copy, Clone, Debug, Default, PartialEq)]
pub struct Vertex {
	pub position: [f32; 3],
	pub normal: [f32; 3],
	pub uv: [f32; 2],
}

impl Vertex {
	const ATTRIBUTES: [VertexAttribute; 3] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

	pub fn new(position: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
		Self {
			position: position.to_array(),
			normal: normal.to_array(),
			uv,
		}
	}

	pub fn layout() -> VertexBufferLayout<'static> {
		VertexBufferLayout {
			array_stride: mem::size_of::<Self>() as BufferAddress,
			step_mode: VertexStepMode::Vertex,
			attributes: &Self::ATTRIBUTES,
		}
	}
}

/// Geometry on the CPU side, as a triangle list
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
	pub vertices: Vec<Vertex>,
	pub indices: Vec<u32>,
}

impl MeshData {
	pub fn triangle_count(&self) -> usize {
		self.indices.len() / 3
	}

	/// Axis-aligned bounds as `(min, max)`, `None` for an empty mesh
	pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
		let mut positions = self.vertices.iter().map(|vertex| Vec3::from(vertex.position));
		let first = positions.next()?;

		Some(positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
	}

	pub fn upload(&self, device: &Device, label: &str) -> GpuMesh {
		let vertex_buffer = device.create_buffer_init(&BufferInitDescriptor {
			label: Some(&format!("{label} Vertex Buffer")),
			contents: bytemuck::cast_slice(&self.vertices),
			usage: BufferUsages::VERTEX,
		});

		let index_buffer = device.create_buffer_init(&BufferInitDescriptor {
			label: Some(&format!("{label} Index Buffer")),
			contents: bytemuck::cast_slice(&self.indices),
			usage: BufferUsages::INDEX,
		});

		GpuMesh {
			vertex_buffer,
			index_buffer,
			index_count: self.indices.len() as u32,
		}
	}
}

#[derive(Debug)]
pub struct GpuMesh {
	pub vertex_buffer: Buffer,
	pub index_buffer: Buffer,
	pub index_count: u32,
}

/// Several entities can draw the same mesh
#[derive(ecs::Component, Deref, Clone, Debug)]
pub struct MeshHandle(pub Arc<GpuMesh>);

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vertex_layout_matches_struct() {
		let layout = Vertex::layout();
		assert_eq!(layout.array_stride, 32);
		assert_eq!(layout.attributes.len(), 3);
		assert_eq!(layout.attributes[1].offset, 12);
		assert_eq!(layout.attributes[2].offset, 24);
	}

	#[test]
	fn bounds_cover_all_vertices() {
		let mesh = MeshData {
			vertices: vec![
				Vertex::new(Vec3::new(1.0, -2.0, 0.0), Vec3::Y, [0.0, 0.0]),
				Vertex::new(Vec3::new(-1.0, 3.0, 0.5), Vec3::Y, [0.0, 0.0]),
				Vertex::new(Vec3::new(0.0, 0.0, -4.0), Vec3::Y, [0.0, 0.0]),
			],
			indices: vec![0, 1, 2],
		};

		assert_eq!(mesh.triangle_count(), 1);
		assert_eq!(
			mesh.bounds(),
			Some((Vec3::new(-1.0, -2.0, -4.0), Vec3::new(1.0, 3.0, 0.5)))
		);
		assert_eq!(MeshData::default().bounds(), None);
	}
}
