//! Triangle meshes sampled from a parametric function over the unit square.

use anyhow::{ensure, Result};
use glam::Vec3;

use super::mesh::{MeshData, Vertex};

/// Step used for the finite-difference normals
const EPS: f32 = 0.00001;

/// Samples `func` on a `(slices + 1) x (stacks + 1)` grid, `u` running along slices and `v` along stacks.
///
/// Normals are estimated with finite differences, stepping backwards where possible and forwards at the
/// `0` edges so that samples never leave the unit square.
pub fn parametric<F>(func: F, slices: u32, stacks: u32) -> Result<MeshData>
where
	F: Fn(f32, f32) -> Vec3,
{
	ensure!(
		slices > 0 && stacks > 0,
		"parametric geometry needs at least one slice and one stack, got {slices}x{stacks}"
	);

	let columns = slices + 1;
	let mut vertices = Vec::with_capacity((columns * (stacks + 1)) as usize);

	for i in 0..=stacks {
		let v = i as f32 / stacks as f32;

		for j in 0..=slices {
			let u = j as f32 / slices as f32;

			let p = func(u, v);

			let pu = if u - EPS >= 0.0 {
				p - func(u - EPS, v)
			} else {
				func(u + EPS, v) - p
			};

			let pv = if v - EPS >= 0.0 {
				p - func(u, v - EPS)
			} else {
				func(u, v + EPS) - p
			};

			// Degenerate spots get a zero normal instead of NaN
			let normal = pu.cross(pv).normalize_or_zero();

			vertices.push(Vertex::new(p, normal, [u, v]));
		}
	}

	let mut indices = Vec::with_capacity((slices * stacks * 6) as usize);

	for i in 0..stacks {
		for j in 0..slices {
			let a = i * columns + j;
			let b = i * columns + j + 1;
			let c = (i + 1) * columns + j + 1;
			let d = (i + 1) * columns + j;

			indices.extend_from_slice(&[a, b, d, b, c, d]);
		}
	}

	Ok(MeshData { vertices, indices })
}

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;

	use super::*;

	fn plane(u: f32, v: f32) -> Vec3 {
		Vec3::new(u, v, 0.0)
	}

	#[test]
	fn grid_counts() {
		let mesh = parametric(plane, 4, 3).unwrap();
		assert_eq!(mesh.vertices.len(), 5 * 4);
		assert_eq!(mesh.triangle_count(), 4 * 3 * 2);
		assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
	}

	#[test]
	fn first_cell_winding() {
		let mesh = parametric(plane, 2, 2).unwrap();
		assert_eq!(&mesh.indices[..6], &[0, 1, 3, 1, 4, 3]);
	}

	#[test]
	fn rows_follow_v_and_columns_follow_u() {
		let mesh = parametric(plane, 2, 4).unwrap();
		assert_eq!(mesh.vertices[1].uv, [0.5, 0.0]);
		assert_eq!(mesh.vertices[3].uv, [0.0, 0.25]);
		assert_eq!(mesh.vertices.last().unwrap().position, [1.0, 1.0, 0.0]);
	}

	#[test]
	fn plane_normals_point_along_z() {
		let mesh = parametric(plane, 3, 3).unwrap();

		for vertex in &mesh.vertices {
			assert_relative_eq!(vertex.normal[0], 0.0, epsilon = 1e-4);
			assert_relative_eq!(vertex.normal[1], 0.0, epsilon = 1e-4);
			assert_relative_eq!(vertex.normal[2], 1.0, epsilon = 1e-4);
		}
	}

	#[test]
	fn degenerate_function_has_zero_normals() {
		let mesh = parametric(|_, _| Vec3::ONE, 2, 2).unwrap();
		assert!(mesh.vertices.iter().all(|v| v.normal == [0.0; 3]));
	}

	#[test]
	fn rejects_empty_grid() {
		assert!(parametric(plane, 0, 4).is_err());
		assert!(parametric(plane, 4, 0).is_err());
	}
}
