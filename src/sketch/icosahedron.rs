use std::f32::consts::PI;

use glam::Vec3;

use super::mesh::{MeshData, Vertex};

/// Golden ratio
const T: f32 = 1.618_034;

#[rustfmt::skip]
const BASE_VERTICES: [[f32; 3]; 12] = [
	[-1.0,  T, 0.0], [ 1.0,  T, 0.0], [-1.0, -T, 0.0], [ 1.0, -T, 0.0],
	[0.0, -1.0,  T], [0.0,  1.0,  T], [0.0, -1.0, -T], [0.0,  1.0, -T],
	[ T, 0.0, -1.0], [ T, 0.0,  1.0], [-T, 0.0, -1.0], [-T, 0.0,  1.0],
];

#[rustfmt::skip]
const BASE_FACES: [[usize; 3]; 20] = [
	[0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
	[1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
	[3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
	[4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
];

/// A sphere made from a subdivided icosahedron, each face split into `(detail + 1)²` triangles.
///
/// Vertices aren't shared between triangles, so there are `60 * (detail + 1)²` of them.
pub fn icosphere(radius: f32, detail: u32) -> MeshData {
	let columns = detail as usize + 1;
	let mut positions = Vec::with_capacity(60 * columns * columns);

	for [a, b, c] in BASE_FACES {
		subdivide_face(
			Vec3::from(BASE_VERTICES[a]),
			Vec3::from(BASE_VERTICES[b]),
			Vec3::from(BASE_VERTICES[c]),
			columns,
			&mut positions,
		);
	}

	let mut vertices = Vec::with_capacity(positions.len());
	for triangle in positions.chunks_exact(3) {
		let normals = [triangle[0].normalize(), triangle[1].normalize(), triangle[2].normalize()];

		vertices.extend(
			normals
				.into_iter()
				.zip(triangle_uvs(normals))
				.map(|(normal, uv)| Vertex::new(normal * radius, normal, uv)),
		);
	}

	let indices = (0..vertices.len() as u32).collect();

	MeshData { vertices, indices }
}

fn subdivide_face(a: Vec3, b: Vec3, c: Vec3, columns: usize, out: &mut Vec<Vec3>) {
	// Rows of points going from the ab edge towards c, each one point shorter than the previous
	let grid = (0..=columns)
		.map(|i| {
			let t = i as f32 / columns as f32;
			let aj = a.lerp(c, t);
			let bj = b.lerp(c, t);
			let rows = columns - i;

			if rows == 0 {
				vec![aj]
			} else {
				(0..=rows).map(|j| aj.lerp(bj, j as f32 / rows as f32)).collect()
			}
		})
		.collect::<Vec<_>>();

	for i in 0..columns {
		for j in 0..2 * (columns - i) - 1 {
			let k = j / 2;

			if j % 2 == 0 {
				out.extend_from_slice(&[grid[i][k + 1], grid[i + 1][k], grid[i][k]]);
			} else {
				out.extend_from_slice(&[grid[i][k + 1], grid[i + 1][k + 1], grid[i + 1][k]]);
			}
		}
	}
}

fn azimuth(direction: Vec3) -> f32 {
	direction.z.atan2(-direction.x)
}

/// Equirectangular mapping, v grows towards +Y
fn spherical_uv(direction: Vec3) -> [f32; 2] {
	let inclination = (-direction.y).atan2((direction.x * direction.x + direction.z * direction.z).sqrt());

	[azimuth(direction) / 2.0 / PI + 0.5, 0.5 - inclination / PI]
}

/// Spherical UVs of one triangle, fixed up where the mapping is discontinuous.
///
/// Triangles crossing the seam at the back get their low u pushed past 1 so they don't span the whole texture, and
/// pole vertices take the azimuth of their triangle.
fn triangle_uvs(normals: [Vec3; 3]) -> [[f32; 2]; 3] {
	let centroid_azimuth = azimuth((normals[0] + normals[1] + normals[2]) / 3.0);

	let mut uvs = normals.map(|normal| {
		let mut uv = spherical_uv(normal);

		if centroid_azimuth < 0.0 && uv[0] == 1.0 {
			uv[0] -= 1.0;
		}
		if normal.x == 0.0 && normal.z == 0.0 {
			uv[0] = centroid_azimuth / 2.0 / PI + 0.5;
		}

		uv
	});

	let max_u = uvs.iter().map(|uv| uv[0]).fold(f32::MIN, f32::max);
	let min_u = uvs.iter().map(|uv| uv[0]).fold(f32::MAX, f32::min);

	if max_u > 0.9 && min_u < 0.1 {
		for uv in uvs.iter_mut().filter(|uv| uv[0] < 0.2) {
			uv[0] += 1.0;
		}
	}

	uvs
}

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;

	use super::*;

	#[test]
	fn vertex_count_follows_detail() {
		assert_eq!(icosphere(1.0, 0).vertices.len(), 60);
		assert_eq!(icosphere(1.0, 1).vertices.len(), 240);
		assert_eq!(icosphere(0.26, 5).vertices.len(), 2160);
		assert_eq!(icosphere(0.26, 5).triangle_count(), 720);
	}

	#[test]
	fn vertices_lie_on_sphere() {
		let mesh = icosphere(0.26, 5);

		for vertex in &mesh.vertices {
			assert_relative_eq!(Vec3::from(vertex.position).length(), 0.26, epsilon = 1e-5);
			assert_relative_eq!(Vec3::from(vertex.normal).length(), 1.0, epsilon = 1e-5);
		}
	}

	#[test]
	fn triangles_face_outwards() {
		let mesh = icosphere(1.0, 2);

		for triangle in mesh.indices.chunks(3) {
			let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(mesh.vertices[triangle[i] as usize].position));
			let face_normal = (b - a).cross(c - a);
			assert!(face_normal.dot(a + b + c) > 0.0);
		}
	}

	#[test]
	fn uvs_stay_in_range() {
		let mesh = icosphere(1.0, 3);

		// u may run past 1 on triangles wrapped around the seam
		assert!(mesh
			.vertices
			.iter()
			.all(|v| (0.0..1.2).contains(&v.uv[0]) && (0.0..=1.0).contains(&v.uv[1])));
	}

	#[test]
	fn v_runs_from_south_to_north_pole() {
		assert_relative_eq!(spherical_uv(Vec3::Y)[1], 1.0);
		assert_relative_eq!(spherical_uv(Vec3::NEG_Y)[1], 0.0);
		assert_relative_eq!(spherical_uv(Vec3::X)[1], 0.5);
	}

	#[test]
	fn seam_triangles_do_not_span_the_texture() {
		let mesh = icosphere(1.0, 4);

		// Azimuth is meaningless close to the poles
		let away_from_poles = mesh
			.vertices
			.chunks(3)
			.filter(|triangle| triangle.iter().all(|v| v.normal[1].abs() < 0.8));

		for triangle in away_from_poles {
			let us = triangle.iter().map(|v| v.uv[0]);
			let span = us.clone().fold(f32::MIN, f32::max) - us.fold(f32::MAX, f32::min);
			assert!(span < 0.5, "triangle spans {span} of the texture");
		}
	}
}
