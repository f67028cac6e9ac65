use std::f32::consts::TAU;

use anyhow::Result;
use glam::Vec3;

use super::{mesh::MeshData, parametric::parametric};
use crate::config::SurfaceSettings;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HelicoidParams {
	/// Angular frequency of the twist around the Y axis
	pub twist: f32,
	pub height_scale: f32,
}

impl Default for HelicoidParams {
	fn default() -> Self {
		Self {
			twist: 5.0,
			height_scale: 1.5,
		}
	}
}

impl From<&SurfaceSettings> for HelicoidParams {
	fn from(settings: &SurfaceSettings) -> Self {
		Self {
			twist: settings.twist,
			height_scale: settings.height_scale,
		}
	}
}

/// Point on the twisted helicoid for `u, v` in `[0, 1]`.
///
/// The denominator is at least 2, so the surface is bounded by the unit cylinder and by `height_scale` on Y.
pub fn helicoid(u: f32, v: f32, params: HelicoidParams) -> Vec3 {
	let alpha = TAU * (u - 0.5);
	let theta = TAU * (v - 0.5);

	let bottom = 1.0 + alpha.cosh() * theta.cosh();

	Vec3::new(
		alpha.sinh() * (params.twist * theta).cos() / bottom,
		params.height_scale * alpha.cosh() * theta.sinh() / bottom,
		alpha.sinh() * (params.twist * theta).sin() / bottom,
	)
}

pub fn helicoid_mesh(settings: &SurfaceSettings) -> Result<MeshData> {
	let params = HelicoidParams::from(settings);
	parametric(|u, v| helicoid(u, v, params), settings.slices, settings.stacks)
}

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;

	use super::*;

	#[test]
	fn center_is_origin() {
		let p = helicoid(0.5, 0.5, HelicoidParams::default());
		assert_relative_eq!(p.length(), 0.0);
	}

	#[test]
	fn known_sample() {
		// alpha = pi, theta = 0
		let p = helicoid(1.0, 0.5, HelicoidParams::default());
		let pi = std::f32::consts::PI;

		assert_relative_eq!(p.x, pi.sinh() / (1.0 + pi.cosh()), epsilon = 1e-6);
		assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);
		assert_relative_eq!(p.z, 0.0, epsilon = 1e-6);
	}

	#[test]
	fn mirrored_in_u() {
		let params = HelicoidParams::default();
		let a = helicoid(0.2, 0.7, params);
		let b = helicoid(0.8, 0.7, params);

		assert_relative_eq!(a.x, -b.x, epsilon = 1e-6);
		assert_relative_eq!(a.y, b.y, epsilon = 1e-6);
		assert_relative_eq!(a.z, -b.z, epsilon = 1e-6);
	}

	#[test]
	fn mesh_stays_in_bounds() {
		let settings = SurfaceSettings::default();
		let mesh = helicoid_mesh(&settings).unwrap();

		assert_eq!(mesh.vertices.len(), 101 * 101);
		assert_eq!(mesh.triangle_count(), 100 * 100 * 2);

		let (min, max) = mesh.bounds().unwrap();
		assert!(max.x <= 1.0 && min.x >= -1.0);
		assert!(max.z <= 1.0 && min.z >= -1.0);
		assert!(max.y <= settings.height_scale && min.y >= -settings.height_scale);
		assert!(max.y > 1.0);
	}

	#[test]
	fn normals_are_unit_or_zero() {
		let mesh = helicoid_mesh(&SurfaceSettings {
			slices: 20,
			stacks: 20,
			..Default::default()
		})
		.unwrap();

		for vertex in &mesh.vertices {
			let length = Vec3::from(vertex.normal).length();
			assert!(length == 0.0 || (length - 1.0).abs() < 1e-4);
		}
	}
}
