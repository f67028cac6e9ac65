use glam::{Mat4, Quat, Vec3, Vec4};
use helicoid_sketch_derive::ShaderStruct;

use crate::ecs;

#[derive(ecs::Component, Copy, Clone, Debug, PartialEq)]
pub struct Transform {
	pub translation: Vec3,
	pub rotation: Quat,
	pub scale: Vec3,
}

impl Default for Transform {
	fn default() -> Self {
		Self {
			translation: Vec3::ZERO,
			rotation: Quat::IDENTITY,
			scale: Vec3::ONE,
		}
	}
}

impl Transform {
	pub fn from_translation(translation: Vec3) -> Self {
		Self {
			translation,
			..Default::default()
		}
	}

	pub fn matrix(&self) -> Mat4 {
		Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
	}
}

/// Which shadow passes an entity takes part in
#[derive(ecs::Component, Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShadowFlags {
	pub cast: bool,
	pub receive: bool,
}

#[repr(C)]
#[derive(ShaderStruct, bytemuck::Pod, bytemuck::Zeroable, ecs::Component, Copy, Clone, Debug, Default, PartialEq)]
pub struct ModelUniform {
	pub model: Mat4,
	/// Inverse transpose of `model`, for normals
	pub normal_matrix: Mat4,
	/// x is 1 when the entity receives shadows
	pub flags: Vec4,
}

impl ModelUniform {
	pub fn new(transform: &Transform, shadows: &ShadowFlags) -> Self {
		let model = transform.matrix();

		Self {
			model,
			normal_matrix: model.inverse().transpose(),
			flags: Vec4::new(if shadows.receive { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::f32::consts::FRAC_PI_2;

	use approx::assert_relative_eq;

	use super::*;

	#[test]
	fn normals_survive_non_uniform_scale() {
		let transform = Transform {
			scale: Vec3::new(2.0, 1.0, 1.0),
			..Default::default()
		};
		let uniform = ModelUniform::new(&transform, &ShadowFlags { cast: true, receive: false });

		// The normal of the x + y = 1 plane
		let normal = Vec3::new(1.0, 1.0, 0.0).normalize();
		let transformed = uniform.normal_matrix.transform_vector3(normal).normalize();

		// After scaling, the plane is x / 2 + y = 1
		let expected = Vec3::new(0.5, 1.0, 0.0).normalize();
		assert_relative_eq!(transformed.x, expected.x, epsilon = 1e-6);
		assert_relative_eq!(transformed.y, expected.y, epsilon = 1e-6);
		assert_eq!(uniform.flags.x, 0.0);
	}

	#[test]
	fn rotation_then_translation() {
		let transform = Transform {
			translation: Vec3::new(0.0, 0.0, 1.0),
			rotation: Quat::from_rotation_y(FRAC_PI_2),
			..Default::default()
		};

		let p = transform.matrix().transform_point3(Vec3::X);
		assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
		assert_relative_eq!(p.z, 0.0, epsilon = 1e-6);
	}
}
