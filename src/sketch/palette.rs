//! Cosine color palette, `a + b * cos(2k * (c * t + d))`.
//!
//! The same formula runs on the GPU in `palette.wgsl`, where `t` is the sum of the view-space normal's
//! components.

use glam::{Vec3, Vec4};

use crate::config::PaletteSettings;

/// Phase constant of the palette. Slightly off from pi, which shifts the bands a little.
pub const PALETTE_PHASE: f32 = 3.151592;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Palette {
	pub a: Vec3,
	pub b: Vec3,
	pub c: Vec3,
	pub d: Vec3,
	pub playhead_weight: f32,
}

impl Default for Palette {
	fn default() -> Self {
		Self::from(&PaletteSettings::default())
	}
}

impl From<&PaletteSettings> for Palette {
	fn from(settings: &PaletteSettings) -> Self {
		Self {
			a: Vec3::from(settings.a),
			b: Vec3::from(settings.b),
			c: Vec3::from(settings.c),
			d: Vec3::from(settings.d),
			playhead_weight: settings.playhead_weight,
		}
	}
}

impl Palette {
	pub fn color(&self, t: f32, playhead: f32) -> Vec3 {
		let phase = (self.c * t + self.d + Vec3::splat(playhead * self.playhead_weight)) * (2.0 * PALETTE_PHASE);
		self.a + self.b * Vec3::new(phase.x.cos(), phase.y.cos(), phase.z.cos())
	}

	/// The diffuse color a fragment with the given view-space normal gets
	pub fn shade_normal(&self, view_normal: Vec3, playhead: f32) -> Vec3 {
		self.color(view_normal.dot(Vec3::ONE), playhead)
	}

	/// The four coefficient vectors as uniform data, the playhead weight travels in `d.w`
	pub fn coefficients(&self) -> [Vec4; 4] {
		[
			self.a.extend(0.0),
			self.b.extend(0.0),
			self.c.extend(0.0),
			self.d.extend(self.playhead_weight),
		]
	}
}

#[cfg(test)]
mod tests {
	use approx::assert_relative_eq;

	use super::*;

	#[test]
	fn default_palette_at_zero() {
		let color = Palette::default().color(0.0, 0.0);

		assert_relative_eq!(color.x, 1.0, epsilon = 1e-6);
		assert_relative_eq!(color.y, 0.5 + 0.5 * (0.2 * PALETTE_PHASE).cos(), epsilon = 1e-6);
		assert_relative_eq!(color.z, 0.5 + 0.5 * (0.4 * PALETTE_PHASE).cos(), epsilon = 1e-6);
	}

	#[test]
	fn stays_within_a_plus_minus_b() {
		let palette = Palette::default();

		for i in 0..100 {
			let color = palette.color(i as f32 * 0.173 - 5.0, 0.0);
			assert!(color.min_element() >= -1e-6);
			assert!(color.max_element() <= 1.0 + 1e-6);
		}
	}

	#[test]
	fn playhead_has_no_effect_without_weight() {
		let palette = Palette::default();
		assert_eq!(palette.color(0.3, 0.0), palette.color(0.3, 0.75));

		let weighted = Palette {
			playhead_weight: 1.0,
			..Default::default()
		};
		assert_ne!(weighted.color(0.3, 0.0), weighted.color(0.3, 0.25));
	}

	#[test]
	fn normal_facing_camera() {
		// Normal pointing at the camera sums to 1
		let palette = Palette::default();
		assert_eq!(palette.shade_normal(Vec3::Z, 0.0), palette.color(1.0, 0.0));
	}

	#[test]
	fn coefficients_carry_weight() {
		let palette = Palette {
			playhead_weight: 0.5,
			..Default::default()
		};
		let [a, _, c, d] = palette.coefficients();

		assert_eq!(a, Vec4::new(0.5, 0.5, 0.5, 0.0));
		assert_eq!(c, Vec4::new(1.0, 1.0, 1.0, 0.0));
		assert_eq!(d.w, 0.5);
	}
}
