// Copyright 2025 the Onyx Engine authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Math types used throughout the renderer.

mod color;
mod dimension;
mod rect;
mod vector;

pub use color::{PackedRgba, Rgba};
pub use dimension::{Extent2D, Extent3D, Origin3D, ScissorRect, Viewport};
pub use rect::Rect2;
pub use vector::{Vec2, Vec3};

/// Tolerance used for near-zero comparisons.
pub const EPSILON: f32 = 1e-6;

/// Half pi.
pub const HALF_PI: f32 = std::f32::consts::FRAC_PI_2;
/// Pi.
pub const PI: f32 = std::f32::consts::PI;
/// Two pi, a full turn.
pub const TAU: f32 = std::f32::consts::TAU;

/// Converts degrees to radians.
#[inline]
pub const fn deg_to_rad(degrees: f32) -> f32 {
    degrees * (PI / 180.0)
}

/// Linearly interpolates between `a` and `b` by unclamped factor `t`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Returns where `value` sits between `a` and `b` as a factor, the inverse of
/// [`lerp`]. Degenerate ranges (`a == b`) map to `0.0`.
#[inline]
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    let range = b - a;
    if range.abs() < EPSILON {
        0.0
    } else {
        (value - a) / range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lerp_endpoints() {
        assert_relative_eq!(lerp(2.0, 6.0, 0.0), 2.0);
        assert_relative_eq!(lerp(2.0, 6.0, 1.0), 6.0);
        assert_relative_eq!(lerp(2.0, 6.0, 0.5), 4.0);
    }

    #[test]
    fn inverse_lerp_round_trips() {
        let t = inverse_lerp(10.0, 20.0, 15.0);
        assert_relative_eq!(t, 0.5);
        assert_relative_eq!(lerp(10.0, 20.0, t), 15.0);
    }

    #[test]
    fn inverse_lerp_degenerate_range() {
        assert_relative_eq!(inverse_lerp(3.0, 3.0, 7.0), 0.0);
    }
}
