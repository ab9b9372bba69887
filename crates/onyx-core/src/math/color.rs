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

//! Color types: linear `f32` RGBA for CPU-side math, packed `u8` RGBA for
//! vertex streams.

/// An RGBA color in linear space with `f32` components.
///
/// `#[repr(C)]` keeps the memory layout stable for uniform uploads.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Rgba {
    /// The red component in linear space.
    pub r: f32,
    /// The green component in linear space.
    pub g: f32,
    /// The blue component in linear space.
    pub b: f32,
    /// The alpha (opacity) component.
    pub a: f32,
}

impl Rgba {
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Opaque red.
    pub const RED: Self = Self::rgb(1.0, 0.0, 0.0);
    /// Opaque green.
    pub const GREEN: Self = Self::rgb(0.0, 1.0, 0.0);
    /// Opaque blue.
    pub const BLUE: Self = Self::rgb(0.0, 0.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a color from all four components.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color from RGB components.
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Linearly interpolates between two colors with unclamped `t`.
    #[inline]
    pub fn lerp(a: Self, b: Self, t: f32) -> Self {
        Self {
            r: a.r + (b.r - a.r) * t,
            g: a.g + (b.g - a.g) * t,
            b: a.b + (b.b - a.b) * t,
            a: a.a + (b.a - a.a) * t,
        }
    }

    /// Packs the color to 8-bit components, clamping to `[0, 1]` first.
    #[inline]
    pub fn packed(self) -> PackedRgba {
        #[inline]
        fn quantize(v: f32) -> u8 {
            (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        }
        PackedRgba {
            r: quantize(self.r),
            g: quantize(self.g),
            b: quantize(self.b),
            a: quantize(self.a),
        }
    }
}

/// An RGBA color packed as four `u8` components, the form vertex streams use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct PackedRgba {
    /// The red component.
    pub r: u8,
    /// The green component.
    pub g: u8,
    /// The blue component.
    pub b: u8,
    /// The alpha component.
    pub a: u8,
}

impl PackedRgba {
    /// Opaque white.
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF, 0xFF);

    /// Creates a packed color from four 8-bit components.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Unpacks the color back to linear `f32` components.
    #[inline]
    pub fn unpacked(self) -> Rgba {
        const INV: f32 = 1.0 / 255.0;
        Rgba {
            r: f32::from(self.r) * INV,
            g: f32::from(self.g) * INV,
            b: f32::from(self.b) * INV,
            a: f32::from(self.a) * INV,
        }
    }
}

impl From<Rgba> for PackedRgba {
    #[inline]
    fn from(value: Rgba) -> Self {
        value.packed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pack_clamps_and_rounds() {
        assert_eq!(Rgba::new(1.5, -0.2, 0.5, 1.0).packed(), PackedRgba::new(255, 0, 128, 255));
    }

    #[test]
    fn pack_unpack_round_trip() {
        let packed = Rgba::new(0.25, 0.5, 0.75, 1.0).packed();
        let unpacked = packed.unpacked();
        assert_relative_eq!(unpacked.r, 0.25, epsilon = 1.0 / 255.0);
        assert_relative_eq!(unpacked.g, 0.5, epsilon = 1.0 / 255.0);
        assert_relative_eq!(unpacked.b, 0.75, epsilon = 1.0 / 255.0);
    }

    #[test]
    fn lerp_midpoint_is_half_grey() {
        let mid = Rgba::lerp(Rgba::WHITE, Rgba::BLACK, 0.5);
        assert_relative_eq!(mid.r, 0.5);
        assert_relative_eq!(mid.g, 0.5);
        assert_relative_eq!(mid.b, 0.5);
        assert_relative_eq!(mid.a, 1.0);
    }
}
