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

//! Integer extents and origins plus the fixed-function viewport/scissor
//! rectangles.

/// A two-dimensional size in texels/pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent2D {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A three-dimensional size in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3D {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (or array layers).
    pub depth: u32,
}

impl Extent3D {
    /// Creates a new extent.
    #[inline]
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }
}

impl Default for Extent3D {
    fn default() -> Self {
        Self { width: 1, height: 1, depth: 1 }
    }
}

/// A three-dimensional offset into a texture.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin3D {
    /// Offset along x in texels.
    pub x: u32,
    /// Offset along y in texels.
    pub y: u32,
    /// Offset along z in texels.
    pub z: u32,
}

impl Origin3D {
    /// The zero origin.
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Creates a new origin.
    #[inline]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// A rasterizer viewport with a depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Minimum depth of the viewport range.
    pub min_depth: f32,
    /// Maximum depth of the viewport range.
    pub max_depth: f32,
}

impl Viewport {
    /// Creates a full-depth-range viewport covering `width` x `height` pixels
    /// from the top-left origin.
    #[inline]
    pub const fn from_extent(width: f32, height: f32) -> Self {
        Self { x: 0.0, y: 0.0, width, height, min_depth: 0.0, max_depth: 1.0 }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::from_extent(0.0, 0.0)
    }
}

/// An integer scissor rectangle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    /// Left edge in pixels.
    pub x: i32,
    /// Top edge in pixels.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ScissorRect {
    /// Creates a new scissor rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Creates a scissor covering a full `width` x `height` framebuffer.
    #[inline]
    pub const fn from_extent(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}
