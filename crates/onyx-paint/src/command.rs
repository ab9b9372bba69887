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

//! The painter's recorded command stream.
//!
//! Commands are plain data in per-frame arenas rewound each frame: points,
//! indices, and text live in shared vectors and are referenced by range, so
//! a command is `Copy` and the whole stream drops in one truncate.

use crate::brush::BrushId;
use crate::geometry::AxisQuad;
use crate::polyline::{PolylineEnd, PolylineJoin};
use onyx_core::math::{Rect2, Vec2};

/// Index of a clip rect in the painter's per-frame clip arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipId(pub(crate) usize);

/// A range into the painter's point arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointRange {
    pub(crate) start: usize,
    pub(crate) len: usize,
}

/// A range into the painter's index arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub(crate) start: usize,
    pub(crate) len: usize,
}

/// A byte range into the painter's text arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub(crate) start: usize,
    pub(crate) len: usize,
}

/// The shape-specific payload of a paint command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaintShape {
    /// A filled quad.
    FillRect {
        /// The quad to fill.
        rect: AxisQuad,
    },
    /// A filled quad with rounded corners.
    FillRoundedRect {
        /// The quad to fill.
        rect: AxisQuad,
        /// Corner radius, already clamped to half the shorter side.
        border_radius: f32,
    },
    /// An analytically blurred rectangle (drop shadow).
    BlurredRect {
        /// The unblurred box.
        rect: Rect2,
        /// Gaussian sigma; the quad expands `3 * sigma` outward.
        sigma: f32,
        /// Corner radii: top-left, top-right, bottom-right, bottom-left.
        border_radii: [f32; 4],
    },
    /// A quad split into nine sub-quads by border insets, each brush-mapped.
    NineSliceRect {
        /// The quad to fill.
        rect: AxisQuad,
        /// Insets: top, bottom, left, right.
        border_area: [f32; 4],
    },
    /// A filled arc fan.
    FillArc {
        /// Fan center.
        position: Vec2,
        /// Arc radius; non-positive radii draw nothing.
        radius: f32,
        /// Start angle in radians.
        start_angle: f32,
        /// Sweep in radians, clamped to a full turn; non-positive sweeps
        /// draw nothing.
        arc_angle: f32,
    },
    /// A stroked path.
    Polyline {
        /// The path's points in the point arena.
        points: PointRange,
        /// Stroke thickness.
        thickness: f32,
        /// Corner treatment between segments.
        join_style: PolylineJoin,
        /// End-cap treatment.
        end_style: PolylineEnd,
        /// Whether inner-edge intersections may extend beyond segment ends.
        overlap_allowed: bool,
    },
    /// Caller-provided triangles pushed through the brush sampler.
    FillTriangles {
        /// The triangle vertices in the point arena.
        points: PointRange,
        /// The triangle indices in the index arena.
        indices: IndexRange,
    },
    /// A UTF-8 text run; the brush must be a font brush.
    Text {
        /// Baseline origin of the first line.
        position: Vec2,
        /// The text bytes in the text arena.
        text: TextRange,
        /// Measured size of the whole run, scaled.
        bounds_size: Vec2,
        /// Glyph quads the run produces (newlines excluded).
        num_glyphs: u32,
        /// Uniform glyph scale.
        scale: f32,
        /// Distance from the last baseline to the bottom of the bounds.
        descent: f32,
    },
}

/// One recorded paint command: brush, clip, and shape payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintCommand {
    /// The colouring recipe.
    pub brush: BrushId,
    /// The clip rect active when the command was recorded.
    pub clip: ClipId,
    /// The shape payload.
    pub shape: PaintShape,
}

impl PaintCommand {
    /// `true` when the command renders through the shadow pipeline.
    pub fn is_blurred(&self) -> bool {
        matches!(self.shape, PaintShape::BlurredRect { .. })
    }

    /// The command's screen-space bounding rectangle. Blur halos are part
    /// of the bounds; `points` is the painter's point arena.
    pub fn bounds(&self, points: &[Vec2]) -> Rect2 {
        match self.shape {
            PaintShape::FillRect { rect } | PaintShape::NineSliceRect { rect, .. } => rect.bounds(),
            PaintShape::FillRoundedRect { rect, .. } => rect.bounds(),
            PaintShape::BlurredRect { rect, sigma, .. } => rect.expanded(sigma * 3.0),
            PaintShape::FillArc { position, radius, .. } => {
                Rect2::from_center_radius(position, radius.max(0.0))
            }
            PaintShape::Polyline { points: range, thickness, .. } => {
                Rect2::bounding_points(&points[range.start..range.start + range.len])
                    .expanded(thickness * 0.5)
            }
            PaintShape::FillTriangles { points: range, .. } => {
                Rect2::bounding_points(&points[range.start..range.start + range.len])
            }
            PaintShape::Text { position, bounds_size, descent, .. } => Rect2::new(
                Vec2::new(position.x, position.y - bounds_size.y),
                Vec2::new(position.x + bounds_size.x, position.y + descent),
            ),
        }
    }
}
