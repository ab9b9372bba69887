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

//! # Onyx Paint
//!
//! High-level 2D drawing for the Onyx rendering core: the [`Painter2D`]
//! vector painter (filled and rounded rectangles, arcs, analytic drop
//! shadows, polylines, brush-sampled triangles, text over a dynamic glyph
//! atlas), the [`DebugLineRenderer`] for time-bounded 3D line drawing, and
//! the WGSL programs both draw with.

#![warn(missing_docs)]

pub mod brush;
pub mod command;
pub mod debug_draw;
pub mod geometry;
pub mod painter;
pub mod polyline;
pub mod shaders;
pub mod text;

pub use brush::{Brush, BrushId, GradientStop};
pub use command::{PaintCommand, PaintShape};
pub use debug_draw::{DebugLineRenderer, DebugVertex};
pub use geometry::{AxisQuad, ShadowVertex, Vertex2D};
pub use painter::Painter2D;
pub use polyline::{PolylineEnd, PolylineJoin};
pub use text::{
    FontError, FontId, FontdueRasterizer, GlyphCache, GlyphInfo, GlyphRasterizer, LineMetrics,
    PainterFont, RasterizedGlyph,
};
