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

//! Brushes: the colouring recipes primitives are rasterised with.
//!
//! Every primitive writer samples its brush per vertex through
//! [`Brush::sample`], which remaps the primitive's canonical UV and returns
//! the vertex color. Gradient and texture brushes carry a UV-remap quad so
//! one gradient can be projected across arbitrary geometry.

use crate::geometry::AxisQuad;
use crate::text::FontId;
use onyx_core::gpu::TextureViewId;
use onyx_core::math::{inverse_lerp, Rgba, Vec2, EPSILON};

/// Index of a brush in the painter's per-frame brush arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrushId(pub(crate) usize);

/// One color stop of an n-ary gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient in `[0, 1]`.
    pub percent: f32,
    /// Color at this stop.
    pub color: Rgba,
}

/// A colouring recipe. See the module docs.
#[derive(Debug, Clone, PartialEq)]
pub enum Brush {
    /// A single flat color.
    Colored {
        /// The fill color.
        color: Rgba,
    },
    /// A two-color gradient along the remap quad's x axis.
    LinearGradient {
        /// Colors at the start and end of the gradient.
        colors: [Rgba; 2],
        /// Projects primitive UVs into gradient space.
        uv_remap: AxisQuad,
    },
    /// A gradient over two or more sorted stops.
    NaryLinearGradient {
        /// The stops, sorted ascending by `percent`.
        stops: Vec<GradientStop>,
        /// Projects primitive UVs into gradient space.
        uv_remap: AxisQuad,
    },
    /// A texture modulated by a tint.
    Textured {
        /// The sampled texture view.
        view: TextureViewId,
        /// Multiplied with the texel color.
        tint: Rgba,
        /// Projects primitive UVs into texture space.
        uv_remap: AxisQuad,
    },
    /// Glyph-atlas sampling for text; UVs come from the glyphs themselves.
    Font {
        /// The painter font drawn with.
        font: FontId,
        /// Text color.
        tint: Rgba,
    },
}

/// Projects `uv` into `remap` space: the remap quad's origin maps to zero
/// and each axis end to one, via projection onto the axes.
fn remap_uv(remap: &AxisQuad, uv: Vec2) -> Vec2 {
    Vec2::new(
        inverse_lerp_on_axis(remap.position, remap.x_axis, uv),
        inverse_lerp_on_axis(remap.position, remap.y_axis, uv),
    )
}

fn inverse_lerp_on_axis(origin: Vec2, axis: Vec2, point: Vec2) -> f32 {
    let len_sq = axis.length_squared();
    if len_sq < EPSILON * EPSILON {
        return 0.0;
    }
    (point - origin).dot(axis) / len_sq
}

impl Brush {
    /// A flat-color brush.
    pub fn colored(color: Rgba) -> Self {
        Self::Colored { color }
    }

    /// A two-stop gradient with the identity remap.
    pub fn linear_gradient(a: Rgba, b: Rgba) -> Self {
        Self::LinearGradient { colors: [a, b], uv_remap: AxisQuad::default() }
    }

    /// Samples the brush at a canonical UV.
    ///
    /// Returns the (possibly remapped) UV for the vertex stream and the
    /// vertex color. `vertex_index` is accepted for per-vertex patterned
    /// brushes; the built-in brushes ignore it.
    pub fn sample(&self, uv: Vec2, vertex_index: u32) -> (Vec2, Rgba) {
        let _ = vertex_index;
        match self {
            Brush::Colored { color } => (uv, *color),
            Brush::LinearGradient { colors, uv_remap } => {
                let remapped = remap_uv(uv_remap, uv);
                let color = Rgba::lerp(colors[0], colors[1], remapped.x.clamp(0.0, 1.0));
                (remapped, color)
            }
            Brush::NaryLinearGradient { stops, uv_remap } => {
                let remapped = remap_uv(uv_remap, uv);
                (remapped, sample_stops(stops, remapped.x))
            }
            Brush::Textured { tint, uv_remap, .. } => (remap_uv(uv_remap, uv), *tint),
            Brush::Font { tint, .. } => (uv, *tint),
        }
    }

    /// `true` for brushes whose output lives entirely in the vertex color,
    /// with no texture bound; all such brushes share one batch.
    pub fn is_vertex_color_based(&self) -> bool {
        matches!(
            self,
            Brush::Colored { .. } | Brush::LinearGradient { .. } | Brush::NaryLinearGradient { .. }
        )
    }

    /// Batch compatibility: vertex-color brushes all batch together;
    /// textured and font brushes batch with their own kind on the same
    /// resource. Transitive by construction.
    pub fn can_batch_with(&self, rhs: &Brush) -> bool {
        if self.is_vertex_color_based() && rhs.is_vertex_color_based() {
            return true;
        }
        match (self, rhs) {
            (Brush::Textured { view: a, .. }, Brush::Textured { view: b, .. }) => a == b,
            (Brush::Font { font: a, .. }, Brush::Font { font: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// Samples sorted gradient stops at `t`.
///
/// Before the first stop the first color wins, past the last stop the last
/// color; in between the two adjacent stops interpolate by where `t` sits
/// between their percents.
fn sample_stops(stops: &[GradientStop], t: f32) -> Rgba {
    debug_assert!(stops.len() >= 2, "an n-ary gradient needs at least two stops");
    let upper = stops.partition_point(|stop| stop.percent < t);
    if upper == 0 {
        return stops[0].color;
    }
    if upper == stops.len() {
        return stops[stops.len() - 1].color;
    }
    let a = &stops[upper - 1];
    let b = &stops[upper];
    let local = inverse_lerp(a.percent, b.percent, t).clamp(0.0, 1.0);
    Rgba::lerp(a.color, b.color, local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use onyx_core::math::Rect2;

    #[test]
    fn colored_brush_is_constant() {
        let brush = Brush::colored(Rgba::GREEN);
        let (uv, color) = brush.sample(Vec2::new(0.3, 0.7), 0);
        assert_eq!(uv, Vec2::new(0.3, 0.7));
        assert_eq!(color, Rgba::GREEN);
    }

    #[test]
    fn linear_gradient_endpoints_and_midpoint() {
        let brush = Brush::linear_gradient(Rgba::WHITE, Rgba::BLACK);
        let (_, start) = brush.sample(Vec2::new(0.0, 0.5), 0);
        let (_, end) = brush.sample(Vec2::new(1.0, 0.5), 1);
        let (_, mid) = brush.sample(Vec2::new(0.5, 0.5), 2);
        assert_eq!(start, Rgba::WHITE);
        assert_eq!(end, Rgba::BLACK);
        assert_relative_eq!(mid.r, 0.5);
        assert_relative_eq!(mid.g, 0.5);
        assert_relative_eq!(mid.b, 0.5);
    }

    #[test]
    fn gradient_remap_rotates_the_axis() {
        // Remap x axis pointing down the v axis: a "vertical" gradient.
        let brush = Brush::LinearGradient {
            colors: [Rgba::WHITE, Rgba::BLACK],
            uv_remap: AxisQuad::new(Vec2::ZERO, Vec2::Y, Vec2::X),
        };
        let (_, top) = brush.sample(Vec2::new(0.5, 0.0), 0);
        let (_, bottom) = brush.sample(Vec2::new(0.5, 1.0), 1);
        assert_eq!(top, Rgba::WHITE);
        assert_eq!(bottom, Rgba::BLACK);
    }

    #[test]
    fn gradient_sampling_is_monotonic_along_x() {
        let brush = Brush::linear_gradient(Rgba::BLACK, Rgba::WHITE);
        let mut last = -1.0f32;
        for i in 0..=20 {
            let t = i as f32 / 20.0 * 1.4 - 0.2; // Sample outside [0, 1] too.
            let (_, color) = brush.sample(Vec2::new(t, 0.0), 0);
            assert!(color.r >= last, "gradient regressed at t = {t}");
            last = color.r;
        }
    }

    #[test]
    fn nary_gradient_clamps_and_interpolates() {
        let stops = vec![
            GradientStop { percent: 0.25, color: Rgba::RED },
            GradientStop { percent: 0.5, color: Rgba::GREEN },
            GradientStop { percent: 0.75, color: Rgba::BLUE },
        ];
        let brush = Brush::NaryLinearGradient { stops, uv_remap: AxisQuad::default() };

        let (_, before) = brush.sample(Vec2::new(0.0, 0.0), 0);
        let (_, after) = brush.sample(Vec2::new(1.0, 0.0), 0);
        assert_eq!(before, Rgba::RED);
        assert_eq!(after, Rgba::BLUE);

        // Halfway between the first two stops.
        let (_, mid) = brush.sample(Vec2::new(0.375, 0.0), 0);
        assert_relative_eq!(mid.r, 0.5);
        assert_relative_eq!(mid.g, 0.5);
        assert_relative_eq!(mid.b, 0.0);
    }

    #[test]
    fn nary_gradient_is_monotonic() {
        let stops = vec![
            GradientStop { percent: 0.0, color: Rgba::BLACK },
            GradientStop { percent: 0.4, color: Rgba::new(0.3, 0.3, 0.3, 1.0) },
            GradientStop { percent: 1.0, color: Rgba::WHITE },
        ];
        let brush = Brush::NaryLinearGradient { stops, uv_remap: AxisQuad::default() };
        let mut last = -1.0f32;
        for i in 0..=32 {
            let t = i as f32 / 32.0;
            let (_, color) = brush.sample(Vec2::new(t, 0.0), 0);
            assert!(color.r >= last - 1e-6, "stops regressed at t = {t}");
            last = color.r;
        }
    }

    #[test]
    fn textured_brush_remaps_uv() {
        let quad = AxisQuad::from_rect(Rect2::from_pos_size(
            Vec2::new(0.25, 0.25),
            Vec2::new(0.5, 0.5),
        ));
        let brush = Brush::Textured { view: TextureViewId(1), tint: Rgba::WHITE, uv_remap: quad };
        let (uv, _) = brush.sample(Vec2::new(0.5, 0.5), 0);
        assert_relative_eq!(uv.x, 0.5);
        assert_relative_eq!(uv.y, 0.5);
        let (uv, _) = brush.sample(Vec2::new(0.25, 0.75), 0);
        assert_relative_eq!(uv.x, 0.0);
        assert_relative_eq!(uv.y, 1.0);
    }

    #[test]
    fn batching_rules() {
        let colored = Brush::colored(Rgba::RED);
        let gradient = Brush::linear_gradient(Rgba::RED, Rgba::BLUE);
        let tex_a = Brush::Textured {
            view: TextureViewId(1),
            tint: Rgba::WHITE,
            uv_remap: AxisQuad::default(),
        };
        let tex_b = Brush::Textured {
            view: TextureViewId(2),
            tint: Rgba::WHITE,
            uv_remap: AxisQuad::default(),
        };
        let font = Brush::Font { font: FontId(0), tint: Rgba::BLACK };

        assert!(colored.can_batch_with(&gradient));
        assert!(tex_a.can_batch_with(&tex_a.clone()));
        assert!(!tex_a.can_batch_with(&tex_b));
        assert!(!colored.can_batch_with(&tex_a));
        assert!(!font.can_batch_with(&tex_a));
        assert!(font.can_batch_with(&font.clone()));
    }
}
