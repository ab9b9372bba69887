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

//! Geometric building blocks of the 2D painter: the rotated-quad primitive,
//! the vertex formats written into GPU buffers, and the uniform vertex
//! writer every fill primitive rasterises through.

use crate::brush::Brush;
use onyx_core::math::{PackedRgba, Rect2, Vec2, EPSILON, HALF_PI};

/// Segment count for a full arc of the given radius.
///
/// `round(3.5 * sqrt(radius))`; bigger circles get proportionally more
/// segments so curvature error stays roughly constant. Radii at or below
/// zero produce no segments at all.
pub fn arc_segment_count(radius: f32) -> u32 {
    if radius <= 0.0 {
        return 0;
    }
    ((ARC_SMOOTHING * radius.sqrt()).round() as u32).max(1)
}

const ARC_SMOOTHING: f32 = 3.5;

/// A quad spanned by two arbitrary axes; not necessarily orthogonal.
///
/// `position` is the first corner; the other three follow from the axes.
/// UV space maps `position` to `(0, 0)` and `position + x_axis + y_axis`
/// to `(1, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisQuad {
    /// The first corner.
    pub position: Vec2,
    /// Edge vector of the "horizontal" sides.
    pub x_axis: Vec2,
    /// Edge vector of the "vertical" sides.
    pub y_axis: Vec2,
}

impl Default for AxisQuad {
    fn default() -> Self {
        Self { position: Vec2::ZERO, x_axis: Vec2::X, y_axis: Vec2::Y }
    }
}

impl AxisQuad {
    /// A quad from a position and two explicit axes.
    pub const fn new(position: Vec2, x_axis: Vec2, y_axis: Vec2) -> Self {
        Self { position, x_axis, y_axis }
    }

    /// The axis-aligned quad covering `rect`.
    pub fn from_rect(rect: Rect2) -> Self {
        Self {
            position: rect.min,
            x_axis: Vec2::new(rect.width(), 0.0),
            y_axis: Vec2::new(0.0, rect.height()),
        }
    }

    /// First corner.
    pub fn v0(&self) -> Vec2 {
        self.position
    }

    /// Corner along the x axis.
    pub fn v1(&self) -> Vec2 {
        self.position + self.x_axis
    }

    /// Corner opposite `v0`.
    pub fn v2(&self) -> Vec2 {
        self.position + self.x_axis + self.y_axis
    }

    /// Corner along the y axis.
    pub fn v3(&self) -> Vec2 {
        self.position + self.y_axis
    }

    /// Length of the x axis.
    pub fn width(&self) -> f32 {
        self.x_axis.length()
    }

    /// Length of the y axis.
    pub fn height(&self) -> f32 {
        self.y_axis.length()
    }

    /// A sub-quad moved `offset` along the (normalized) axes with new side
    /// lengths; used to carve rounded rects into side pieces.
    pub fn mutated(&self, offset: Vec2, new_width: f32, new_height: f32) -> Self {
        let nx = self.x_axis.normalize();
        let ny = self.y_axis.normalize();
        Self {
            position: self.position + nx * offset.x + ny * offset.y,
            x_axis: nx * new_width,
            y_axis: ny * new_height,
        }
    }

    /// A point moved `offset` along the (normalized) axes from `position`.
    pub fn offset_along_axes(&self, offset: Vec2) -> Vec2 {
        self.position + self.x_axis.normalize() * offset.x + self.y_axis.normalize() * offset.y
    }

    /// The axis-aligned bounding rectangle of the four corners.
    pub fn bounds(&self) -> Rect2 {
        Rect2::bounding_points(&[self.v0(), self.v1(), self.v2(), self.v3()])
    }
}

/// The vertex format of every non-blurred painter primitive.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex2D {
    /// Screen-space position.
    pub pos: Vec2,
    /// Brush-remapped texture coordinate.
    pub uv: Vec2,
    /// Brush-sampled color.
    pub color: PackedRgba,
}

/// The vertex format of blurred (drop-shadow) rectangles. The fragment
/// shader evaluates the analytic Gaussian-blurred box from these fields.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ShadowVertex {
    /// Screen-space position, expanded `3 * sigma` outward from the box.
    pub pos: Vec2,
    /// Gaussian sigma of the blur.
    pub sigma: f32,
    /// Corner radius at this vertex's corner.
    pub corner_radius: f32,
    /// Top-left of the unblurred box.
    pub box_min: Vec2,
    /// Bottom-right of the unblurred box.
    pub box_max: Vec2,
    /// Shadow color.
    pub color: PackedRgba,
}

/// Vertices for one rectangle.
pub const VERTS_PER_RECT: u32 = 4;
/// Indices for one rectangle.
pub const INDICES_PER_RECT: u32 = 6;

/// Vertex count of an arc fan with `segments` segments.
pub fn arc_vertex_count(segments: u32) -> u32 {
    if segments == 0 {
        0
    } else {
        segments * 2 + 1
    }
}

/// Index count of an arc fan with `segments` segments.
pub fn arc_index_count(segments: u32) -> u32 {
    segments * 3
}

/// The uniform writer all fill primitives go through.
///
/// Positions are mapped into the command's bounds to form the canonical
/// `(0,0)..(1,1)` parameterisation, the brush is sampled there, and the
/// `(position, remapped_uv, color)` triple lands in the output slices.
/// Indices are emitted bucket-global: `base_vertex` is the number of
/// vertices written by earlier commands into the same buffer.
pub struct VertexWriter<'a> {
    vertices: &'a mut [Vertex2D],
    indices: &'a mut [u32],
    base_vertex: u32,
    num_vertices: u32,
    num_indices: u32,
    brush: &'a Brush,
    uv_origin: Vec2,
    uv_inv_extent: Vec2,
}

impl<'a> VertexWriter<'a> {
    /// A writer emitting into `vertices`/`indices` with brush sampling
    /// parameterised over `bounds`.
    pub fn new(
        vertices: &'a mut [Vertex2D],
        indices: &'a mut [u32],
        base_vertex: u32,
        brush: &'a Brush,
        bounds: Rect2,
    ) -> Self {
        let width = bounds.width();
        let height = bounds.height();
        Self {
            vertices,
            indices,
            base_vertex,
            num_vertices: 0,
            num_indices: 0,
            brush,
            uv_origin: bounds.min,
            uv_inv_extent: Vec2::new(
                if width.abs() < EPSILON { 0.0 } else { 1.0 / width },
                if height.abs() < EPSILON { 0.0 } else { 1.0 / height },
            ),
        }
    }

    /// Vertices and indices written so far.
    pub fn counts(&self) -> (u32, u32) {
        (self.num_vertices, self.num_indices)
    }

    /// Maps a position into the command's canonical UV space.
    pub fn map_uv(&self, pos: Vec2) -> Vec2 {
        Vec2::new(
            (pos.x - self.uv_origin.x) * self.uv_inv_extent.x,
            (pos.y - self.uv_origin.y) * self.uv_inv_extent.y,
        )
    }

    /// Writes one brush-sampled vertex and returns its bucket-global index.
    pub fn push_sampled(&mut self, pos: Vec2) -> u32 {
        let (uv, color) = self.brush.sample(self.map_uv(pos), self.num_vertices);
        self.push_raw(Vertex2D { pos, uv, color: color.packed() })
    }

    /// Writes one pre-built vertex (text quads, polyline copies) and returns
    /// its bucket-global index.
    pub fn push_raw(&mut self, vertex: Vertex2D) -> u32 {
        let id = self.base_vertex + self.num_vertices;
        self.vertices[self.num_vertices as usize] = vertex;
        self.num_vertices += 1;
        id
    }

    /// Emits one triangle over bucket-global vertex indices.
    pub fn push_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        let at = self.num_indices as usize;
        self.indices[at] = i0;
        self.indices[at + 1] = i1;
        self.indices[at + 2] = i2;
        self.num_indices += 3;
    }

    /// Emits a filled quad: four sampled corners, two triangles.
    pub fn add_rect(&mut self, quad: &AxisQuad) {
        let v0 = self.push_sampled(quad.v0());
        let v1 = self.push_sampled(quad.v1());
        let v2 = self.push_sampled(quad.v2());
        let v3 = self.push_sampled(quad.v3());
        self.push_triangle(v0, v2, v1);
        self.push_triangle(v0, v3, v2);
    }

    /// Emits an arc fan around `center` from `start_angle` over `arc_angle`
    /// radians.
    ///
    /// The walk along the arc uses one incremental rotation per segment
    /// (`x += -y * tan(theta); y += x * tan(theta); scale by cos(theta)`)
    /// instead of a `sin`/`cos` pair per vertex. Non-positive radii or
    /// sweeps emit nothing.
    pub fn add_arc(&mut self, center: Vec2, radius: f32, start_angle: f32, arc_angle: f32) {
        if radius <= 0.0 || arc_angle <= 0.0 {
            return;
        }
        let num_segments = arc_segment_count(radius);
        let theta = arc_angle / num_segments as f32;
        let tangential_factor = theta.tan();
        let radial_factor = theta.cos();

        let mut x = start_angle.cos() * radius;
        let mut y = start_angle.sin() * radius;

        let center_id = self.push_sampled(center);
        for _ in 0..num_segments {
            let p0 = self.push_sampled(Vec2::new(x + center.x, y + center.y));

            let tx = -y;
            let ty = x;
            x += tx * tangential_factor;
            y += ty * tangential_factor;
            x *= radial_factor;
            y *= radial_factor;

            let p1 = self.push_sampled(Vec2::new(x + center.x, y + center.y));
            self.push_triangle(center_id, p1, p0);
        }
    }

    /// Emits the decomposition of a rounded rectangle: middle, left, and
    /// right side pieces plus four quarter-circle corner fans. A radius of
    /// (near) zero degenerates to a single quad.
    pub fn add_rounded_rect(&mut self, quad: &AxisQuad, border_radius: f32) {
        if border_radius < EPSILON {
            self.add_rect(quad);
            return;
        }
        let rect_width = quad.width();
        let rect_height = quad.height();
        let radius_x2 = border_radius * 2.0;
        let middle_width = rect_width - radius_x2;
        let side_height = rect_height - radius_x2;

        let middle = quad.mutated(Vec2::new(border_radius, 0.0), middle_width, rect_height);
        let left = quad.mutated(Vec2::new(0.0, border_radius), border_radius, side_height);
        let right = quad.mutated(
            Vec2::new(middle_width + border_radius, border_radius),
            border_radius,
            side_height,
        );
        let inner = quad.mutated(Vec2::new(border_radius, border_radius), middle_width, side_height);

        let tl = inner.position;
        let tr = tl + inner.x_axis;
        let br = tr + inner.y_axis;
        let bl = tl + inner.y_axis;

        self.add_rect(&middle);
        self.add_rect(&left);
        self.add_rect(&right);
        self.add_arc(tl, border_radius, std::f32::consts::PI, HALF_PI);
        self.add_arc(tr, border_radius, -HALF_PI, HALF_PI);
        self.add_arc(bl, border_radius, HALF_PI, HALF_PI);
        self.add_arc(br, border_radius, 0.0, HALF_PI);
    }
}

/// Vertex/index counts of a rounded rectangle, matching what
/// [`VertexWriter::add_rounded_rect`] writes.
pub fn rounded_rect_counts(border_radius: f32) -> (u32, u32) {
    if border_radius < EPSILON {
        return (VERTS_PER_RECT, INDICES_PER_RECT);
    }
    let segments = arc_segment_count(border_radius);
    (
        3 * VERTS_PER_RECT + 4 * arc_vertex_count(segments),
        3 * INDICES_PER_RECT + 4 * arc_index_count(segments),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::Brush;
    use onyx_core::math::Rgba;
    use approx::assert_relative_eq;

    fn scratch(verts: usize, indices: usize) -> (Vec<Vertex2D>, Vec<u32>) {
        (vec![Vertex2D::zeroed(); verts], vec![0; indices])
    }

    use bytemuck::Zeroable;

    #[test]
    fn axis_quad_corners_and_bounds() {
        let quad = AxisQuad::from_rect(Rect2::from_pos_size(
            Vec2::new(10.0, 20.0),
            Vec2::new(100.0, 50.0),
        ));
        assert_eq!(quad.v0(), Vec2::new(10.0, 20.0));
        assert_eq!(quad.v1(), Vec2::new(110.0, 20.0));
        assert_eq!(quad.v2(), Vec2::new(110.0, 70.0));
        assert_eq!(quad.v3(), Vec2::new(10.0, 70.0));
        let bounds = quad.bounds();
        assert_eq!(bounds.min, Vec2::new(10.0, 20.0));
        assert_eq!(bounds.max, Vec2::new(110.0, 70.0));
    }

    #[test]
    fn mutated_carves_sub_quads() {
        let quad = AxisQuad::from_rect(Rect2::from_pos_size(Vec2::ZERO, Vec2::new(100.0, 40.0)));
        let middle = quad.mutated(Vec2::new(10.0, 0.0), 80.0, 40.0);
        assert_eq!(middle.position, Vec2::new(10.0, 0.0));
        assert_relative_eq!(middle.width(), 80.0);
        assert_relative_eq!(middle.height(), 40.0);
    }

    #[test]
    fn rect_emits_four_vertices_two_triangles() {
        let brush = Brush::colored(Rgba::RED);
        let (mut verts, mut indices) = scratch(4, 6);
        let quad = AxisQuad::from_rect(Rect2::from_pos_size(Vec2::ZERO, Vec2::new(8.0, 8.0)));
        let mut writer = VertexWriter::new(&mut verts, &mut indices, 0, &brush, quad.bounds());
        writer.add_rect(&quad);
        assert_eq!(writer.counts(), (4, 6));
        assert_eq!(verts[0].color, Rgba::RED.packed());
        assert_eq!(indices, vec![0, 2, 1, 0, 3, 2]);
    }

    #[test]
    fn base_vertex_offsets_indices() {
        let brush = Brush::colored(Rgba::WHITE);
        let (mut verts, mut indices) = scratch(4, 6);
        let quad = AxisQuad::from_rect(Rect2::from_pos_size(Vec2::ZERO, Vec2::new(8.0, 8.0)));
        let mut writer = VertexWriter::new(&mut verts, &mut indices, 100, &brush, quad.bounds());
        writer.add_rect(&quad);
        assert_eq!(indices, vec![100, 102, 101, 100, 103, 102]);
    }

    #[test]
    fn arc_counts_match_writer_output() {
        let brush = Brush::colored(Rgba::WHITE);
        let radius = 16.0;
        let segments = arc_segment_count(radius);
        let (mut verts, mut indices) = scratch(
            arc_vertex_count(segments) as usize,
            arc_index_count(segments) as usize,
        );
        let mut writer = VertexWriter::new(
            &mut verts,
            &mut indices,
            0,
            &brush,
            Rect2::from_center_radius(Vec2::ZERO, radius),
        );
        writer.add_arc(Vec2::ZERO, radius, 0.0, std::f32::consts::TAU);
        assert_eq!(writer.counts(), (arc_vertex_count(segments), arc_index_count(segments)));
    }

    #[test]
    fn arc_vertices_stay_on_the_circle() {
        let brush = Brush::colored(Rgba::WHITE);
        let radius = 25.0;
        let segments = arc_segment_count(radius);
        let (mut verts, mut indices) = scratch(
            arc_vertex_count(segments) as usize,
            arc_index_count(segments) as usize,
        );
        let center = Vec2::new(50.0, 50.0);
        let mut writer = VertexWriter::new(
            &mut verts,
            &mut indices,
            0,
            &brush,
            Rect2::from_center_radius(center, radius),
        );
        writer.add_arc(center, radius, 0.0, std::f32::consts::TAU);

        // The incremental rotation must not drift off the radius.
        for vertex in &verts[1..] {
            assert_relative_eq!((vertex.pos - center).length(), radius, epsilon = 0.05);
        }
    }

    #[test]
    fn degenerate_arcs_emit_nothing() {
        let brush = Brush::colored(Rgba::WHITE);
        let (mut verts, mut indices) = scratch(8, 12);
        let mut writer = VertexWriter::new(
            &mut verts,
            &mut indices,
            0,
            &brush,
            Rect2::from_pos_size(Vec2::ZERO, Vec2::ONE),
        );
        writer.add_arc(Vec2::ZERO, 0.0, 0.0, std::f32::consts::TAU);
        writer.add_arc(Vec2::ZERO, 10.0, 0.0, 0.0);
        writer.add_arc(Vec2::ZERO, 10.0, 0.0, -1.0);
        assert_eq!(writer.counts(), (0, 0));
    }

    #[test]
    fn rounded_rect_counts_match_writer() {
        for radius in [0.0f32, 4.0, 10.0, 32.0] {
            let brush = Brush::colored(Rgba::WHITE);
            let (expected_verts, expected_indices) = rounded_rect_counts(radius);
            let (mut verts, mut indices) =
                scratch(expected_verts as usize, expected_indices as usize);
            let quad =
                AxisQuad::from_rect(Rect2::from_pos_size(Vec2::ZERO, Vec2::new(100.0, 100.0)));
            let mut writer =
                VertexWriter::new(&mut verts, &mut indices, 0, &brush, quad.bounds());
            writer.add_rounded_rect(&quad, radius);
            assert_eq!(writer.counts(), (expected_verts, expected_indices), "radius {radius}");
        }
    }
}
