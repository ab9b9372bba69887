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

//! Polyline tessellation: thick strokes with miter, bevel, or round joins
//! and flat, square, round, or connected ends.
//!
//! Each consecutive point pair becomes a center segment with two edge
//! segments offset `±thickness/2` along the normal. Joins bridge adjacent
//! segments' edges; the turn direction (sign of the 2D cross product of the
//! incoming and outgoing directions) picks which edge is outer, and fans and
//! bevel triangles wind from that same sign so both clockwise and
//! counterclockwise turns grow outward.

use onyx_core::math::{deg_to_rad, Vec2, EPSILON, HALF_PI, PI, TAU};

/// Corner treatment between adjacent polyline segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolylineJoin {
    /// Extend the edges to their intersection. Joins sharper than 15
    /// degrees demote to bevel.
    #[default]
    Miter,
    /// One triangle bridging the outer edge endpoints.
    Bevel,
    /// A fan of triangles subdividing every 10 degrees.
    Round,
}

/// End-cap treatment of a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolylineEnd {
    /// Cut at the terminal points.
    #[default]
    Flat,
    /// Extend the terminal edges outward by half the thickness.
    Square,
    /// Rounded fan at each end.
    Round,
    /// Join the last point back to the first, closing the loop.
    Connected,
}

/// Tessellated polyline geometry with command-local indices.
///
/// Colors and UVs are assigned later by the brush sampler; only positions
/// are produced here.
#[derive(Debug, Default, Clone)]
pub struct PolylineGeometry {
    /// The stroke's vertex positions.
    pub positions: Vec<Vec2>,
    /// Triangle indices into `positions`.
    pub indices: Vec<u32>,
}

const MIN_MITER_ANGLE: f32 = deg_to_rad(15.0);
const ROUND_FAN_STEP: f32 = deg_to_rad(10.0);

#[derive(Debug, Clone, Copy, PartialEq)]
struct LineSegment {
    p0: Vec2,
    p1: Vec2,
}

impl LineSegment {
    fn direction_unnormalized(&self) -> Vec2 {
        self.p1 - self.p0
    }

    fn direction(&self) -> Vec2 {
        self.direction_unnormalized().normalize()
    }

    fn normal(&self) -> Vec2 {
        let dir = self.direction();
        Vec2::new(-dir.y, dir.x)
    }

    fn offset(&self, by: Vec2) -> Self {
        Self { p0: self.p0 + by, p1: self.p1 + by }
    }

    /// Line/line intersection. With `is_infinite` both segments extend
    /// without bound; otherwise the hit must land inside both segments.
    fn intersection(&self, rhs: &Self, is_infinite: bool) -> Option<Vec2> {
        let r = self.direction_unnormalized();
        let s = rhs.direction_unnormalized();
        let a_to_b = rhs.p0 - self.p0;
        let num = a_to_b.cross(r);
        let denom = r.cross(s);

        if denom.abs() < EPSILON {
            return None;
        }

        let u = num / denom;
        let t = a_to_b.cross(s) / denom;
        if !is_infinite && (!(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u)) {
            return None;
        }
        Some(self.p0 + r * t)
    }
}

#[derive(Debug, Clone, Copy)]
struct PolySegment {
    center: LineSegment,
    /// `edges[0]` offset along `+normal`, `edges[1]` along `-normal`.
    edges: [LineSegment; 2],
}

impl PolySegment {
    fn new(center: LineSegment, half_thickness: f32) -> Self {
        let thick_normal = center.normal() * half_thickness;
        Self {
            center,
            edges: [center.offset(thick_normal), center.offset(-thick_normal)],
        }
    }
}

struct GeometryBuilder {
    positions: Vec<Vec2>,
    indices: Vec<u32>,
}

impl GeometryBuilder {
    fn request(&mut self, points: &[Vec2]) -> u32 {
        let id = self.positions.len() as u32;
        self.positions.extend_from_slice(points);
        id
    }

    fn push_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    /// A fan of triangles around `center_vertex_pos` covering the angle
    /// from `start` to `end` as seen from `origin`, one triangle per 10
    /// degrees.
    fn push_rounded_fan(&mut self, center_vertex_pos: Vec2, origin: Vec2, start: Vec2, end: Vec2) {
        let point0 = start - origin;
        let point1 = end - origin;
        let mut angle0 = point0.y.atan2(point0.x);
        let angle1 = point1.y.atan2(point1.x);
        if angle0 > angle1 {
            angle0 -= TAU;
        }

        let center_id = self.request(&[center_vertex_pos]);
        let join_angle = angle1 - angle0;
        let num_tris = ((join_angle.abs() / ROUND_FAN_STEP).floor() as u32).max(1);
        let tri_angle = join_angle / num_tris as f32;

        let mut start_p = start;
        for i in 0..num_tris {
            let end_p = if i == num_tris - 1 {
                end
            } else {
                let rotation = (i + 1) as f32 * tri_angle;
                let (sin_rot, cos_rot) = rotation.sin_cos();
                Vec2::new(
                    cos_rot * point0.x - sin_rot * point0.y,
                    sin_rot * point0.x + cos_rot * point0.y,
                ) + origin
            };

            let id = self.request(&[start_p, end_p]);
            self.push_triangle(id + 1, id, center_id);
            start_p = end_p;
        }
    }

    /// Resolves the joint between two segments. Returns the end points of
    /// the first segment's quad and the start points of the next one, each
    /// as `[edge0, edge1]`, and emits bridging geometry for bevel/round.
    fn push_joint(
        &mut self,
        one: &PolySegment,
        two: &PolySegment,
        mut style: PolylineJoin,
        overlap_allowed: bool,
    ) -> ([Vec2; 2], [Vec2; 2]) {
        let dir0 = one.center.direction();
        let dir1 = two.center.direction();
        let angle = dir0.angle_between(dir1);
        let wrapped_angle = if angle > HALF_PI { PI - angle } else { angle };

        if style == PolylineJoin::Miter && wrapped_angle < MIN_MITER_ANGLE {
            style = PolylineJoin::Bevel;
        }

        match style {
            PolylineJoin::Miter => {
                let end0 = one.edges[0]
                    .intersection(&two.edges[0], true)
                    .unwrap_or(one.edges[0].p1);
                let end1 = one.edges[1]
                    .intersection(&two.edges[1], true)
                    .unwrap_or(one.edges[1].p1);
                ([end0, end1], [end0, end1])
            }
            PolylineJoin::Bevel | PolylineJoin::Round => {
                let clockwise = dir0.cross(dir1) < 0.0;
                let (outer1, outer2, inner1, inner2) = if clockwise {
                    (&one.edges[0], &two.edges[0], &one.edges[1], &two.edges[1])
                } else {
                    (&one.edges[1], &two.edges[1], &one.edges[0], &two.edges[0])
                };

                // A failed inner intersection means the segments are too
                // short for the turn; fall back to the segment's own
                // terminal point instead of inverting geometry.
                let inner_intersection = inner1.intersection(inner2, overlap_allowed);
                let inner_point = inner_intersection.unwrap_or(inner1.p1);
                let inner_start = if inner_intersection.is_some() { inner_point } else { inner1.p1 };

                let (ends, next_starts) = if clockwise {
                    (
                        [outer1.p1, inner_point],
                        [outer2.p0, inner_start],
                    )
                } else {
                    (
                        [inner_point, outer1.p1],
                        [inner_start, outer2.p0],
                    )
                };

                if style == PolylineJoin::Bevel {
                    let id = self.request(&[outer1.p1, outer2.p0, inner_point]);
                    if clockwise {
                        self.push_triangle(id, id + 1, id + 2);
                    } else {
                        self.push_triangle(id, id + 2, id + 1);
                    }
                } else if clockwise {
                    // The fan must sweep the short gap between the outer
                    // edge endpoints; the sweep direction flips with the
                    // turn direction.
                    self.push_rounded_fan(inner_point, one.center.p1, outer2.p0, outer1.p1);
                } else {
                    self.push_rounded_fan(inner_point, one.center.p1, outer1.p1, outer2.p0);
                }

                (ends, next_starts)
            }
        }
    }
}

/// Tessellates a stroked path into positions and local triangle indices.
///
/// Consecutive duplicate points collapse; fewer than two distinct points
/// produce empty geometry.
pub fn tessellate(
    points: &[Vec2],
    thickness: f32,
    join_style: PolylineJoin,
    end_style: PolylineEnd,
    overlap_allowed: bool,
) -> PolylineGeometry {
    let mut builder = GeometryBuilder { positions: Vec::new(), indices: Vec::new() };

    let half_thickness = thickness * 0.5;
    let mut segments: Vec<PolySegment> = Vec::with_capacity(points.len());
    for pair in points.windows(2) {
        if pair[0] != pair[1] {
            segments.push(PolySegment::new(LineSegment { p0: pair[0], p1: pair[1] }, half_thickness));
        }
    }
    if end_style == PolylineEnd::Connected {
        if let (Some(&last), Some(&first)) = (points.last(), points.first()) {
            if last != first {
                segments.push(PolySegment::new(LineSegment { p0: last, p1: first }, half_thickness));
            }
        }
    }
    if segments.is_empty() {
        return PolylineGeometry::default();
    }

    let first_segment = segments[0];
    let last_segment = segments[segments.len() - 1];
    let mut path_starts = [first_segment.edges[0].p0, first_segment.edges[1].p0];
    let mut path_ends = [last_segment.edges[0].p1, last_segment.edges[1].p1];

    match end_style {
        PolylineEnd::Flat => {}
        PolylineEnd::Square => {
            for (edge_index, start) in path_starts.iter_mut().enumerate() {
                *start -= first_segment.edges[edge_index].direction() * half_thickness;
            }
            for (edge_index, end) in path_ends.iter_mut().enumerate() {
                *end += last_segment.edges[edge_index].direction() * half_thickness;
            }
        }
        PolylineEnd::Round => {
            builder.push_rounded_fan(
                first_segment.center.p0,
                first_segment.center.p0,
                first_segment.edges[0].p0,
                first_segment.edges[1].p0,
            );
            builder.push_rounded_fan(
                last_segment.center.p1,
                last_segment.center.p1,
                last_segment.edges[1].p1,
                last_segment.edges[0].p1,
            );
        }
        PolylineEnd::Connected => {
            let (ends, starts) =
                builder.push_joint(&last_segment, &first_segment, join_style, overlap_allowed);
            path_ends = ends;
            path_starts = starts;
        }
    }

    let mut starts = path_starts;
    for (index, segment) in segments.iter().enumerate() {
        let is_tail = index + 1 == segments.len();
        let (ends, next_starts) = if is_tail {
            (path_ends, path_ends)
        } else {
            builder.push_joint(segment, &segments[index + 1], join_style, overlap_allowed)
        };

        let id = builder.request(&[starts[0], starts[1], ends[0], ends[1]]);
        builder.push_triangle(id, id + 2, id + 1);
        builder.push_triangle(id + 2, id + 3, id + 1);

        starts = next_starts;
    }

    PolylineGeometry { positions: builder.positions, indices: builder.indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn contains_point(positions: &[Vec2], target: Vec2) -> bool {
        positions.iter().any(|p| (*p - target).length() < 1e-3)
    }

    #[test]
    fn right_angle_miter_produces_the_expected_corners() {
        let points = [Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(100.0, 100.0)];
        let geometry =
            tessellate(&points, 10.0, PolylineJoin::Miter, PolylineEnd::Flat, false);

        // Outer corner of the L sits at (105, -5), inner at (95, 5).
        assert!(contains_point(&geometry.positions, Vec2::new(105.0, -5.0)));
        assert!(contains_point(&geometry.positions, Vec2::new(95.0, 5.0)));
        // Two quads, no join geometry for a miter.
        assert_eq!(geometry.positions.len(), 8);
        assert_eq!(geometry.indices.len(), 12);
    }

    #[test]
    fn mirrored_winding_mirrors_the_corners() {
        // The same L turned the other way (y negated); corners mirror.
        let points = [Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(100.0, -100.0)];
        let geometry =
            tessellate(&points, 10.0, PolylineJoin::Miter, PolylineEnd::Flat, false);
        assert!(contains_point(&geometry.positions, Vec2::new(105.0, 5.0)));
        assert!(contains_point(&geometry.positions, Vec2::new(95.0, -5.0)));
    }

    #[test]
    fn sharp_miter_demotes_to_bevel() {
        // A nearly-reversing turn, well under the 15 degree limit.
        let sharp = [Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(0.0, 5.0)];
        let demoted = tessellate(&sharp, 4.0, PolylineJoin::Miter, PolylineEnd::Flat, false);
        // A right-angle turn stays a true miter: two quads, nothing more.
        let square_turn =
            [Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(100.0, 100.0)];
        let mitered =
            tessellate(&square_turn, 4.0, PolylineJoin::Miter, PolylineEnd::Flat, false);

        assert_eq!(mitered.indices.len(), 12);
        // The demoted join carries a bevel triangle the true miter lacks.
        assert_eq!(demoted.indices.len(), 12 + 3);
    }

    #[test]
    fn bevel_adds_one_bridging_triangle_either_winding() {
        for flip in [1.0f32, -1.0] {
            let points =
                [Vec2::new(0.0, 0.0), Vec2::new(50.0, 0.0), Vec2::new(50.0, 50.0 * flip)];
            let geometry =
                tessellate(&points, 8.0, PolylineJoin::Bevel, PolylineEnd::Flat, false);
            assert_eq!(geometry.indices.len(), 12 + 3, "flip {flip}");
            assert_eq!(geometry.positions.len(), 8 + 3);
        }
    }

    #[test]
    fn round_join_fans_cover_the_turn_watertight() {
        let half = 5.0;
        let points = [Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), Vec2::new(100.0, 100.0)];
        let geometry =
            tessellate(&points, half * 2.0, PolylineJoin::Round, PolylineEnd::Flat, false);

        // 90 degrees at 10 degrees per fan triangle, plus two body quads.
        let fan_tris = geometry.indices.len() / 3 - 4;
        assert_eq!(fan_tris, 9);

        // Vertices that are neither quad corners nor the fan center are fan
        // rim points; all of them sit half a thickness from the joint.
        let joint = Vec2::new(100.0, 0.0);
        let known = [
            Vec2::new(0.0, 5.0),
            Vec2::new(0.0, -5.0),
            Vec2::new(95.0, 5.0), // inner intersection / fan center
            Vec2::new(95.0, 100.0),
            Vec2::new(105.0, 100.0),
        ];
        let mut rim = 0;
        for p in &geometry.positions {
            if known.iter().any(|k| (*p - *k).length() < 1e-3) {
                continue;
            }
            assert_relative_eq!((*p - joint).length(), half, epsilon = 0.05);
            rim += 1;
        }
        // The fan walks the rim continuously: each of the 9 triangles
        // shares an edge with the next, so there are no gaps at any angle.
        assert_eq!(rim, 9 * 2 + 2); // fan start/end pairs plus the two quad rim corners
    }

    #[test]
    fn square_ends_extend_by_half_thickness() {
        let points = [Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)];
        let geometry =
            tessellate(&points, 10.0, PolylineJoin::Miter, PolylineEnd::Square, false);
        assert!(contains_point(&geometry.positions, Vec2::new(-5.0, 5.0)));
        assert!(contains_point(&geometry.positions, Vec2::new(-5.0, -5.0)));
        assert!(contains_point(&geometry.positions, Vec2::new(105.0, 5.0)));
        assert!(contains_point(&geometry.positions, Vec2::new(105.0, -5.0)));
    }

    #[test]
    fn round_ends_emit_semicircular_caps() {
        let points = [Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)];
        let geometry =
            tessellate(&points, 10.0, PolylineJoin::Miter, PolylineEnd::Round, false);
        // 18 fan triangles per semicircle end plus the body quad.
        assert_eq!(geometry.indices.len() / 3, 18 * 2 + 2);
        // Cap rim vertices sit on the half-thickness circle around the ends.
        for p in geometry.positions.iter().filter(|p| p.x < 0.0) {
            assert_relative_eq!(p.length(), 5.0, epsilon = 0.05);
        }
        for p in geometry.positions.iter().filter(|p| p.x > 100.0) {
            assert_relative_eq!((*p - Vec2::new(100.0, 0.0)).length(), 5.0, epsilon = 0.05);
        }
    }

    #[test]
    fn connected_loop_ignores_an_explicit_closing_point() {
        let open = [
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(100.0, 100.0),
            Vec2::new(0.0, 100.0),
        ];
        let closed = [
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(100.0, 100.0),
            Vec2::new(0.0, 100.0),
            Vec2::new(0.0, 0.0),
        ];
        let a = tessellate(&open, 6.0, PolylineJoin::Miter, PolylineEnd::Connected, false);
        let b = tessellate(&closed, 6.0, PolylineJoin::Miter, PolylineEnd::Connected, false);
        assert_eq!(a.positions, b.positions);
        assert_eq!(a.indices, b.indices);
    }

    #[test]
    fn degenerate_inputs_produce_no_geometry() {
        assert!(tessellate(&[], 4.0, PolylineJoin::Miter, PolylineEnd::Flat, false)
            .positions
            .is_empty());
        assert!(tessellate(&[Vec2::ZERO], 4.0, PolylineJoin::Miter, PolylineEnd::Flat, false)
            .positions
            .is_empty());
        let same = [Vec2::new(3.0, 3.0), Vec2::new(3.0, 3.0)];
        assert!(tessellate(&same, 4.0, PolylineJoin::Miter, PolylineEnd::Flat, false)
            .positions
            .is_empty());
    }
}
