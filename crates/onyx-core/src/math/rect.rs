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

//! Axis-aligned rectangle in min/max form, y-down screen space.

use super::Vec2;

/// An axis-aligned rectangle stored as min/max corners.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rect2 {
    /// The top-left corner (minimum x and y).
    pub min: Vec2,
    /// The bottom-right corner (maximum x and y).
    pub max: Vec2,
}

impl Rect2 {
    /// Creates a rectangle from min/max corners.
    #[inline]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Creates a rectangle from a position and a size.
    #[inline]
    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self { min: pos, max: pos + size }
    }

    /// Creates a square rectangle centered on `center` with the given
    /// half-extent, the bounding box of a circle.
    #[inline]
    pub fn from_center_radius(center: Vec2, radius: f32) -> Self {
        Self { min: center - Vec2::splat(radius), max: center + Vec2::splat(radius) }
    }

    /// The smallest rectangle containing every point in the slice. Returns a
    /// zero rect for an empty slice.
    pub fn bounding_points(points: &[Vec2]) -> Self {
        let Some((&first, rest)) = points.split_first() else {
            return Self::default();
        };
        let mut min = first;
        let mut max = first;
        for &p in rest {
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    /// The rectangle's width.
    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// The rectangle's height.
    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// The rectangle's area.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// The top-left corner.
    #[inline]
    pub fn top_left(&self) -> Vec2 {
        self.min
    }

    /// The top-right corner.
    #[inline]
    pub fn top_right(&self) -> Vec2 {
        Vec2::new(self.max.x, self.min.y)
    }

    /// The bottom-left corner.
    #[inline]
    pub fn bottom_left(&self) -> Vec2 {
        Vec2::new(self.min.x, self.max.y)
    }

    /// The bottom-right corner.
    #[inline]
    pub fn bottom_right(&self) -> Vec2 {
        self.max
    }

    /// Returns the rectangle grown outward by `amount` on every side.
    #[inline]
    pub fn expanded(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(amount),
            max: self.max + Vec2::splat(amount),
        }
    }

    /// Returns `true` if the two rectangles overlap. Touching edges count as
    /// an overlap, matching the conservative test batching wants.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Returns the intersection of two rectangles, or a zero-area rect when
    /// they do not overlap.
    #[inline]
    pub fn clipped_to(&self, other: &Self) -> Self {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max).max(min);
        Self { min, max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_points_covers_all() {
        let rect = Rect2::bounding_points(&[
            Vec2::new(3.0, -1.0),
            Vec2::new(-2.0, 4.0),
            Vec2::new(0.0, 0.0),
        ]);
        assert_eq!(rect.min, Vec2::new(-2.0, -1.0));
        assert_eq!(rect.max, Vec2::new(3.0, 4.0));
    }

    #[test]
    fn intersects_disjoint_and_overlapping() {
        let a = Rect2::from_pos_size(Vec2::new(10.0, 10.0), Vec2::new(100.0, 50.0));
        let b = Rect2::from_pos_size(Vec2::new(200.0, 200.0), Vec2::new(50.0, 50.0));
        let c = Rect2::from_pos_size(Vec2::new(50.0, 40.0), Vec2::new(100.0, 100.0));
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(c.intersects(&a));
    }

    #[test]
    fn clipped_to_disjoint_is_empty() {
        let a = Rect2::from_pos_size(Vec2::ZERO, Vec2::new(10.0, 10.0));
        let b = Rect2::from_pos_size(Vec2::new(20.0, 20.0), Vec2::new(10.0, 10.0));
        assert_eq!(a.clipped_to(&b).area(), 0.0);
    }

    #[test]
    fn expanded_grows_every_side() {
        let rect = Rect2::from_pos_size(Vec2::new(5.0, 5.0), Vec2::new(10.0, 10.0)).expanded(2.0);
        assert_eq!(rect.min, Vec2::new(3.0, 3.0));
        assert_eq!(rect.max, Vec2::new(17.0, 17.0));
    }
}
