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

//! Per-view camera data and the uniform layout shaders consume.

use onyx_core::math::Vec3;

/// A 4x4 column-major matrix; just enough for view-projection math.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix.
    pub cols: [[f32; 4]; 4],
}

impl Mat4 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// An orthographic projection mapping the box onto clip space with a
    /// `[0, 1]` depth range.
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let rcp_width = 1.0 / (right - left);
        let rcp_height = 1.0 / (top - bottom);
        let rcp_depth = 1.0 / (far - near);
        Self {
            cols: [
                [2.0 * rcp_width, 0.0, 0.0, 0.0],
                [0.0, 2.0 * rcp_height, 0.0, 0.0],
                [0.0, 0.0, rcp_depth, 0.0],
                [
                    -(right + left) * rcp_width,
                    -(top + bottom) * rcp_height,
                    -near * rcp_depth,
                    1.0,
                ],
            ],
        }
    }

    /// The screen-space projection the 2D painter draws with: pixel
    /// coordinates with the origin at the top left, y growing downward.
    pub fn screen_projection(width: f32, height: f32) -> Self {
        Self::orthographic(0.0, width, height, 0.0, 0.0, 1.0)
    }

    /// Matrix * column-vector transform of a point with w = 1.
    pub fn transform_point(&self, point: [f32; 3]) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        for (row, slot) in out.iter_mut().enumerate() {
            *slot = self.cols[0][row] * point[0]
                + self.cols[1][row] * point[1]
                + self.cols[2][row] * point[2]
                + self.cols[3][row];
        }
        out
    }
}

/// The camera state a view renders with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Combined view-projection matrix.
    pub view_proj: Mat4,
    /// World-space camera position, used for depth sorting.
    pub position: Vec3,
}

impl Camera {
    /// A screen-space camera over a pixel extent.
    pub fn screen(width: f32, height: f32) -> Self {
        Self { view_proj: Mat4::screen_projection(width, height), position: Vec3::ZERO }
    }

    /// Distance from the camera to a world point, for queue sort keys.
    pub fn distance_to(&self, point: Vec3) -> f32 {
        (point - self.position).length()
    }
}

/// The GPU layout of the per-view camera uniform (set 0, binding 0 of
/// every core shader program).
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct CameraUniform {
    /// Combined view-projection matrix.
    pub view_proj: Mat4,
    /// Viewport width and height in pixels; zw unused.
    pub viewport: [f32; 4],
}

impl CameraUniform {
    /// Builds the uniform for a camera over a viewport extent.
    pub fn new(camera: &Camera, width: u32, height: u32) -> Self {
        Self {
            view_proj: camera.view_proj,
            viewport: [width as f32, height as f32, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn screen_projection_maps_corners_to_clip_space() {
        let projection = Mat4::screen_projection(640.0, 480.0);

        let top_left = projection.transform_point([0.0, 0.0, 0.0]);
        assert_relative_eq!(top_left[0], -1.0);
        assert_relative_eq!(top_left[1], 1.0);

        let bottom_right = projection.transform_point([640.0, 480.0, 0.0]);
        assert_relative_eq!(bottom_right[0], 1.0);
        assert_relative_eq!(bottom_right[1], -1.0);

        let center = projection.transform_point([320.0, 240.0, 0.0]);
        assert_relative_eq!(center[0], 0.0);
        assert_relative_eq!(center[1], 0.0);
    }

    #[test]
    fn identity_leaves_points_alone() {
        let point = Mat4::IDENTITY.transform_point([3.0, -2.0, 5.0]);
        assert_eq!(&point[..3], &[3.0, -2.0, 5.0]);
        assert_eq!(point[3], 1.0);
    }

    #[test]
    fn camera_distance_is_euclidean() {
        let camera = Camera {
            view_proj: Mat4::IDENTITY,
            position: Vec3::new(0.0, 0.0, 10.0),
        };
        assert_relative_eq!(camera.distance_to(Vec3::new(0.0, 0.0, 0.0)), 10.0);
    }

    #[test]
    fn uniform_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
    }
}
