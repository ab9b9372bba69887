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

//! Time-bounded 3D line and AABB debug drawing.
//!
//! Commands carry a duration and live in two lists: depth-tested (world)
//! and overlay. Each frame the expired ones are erased and the rest are
//! expanded into pooled vertex blocks: fixed-size frame-ring buffers that
//! rotate with the frame index and return to a free list when a frame
//! doesn't need them. Lines render as two triangles expanded along the
//! screen-space perpendicular in the vertex stage; overlay lines keep
//! their pixel width at any distance.

use crate::shaders;
use onyx_core::error::ResourceError;
use onyx_core::gpu::{
    BufferUsage, CullFace, DynamicStateFlags, FrameRingBuffer, GpuDevice, PipelineState, ProgramId,
    RenderCommand, RenderQueue, ShaderStage, ShaderStageFlags, VertexBufferBinding, VertexFormat,
    VertexLayoutId, VertexLayoutSet,
};
use onyx_core::math::{PackedRgba, Rgba, Vec3};

/// Segments per pooled vertex block.
pub const SEGMENTS_PER_BLOCK: u32 = 256;
/// Vertices per line segment: two triangles.
pub const VERTICES_PER_SEGMENT: u32 = 6;
/// Vertices per pooled block.
pub const BLOCK_VERTEX_COUNT: u32 = SEGMENTS_PER_BLOCK * VERTICES_PER_SEGMENT;

const DEFAULT_THICKNESS: f32 = 2.0;

/// The debug line vertex: segment endpoints plus the expansion inputs the
/// vertex shader needs.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DebugVertex {
    /// This vertex's segment endpoint.
    pub curr_pos: Vec3,
    /// The other endpoint; equal to `curr_pos` on end vertices.
    pub next_pos: Vec3,
    /// The previous endpoint, used when `next_pos == curr_pos`.
    pub prev_pos: Vec3,
    /// Line color.
    pub color: PackedRgba,
    /// Which side of the line to expand toward: `-1` or `+1`.
    pub direction: f32,
    /// Expansion half-width in pixels.
    pub thickness: f32,
}

#[derive(Debug, Clone, Copy)]
enum DebugShape {
    Line { a: Vec3, b: Vec3 },
    Aabb { center: Vec3, extents: Vec3 },
}

#[derive(Debug, Clone, Copy)]
struct DebugCommand {
    duration: f32,
    color: PackedRgba,
    shape: DebugShape,
}

/// One pooled block: a frame-ring buffer holding up to
/// [`BLOCK_VERTEX_COUNT`] vertices per frame slot.
struct VertexBlock {
    ring: FrameRingBuffer,
    used: u32,
}

#[derive(Default)]
struct Channel {
    commands: Vec<DebugCommand>,
    blocks: Vec<VertexBlock>,
}

/// The debug line renderer. See the module docs.
pub struct DebugLineRenderer {
    world_program: ProgramId,
    overlay_program: ProgramId,
    layout: VertexLayoutId,
    pool: Vec<VertexBlock>,
    world: Channel,
    overlay: Channel,
}

impl DebugLineRenderer {
    /// Creates the renderer's programs and vertex layout on `device`.
    pub fn new(device: &mut GpuDevice) -> Result<Self, ResourceError> {
        let world_vs = shaders::create_module(
            device,
            "debug.world.vs",
            ShaderStage::Vertex,
            "vs_world",
            shaders::DEBUG_LINE,
        )?;
        let overlay_vs = shaders::create_module(
            device,
            "debug.overlay.vs",
            ShaderStage::Vertex,
            "vs_overlay",
            shaders::DEBUG_LINE,
        )?;
        let fs = shaders::create_module(
            device,
            "debug.fs",
            ShaderStage::Fragment,
            "fs_main",
            shaders::DEBUG_LINE,
        )?;
        let world_program =
            shaders::create_program(device, "Debug.World", [world_vs, fs], 1, |descriptor| {
                descriptor.with_uniform_buffer(0, 0, 1, ShaderStageFlags::VERTEX)
            })?;
        let overlay_program =
            shaders::create_program(device, "Debug.Overlay", [overlay_vs, fs], 1, |descriptor| {
                descriptor.with_uniform_buffer(0, 0, 1, ShaderStageFlags::VERTEX)
            })?;

        let mut layout = VertexLayoutSet::new();
        let binding = layout.add_binding(std::mem::size_of::<DebugVertex>() as u64);
        layout.add_attribute(binding, VertexFormat::Float32x3, 0);
        layout.add_attribute(binding, VertexFormat::Float32x3, 12);
        layout.add_attribute(binding, VertexFormat::Float32x3, 24);
        layout.add_attribute(binding, VertexFormat::Unorm8x4, 36);
        layout.add_attribute(binding, VertexFormat::Float32, 40);
        layout.add_attribute(binding, VertexFormat::Float32, 44);
        let layout = device.create_vertex_layout(layout);

        Ok(Self {
            world_program,
            overlay_program,
            layout,
            pool: Vec::new(),
            world: Channel::default(),
            overlay: Channel::default(),
        })
    }

    /// Queues a line for `duration` seconds; zero draws for one frame.
    pub fn add_line(&mut self, a: Vec3, b: Vec3, color: Rgba, duration: f32, overlay: bool) {
        self.channel_mut(overlay).commands.push(DebugCommand {
            duration,
            color: color.packed(),
            shape: DebugShape::Line { a, b },
        });
    }

    /// Queues an axis-aligned box outline for `duration` seconds.
    pub fn add_aabb(&mut self, center: Vec3, extents: Vec3, color: Rgba, duration: f32, overlay: bool) {
        self.channel_mut(overlay).commands.push(DebugCommand {
            duration,
            color: color.packed(),
            shape: DebugShape::Aabb { center, extents },
        });
    }

    /// Pending command count for one channel.
    pub fn num_commands(&self, overlay: bool) -> usize {
        self.channel(overlay).commands.len()
    }

    /// Advances command lifetimes and erases the expired. Call once per
    /// frame, after drawing.
    pub fn update(&mut self, delta_time: f32) {
        for channel in [&mut self.world, &mut self.overlay] {
            channel.commands.retain_mut(|command| {
                command.duration -= delta_time;
                command.duration > 0.0
            });
        }
    }

    /// Fills vertex blocks from one channel's commands and emits a draw
    /// per used block into `queue`.
    pub fn draw(
        &mut self,
        device: &mut GpuDevice,
        queue: &mut RenderQueue,
        overlay: bool,
    ) -> Result<(), ResourceError> {
        // Recycle last frame's blocks before filling.
        let channel = if overlay { &mut self.overlay } else { &mut self.world };
        for mut block in channel.blocks.drain(..) {
            block.used = 0;
            self.pool.push(block);
        }
        if channel.commands.is_empty() {
            return Ok(());
        }

        for command in channel.commands.clone() {
            match command.shape {
                DebugShape::Line { a, b } => {
                    Self::add_segment(device, &mut self.pool, channel, a, b, command.color)?;
                }
                DebugShape::Aabb { center, extents } => {
                    for (a, b) in aabb_edges(center, extents) {
                        Self::add_segment(device, &mut self.pool, channel, a, b, command.color)?;
                    }
                }
            }
        }

        let mut state = PipelineState::default_alpha_blended();
        state.set_cull_face(CullFace::None);
        state.set_dynamic_states(DynamicStateFlags::EMPTY);
        state.set_depth_testing(!overlay);
        state.program = Some(if overlay { self.overlay_program } else { self.world_program });
        state.vertex_layout = Some(self.layout);

        let frame = device.frame_info();
        for block in &channel.blocks {
            block.ring.flush_current(device)?;
            if block.used == 0 {
                continue;
            }
            let mut command = RenderCommand::draw_arrays(state, 0, block.used);
            command.vertex_buffers.push(VertexBufferBinding {
                binding: 0,
                buffer: block.ring.buffer(),
                offset: block.ring.offset(&frame),
            });
            queue.submit(command, 0.0);
        }
        Ok(())
    }

    /// Releases every pooled buffer. Programs are device-owned and follow
    /// the usual release path.
    pub fn destroy(mut self, device: &mut GpuDevice) {
        for block in self
            .pool
            .drain(..)
            .chain(self.world.blocks.drain(..))
            .chain(self.overlay.blocks.drain(..))
        {
            block.ring.destroy(device);
        }
        device.release(self.world_program);
        device.release(self.overlay_program);
    }

    fn channel(&self, overlay: bool) -> &Channel {
        if overlay {
            &self.overlay
        } else {
            &self.world
        }
    }

    fn channel_mut(&mut self, overlay: bool) -> &mut Channel {
        if overlay {
            &mut self.overlay
        } else {
            &mut self.world
        }
    }

    fn add_segment(
        device: &mut GpuDevice,
        pool: &mut Vec<VertexBlock>,
        channel: &mut Channel,
        a: Vec3,
        b: Vec3,
        color: PackedRgba,
    ) -> Result<(), ResourceError> {
        let needs_block = channel
            .blocks
            .last()
            .is_none_or(|block| block.used + VERTICES_PER_SEGMENT > BLOCK_VERTEX_COUNT);
        if needs_block {
            let block = match pool.pop() {
                Some(block) => block,
                None => VertexBlock {
                    ring: FrameRingBuffer::new(
                        device,
                        u64::from(BLOCK_VERTEX_COUNT) * std::mem::size_of::<DebugVertex>() as u64,
                        BufferUsage::VERTEX,
                        "debug-lines",
                    )?,
                    used: 0,
                },
            };
            channel.blocks.push(block);
        }

        let block = channel.blocks.last_mut().expect("ensured above");
        let corners = [
            DebugVertex { curr_pos: a, next_pos: b, prev_pos: a, color, direction: 1.0, thickness: DEFAULT_THICKNESS },
            DebugVertex { curr_pos: a, next_pos: b, prev_pos: a, color, direction: -1.0, thickness: DEFAULT_THICKNESS },
            DebugVertex { curr_pos: b, next_pos: b, prev_pos: a, color, direction: 1.0, thickness: DEFAULT_THICKNESS },
            DebugVertex { curr_pos: b, next_pos: b, prev_pos: a, color, direction: -1.0, thickness: DEFAULT_THICKNESS },
        ];

        // Two triangles per segment.
        let stride = std::mem::size_of::<DebugVertex>();
        let bytes = block.ring.current_slice();
        for (index, &corner) in [0usize, 2, 1, 1, 2, 3].iter().enumerate() {
            let at = (block.used as usize + index) * stride;
            bytes[at..at + stride].copy_from_slice(bytemuck::bytes_of(&corners[corner]));
        }
        block.used += VERTICES_PER_SEGMENT;
        Ok(())
    }
}

/// The twelve edges of an axis-aligned box given center and full extents.
pub fn aabb_edges(center: Vec3, extents: Vec3) -> [(Vec3, Vec3); 12] {
    let half = extents * 0.5;
    let min = center - half;
    let max = center + half;

    let p = [
        min,
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        max,
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(max.x, max.y, min.z),
    ];

    [
        // Bottom face.
        (p[1], p[0]),
        (p[1], p[6]),
        (p[3], p[6]),
        (p[3], p[0]),
        // Top face.
        (p[4], p[7]),
        (p[4], p[5]),
        (p[2], p[5]),
        (p[2], p[7]),
        // Vertical edges.
        (p[0], p[2]),
        (p[1], p[7]),
        (p[3], p[5]),
        (p[6], p[4]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_edges_have_unit_axis_directions() {
        let edges = aabb_edges(Vec3::new(1.0, 2.0, 3.0), Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(edges.len(), 12);
        for (a, b) in edges {
            let d = b - a;
            let axis_aligned = [d.x, d.y, d.z].iter().filter(|v| v.abs() > 1e-6).count();
            assert_eq!(axis_aligned, 1, "edge {a:?} -> {b:?} is not axis-aligned");
        }
    }

    #[test]
    fn aabb_edges_touch_each_corner_three_times() {
        let edges = aabb_edges(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0));
        let mut counts = std::collections::HashMap::new();
        for (a, b) in edges {
            for p in [a, b] {
                *counts.entry(format!("{:?}", p)).or_insert(0) += 1;
            }
        }
        assert_eq!(counts.len(), 8);
        assert!(counts.values().all(|&count| count == 3));
    }

    #[test]
    fn commands_expire_after_their_duration() {
        // A 0.1 second command at a 60 Hz tick survives exactly 6 updates.
        let mut commands = vec![DebugCommand {
            duration: 0.1,
            color: PackedRgba::WHITE,
            shape: DebugShape::Line { a: Vec3::ZERO, b: Vec3::ONE },
        }];
        let dt = 1.0 / 60.0;
        let mut survived = 0;
        while !commands.is_empty() {
            survived += 1;
            commands.retain_mut(|command| {
                command.duration -= dt;
                command.duration > 0.0
            });
            assert!(survived < 100, "command never expired");
        }
        assert_eq!(survived, 6);
    }
}
