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

//! Sorted draw submission for one view.
//!
//! Commands are pushed with a camera distance; a 64-bit key packs program,
//! vertex-layout, and material bits with quantised depth so one stable sort
//! yields the queue's draw order. Opaque queues sort front-to-back to help
//! early-z; transparent queues sort back-to-front for correct blending;
//! overlay queues keep submission order.

use crate::error::ResourceError;
use crate::gpu::{
    BufferId, CommandList, DescriptorSetId, DescriptorSetInfo, GpuDevice, IndexFormat,
    PipelineState,
};
use crate::math::ScissorRect;
use crate::onyx_bitflags;
use crate::utils::hash;

/// Descriptor-set index conventions shared by the core's shader programs.
pub mod set_index {
    /// Per-view camera data.
    pub const CAMERA: u32 = 0;
    /// Per-material resources (textures, material uniforms).
    pub const MATERIAL: u32 = 1;
    /// Per-object data (transforms, dynamic offsets).
    pub const OBJECT: u32 = 2;
}

onyx_bitflags! {
    /// How a queue orders its commands at flush.
    pub struct QueueSortFlags: u32 {
        /// Sort at all; unset keeps submission order.
        const SORT_COMMANDS = 1 << 0;
        /// Depth sorts front-to-back (opaque).
        const SORT_DEPTH_FTB = 1 << 1;
        /// Depth sorts back-to-front (transparent).
        const SORT_DEPTH_BTF = 1 << 2;
    }
}

/// One vertex-buffer binding carried by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferBinding {
    /// Binding slot.
    pub binding: u32,
    /// The bound buffer.
    pub buffer: BufferId,
    /// Byte offset of the binding.
    pub offset: u64,
}

/// How a command binds a descriptor set.
#[derive(Debug, Clone, Default)]
pub enum DescSetBind {
    /// Nothing bound at this slot.
    #[default]
    None,
    /// Contents resolved through the descriptor-set cache at replay.
    Immediate(DescriptorSetInfo),
    /// A pre-allocated set.
    Retained(DescriptorSetId),
}

impl DescSetBind {
    fn key_bits(&self) -> u64 {
        match self {
            DescSetBind::None => 0,
            DescSetBind::Immediate(info) => info.hash64(),
            DescSetBind::Retained(id) => hash::add_usize(hash::SEED, id.0),
        }
    }
}

/// The draw range variant of a command.
#[derive(Debug, Clone, Copy)]
pub enum DrawRange {
    /// Unindexed draw.
    Arrays {
        /// First vertex.
        first_vertex: u32,
        /// Vertex count.
        num_vertices: u32,
    },
    /// Indexed draw.
    Indexed {
        /// The index buffer.
        index_buffer: BufferId,
        /// Byte offset of the index binding.
        buffer_offset: u64,
        /// Index width.
        format: IndexFormat,
        /// Index count.
        num_indices: u32,
        /// First index.
        index_offset: u32,
        /// Added to each index before vertex fetch.
        vertex_offset: i32,
    },
}

/// One recorded draw: complete pipeline state plus bindings.
#[derive(Debug, Clone)]
pub struct RenderCommand {
    /// The full pipeline state the draw is issued with.
    pub pipeline: PipelineState,
    /// Vertex-buffer bindings.
    pub vertex_buffers: Vec<VertexBufferBinding>,
    /// The material descriptor set (set 1).
    pub material_binding: DescSetBind,
    /// The per-object descriptor set (set 2).
    pub object_binding: DescSetBind,
    /// Dynamic offsets passed with the object set.
    pub object_dynamic_offsets: Vec<u32>,
    /// Scissor pushed before the draw when it differs from the active one.
    pub scissor: Option<ScissorRect>,
    /// Instance count, at least 1.
    pub num_instances: u32,
    /// The draw range.
    pub range: DrawRange,
}

impl RenderCommand {
    /// A single-instance indexed draw with no bindings resolved yet.
    pub fn draw_indexed(
        pipeline: PipelineState,
        index_buffer: BufferId,
        format: IndexFormat,
        num_indices: u32,
        index_offset: u32,
    ) -> Self {
        Self {
            pipeline,
            vertex_buffers: Vec::new(),
            material_binding: DescSetBind::None,
            object_binding: DescSetBind::None,
            object_dynamic_offsets: Vec::new(),
            scissor: None,
            num_instances: 1,
            range: DrawRange::Indexed {
                index_buffer,
                buffer_offset: 0,
                format,
                num_indices,
                index_offset,
                vertex_offset: 0,
            },
        }
    }

    /// A single-instance unindexed draw.
    pub fn draw_arrays(pipeline: PipelineState, first_vertex: u32, num_vertices: u32) -> Self {
        Self {
            pipeline,
            vertex_buffers: Vec::new(),
            material_binding: DescSetBind::None,
            object_binding: DescSetBind::None,
            object_dynamic_offsets: Vec::new(),
            scissor: None,
            num_instances: 1,
            range: DrawRange::Arrays { first_vertex, num_vertices },
        }
    }
}

/// Maps a float depth to `num_bits` monotonically sortable bits.
///
/// IEEE-754 floats do not sort by raw bits once negatives appear; flipping
/// the sign bit for positives and all bits for negatives fixes that.
fn depth_to_bits(depth: f32, num_bits: u32) -> u64 {
    const HI_BIT: u32 = 1 << 31;
    let bits = depth.to_bits();
    let flip_mask = ((bits >> 31).wrapping_neg()) | HI_BIT;
    u64::from((bits ^ flip_mask) >> (32 - num_bits))
}

#[inline]
fn key_field(value: u64, shift: u32, bits: u32) -> u64 {
    (value & ((1u64 << bits) - 1)) << shift
}

/// A sorted queue of draw commands for one pass of one view.
#[derive(Debug)]
pub struct RenderQueue {
    flags: QueueSortFlags,
    commands: Vec<(u64, RenderCommand)>,
}

impl RenderQueue {
    /// Creates a queue with the given sorting policy.
    pub fn new(flags: QueueSortFlags) -> Self {
        Self { flags, commands: Vec::new() }
    }

    /// An opaque queue: front-to-back by depth, then state.
    pub fn opaque() -> Self {
        Self::new(QueueSortFlags::SORT_COMMANDS | QueueSortFlags::SORT_DEPTH_FTB)
    }

    /// A transparent queue: back-to-front by depth.
    pub fn transparent() -> Self {
        Self::new(QueueSortFlags::SORT_COMMANDS | QueueSortFlags::SORT_DEPTH_BTF)
    }

    /// An overlay queue grouped by state, no depth.
    pub fn overlay_scene() -> Self {
        Self::new(QueueSortFlags::SORT_COMMANDS)
    }

    /// A screen-overlay queue kept strictly in submission order.
    pub fn screen_overlay() -> Self {
        Self::new(QueueSortFlags::EMPTY)
    }

    /// Queued command count.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The queue's sorting policy.
    pub fn flags(&self) -> QueueSortFlags {
        self.flags
    }

    /// Computes the sort key this queue would assign a command.
    pub fn make_key(&self, command: &RenderCommand, distance_to_camera: f32) -> u64 {
        let program_bits = hash::add_usize(
            hash::SEED,
            command.pipeline.program.map_or(usize::MAX, |p| p.0),
        );
        let layout_bits = hash::add_usize(
            hash::SEED,
            command.pipeline.vertex_layout.map_or(usize::MAX, |l| l.0),
        );
        let material_bits = command.material_binding.key_bits();

        if self.flags.contains(QueueSortFlags::SORT_DEPTH_BTF) {
            // Depth in the top 24 bits, inverted so far things draw first.
            let depth = depth_to_bits(distance_to_camera, 24) ^ 0x00FF_FFFF;
            key_field(material_bits, 0, 8)
                | key_field(layout_bits, 8, 16)
                | key_field(program_bits, 24, 16)
                | key_field(depth, 40, 24)
        } else {
            // State-major: program, then layout, then material, then a
            // front-to-back depth tiebreak.
            let depth = depth_to_bits(distance_to_camera, 16);
            key_field(depth, 0, 16)
                | key_field(material_bits, 16, 16)
                | key_field(layout_bits, 32, 16)
                | key_field(program_bits, 48, 16)
        }
    }

    /// Pushes a command with its camera distance.
    pub fn submit(&mut self, command: RenderCommand, distance_to_camera: f32) {
        let key = self.make_key(&command, distance_to_camera);
        self.commands.push((key, command));
    }

    /// Sorts per policy and replays every command into `list`, then clears
    /// the queue.
    ///
    /// `view_binding` is the per-view camera data bound at set 0; it
    /// resolves against each command's own program, so one binding serves
    /// every program drawn in the queue.
    pub fn flush(
        &mut self,
        list: &mut CommandList,
        device: &mut GpuDevice,
        view_binding: &DescSetBind,
    ) -> Result<(), ResourceError> {
        if self.flags.contains(QueueSortFlags::SORT_COMMANDS) {
            // Stable: equal keys keep submission order.
            self.commands.sort_by_key(|(key, _)| *key);
        }
        for (_, command) in self.commands.drain(..) {
            execute(&command, list, device, view_binding)?;
        }
        Ok(())
    }

    /// Drops queued commands without executing them.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

/// Replays one command into a command list.
fn execute(
    command: &RenderCommand,
    list: &mut CommandList,
    device: &mut GpuDevice,
    view_binding: &DescSetBind,
) -> Result<(), ResourceError> {
    list.set_pipeline_state(&command.pipeline);

    // Clip rects ride the dynamic-scissor path; the value lands with the
    // draw's other dirty dynamic state.
    if let Some(scissor) = command.scissor {
        list.set_scissor(scissor);
    }

    let program = command.pipeline.program;
    bind_set(list, device, program, set_index::CAMERA, view_binding, &[])?;
    bind_set(list, device, program, set_index::MATERIAL, &command.material_binding, &[])?;
    bind_set(
        list,
        device,
        program,
        set_index::OBJECT,
        &command.object_binding,
        &command.object_dynamic_offsets,
    )?;

    for binding in &command.vertex_buffers {
        list.bind_vertex_buffer(binding.binding, binding.buffer, binding.offset);
    }

    match command.range {
        DrawRange::Arrays { first_vertex, num_vertices } => {
            list.draw_arrays(device, first_vertex, num_vertices, command.num_instances)?;
        }
        DrawRange::Indexed {
            index_buffer,
            buffer_offset,
            format,
            num_indices,
            index_offset,
            vertex_offset,
        } => {
            list.bind_index_buffer(index_buffer, buffer_offset, format);
            list.draw_indexed(device, num_indices, index_offset, vertex_offset, command.num_instances)?;
        }
    }
    Ok(())
}

fn bind_set(
    list: &mut CommandList,
    device: &mut GpuDevice,
    program: Option<crate::gpu::ProgramId>,
    set: u32,
    binding: &DescSetBind,
    dynamic_offsets: &[u32],
) -> Result<(), ResourceError> {
    match binding {
        DescSetBind::None => Ok(()),
        DescSetBind::Retained(id) => {
            list.bind_descriptor_set(set, *id, dynamic_offsets);
            Ok(())
        }
        DescSetBind::Immediate(info) => {
            let program = program.ok_or(ResourceError::InvalidHandle)?;
            let id = device.descriptor_set(program, set, info)?;
            list.bind_descriptor_set(set, id, dynamic_offsets);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_bits_sort_monotonically() {
        let depths = [-10.0f32, -1.0, -0.5, 0.0, 0.25, 1.0, 100.0];
        let bits: Vec<u64> = depths.iter().map(|&d| depth_to_bits(d, 24)).collect();
        for pair in bits.windows(2) {
            assert!(pair[0] < pair[1], "bits {pair:?} not increasing");
        }
    }

    #[test]
    fn opaque_keys_sort_front_to_back() {
        let queue = RenderQueue::opaque();
        let command = RenderCommand::draw_arrays(PipelineState::default(), 0, 3);
        let near = queue.make_key(&command, 1.0);
        let far = queue.make_key(&command, 50.0);
        assert!(near < far);
    }

    #[test]
    fn transparent_keys_sort_back_to_front() {
        let queue = RenderQueue::transparent();
        let command = RenderCommand::draw_arrays(PipelineState::default(), 0, 3);
        let near = queue.make_key(&command, 1.0);
        let far = queue.make_key(&command, 50.0);
        assert!(far < near);
    }

    #[test]
    fn transparent_depth_dominates_program_bits() {
        let queue = RenderQueue::transparent();
        let mut a = RenderCommand::draw_arrays(PipelineState::default(), 0, 3);
        a.pipeline.program = Some(crate::gpu::ProgramId(1));
        let mut b = a.clone();
        b.pipeline.program = Some(crate::gpu::ProgramId(2));

        // Whatever the programs hash to, the farther draw must come first.
        assert!(queue.make_key(&b, 90.0) < queue.make_key(&a, 10.0));
    }

    #[test]
    fn screen_overlay_preserves_submission_order() {
        let mut queue = RenderQueue::screen_overlay();
        let command = RenderCommand::draw_arrays(PipelineState::default(), 0, 3);
        queue.submit(command.clone(), 5.0);
        queue.submit(command.clone(), 1.0);
        queue.submit(command, 9.0);
        // Without SORT_COMMANDS the keys are ignored at flush; the stored
        // order is the submission order.
        assert_eq!(queue.len(), 3);
        assert!(!queue.flags().contains(QueueSortFlags::SORT_COMMANDS));
    }
}
