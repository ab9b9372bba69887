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

//! The wgpu command sink: records the core's command stream for replay
//! into a `wgpu::CommandEncoder` at submit time.
//!
//! Recording and replay are split because wgpu render passes borrow their
//! encoder; replaying the whole stream in one place at submit keeps the
//! recording surface free of those lifetimes.

use onyx_core::gpu::{
    BufferId, ClearValue, CommandSink, DescriptorSetId, FramebufferId, IndexFormat, PipelineId,
    RenderPassId,
};
use onyx_core::math::{ScissorRect, Viewport};

/// One recorded command.
#[derive(Debug, Clone)]
pub(crate) enum SinkCommand {
    BeginRenderPass {
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        render_area: ScissorRect,
        clear_values: Vec<ClearValue>,
    },
    NextSubpass,
    EndRenderPass,
    BindPipeline(PipelineId),
    BindDescriptorSet { set_index: u32, set: DescriptorSetId, dynamic_offsets: Vec<u32> },
    BindVertexBuffer { binding: u32, buffer: BufferId, offset: u64 },
    BindIndexBuffer { buffer: BufferId, offset: u64, format: IndexFormat },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    SetBlendConstants([f32; 4]),
    SetStencilReference(u32),
    Draw { first_vertex: u32, num_vertices: u32, first_instance: u32, num_instances: u32 },
    DrawIndexed {
        num_indices: u32,
        index_offset: u32,
        vertex_offset: i32,
        first_instance: u32,
        num_instances: u32,
    },
}

/// The recording sink handed out by the wgpu backend.
#[derive(Debug, Default)]
pub struct WgpuSink {
    pub(crate) label: Option<String>,
    pub(crate) commands: Vec<SinkCommand>,
}

impl WgpuSink {
    pub(crate) fn new(label: Option<&str>) -> Self {
        Self { label: label.map(str::to_owned), commands: Vec::new() }
    }
}

impl CommandSink for WgpuSink {
    fn begin_render_pass(
        &mut self,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        render_area: ScissorRect,
        clear_values: &[ClearValue],
    ) {
        self.commands.push(SinkCommand::BeginRenderPass {
            render_pass,
            framebuffer,
            render_area,
            clear_values: clear_values.to_vec(),
        });
    }

    fn next_subpass(&mut self) {
        self.commands.push(SinkCommand::NextSubpass);
    }

    fn end_render_pass(&mut self) {
        self.commands.push(SinkCommand::EndRenderPass);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(SinkCommand::BindPipeline(pipeline));
    }

    fn bind_descriptor_set(&mut self, set_index: u32, set: DescriptorSetId, dynamic_offsets: &[u32]) {
        self.commands.push(SinkCommand::BindDescriptorSet {
            set_index,
            set,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferId, offset: u64) {
        self.commands.push(SinkCommand::BindVertexBuffer { binding, buffer, offset });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64, format: IndexFormat) {
        self.commands.push(SinkCommand::BindIndexBuffer { buffer, offset, format });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(SinkCommand::SetViewport(viewport));
    }

    fn set_scissor(&mut self, scissor: ScissorRect) {
        self.commands.push(SinkCommand::SetScissor(scissor));
    }

    fn set_blend_constants(&mut self, constants: [f32; 4]) {
        self.commands.push(SinkCommand::SetBlendConstants(constants));
    }

    fn set_line_width(&mut self, width: f32) {
        // wgpu rasterizes 1px lines only; wider lines come from geometry.
        if width != 1.0 {
            log::trace!("dynamic line width {width} ignored by the wgpu backend");
        }
    }

    fn set_depth_bias(&mut self, _constant: f32, _slope: f32, _clamp: f32) {
        // Depth bias is baked into the pipeline under wgpu.
        log::trace!("dynamic depth bias ignored by the wgpu backend");
    }

    fn set_depth_bounds(&mut self, _min: f32, _max: f32) {
        log::trace!("depth bounds test not supported by the wgpu backend");
    }

    fn set_stencil_compare_mask(&mut self, _mask: u32) {
        // wgpu bakes stencil masks into the pipeline.
        log::trace!("dynamic stencil compare mask ignored by the wgpu backend");
    }

    fn set_stencil_write_mask(&mut self, _mask: u32) {
        log::trace!("dynamic stencil write mask ignored by the wgpu backend");
    }

    fn set_stencil_reference(&mut self, reference: u32) {
        self.commands.push(SinkCommand::SetStencilReference(reference));
    }

    fn draw(&mut self, first_vertex: u32, num_vertices: u32, first_instance: u32, num_instances: u32) {
        self.commands.push(SinkCommand::Draw {
            first_vertex,
            num_vertices,
            first_instance,
            num_instances,
        });
    }

    fn draw_indexed(
        &mut self,
        num_indices: u32,
        index_offset: u32,
        vertex_offset: i32,
        first_instance: u32,
        num_instances: u32,
    ) {
        self.commands.push(SinkCommand::DrawIndexed {
            num_indices,
            index_offset,
            vertex_offset,
            first_instance,
            num_instances,
        });
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
