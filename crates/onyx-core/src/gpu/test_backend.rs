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

//! A null backend for unit tests: mints unique IDs, retains buffer bytes,
//! and records every submitted command stream for assertions.

use crate::error::ResourceError;
use crate::gpu::{
    AdapterInfo, BufferDescriptor, BufferId, ClearValue, CommandSink, DescriptorSetId,
    DescriptorSetInfo, FramebufferDescriptor, FramebufferId, GpuBackend, GpuBackendType,
    GpuDeviceType, GpuLimits, IndexFormat, PipelineDescriptor, PipelineId, ProgramDescriptor,
    ProgramId, RenderPassId, RenderPassInfo, SamplerDescriptor, SamplerId, ShaderModuleDescriptor,
    ShaderModuleId, TextureDescriptor, TextureFormat, TextureId, TextureViewDescriptor,
    TextureViewId,
};
use crate::math::{Extent3D, Origin3D, ScissorRect, Viewport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOp {
    BeginRenderPass { render_pass: RenderPassId, framebuffer: FramebufferId, render_area: ScissorRect },
    NextSubpass,
    EndRenderPass,
    BindPipeline(PipelineId),
    BindDescriptorSet { set_index: u32, set: DescriptorSetId, dynamic_offsets: Vec<u32> },
    BindVertexBuffer { binding: u32, buffer: BufferId, offset: u64 },
    BindIndexBuffer { buffer: BufferId, offset: u64, format: IndexFormat },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    SetBlendConstants([f32; 4]),
    SetLineWidth(f32),
    SetDepthBias { constant: f32, slope: f32, clamp: f32 },
    SetDepthBounds { min: f32, max: f32 },
    SetStencilCompareMask(u32),
    SetStencilWriteMask(u32),
    SetStencilReference(u32),
    Draw { first_vertex: u32, num_vertices: u32, num_instances: u32 },
    DrawIndexed { num_indices: u32, index_offset: u32, vertex_offset: i32, num_instances: u32 },
}

#[derive(Debug, Default)]
pub struct NullSink {
    pub ops: Vec<SinkOp>,
}

impl CommandSink for NullSink {
    fn begin_render_pass(
        &mut self,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        render_area: ScissorRect,
        _clear_values: &[ClearValue],
    ) {
        self.ops.push(SinkOp::BeginRenderPass { render_pass, framebuffer, render_area });
    }

    fn next_subpass(&mut self) {
        self.ops.push(SinkOp::NextSubpass);
    }

    fn end_render_pass(&mut self) {
        self.ops.push(SinkOp::EndRenderPass);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineId) {
        self.ops.push(SinkOp::BindPipeline(pipeline));
    }

    fn bind_descriptor_set(&mut self, set_index: u32, set: DescriptorSetId, dynamic_offsets: &[u32]) {
        self.ops.push(SinkOp::BindDescriptorSet {
            set_index,
            set,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferId, offset: u64) {
        self.ops.push(SinkOp::BindVertexBuffer { binding, buffer, offset });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64, format: IndexFormat) {
        self.ops.push(SinkOp::BindIndexBuffer { buffer, offset, format });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.ops.push(SinkOp::SetViewport(viewport));
    }

    fn set_scissor(&mut self, scissor: ScissorRect) {
        self.ops.push(SinkOp::SetScissor(scissor));
    }

    fn set_blend_constants(&mut self, constants: [f32; 4]) {
        self.ops.push(SinkOp::SetBlendConstants(constants));
    }

    fn set_line_width(&mut self, width: f32) {
        self.ops.push(SinkOp::SetLineWidth(width));
    }

    fn set_depth_bias(&mut self, constant: f32, slope: f32, clamp: f32) {
        self.ops.push(SinkOp::SetDepthBias { constant, slope, clamp });
    }

    fn set_depth_bounds(&mut self, min: f32, max: f32) {
        self.ops.push(SinkOp::SetDepthBounds { min, max });
    }

    fn set_stencil_compare_mask(&mut self, mask: u32) {
        self.ops.push(SinkOp::SetStencilCompareMask(mask));
    }

    fn set_stencil_write_mask(&mut self, mask: u32) {
        self.ops.push(SinkOp::SetStencilWriteMask(mask));
    }

    fn set_stencil_reference(&mut self, reference: u32) {
        self.ops.push(SinkOp::SetStencilReference(reference));
    }

    fn draw(&mut self, first_vertex: u32, num_vertices: u32, _first_instance: u32, num_instances: u32) {
        self.ops.push(SinkOp::Draw { first_vertex, num_vertices, num_instances });
    }

    fn draw_indexed(
        &mut self,
        num_indices: u32,
        index_offset: u32,
        vertex_offset: i32,
        _first_instance: u32,
        num_instances: u32,
    ) {
        self.ops.push(SinkOp::DrawIndexed { num_indices, index_offset, vertex_offset, num_instances });
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// The recording null backend. `supports_base_vertex` and creation-failure
/// injection are tweakable so tests can force the emulation and
/// out-of-memory paths.
#[derive(Debug)]
pub struct NullBackend {
    next_id: AtomicUsize,
    pub buffers: Mutex<HashMap<BufferId, Vec<u8>>>,
    pub submissions: Mutex<Vec<Vec<SinkOp>>>,
    pub supports_base_vertex: bool,
    pub fail_next_creates: AtomicUsize,
    pub destroyed_buffers: Mutex<Vec<BufferId>>,
    pub destroyed_pipelines: Mutex<Vec<PipelineId>>,
    pub destroyed_framebuffers: Mutex<Vec<FramebufferId>>,
    pub skip_frames: AtomicUsize,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            buffers: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            supports_base_vertex: true,
            fail_next_creates: AtomicUsize::new(0),
            destroyed_buffers: Mutex::new(Vec::new()),
            destroyed_pipelines: Mutex::new(Vec::new()),
            destroyed_framebuffers: Mutex::new(Vec::new()),
            skip_frames: AtomicUsize::new(0),
        }
    }

    pub fn without_base_vertex() -> Self {
        Self { supports_base_vertex: false, ..Self::new() }
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn maybe_fail(&self) -> Result<(), ResourceError> {
        let remaining = self.fail_next_creates.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_next_creates.store(remaining - 1, Ordering::Relaxed);
            return Err(ResourceError::OutOfMemory);
        }
        Ok(())
    }

    pub fn buffer_contents(&self, id: BufferId) -> Vec<u8> {
        self.buffers.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    pub fn submissions(&self) -> Vec<Vec<SinkOp>> {
        self.submissions.lock().unwrap().clone()
    }
}

impl GpuBackend for NullBackend {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.maybe_fail()?;
        let id = BufferId(self.next());
        self.buffers.lock().unwrap().insert(id, vec![0; desc.size as usize]);
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.buffers.lock().unwrap().remove(&id);
        self.destroyed_buffers.lock().unwrap().push(id);
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = self.buffers.lock().unwrap();
        let buffer = buffers.get_mut(&id).ok_or(ResourceError::InvalidHandle)?;
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.len() {
            return Err(ResourceError::OutOfBounds);
        }
        buffer[start..end].copy_from_slice(data);
        Ok(())
    }

    fn copy_buffer_to_buffer(
        &self,
        src: BufferId,
        src_offset: u64,
        dst: BufferId,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError> {
        let mut buffers = self.buffers.lock().unwrap();
        let data = {
            let source = buffers.get(&src).ok_or(ResourceError::InvalidHandle)?;
            let start = src_offset as usize;
            let end = start + size as usize;
            if end > source.len() {
                return Err(ResourceError::OutOfBounds);
            }
            source[start..end].to_vec()
        };
        let target = buffers.get_mut(&dst).ok_or(ResourceError::InvalidHandle)?;
        let start = dst_offset as usize;
        let end = start + data.len();
        if end > target.len() {
            return Err(ResourceError::OutOfBounds);
        }
        target[start..end].copy_from_slice(&data);
        Ok(())
    }

    fn create_texture(&self, _desc: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        self.maybe_fail()?;
        Ok(TextureId(self.next()))
    }

    fn destroy_texture(&self, _id: TextureId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn write_texture(
        &self,
        _id: TextureId,
        _data: &[u8],
        _bytes_per_row: Option<u32>,
        _origin: Origin3D,
        _size: Extent3D,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_texture_view(
        &self,
        _texture: TextureId,
        _desc: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        Ok(TextureViewId(self.next()))
    }

    fn destroy_texture_view(&self, _id: TextureViewId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_sampler(&self, _desc: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        Ok(SamplerId(self.next()))
    }

    fn destroy_sampler(&self, _id: SamplerId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_shader_module(
        &self,
        _desc: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        Ok(ShaderModuleId(self.next()))
    }

    fn destroy_shader_module(&self, _id: ShaderModuleId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_program(&self, _desc: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        Ok(ProgramId(self.next()))
    }

    fn destroy_program(&self, _id: ProgramId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_render_pass(&self, _info: &RenderPassInfo) -> Result<RenderPassId, ResourceError> {
        self.maybe_fail()?;
        Ok(RenderPassId(self.next()))
    }

    fn destroy_render_pass(&self, _id: RenderPassId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_framebuffer(&self, _desc: &FramebufferDescriptor) -> Result<FramebufferId, ResourceError> {
        self.maybe_fail()?;
        Ok(FramebufferId(self.next()))
    }

    fn destroy_framebuffer(&self, id: FramebufferId) -> Result<(), ResourceError> {
        self.destroyed_framebuffers.lock().unwrap().push(id);
        Ok(())
    }

    fn create_pipeline(&self, _desc: &PipelineDescriptor) -> Result<PipelineId, ResourceError> {
        self.maybe_fail()?;
        Ok(PipelineId(self.next()))
    }

    fn destroy_pipeline(&self, id: PipelineId) -> Result<(), ResourceError> {
        self.destroyed_pipelines.lock().unwrap().push(id);
        Ok(())
    }

    fn allocate_descriptor_set(
        &self,
        _program: ProgramId,
        _set_index: u32,
        _info: &DescriptorSetInfo,
    ) -> Result<DescriptorSetId, ResourceError> {
        self.maybe_fail()?;
        Ok(DescriptorSetId(self.next()))
    }

    fn free_descriptor_set(&self, _id: DescriptorSetId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_command_sink(&self, _label: Option<&str>) -> Box<dyn CommandSink> {
        Box::new(NullSink::default())
    }

    fn submit(&self, mut sink: Box<dyn CommandSink>) {
        let recorded = sink
            .as_any_mut()
            .downcast_mut::<NullSink>()
            .expect("NullBackend only submits its own sinks");
        self.submissions.lock().unwrap().push(std::mem::take(&mut recorded.ops));
    }

    fn begin_frame(&self) -> bool {
        let skips = self.skip_frames.load(Ordering::Relaxed);
        if skips > 0 {
            self.skip_frames.store(skips - 1, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn end_frame(&self) {}

    fn wait_idle(&self) {}

    fn limits(&self) -> GpuLimits {
        GpuLimits { min_uniform_offset_alignment: 256, supports_base_vertex: self.supports_base_vertex }
    }

    fn backend_type(&self) -> GpuBackendType {
        GpuBackendType::Headless
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "NullBackend".to_string(),
            backend_type: GpuBackendType::Headless,
            device_type: GpuDeviceType::Cpu,
        }
    }

    fn surface_format(&self) -> Option<TextureFormat> {
        Some(TextureFormat::Rgba8UnormSrgb)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
