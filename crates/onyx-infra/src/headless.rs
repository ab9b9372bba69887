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

//! The headless recording backend.
//!
//! The second concrete [`GpuBackend`]: it mints IDs, retains buffer
//! contents on the CPU, and records every submitted command stream.
//! Useful for running the full rendering core without a GPU and for
//! asserting on exactly what would have been submitted — integration
//! tests across the workspace drive the painter, queues, and engine
//! through it.

use onyx_core::error::ResourceError;
use onyx_core::gpu::{
    AdapterInfo, BufferDescriptor, BufferId, ClearValue, CommandSink, DescriptorSetId,
    DescriptorSetInfo, FramebufferDescriptor, FramebufferId, GpuBackend, GpuBackendType,
    GpuDeviceType, GpuLimits, IndexFormat, PipelineDescriptor, PipelineId, ProgramDescriptor,
    ProgramId, RenderPassId, RenderPassInfo, SamplerDescriptor, SamplerId, ShaderModuleDescriptor,
    ShaderModuleId, TextureDescriptor, TextureFormat, TextureId, TextureViewDescriptor,
    TextureViewId,
};
use onyx_core::math::{Extent3D, Origin3D, ScissorRect, Viewport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One recorded call on a headless command sink.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum RecordedOp {
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
    SetLineWidth(f32),
    SetDepthBias { constant: f32, slope: f32, clamp: f32 },
    SetDepthBounds { min: f32, max: f32 },
    SetStencilCompareMask(u32),
    SetStencilWriteMask(u32),
    SetStencilReference(u32),
    Draw { first_vertex: u32, num_vertices: u32, num_instances: u32 },
    DrawIndexed { num_indices: u32, index_offset: u32, vertex_offset: i32, num_instances: u32 },
}

/// The recording sink handed out by [`HeadlessBackend`].
#[derive(Debug, Default)]
pub struct HeadlessSink {
    ops: Vec<RecordedOp>,
}

impl CommandSink for HeadlessSink {
    fn begin_render_pass(
        &mut self,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        render_area: ScissorRect,
        clear_values: &[ClearValue],
    ) {
        self.ops.push(RecordedOp::BeginRenderPass {
            render_pass,
            framebuffer,
            render_area,
            clear_values: clear_values.to_vec(),
        });
    }

    fn next_subpass(&mut self) {
        self.ops.push(RecordedOp::NextSubpass);
    }

    fn end_render_pass(&mut self) {
        self.ops.push(RecordedOp::EndRenderPass);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineId) {
        self.ops.push(RecordedOp::BindPipeline(pipeline));
    }

    fn bind_descriptor_set(&mut self, set_index: u32, set: DescriptorSetId, dynamic_offsets: &[u32]) {
        self.ops.push(RecordedOp::BindDescriptorSet {
            set_index,
            set,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferId, offset: u64) {
        self.ops.push(RecordedOp::BindVertexBuffer { binding, buffer, offset });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64, format: IndexFormat) {
        self.ops.push(RecordedOp::BindIndexBuffer { buffer, offset, format });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.ops.push(RecordedOp::SetViewport(viewport));
    }

    fn set_scissor(&mut self, scissor: ScissorRect) {
        self.ops.push(RecordedOp::SetScissor(scissor));
    }

    fn set_blend_constants(&mut self, constants: [f32; 4]) {
        self.ops.push(RecordedOp::SetBlendConstants(constants));
    }

    fn set_line_width(&mut self, width: f32) {
        self.ops.push(RecordedOp::SetLineWidth(width));
    }

    fn set_depth_bias(&mut self, constant: f32, slope: f32, clamp: f32) {
        self.ops.push(RecordedOp::SetDepthBias { constant, slope, clamp });
    }

    fn set_depth_bounds(&mut self, min: f32, max: f32) {
        self.ops.push(RecordedOp::SetDepthBounds { min, max });
    }

    fn set_stencil_compare_mask(&mut self, mask: u32) {
        self.ops.push(RecordedOp::SetStencilCompareMask(mask));
    }

    fn set_stencil_write_mask(&mut self, mask: u32) {
        self.ops.push(RecordedOp::SetStencilWriteMask(mask));
    }

    fn set_stencil_reference(&mut self, reference: u32) {
        self.ops.push(RecordedOp::SetStencilReference(reference));
    }

    fn draw(&mut self, first_vertex: u32, num_vertices: u32, _first_instance: u32, num_instances: u32) {
        self.ops.push(RecordedOp::Draw { first_vertex, num_vertices, num_instances });
    }

    fn draw_indexed(
        &mut self,
        num_indices: u32,
        index_offset: u32,
        vertex_offset: i32,
        _first_instance: u32,
        num_instances: u32,
    ) {
        self.ops.push(RecordedOp::DrawIndexed {
            num_indices,
            index_offset,
            vertex_offset,
            num_instances,
        });
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// The headless backend. See the module docs.
#[derive(Debug)]
pub struct HeadlessBackend {
    next_id: AtomicUsize,
    buffers: Mutex<HashMap<BufferId, Vec<u8>>>,
    textures: Mutex<HashMap<TextureId, Extent3D>>,
    submissions: Mutex<Vec<Vec<RecordedOp>>>,
    destroyed_buffers: Mutex<Vec<BufferId>>,
    destroyed_textures: Mutex<Vec<TextureId>>,
    supports_base_vertex: bool,
    fail_next_creates: AtomicUsize,
    skip_frames: AtomicUsize,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    /// A headless backend with full capabilities.
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            buffers: Mutex::new(HashMap::new()),
            textures: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            destroyed_buffers: Mutex::new(Vec::new()),
            destroyed_textures: Mutex::new(Vec::new()),
            supports_base_vertex: true,
            fail_next_creates: AtomicUsize::new(0),
            skip_frames: AtomicUsize::new(0),
        }
    }

    /// A backend without base-vertex support, forcing the command list's
    /// temp-buffer emulation path.
    pub fn without_base_vertex() -> Self {
        Self { supports_base_vertex: false, ..Self::new() }
    }

    /// Makes the next `count` resource creations fail with out-of-memory.
    pub fn fail_next_creates(&self, count: usize) {
        self.fail_next_creates.store(count, Ordering::Relaxed);
    }

    /// Makes the next `count` `begin_frame` calls report "skip this frame".
    pub fn skip_frames(&self, count: usize) {
        self.skip_frames.store(count, Ordering::Relaxed);
    }

    /// A copy of a buffer's current contents.
    pub fn buffer_contents(&self, id: BufferId) -> Vec<u8> {
        self.buffers.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    /// Every submitted command stream, in submission order.
    pub fn submissions(&self) -> Vec<Vec<RecordedOp>> {
        self.submissions.lock().unwrap().clone()
    }

    /// Buffers destroyed so far, in destruction order.
    pub fn destroyed_buffers(&self) -> Vec<BufferId> {
        self.destroyed_buffers.lock().unwrap().clone()
    }

    /// Textures destroyed so far, in destruction order.
    pub fn destroyed_textures(&self) -> Vec<TextureId> {
        self.destroyed_textures.lock().unwrap().clone()
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
}

impl GpuBackend for HeadlessBackend {
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

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        self.maybe_fail()?;
        let id = TextureId(self.next());
        self.textures.lock().unwrap().insert(id, desc.extent);
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        self.textures.lock().unwrap().remove(&id);
        self.destroyed_textures.lock().unwrap().push(id);
        Ok(())
    }

    fn write_texture(
        &self,
        id: TextureId,
        _data: &[u8],
        _bytes_per_row: Option<u32>,
        _origin: Origin3D,
        _size: Extent3D,
    ) -> Result<(), ResourceError> {
        if !self.textures.lock().unwrap().contains_key(&id) {
            return Err(ResourceError::InvalidHandle);
        }
        Ok(())
    }

    fn create_texture_view(
        &self,
        texture: TextureId,
        _desc: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        if !self.textures.lock().unwrap().contains_key(&texture) {
            return Err(ResourceError::InvalidHandle);
        }
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

    fn destroy_framebuffer(&self, _id: FramebufferId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_pipeline(&self, _desc: &PipelineDescriptor) -> Result<PipelineId, ResourceError> {
        self.maybe_fail()?;
        Ok(PipelineId(self.next()))
    }

    fn destroy_pipeline(&self, _id: PipelineId) -> Result<(), ResourceError> {
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
        Box::new(HeadlessSink::default())
    }

    fn submit(&self, mut sink: Box<dyn CommandSink>) {
        let recorded = sink
            .as_any_mut()
            .downcast_mut::<HeadlessSink>()
            .expect("HeadlessBackend only submits its own sinks");
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
        GpuLimits {
            min_uniform_offset_alignment: 256,
            supports_base_vertex: self.supports_base_vertex,
        }
    }

    fn backend_type(&self) -> GpuBackendType {
        GpuBackendType::Headless
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "Onyx headless".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use onyx_core::gpu::{BufferUsage, GpuDevice, MemoryProps, RendererSettings};

    #[test]
    fn buffers_retain_written_bytes() {
        let backend = HeadlessBackend::new();
        let id = backend
            .create_buffer(&BufferDescriptor::new(
                "b",
                8,
                BufferUsage::VERTEX,
                MemoryProps::HOST_VISIBLE,
            ))
            .unwrap();
        backend.write_buffer(id, 2, &[1, 2, 3]).unwrap();
        assert_eq!(backend.buffer_contents(id), vec![0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn submissions_record_in_order() {
        let backend = HeadlessBackend::new();
        let mut sink = backend.create_command_sink(None);
        sink.bind_pipeline(PipelineId(9));
        sink.draw(0, 3, 0, 1);
        backend.submit(sink);

        let submissions = backend.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0],
            vec![
                RecordedOp::BindPipeline(PipelineId(9)),
                RecordedOp::Draw { first_vertex: 0, num_vertices: 3, num_instances: 1 },
            ]
        );
    }

    #[test]
    fn device_frontend_runs_on_the_headless_backend() {
        let mut device =
            GpuDevice::new(Box::new(HeadlessBackend::new()), &RendererSettings::default());
        assert!(device.begin_frame());
        device.end_frame();
        assert_eq!(device.frame_info().frame_count, 1);
    }

    #[test]
    fn skip_frames_propagates_through_begin_frame() {
        let backend = HeadlessBackend::new();
        backend.skip_frames(2);
        assert!(!backend.begin_frame());
        assert!(!backend.begin_frame());
        assert!(backend.begin_frame());
    }
}
