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

//! The recording surface one view draws through.
//!
//! A `CommandList` accumulates pipeline state, bindings, and renderpass
//! scope. At each draw the current state's masked hash resolves a pipeline
//! through the device cache; the pipeline is bound only when it changed, and
//! dirtied dynamic state is pushed through the sink's dynamic path instead
//! of baking new pipelines.

use crate::error::ResourceError;
use crate::gpu::{
    BufferDescriptor, BufferId, BufferUsage, ClearValue, CommandSink, DescriptorSetId,
    DynamicStateFlags, FramebufferId, GpuDevice, IndexFormat, MemoryProps, PipelineId,
    PipelineState, ProgramId, RenderPassId, RenderPassInfo, TextureId, VertexLayoutId,
    MAX_VERTEX_BINDINGS,
};
use crate::math::{Extent2D, ScissorRect, Viewport};

/// Absolute pixels or framebuffer-relative normalized render area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderArea {
    /// Pixel rectangle.
    Absolute(ScissorRect),
    /// Fractions of the framebuffer extent in `[0, 1]`.
    Relative {
        /// Left edge fraction.
        x: f32,
        /// Top edge fraction.
        y: f32,
        /// Width fraction.
        width: f32,
        /// Height fraction.
        height: f32,
    },
}

impl RenderArea {
    /// The full framebuffer.
    pub const FULL: Self = Self::Relative { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };

    fn resolve(&self, extent: Extent2D) -> ScissorRect {
        match *self {
            RenderArea::Absolute(rect) => rect,
            RenderArea::Relative { x, y, width, height } => ScissorRect {
                x: (x * extent.width as f32) as i32,
                y: (y * extent.height as f32) as i32,
                width: (width * extent.width as f32) as u32,
                height: (height * extent.height as f32) as u32,
            },
        }
    }
}

/// A command list recording against one view. See the module docs.
pub struct CommandList {
    sink: Box<dyn CommandSink>,
    /// The in-progress pipeline state mutated by the setters.
    pub state: PipelineState,
    bound_pipeline: Option<PipelineId>,
    dirty_dynamic: DynamicStateFlags,
    render_area: RenderArea,
    pending_render_pass: Option<RenderPassId>,
    pending_framebuffer: Option<FramebufferId>,
    fb_extent: Extent2D,
    clear_values: Vec<ClearValue>,
    in_render_pass: bool,
    current_subpass: u32,
    vertex_bindings: [Option<(BufferId, u64)>; MAX_VERTEX_BINDINGS],
    index_binding: Option<(BufferId, u64, IndexFormat)>,
    temp_buffers: Vec<BufferId>,
}

impl CommandList {
    /// Opens a fresh command list on the device's backend.
    pub fn begin(device: &GpuDevice, label: &str) -> Self {
        Self {
            sink: device.backend().create_command_sink(Some(label)),
            state: PipelineState::default(),
            bound_pipeline: None,
            dirty_dynamic: DynamicStateFlags::EMPTY,
            render_area: RenderArea::FULL,
            pending_render_pass: None,
            pending_framebuffer: None,
            fb_extent: Extent2D::default(),
            clear_values: Vec::new(),
            in_render_pass: false,
            current_subpass: 0,
            vertex_bindings: [None; MAX_VERTEX_BINDINGS],
            index_binding: None,
            temp_buffers: Vec::new(),
        }
    }

    // --- Renderpass scope ---

    /// Resolves and stages the renderpass for the next `begin_render_pass`.
    pub fn set_renderpass_info(
        &mut self,
        device: &mut GpuDevice,
        info: &RenderPassInfo,
    ) -> Result<RenderPassId, ResourceError> {
        let id = device.render_pass(info)?;
        self.pending_render_pass = Some(id);
        Ok(id)
    }

    /// Resolves and stages the framebuffer for the staged renderpass.
    pub fn set_attachments(
        &mut self,
        device: &mut GpuDevice,
        attachments: &[TextureId],
    ) -> Result<FramebufferId, ResourceError> {
        let render_pass = self.pending_render_pass.ok_or_else(|| {
            log::error!("set_attachments before set_renderpass_info");
            ResourceError::InvalidHandle
        })?;
        let id = device.framebuffer(attachments, render_pass)?;
        self.pending_framebuffer = Some(id);
        // Relative render areas resolve against the attachment extent.
        if let Some(first) = attachments.first() {
            if let Some(extent) = device.texture_extent(*first) {
                self.fb_extent = Extent2D::new(extent.width, extent.height);
            }
        }
        Ok(id)
    }

    /// Sets the clear values, one per attachment with a clear op.
    pub fn set_clear_values(&mut self, values: &[ClearValue]) {
        self.clear_values.clear();
        self.clear_values.extend_from_slice(values);
    }

    /// Sets the render area used by the next `begin_render_pass`.
    pub fn set_render_area(&mut self, area: RenderArea) {
        self.render_area = area;
    }

    /// Opens the staged renderpass over the staged framebuffer.
    pub fn begin_render_pass(&mut self) -> Result<(), ResourceError> {
        let (Some(render_pass), Some(framebuffer)) =
            (self.pending_render_pass, self.pending_framebuffer)
        else {
            log::error!("begin_render_pass without staged renderpass/framebuffer");
            debug_assert!(false, "begin_render_pass requires staged pass and attachments");
            return Err(ResourceError::InvalidHandle);
        };
        let area = self.render_area.resolve(self.fb_extent);
        self.sink.begin_render_pass(render_pass, framebuffer, area, &self.clear_values);
        self.in_render_pass = true;
        self.current_subpass = 0;
        self.state.render_pass = Some(render_pass);
        self.state.subpass_index = 0;
        // A new pass invalidates the bound pipeline and pushed dynamic state.
        self.bound_pipeline = None;
        self.dirty_dynamic = self.state.dynamic_states();
        Ok(())
    }

    /// Advances to the next subpass.
    pub fn next_subpass(&mut self) {
        debug_assert!(self.in_render_pass, "next_subpass outside a renderpass");
        self.sink.next_subpass();
        self.current_subpass += 1;
        self.state.subpass_index = self.current_subpass;
        self.bound_pipeline = None;
    }

    /// Closes the open renderpass.
    pub fn end_render_pass(&mut self) {
        debug_assert!(self.in_render_pass, "end_render_pass outside a renderpass");
        self.sink.end_render_pass();
        self.in_render_pass = false;
    }

    // --- Pipeline state setters ---

    /// Sets the program drawn with.
    pub fn set_program(&mut self, program: ProgramId) {
        self.state.program = Some(program);
    }

    /// Sets the vertex layout vertices are fetched with.
    pub fn set_vertex_layout(&mut self, layout: VertexLayoutId) {
        self.state.vertex_layout = Some(layout);
    }

    /// Replaces the whole pipeline state (queue replay path). The render
    /// pass and subpass stay those of the open scope.
    pub fn set_pipeline_state(&mut self, state: &PipelineState) {
        let render_pass = self.state.render_pass;
        let subpass = self.state.subpass_index;
        self.state = *state;
        self.state.render_pass = render_pass;
        self.state.subpass_index = subpass;
        self.dirty_dynamic = self.state.dynamic_states();
    }

    /// Sets the viewport; dynamic viewports go through the sink instead of
    /// re-baking the pipeline.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.state.viewport != viewport {
            self.state.viewport = viewport;
            self.mark_dynamic(DynamicStateFlags::VIEWPORT);
        }
    }

    /// Sets the scissor rectangle.
    pub fn set_scissor(&mut self, scissor: ScissorRect) {
        if self.state.scissor != scissor {
            self.state.scissor = scissor;
            self.mark_dynamic(DynamicStateFlags::SCISSOR);
        }
    }

    /// Sets the blend constants.
    pub fn set_blend_constants(&mut self, constants: [f32; 4]) {
        if self.state.blend_constants != constants {
            self.state.blend_constants = constants;
            self.mark_dynamic(DynamicStateFlags::BLEND_CONSTANTS);
        }
    }

    /// Sets the rasterized line width.
    pub fn set_line_width(&mut self, width: f32) {
        if self.state.line_width != width {
            self.state.line_width = width;
            self.mark_dynamic(DynamicStateFlags::LINE_WIDTH);
        }
    }

    fn mark_dynamic(&mut self, flag: DynamicStateFlags) {
        if self.state.dynamic_states().contains(flag) {
            self.dirty_dynamic.insert(flag);
        }
    }

    // --- Bindings ---

    /// Binds a vertex buffer to a binding slot.
    pub fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferId, offset: u64) {
        debug_assert!((binding as usize) < MAX_VERTEX_BINDINGS);
        let slot = &mut self.vertex_bindings[binding as usize];
        if *slot != Some((buffer, offset)) {
            *slot = Some((buffer, offset));
            self.sink.bind_vertex_buffer(binding, buffer, offset);
        }
    }

    /// Binds the index buffer.
    pub fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64, format: IndexFormat) {
        if self.index_binding != Some((buffer, offset, format)) {
            self.index_binding = Some((buffer, offset, format));
            self.sink.bind_index_buffer(buffer, offset, format);
        }
    }

    /// Binds a descriptor set.
    pub fn bind_descriptor_set(
        &mut self,
        set_index: u32,
        set: DescriptorSetId,
        dynamic_offsets: &[u32],
    ) {
        self.sink.bind_descriptor_set(set_index, set, dynamic_offsets);
    }

    // --- Draws ---

    /// Resolves the current pipeline, binds it if changed, pushes dirtied
    /// dynamic state.
    fn flush_draw_state(&mut self, device: &mut GpuDevice) -> Result<(), ResourceError> {
        if !self.in_render_pass {
            log::error!("draw issued outside a renderpass");
            debug_assert!(false, "draw issued outside a renderpass");
            return Err(ResourceError::InvalidHandle);
        }

        let pipeline = device.pipeline(&self.state)?;
        if self.bound_pipeline != Some(pipeline) {
            self.sink.bind_pipeline(pipeline);
            self.bound_pipeline = Some(pipeline);
            // A fresh pipeline bind invalidates previously pushed dynamic
            // state.
            self.dirty_dynamic = self.state.dynamic_states();
        }

        let dirty = self.dirty_dynamic;
        if dirty.contains(DynamicStateFlags::VIEWPORT) {
            self.sink.set_viewport(self.state.viewport);
        }
        if dirty.contains(DynamicStateFlags::SCISSOR) {
            self.sink.set_scissor(self.state.scissor);
        }
        if dirty.contains(DynamicStateFlags::BLEND_CONSTANTS) {
            self.sink.set_blend_constants(self.state.blend_constants);
        }
        if dirty.contains(DynamicStateFlags::LINE_WIDTH) {
            self.sink.set_line_width(self.state.line_width);
        }
        if dirty.contains(DynamicStateFlags::DEPTH_BIAS) {
            let bias = self.state.depth_bias;
            self.sink.set_depth_bias(bias.constant, bias.slope, bias.clamp);
        }
        if dirty.contains(DynamicStateFlags::DEPTH_BOUNDS) {
            let bounds = self.state.depth_bounds;
            self.sink.set_depth_bounds(bounds.min, bounds.max);
        }
        if dirty.contains(DynamicStateFlags::STENCIL_CMP_MASK) {
            self.sink.set_stencil_compare_mask(u32::from(self.state.stencil_compare_mask()));
        }
        if dirty.contains(DynamicStateFlags::STENCIL_WRITE_MASK) {
            self.sink.set_stencil_write_mask(u32::from(self.state.stencil_write_mask()));
        }
        if dirty.contains(DynamicStateFlags::STENCIL_REFERENCE) {
            self.sink.set_stencil_reference(u32::from(self.state.stencil_reference()));
        }
        self.dirty_dynamic = DynamicStateFlags::EMPTY;
        Ok(())
    }

    /// Draws unindexed vertices.
    pub fn draw_arrays(
        &mut self,
        device: &mut GpuDevice,
        first_vertex: u32,
        num_vertices: u32,
        num_instances: u32,
    ) -> Result<(), ResourceError> {
        self.flush_draw_state(device)?;
        self.sink.draw(first_vertex, num_vertices, 0, num_instances);
        device.count_draw_call();
        Ok(())
    }

    /// Draws indexed vertices.
    ///
    /// On backends without base-vertex support a nonzero `vertex_offset` is
    /// emulated: the bound vertex slice past the offset is copied into a
    /// temporary buffer bound at offset zero, and the draw is issued with a
    /// zero vertex offset. Temporaries are released when the list ends.
    pub fn draw_indexed(
        &mut self,
        device: &mut GpuDevice,
        num_indices: u32,
        index_offset: u32,
        vertex_offset: i32,
        num_instances: u32,
    ) -> Result<(), ResourceError> {
        self.flush_draw_state(device)?;

        let mut vertex_offset = vertex_offset;
        if vertex_offset != 0 && !device.limits().supports_base_vertex {
            self.emulate_base_vertex(device, vertex_offset)?;
            vertex_offset = 0;
        }

        self.sink.draw_indexed(num_indices, index_offset, vertex_offset, 0, num_instances);
        device.count_draw_call();
        Ok(())
    }

    fn emulate_base_vertex(
        &mut self,
        device: &mut GpuDevice,
        vertex_offset: i32,
    ) -> Result<(), ResourceError> {
        let (buffer, bind_offset) = self.vertex_bindings[0].ok_or_else(|| {
            log::error!("base-vertex emulation without a bound vertex buffer");
            ResourceError::InvalidHandle
        })?;
        let layout_id = self.state.vertex_layout.ok_or(ResourceError::InvalidHandle)?;
        let stride = device
            .vertex_layout(layout_id)
            .ok_or(ResourceError::InvalidHandle)?
            .binding_stride(0);
        let byte_offset = bind_offset + vertex_offset as u64 * stride;
        let size = device.buffer_size(buffer).saturating_sub(byte_offset);
        if size == 0 {
            return Err(ResourceError::OutOfBounds);
        }

        let temp = device.create_buffer(&BufferDescriptor::new(
            "base-vertex-emulation",
            size,
            BufferUsage::VERTEX | BufferUsage::TRANSFER_DST | BufferUsage::TRANSFER_SRC,
            MemoryProps::DEVICE_LOCAL,
        ))?;
        device.backend().copy_buffer_to_buffer(buffer, byte_offset, temp, 0, size)?;

        self.sink.bind_vertex_buffer(0, temp, 0);
        // The real binding must be restored before the next draw.
        self.vertex_bindings[0] = None;
        self.temp_buffers.push(temp);
        Ok(())
    }

    /// Finishes recording: submits the stream and releases emulation
    /// temporaries.
    pub fn end(mut self, device: &mut GpuDevice) {
        debug_assert!(!self.in_render_pass, "command list ended inside a renderpass");
        device.backend().submit(self.sink);
        for temp in self.temp_buffers.drain(..) {
            device.release(temp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::test_backend::{NullBackend, SinkOp};
    use crate::gpu::{
        AttachmentInfo, AttachmentRef, ImageLayout, ProgramDescriptor, RendererSettings,
        SampleCount, SubpassInfo, TextureDescriptor, TextureFlags, TextureFormat, VertexFormat,
        VertexLayoutSet,
    };
    use crate::math::Extent3D;

    struct Fixture {
        device: GpuDevice,
    }

    impl Fixture {
        fn new(backend: NullBackend) -> Self {
            Self { device: GpuDevice::new(Box::new(backend), &RendererSettings::default()) }
        }

        fn open_pass(&mut self) -> CommandList {
            let texture = self
                .device
                .create_texture(&TextureDescriptor {
                    label: None,
                    extent: Extent3D::new(128, 128, 1),
                    mip_levels: 1,
                    sample_count: SampleCount::X1,
                    format: TextureFormat::Rgba8Unorm,
                    flags: TextureFlags::COLOR_ATTACHMENT,
                })
                .unwrap();
            let mut info = RenderPassInfo::new();
            let color = info.add_attachment(AttachmentInfo {
                texture,
                format: TextureFormat::Rgba8Unorm,
                samples: SampleCount::X1,
                final_layout: ImageLayout::Present,
                may_alias: false,
            });
            info.add_subpass(SubpassInfo {
                input_refs: Vec::new(),
                color_refs: vec![AttachmentRef {
                    attachment: color,
                    layout: ImageLayout::ColorAttachment,
                }],
                depth_ref: None,
            });
            info.clears(1).stores(1);

            let mut list = CommandList::begin(&self.device, "test");
            list.set_renderpass_info(&mut self.device, &info).unwrap();
            list.set_attachments(&mut self.device, &[texture]).unwrap();
            list.begin_render_pass().unwrap();

            let program = self
                .device
                .create_program(&ProgramDescriptor::new("p", &[], 1))
                .unwrap();
            let mut layout = VertexLayoutSet::new();
            let binding = layout.add_binding(16);
            layout.add_attribute(binding, VertexFormat::Float32x4, 0);
            let layout_id = self.device.create_vertex_layout(layout);
            list.set_program(program);
            list.set_vertex_layout(layout_id);
            list
        }

        fn submitted_ops(&self) -> Vec<SinkOp> {
            let null = self.device.backend().as_any().downcast_ref::<NullBackend>().unwrap();
            null.submissions().into_iter().flatten().collect()
        }
    }

    #[test]
    fn repeated_draws_bind_the_pipeline_once() {
        let mut fixture = Fixture::new(NullBackend::new());
        let mut list = fixture.open_pass();

        list.draw_arrays(&mut fixture.device, 0, 3, 1).unwrap();
        list.draw_arrays(&mut fixture.device, 3, 3, 1).unwrap();
        list.end_render_pass();
        list.end(&mut fixture.device);

        let binds = fixture
            .submitted_ops()
            .iter()
            .filter(|op| matches!(op, SinkOp::BindPipeline(_)))
            .count();
        assert_eq!(binds, 1);
    }

    #[test]
    fn static_state_change_rebinds_a_new_pipeline() {
        let mut fixture = Fixture::new(NullBackend::new());
        let mut list = fixture.open_pass();

        list.draw_arrays(&mut fixture.device, 0, 3, 1).unwrap();
        list.state.set_cull_face(crate::gpu::CullFace::Back);
        list.draw_arrays(&mut fixture.device, 0, 3, 1).unwrap();
        list.end_render_pass();
        list.end(&mut fixture.device);

        let binds: Vec<_> = fixture
            .submitted_ops()
            .into_iter()
            .filter(|op| matches!(op, SinkOp::BindPipeline(_)))
            .collect();
        assert_eq!(binds.len(), 2);
        assert_ne!(binds[0], binds[1]);
    }

    #[test]
    fn dynamic_viewport_changes_push_through_the_sink() {
        let mut fixture = Fixture::new(NullBackend::new());
        let mut list = fixture.open_pass();
        list.state.set_dynamic_states(DynamicStateFlags::VIEWPORT);

        list.set_viewport(Viewport::from_extent(128.0, 128.0));
        list.draw_arrays(&mut fixture.device, 0, 3, 1).unwrap();
        list.set_viewport(Viewport::from_extent(64.0, 64.0));
        list.draw_arrays(&mut fixture.device, 0, 3, 1).unwrap();
        list.end_render_pass();
        list.end(&mut fixture.device);

        let ops = fixture.submitted_ops();
        let viewports = ops.iter().filter(|op| matches!(op, SinkOp::SetViewport(_))).count();
        let binds = ops.iter().filter(|op| matches!(op, SinkOp::BindPipeline(_))).count();
        assert_eq!(viewports, 2, "each dynamic change pushes once");
        assert_eq!(binds, 1, "dynamic changes never rebake the pipeline");
    }

    #[test]
    fn draw_outside_renderpass_is_rejected() {
        let mut fixture = Fixture::new(NullBackend::new());
        let mut list = fixture.open_pass();
        list.end_render_pass();
        // debug_assert fires in debug builds; release builds return an error.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            list.draw_arrays(&mut fixture.device, 0, 3, 1)
        }));
        match result {
            Ok(draw_result) => assert!(draw_result.is_err()),
            Err(_) => (), // debug_assert panicked, also acceptable
        }
    }

    #[test]
    fn base_vertex_emulation_copies_into_a_temp_buffer() {
        let mut fixture = Fixture::new(NullBackend::without_base_vertex());
        let mut list = fixture.open_pass();

        // 8 vertices of 16 bytes; draw starting at vertex 4.
        let vertex_buffer = fixture
            .device
            .create_buffer(&crate::gpu::BufferDescriptor::new(
                "verts",
                8 * 16,
                BufferUsage::VERTEX | BufferUsage::TRANSFER_SRC,
                crate::gpu::MemoryProps::HOST_VISIBLE,
            ))
            .unwrap();
        let index_buffer = fixture
            .device
            .create_buffer(&crate::gpu::BufferDescriptor::new(
                "indices",
                6 * 4,
                BufferUsage::INDEX,
                crate::gpu::MemoryProps::HOST_VISIBLE,
            ))
            .unwrap();
        let pattern: Vec<u8> = (0..8 * 16).map(|i| i as u8).collect();
        fixture.device.write_buffer(vertex_buffer, 0, &pattern).unwrap();

        list.bind_vertex_buffer(0, vertex_buffer, 0);
        list.bind_index_buffer(index_buffer, 0, IndexFormat::Uint32);
        list.draw_indexed(&mut fixture.device, 6, 0, 4, 1).unwrap();
        list.end_render_pass();
        list.end(&mut fixture.device);

        let ops = fixture.submitted_ops();
        // The actual draw was issued with vertex_offset 0.
        assert!(ops.iter().any(|op| matches!(
            op,
            SinkOp::DrawIndexed { vertex_offset: 0, num_indices: 6, .. }
        )));
        // A second vertex-buffer bind switched to the temp buffer.
        let vertex_binds: Vec<_> = ops
            .iter()
            .filter_map(|op| match op {
                SinkOp::BindVertexBuffer { buffer, offset, .. } => Some((*buffer, *offset)),
                _ => None,
            })
            .collect();
        assert_eq!(vertex_binds.len(), 2);
        assert_eq!(vertex_binds[0], (vertex_buffer, 0));
        let (temp, temp_offset) = vertex_binds[1];
        assert_ne!(temp, vertex_buffer);
        assert_eq!(temp_offset, 0);

        // The temp holds the slice starting at vertex 4 (byte 64).
        let null = fixture.device.backend().as_any().downcast_ref::<NullBackend>().unwrap();
        let contents = null.buffer_contents(temp);
        assert_eq!(contents.as_slice(), &pattern[64..]);
    }
}
