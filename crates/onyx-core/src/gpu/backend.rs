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

//! The backend boundary: one trait, concrete implementations per API.
//!
//! Everything above this boundary (device frontend, caches, command lists,
//! painter) is backend-agnostic. The only polymorphism across graphics APIs
//! in the core lives here.

use crate::error::ResourceError;
use crate::gpu::{
    BufferDescriptor, BufferId, ClearValue, DescriptorSetId, DescriptorSetInfo, FramebufferId,
    IndexFormat, PipelineDescriptor, PipelineId, ProgramDescriptor, ProgramId, RenderPassId,
    RenderPassInfo, SamplerDescriptor, SamplerId, ShaderModuleDescriptor, ShaderModuleId,
    TextureDescriptor, TextureFormat, TextureId, TextureViewDescriptor, TextureViewId,
};
use crate::math::{Extent3D, Origin3D, ScissorRect, Viewport};
use std::borrow::Cow;
use std::fmt::Debug;

/// A backend-agnostic identification of a graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuBackendType {
    /// Vulkan.
    Vulkan,
    /// Apple Metal.
    Metal,
    /// DirectX 12.
    Dx12,
    /// OpenGL / OpenGL ES.
    OpenGl,
    /// WebGPU.
    WebGpu,
    /// The command-recording headless backend.
    Headless,
    /// Unknown backend.
    #[default]
    Unknown,
}

/// The physical class of the device an adapter represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuDeviceType {
    /// GPU integrated with the CPU.
    IntegratedGpu,
    /// Discrete GPU.
    DiscreteGpu,
    /// Virtualized GPU.
    VirtualGpu,
    /// Software rasterizer.
    Cpu,
    /// Unknown device class.
    #[default]
    Unknown,
}

/// Adapter identification surfaced for logging and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct AdapterInfo {
    /// Human-readable adapter name.
    pub name: String,
    /// The API in use.
    pub backend_type: GpuBackendType,
    /// The device class.
    pub device_type: GpuDeviceType,
}

/// Framebuffer creation parameters.
#[derive(Debug, Clone)]
pub struct FramebufferDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The attached textures, matching the renderpass attachment order.
    pub attachments: &'a [TextureId],
    /// The renderpass the framebuffer is compatible with.
    pub render_pass: RenderPassId,
    /// Framebuffer width in pixels.
    pub width: u32,
    /// Framebuffer height in pixels.
    pub height: u32,
}

/// Device limits the core needs to know about.
#[derive(Debug, Clone, Copy)]
pub struct GpuLimits {
    /// Required alignment for uniform-buffer offsets; ring-buffer slices
    /// align to this.
    pub min_uniform_offset_alignment: u64,
    /// Whether `draw_indexed` accepts a nonzero `vertex_offset`. Backends
    /// without it get the temp-buffer emulation path.
    pub supports_base_vertex: bool,
}

impl Default for GpuLimits {
    fn default() -> Self {
        Self { min_uniform_offset_alignment: 256, supports_base_vertex: true }
    }
}

/// A recording surface for one stream of GPU commands.
///
/// Command lists validate state and resolve pipelines, then feed the raw
/// calls through this trait. Recorded order is submission order. Renderpass
/// scoping is the caller's responsibility; sinks may assume begin/end pairs
/// are balanced because [`CommandList`](crate::gpu::CommandList) enforces it.
pub trait CommandSink {
    /// Begins a renderpass instance over `framebuffer`.
    fn begin_render_pass(
        &mut self,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        render_area: ScissorRect,
        clear_values: &[ClearValue],
    );

    /// Advances to the next subpass.
    fn next_subpass(&mut self);

    /// Ends the current renderpass instance.
    fn end_render_pass(&mut self);

    /// Binds a baked pipeline.
    fn bind_pipeline(&mut self, pipeline: PipelineId);

    /// Binds a descriptor set at `set_index` with per-draw dynamic offsets.
    fn bind_descriptor_set(&mut self, set_index: u32, set: DescriptorSetId, dynamic_offsets: &[u32]);

    /// Binds a vertex buffer at a binding slot.
    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferId, offset: u64);

    /// Binds the index buffer.
    fn bind_index_buffer(&mut self, buffer: BufferId, offset: u64, format: IndexFormat);

    /// Pushes a dynamic viewport.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Pushes a dynamic scissor rectangle.
    fn set_scissor(&mut self, scissor: ScissorRect);

    /// Pushes dynamic blend constants.
    fn set_blend_constants(&mut self, constants: [f32; 4]);

    /// Pushes a dynamic line width.
    fn set_line_width(&mut self, width: f32);

    /// Pushes dynamic depth-bias parameters.
    fn set_depth_bias(&mut self, constant: f32, slope: f32, clamp: f32);

    /// Pushes a dynamic depth-bounds range.
    fn set_depth_bounds(&mut self, min: f32, max: f32);

    /// Pushes a dynamic stencil compare mask.
    fn set_stencil_compare_mask(&mut self, mask: u32);

    /// Pushes a dynamic stencil write mask.
    fn set_stencil_write_mask(&mut self, mask: u32);

    /// Pushes a dynamic stencil reference.
    fn set_stencil_reference(&mut self, reference: u32);

    /// Draws unindexed vertices.
    fn draw(&mut self, first_vertex: u32, num_vertices: u32, first_instance: u32, num_instances: u32);

    /// Draws indexed vertices. `index_offset` is in indices, not bytes.
    fn draw_indexed(
        &mut self,
        num_indices: u32,
        index_offset: u32,
        vertex_offset: i32,
        first_instance: u32,
        num_instances: u32,
    );

    /// Downcast support so backends can recover their concrete sink at
    /// submit time.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// The single boundary between the core and a concrete graphics API.
///
/// Implementations: the wgpu backend (primary) and the headless recording
/// backend (secondary). All methods take `&self`; backends use interior
/// mutability for their registries, and only the render thread calls in.
pub trait GpuBackend: Send + Sync + Debug + 'static {
    // --- Resources ---

    /// Creates a buffer. Returns `Err(ResourceError::OutOfMemory)` when the
    /// device cannot satisfy the allocation.
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer immediately. Callers route through the device
    /// release list instead of calling this mid-frame.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes bytes into a buffer at `offset`.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Copies a byte range between buffers.
    fn copy_buffer_to_buffer(
        &self,
        src: BufferId,
        src_offset: u64,
        dst: BufferId,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError>;

    /// Creates a texture.
    fn create_texture(&self, desc: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a texture immediately.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Uploads texel data into a texture region.
    fn write_texture(
        &self,
        id: TextureId,
        data: &[u8],
        bytes_per_row: Option<u32>,
        origin: Origin3D,
        size: Extent3D,
    ) -> Result<(), ResourceError>;

    /// Creates a view over a texture.
    fn create_texture_view(
        &self,
        texture: TextureId,
        desc: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError>;

    /// Destroys a texture view immediately.
    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError>;

    /// Creates a sampler.
    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler immediately.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /// Compiles a shader module. Compilation failures carry the driver log.
    fn create_shader_module(
        &self,
        desc: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError>;

    /// Destroys a shader module immediately.
    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError>;

    /// Links modules and set layouts into a program.
    fn create_program(&self, desc: &ProgramDescriptor) -> Result<ProgramId, ResourceError>;

    /// Destroys a program immediately.
    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError>;

    /// Creates a renderpass object.
    fn create_render_pass(&self, info: &RenderPassInfo) -> Result<RenderPassId, ResourceError>;

    /// Destroys a renderpass immediately.
    fn destroy_render_pass(&self, id: RenderPassId) -> Result<(), ResourceError>;

    /// Creates a framebuffer.
    fn create_framebuffer(&self, desc: &FramebufferDescriptor) -> Result<FramebufferId, ResourceError>;

    /// Destroys a framebuffer immediately.
    fn destroy_framebuffer(&self, id: FramebufferId) -> Result<(), ResourceError>;

    /// Bakes a pipeline from state + program + layout + renderpass.
    fn create_pipeline(&self, desc: &PipelineDescriptor) -> Result<PipelineId, ResourceError>;

    /// Destroys a pipeline immediately.
    fn destroy_pipeline(&self, id: PipelineId) -> Result<(), ResourceError>;

    /// Allocates a descriptor set against set `set_index` of `program`.
    fn allocate_descriptor_set(
        &self,
        program: ProgramId,
        set_index: u32,
        info: &DescriptorSetInfo,
    ) -> Result<DescriptorSetId, ResourceError>;

    /// Frees a descriptor set immediately.
    fn free_descriptor_set(&self, id: DescriptorSetId) -> Result<(), ResourceError>;

    // --- Recording and submission ---

    /// Creates a fresh command recording surface.
    fn create_command_sink(&self, label: Option<&str>) -> Box<dyn CommandSink>;

    /// Submits a finished recording for execution.
    fn submit(&self, sink: Box<dyn CommandSink>);

    // --- Frame pacing ---

    /// Starts a frame. Returns `false` when the frame must be skipped
    /// (surface unavailable or the frame-slot fence has not retired).
    fn begin_frame(&self) -> bool;

    /// Ends the frame and presents if a surface is attached.
    fn end_frame(&self);

    /// Blocks until the GPU is idle. Used at shutdown and on window resize.
    fn wait_idle(&self);

    // --- Capabilities ---

    /// Device limits relevant to the core.
    fn limits(&self) -> GpuLimits;

    /// The backend's API.
    fn backend_type(&self) -> GpuBackendType;

    /// Adapter identification.
    fn adapter_info(&self) -> AdapterInfo;

    /// The surface's preferred color format, when a surface exists.
    fn surface_format(&self) -> Option<TextureFormat>;

    /// Downcast support for backend-specific plumbing (surface resize, test
    /// assertions).
    fn as_any(&self) -> &dyn std::any::Any;
}
