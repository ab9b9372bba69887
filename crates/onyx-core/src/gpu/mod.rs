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

//! The GPU command-submission core.
//!
//! Layering, bottom up: typed handles and descriptor structs; the
//! [`GpuBackend`] boundary (one trait, concrete implementations per API);
//! the [`GpuDevice`] frontend owning frame bookkeeping, the release list,
//! and the resource caches; [`FrameRingBuffer`] for per-frame host-visible
//! data; [`CommandList`] recording; [`RenderQueue`] sorted submission.

mod backend;
mod buffer;
mod cache;
mod command_list;
mod descriptor;
mod device;
mod handle;
mod pipeline;
mod queue;
mod render_pass;
mod ring_buffer;
mod settings;
mod shader;
mod texture;
mod vertex;

#[cfg(test)]
pub(crate) mod test_backend;

pub use backend::{
    AdapterInfo, CommandSink, FramebufferDescriptor, GpuBackend, GpuBackendType, GpuDeviceType,
    GpuLimits,
};
pub use buffer::{align_up, BufferDescriptor, BufferUsage, MemoryProps};
pub use command_list::{CommandList, RenderArea};
pub use descriptor::{
    BufferBinding, DescriptorBinding, DescriptorBindingData, DescriptorSetInfo,
    ImageSamplerBinding,
};
pub use device::{FrameInfo, GpuDevice};
pub use handle::{
    BufferId, DescriptorSetId, FramebufferId, GpuHandle, PipelineId, ProgramId, RenderPassId,
    SamplerId, ShaderModuleId, TextureId, TextureViewId, VertexLayoutId,
};
pub use pipeline::{
    BlendFactor, BlendOp, BlendTargetState, ColorWrites, CompareOp, CullFace, DepthBias,
    DepthBounds, DrawMode, DynamicStateFlags, FillMode, FrontFace, LogicOp, PipelineDescriptor,
    PipelineState, StencilFaceOps, StencilOp, MAX_COLOR_TARGETS,
};
pub use queue::{
    set_index, DescSetBind, DrawRange, QueueSortFlags, RenderCommand, RenderQueue,
    VertexBufferBinding,
};
pub use render_pass::{
    AttachmentInfo, AttachmentRef, ClearValue, ImageLayout, RenderPassInfo, SubpassDependency,
    SubpassInfo, MAX_ATTACHMENTS, MAX_SUBPASSES, SUBPASS_EXTERNAL,
};
pub use ring_buffer::FrameRingBuffer;
pub use settings::{RenderStats, RendererSettings};
pub use shader::{
    DescriptorType, ProgramDescriptor, SetLayout, SetLayoutBinding, ShaderModuleDescriptor,
    ShaderSource, ShaderStage, ShaderStageFlags, MAX_DESCRIPTOR_SETS,
};
pub use texture::{
    AddressMode, FilterMode, SampleCount, SamplerDescriptor, TextureAspect, TextureDescriptor,
    TextureFlags, TextureFormat, TextureViewDescriptor,
};
pub use vertex::{
    IndexFormat, VertexAttribute, VertexBinding, VertexFormat, VertexLayoutSet, VertexStepMode,
    MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_BINDINGS,
};
