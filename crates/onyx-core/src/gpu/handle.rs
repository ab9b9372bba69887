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

//! Opaque typed handles for every GPU object kind.
//!
//! The [`GpuDevice`](crate::gpu::GpuDevice) is the exclusive owner of the
//! objects behind these IDs; everything else holds non-owning copies.
//! Destruction goes through the device release list, never directly.

macro_rules! gpu_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub usize);
    };
}

gpu_id!(
    /// An opaque handle to a GPU buffer.
    BufferId
);
gpu_id!(
    /// An opaque handle to a GPU texture.
    TextureId
);
gpu_id!(
    /// An opaque handle to a view over a GPU texture.
    TextureViewId
);
gpu_id!(
    /// An opaque handle to a texture sampler.
    SamplerId
);
gpu_id!(
    /// An opaque handle to a compiled shader module.
    ShaderModuleId
);
gpu_id!(
    /// An opaque handle to a linked shader program (modules + set layouts).
    ProgramId
);
gpu_id!(
    /// An opaque handle to a renderpass object.
    RenderPassId
);
gpu_id!(
    /// An opaque handle to a framebuffer object.
    FramebufferId
);
gpu_id!(
    /// An opaque handle to a baked graphics pipeline.
    PipelineId
);
gpu_id!(
    /// An opaque handle to an allocated descriptor set.
    DescriptorSetId
);
gpu_id!(
    /// An opaque handle to a registered vertex layout set.
    ///
    /// Vertex layouts are CPU-side descriptions registered with the device so
    /// pipeline state can reference them by ID.
    VertexLayoutId
);

/// A kind-tagged handle, the currency of the device release list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuHandle {
    /// A buffer handle.
    Buffer(BufferId),
    /// A texture handle.
    Texture(TextureId),
    /// A texture-view handle.
    TextureView(TextureViewId),
    /// A sampler handle.
    Sampler(SamplerId),
    /// A shader-module handle.
    ShaderModule(ShaderModuleId),
    /// A program handle.
    Program(ProgramId),
    /// A renderpass handle.
    RenderPass(RenderPassId),
    /// A framebuffer handle.
    Framebuffer(FramebufferId),
    /// A pipeline handle.
    Pipeline(PipelineId),
    /// A descriptor-set handle.
    DescriptorSet(DescriptorSetId),
}

macro_rules! handle_from {
    ($id:ident => $variant:ident) => {
        impl From<$id> for GpuHandle {
            fn from(id: $id) -> Self {
                GpuHandle::$variant(id)
            }
        }
    };
}

handle_from!(BufferId => Buffer);
handle_from!(TextureId => Texture);
handle_from!(TextureViewId => TextureView);
handle_from!(SamplerId => Sampler);
handle_from!(ShaderModuleId => ShaderModule);
handle_from!(ProgramId => Program);
handle_from!(RenderPassId => RenderPass);
handle_from!(FramebufferId => Framebuffer);
handle_from!(PipelineId => Pipeline);
handle_from!(DescriptorSetId => DescriptorSet);
