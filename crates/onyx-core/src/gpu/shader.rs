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

//! Shader modules, programs, and descriptor-set layouts.

use crate::gpu::ShaderModuleId;
use crate::onyx_bitflags;
use std::borrow::Cow;

/// The maximum number of descriptor sets a program may declare.
pub const MAX_DESCRIPTOR_SETS: usize = 4;

/// The programmable stage a shader module targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex shader stage.
    Vertex,
    /// The fragment shader stage.
    Fragment,
}

onyx_bitflags! {
    /// Which shader stages can access a resource binding.
    pub struct ShaderStageFlags: u32 {
        /// The vertex stage.
        const VERTEX = 1 << 0;
        /// The fragment stage.
        const FRAGMENT = 1 << 1;
        /// Both graphics stages.
        const VERTEX_FRAGMENT = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// Shader source payload accepted by the backend.
#[derive(Debug, Clone)]
pub enum ShaderSource<'a> {
    /// WGSL source text.
    Wgsl(Cow<'a, str>),
    /// SPIR-V words.
    SpirV(Cow<'a, [u32]>),
}

/// A descriptor used to create a [`ShaderModuleId`].
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The stage the module is compiled for.
    pub stage: ShaderStage,
    /// The entry point function name.
    pub entry_point: Cow<'a, str>,
    /// The source payload.
    pub source: ShaderSource<'a>,
}

/// The resource class of a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// A uniform buffer.
    UniformBuffer,
    /// A uniform buffer addressed with per-draw dynamic offsets.
    DynamicUniformBuffer,
    /// A combined image + sampler.
    CombinedImageSampler,
    /// A texel buffer view.
    BufferView,
    /// A subpass input attachment.
    InputAttachment,
}

/// A single binding inside a descriptor-set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetLayoutBinding {
    /// The binding index within the set.
    pub binding: u32,
    /// The resource class bound here.
    pub ty: DescriptorType,
    /// Array element count, at least 1.
    pub count: u32,
    /// The stages that may access the binding.
    pub stages: ShaderStageFlags,
}

/// The layout of one descriptor set: an ordered list of bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetLayout {
    /// The bindings declared in this set.
    pub bindings: Vec<SetLayoutBinding>,
}

/// A descriptor used to create a [`ProgramId`](crate::gpu::ProgramId).
///
/// A program owns an ordered list of modules and the descriptor-set layouts
/// its pipeline layout is built from. Layout declarations accumulate through
/// the builder methods, mirroring how materials declare their bindings one at
/// a time before the program links.
#[derive(Debug, Clone)]
pub struct ProgramDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The modules composing the program, in stage order.
    pub modules: Vec<ShaderModuleId>,
    /// The declared descriptor-set layouts. Index = set number.
    pub set_layouts: Vec<SetLayout>,
}

impl<'a> ProgramDescriptor<'a> {
    /// Starts a program descriptor with `num_sets` empty set layouts.
    ///
    /// `num_sets` is clamped to [`MAX_DESCRIPTOR_SETS`].
    pub fn new(label: &'a str, modules: &[ShaderModuleId], num_sets: usize) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            modules: modules.to_vec(),
            set_layouts: vec![SetLayout::default(); num_sets.min(MAX_DESCRIPTOR_SETS)],
        }
    }

    /// Declares a uniform buffer binding on `set`.
    #[must_use]
    pub fn with_uniform_buffer(
        self,
        set: usize,
        binding: u32,
        count: u32,
        stages: ShaderStageFlags,
    ) -> Self {
        self.with_binding(set, binding, DescriptorType::UniformBuffer, count, stages)
    }

    /// Declares a combined image-sampler binding on `set`.
    #[must_use]
    pub fn with_image_sampler(
        self,
        set: usize,
        binding: u32,
        count: u32,
        stages: ShaderStageFlags,
    ) -> Self {
        self.with_binding(set, binding, DescriptorType::CombinedImageSampler, count, stages)
    }

    /// Declares an arbitrary binding on `set`.
    #[must_use]
    pub fn with_binding(
        mut self,
        set: usize,
        binding: u32,
        ty: DescriptorType,
        count: u32,
        stages: ShaderStageFlags,
    ) -> Self {
        debug_assert!(set < self.set_layouts.len(), "set index out of declared range");
        if let Some(layout) = self.set_layouts.get_mut(set) {
            layout.bindings.push(SetLayoutBinding { binding, ty, count, stages });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_builder_accumulates_bindings() {
        let modules = [ShaderModuleId(1), ShaderModuleId(2)];
        let desc = ProgramDescriptor::new("painter", &modules, 2)
            .with_uniform_buffer(0, 0, 1, ShaderStageFlags::VERTEX)
            .with_image_sampler(1, 0, 1, ShaderStageFlags::FRAGMENT);

        assert_eq!(desc.set_layouts.len(), 2);
        assert_eq!(desc.set_layouts[0].bindings.len(), 1);
        assert_eq!(desc.set_layouts[0].bindings[0].ty, DescriptorType::UniformBuffer);
        assert_eq!(desc.set_layouts[1].bindings[0].ty, DescriptorType::CombinedImageSampler);
    }

    #[test]
    fn set_count_is_clamped() {
        let desc = ProgramDescriptor::new("too-many", &[], 9);
        assert_eq!(desc.set_layouts.len(), MAX_DESCRIPTOR_SETS);
    }
}
