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

//! Descriptor-set contents: what is bound where. Hashable so allocated sets
//! can be cached and shared between draws.

use crate::gpu::{BufferId, SamplerId, TextureViewId};
use crate::utils::hash;

/// One buffer range bound to a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    /// The bound buffer.
    pub buffer: BufferId,
    /// Byte offset of the bound range.
    pub offset: u64,
    /// Byte size of the bound range.
    pub size: u64,
}

/// One combined image-sampler bound to a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSamplerBinding {
    /// The bound texture view.
    pub view: TextureViewId,
    /// The bound sampler.
    pub sampler: SamplerId,
}

/// The payload of one descriptor binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorBindingData {
    /// Uniform buffer ranges.
    UniformBuffers(Vec<BufferBinding>),
    /// Uniform buffer ranges addressed with per-draw dynamic offsets.
    DynamicUniformBuffers(Vec<BufferBinding>),
    /// Combined image-samplers.
    ImageSamplers(Vec<ImageSamplerBinding>),
    /// Subpass input attachments.
    InputAttachments(Vec<TextureViewId>),
}

/// One binding inside a descriptor set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorBinding {
    /// Binding index within the set.
    pub binding: u32,
    /// First array element written.
    pub array_start: u32,
    /// The bound resources.
    pub data: DescriptorBindingData,
}

/// The full contents of one descriptor set.
///
/// Looked up in the descriptor-set cache before allocation so identical
/// contents share one allocated set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSetInfo {
    /// The bindings, in declaration order.
    pub bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetInfo {
    /// Creates an empty set description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a single texture + sampler pair at `binding`.
    pub fn add_image_sampler(&mut self, binding: u32, view: TextureViewId, sampler: SamplerId) {
        self.bindings.push(DescriptorBinding {
            binding,
            array_start: 0,
            data: DescriptorBindingData::ImageSamplers(vec![ImageSamplerBinding { view, sampler }]),
        });
    }

    /// Binds a single uniform-buffer range at `binding`.
    pub fn add_uniform_buffer(&mut self, binding: u32, buffer: BufferId, offset: u64, size: u64) {
        self.bindings.push(DescriptorBinding {
            binding,
            array_start: 0,
            data: DescriptorBindingData::UniformBuffers(vec![BufferBinding { buffer, offset, size }]),
        });
    }

    /// `true` when any binding references `view`.
    pub fn references_view(&self, view: TextureViewId) -> bool {
        self.bindings.iter().any(|b| match &b.data {
            DescriptorBindingData::ImageSamplers(images) => images.iter().any(|i| i.view == view),
            DescriptorBindingData::InputAttachments(views) => views.contains(&view),
            _ => false,
        })
    }

    /// Folds the set contents into a cache key.
    pub fn hash64(&self) -> u64 {
        let mut state = hash::SEED;
        state = hash::add_usize(state, self.bindings.len());
        for binding in &self.bindings {
            state = hash::add_u32(state, binding.binding);
            state = hash::add_u32(state, binding.array_start);
            match &binding.data {
                DescriptorBindingData::UniformBuffers(buffers) => {
                    state = hash::add_u32(state, 0);
                    state = hash::add_usize(state, buffers.len());
                    for b in buffers {
                        state = hash::add_usize(state, b.buffer.0);
                        state = hash::add_u64(state, b.offset);
                        state = hash::add_u64(state, b.size);
                    }
                }
                DescriptorBindingData::DynamicUniformBuffers(buffers) => {
                    state = hash::add_u32(state, 1);
                    state = hash::add_usize(state, buffers.len());
                    for b in buffers {
                        state = hash::add_usize(state, b.buffer.0);
                        state = hash::add_u64(state, b.offset);
                        state = hash::add_u64(state, b.size);
                    }
                }
                DescriptorBindingData::ImageSamplers(images) => {
                    state = hash::add_u32(state, 2);
                    state = hash::add_usize(state, images.len());
                    for i in images {
                        state = hash::add_usize(state, i.view.0);
                        state = hash::add_usize(state, i.sampler.0);
                    }
                }
                DescriptorBindingData::InputAttachments(views) => {
                    state = hash::add_u32(state, 3);
                    state = hash::add_usize(state, views.len());
                    for v in views {
                        state = hash::add_usize(state, v.0);
                    }
                }
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_contents_hash_equal() {
        let mut a = DescriptorSetInfo::new();
        a.add_image_sampler(0, TextureViewId(5), SamplerId(1));
        let mut b = DescriptorSetInfo::new();
        b.add_image_sampler(0, TextureViewId(5), SamplerId(1));
        assert_eq!(a.hash64(), b.hash64());
        assert_eq!(a, b);
    }

    #[test]
    fn different_handles_hash_differently() {
        let mut a = DescriptorSetInfo::new();
        a.add_image_sampler(0, TextureViewId(5), SamplerId(1));
        let mut b = DescriptorSetInfo::new();
        b.add_image_sampler(0, TextureViewId(6), SamplerId(1));
        assert_ne!(a.hash64(), b.hash64());
    }

    #[test]
    fn buffer_offsets_participate_in_the_key() {
        let mut a = DescriptorSetInfo::new();
        a.add_uniform_buffer(0, BufferId(2), 0, 256);
        let mut b = DescriptorSetInfo::new();
        b.add_uniform_buffer(0, BufferId(2), 256, 256);
        assert_ne!(a.hash64(), b.hash64());
    }

    #[test]
    fn references_view_finds_bound_views() {
        let mut info = DescriptorSetInfo::new();
        info.add_uniform_buffer(0, BufferId(1), 0, 64);
        info.add_image_sampler(1, TextureViewId(7), SamplerId(0));
        assert!(info.references_view(TextureViewId(7)));
        assert!(!info.references_view(TextureViewId(8)));
    }
}
