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

//! Vertex buffer layouts and index formats.

use crate::utils::hash;

/// The maximum number of vertex buffer bindings in a layout set.
pub const MAX_VERTEX_BINDINGS: usize = 16;
/// The maximum number of vertex attributes in a layout set.
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// The data type of indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit unsigned indices.
    Uint16,
    /// 32-bit unsigned indices.
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            Self::Uint16 => 2,
            Self::Uint32 => 4,
        }
    }
}

/// The format of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// One 32-bit float.
    Float32,
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
    /// One 32-bit unsigned integer.
    Uint32,
    /// Four unsigned-normalized bytes.
    Unorm8x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub const fn size(&self) -> u64 {
        match self {
            Self::Float32 | Self::Uint32 | Self::Unorm8x4 => 4,
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
        }
    }
}

/// How often a vertex buffer binding advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Advance per vertex.
    #[default]
    Vertex,
    /// Advance per instance.
    Instance,
}

/// One declared vertex buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    /// Byte distance between consecutive elements.
    pub stride: u64,
    /// Per-vertex or per-instance stepping.
    pub step_mode: VertexStepMode,
}

/// One declared vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// The buffer binding the attribute reads from. Must refer to a declared
    /// binding.
    pub binding: u32,
    /// The attribute's data format.
    pub format: VertexFormat,
    /// Byte offset of the attribute from the start of the element.
    pub offset: u64,
}

/// A full vertex-fetch description: buffer bindings plus attributes.
///
/// Shader locations are assigned in attribute declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayoutSet {
    bindings: Vec<VertexBinding>,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayoutSet {
    /// Creates an empty layout set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a per-vertex buffer binding and returns its index.
    pub fn add_binding(&mut self, stride: u64) -> u32 {
        self.add_binding_with_rate(stride, VertexStepMode::Vertex)
    }

    /// Declares a buffer binding with an explicit step mode and returns its
    /// index.
    pub fn add_binding_with_rate(&mut self, stride: u64, step_mode: VertexStepMode) -> u32 {
        debug_assert!(self.bindings.len() < MAX_VERTEX_BINDINGS, "too many vertex bindings");
        self.bindings.push(VertexBinding { stride, step_mode });
        (self.bindings.len() - 1) as u32
    }

    /// Declares an attribute read from `binding` at `offset`.
    ///
    /// Declaring an attribute against an unknown binding is a programmer
    /// error.
    pub fn add_attribute(&mut self, binding: u32, format: VertexFormat, offset: u64) {
        debug_assert!((binding as usize) < self.bindings.len(), "attribute references undeclared binding");
        debug_assert!(self.attributes.len() < MAX_VERTEX_ATTRIBUTES, "too many vertex attributes");
        self.attributes.push(VertexAttribute { binding, format, offset });
    }

    /// The declared buffer bindings.
    pub fn bindings(&self) -> &[VertexBinding] {
        &self.bindings
    }

    /// The declared attributes.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// The stride of binding `index`, or 0 when undeclared.
    pub fn binding_stride(&self, index: u32) -> u64 {
        self.bindings.get(index as usize).map_or(0, |b| b.stride)
    }

    /// Folds the layout into a cache key.
    pub fn hash64(&self, mut state: u64) -> u64 {
        state = hash::add_usize(state, self.bindings.len());
        for binding in &self.bindings {
            state = hash::add_u64(state, binding.stride);
            state = hash::add_u32(state, binding.step_mode as u32);
        }
        state = hash::add_usize(state, self.attributes.len());
        for attr in &self.attributes {
            state = hash::add_u32(state, attr.binding);
            state = hash::add_u32(state, attr.format as u32);
            state = hash::add_u64(state, attr.offset);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash::SEED;

    #[test]
    fn bindings_and_attributes_accumulate() {
        let mut layout = VertexLayoutSet::new();
        let binding = layout.add_binding(20);
        layout.add_attribute(binding, VertexFormat::Float32x2, 0);
        layout.add_attribute(binding, VertexFormat::Float32x2, 8);
        layout.add_attribute(binding, VertexFormat::Unorm8x4, 16);

        assert_eq!(binding, 0);
        assert_eq!(layout.bindings().len(), 1);
        assert_eq!(layout.attributes().len(), 3);
        assert_eq!(layout.binding_stride(0), 20);
        assert_eq!(layout.binding_stride(3), 0);
    }

    #[test]
    fn hash_distinguishes_layouts() {
        let mut a = VertexLayoutSet::new();
        let b0 = a.add_binding(12);
        a.add_attribute(b0, VertexFormat::Float32x3, 0);

        let mut b = VertexLayoutSet::new();
        let b1 = b.add_binding(16);
        b.add_attribute(b1, VertexFormat::Float32x4, 0);

        assert_ne!(a.hash64(SEED), b.hash64(SEED));
        assert_eq!(a.hash64(SEED), a.clone().hash64(SEED));
    }
}
