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

//! Data structures describing GPU buffer resources.

use crate::onyx_bitflags;
use std::borrow::Cow;

onyx_bitflags! {
    /// A set of flags describing the allowed usages of a buffer.
    ///
    /// The backend uses these to place the buffer in the right memory class
    /// and to validate bindings.
    pub struct BufferUsage: u32 {
        /// The buffer can be the source of a copy operation.
        const TRANSFER_SRC = 1 << 0;
        /// The buffer can be the destination of a copy operation.
        const TRANSFER_DST = 1 << 1;
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 2;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 3;
        /// The buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 4;
        /// The buffer can be bound as a storage buffer.
        const STORAGE = 1 << 5;
        /// The buffer can source indirect draw parameters.
        const INDIRECT = 1 << 6;
    }
}

onyx_bitflags! {
    /// Memory property requirements for a buffer allocation.
    pub struct MemoryProps: u32 {
        /// Device-local memory, fastest for GPU access.
        const DEVICE_LOCAL = 1 << 0;
        /// Host-visible memory the CPU can write into.
        const HOST_VISIBLE = 1 << 1;
        /// Host writes become visible without explicit flushes.
        const HOST_COHERENT = 1 << 2;
        /// Host-cached memory, faster for CPU read-back.
        const HOST_CACHED = 1 << 3;
    }
}

impl MemoryProps {
    /// `true` when the CPU may write directly into the allocation.
    pub const fn is_mappable(&self) -> bool {
        self.contains(Self::HOST_VISIBLE)
    }
}

/// A descriptor used to create a [`BufferId`](crate::gpu::BufferId).
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// Allowed usages of the buffer.
    pub usage: BufferUsage,
    /// Memory placement requirements. Host-visible buffers stay mapped for
    /// their whole lifetime.
    pub memory_props: MemoryProps,
}

impl<'a> BufferDescriptor<'a> {
    /// Creates a descriptor with a static label.
    pub fn new(label: &'a str, size: u64, usage: BufferUsage, memory_props: MemoryProps) -> Self {
        Self { label: Some(Cow::Borrowed(label)), size, usage, memory_props }
    }
}

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two; zero alignment is treated as one.
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        value
    } else {
        (value + alignment - 1) & !(alignment - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiples() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn align_up_degenerate_alignment() {
        assert_eq!(align_up(37, 0), 37);
        assert_eq!(align_up(37, 1), 37);
    }

    #[test]
    fn mappable_requires_host_visible() {
        assert!(MemoryProps::HOST_VISIBLE.is_mappable());
        assert!((MemoryProps::HOST_VISIBLE | MemoryProps::HOST_COHERENT).is_mappable());
        assert!(!MemoryProps::DEVICE_LOCAL.is_mappable());
    }
}
