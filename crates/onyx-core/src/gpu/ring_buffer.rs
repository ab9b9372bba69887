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

//! A host-visible buffer whose active slice rotates with the frame index.
//!
//! One backing allocation of `align_up(element_size) * num_frame_indices`
//! bytes holds one slice per frame slot. The CPU only ever writes the slice
//! belonging to the active frame; the GPU reads a slice only after the
//! previous use of that slot has been fenced, so the rotation needs no
//! locking. Slot data reaches the GPU through [`flush_current`]
//! (`flush_current`) before the frame's fence is signalled.
//!
//! [`flush_current`]: FrameRingBuffer::flush_current

use crate::error::ResourceError;
use crate::gpu::{align_up, BufferDescriptor, BufferId, BufferUsage, FrameInfo, GpuDevice, MemoryProps};

/// A frame-sliced host-visible buffer. See the module docs.
#[derive(Debug)]
pub struct FrameRingBuffer {
    buffer: BufferId,
    element_size: u64,
    aligned_element_size: u64,
    real_size: u64,
    min_alignment: u64,
    staging: Vec<u8>,
    label: &'static str,
}

impl FrameRingBuffer {
    /// Allocates a ring of `element_size`-byte slices, one per frame slot.
    ///
    /// Uniform rings align slices to the device's minimum uniform-offset
    /// alignment; other usages align to 4.
    pub fn new(
        device: &mut GpuDevice,
        element_size: u64,
        usage: BufferUsage,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let min_alignment = if usage.contains(BufferUsage::UNIFORM) {
            device.limits().min_uniform_offset_alignment
        } else {
            4
        };
        let aligned_element_size = align_up(element_size, min_alignment);
        let slots = u64::from(device.frame_info().num_frame_indices);
        let real_size = aligned_element_size * slots;

        let buffer = device.create_buffer(&BufferDescriptor::new(
            label,
            real_size,
            usage | BufferUsage::TRANSFER_DST,
            MemoryProps::HOST_VISIBLE | MemoryProps::HOST_COHERENT,
        ))?;

        Ok(Self {
            buffer,
            element_size,
            aligned_element_size,
            real_size,
            min_alignment,
            staging: vec![0; element_size as usize],
            label,
        })
    }

    /// The backing buffer, for bindings.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Logical slice size in bytes.
    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// Total backing allocation size in bytes.
    pub fn real_size(&self) -> u64 {
        self.real_size
    }

    /// The slice alignment in force.
    pub fn min_alignment(&self) -> u64 {
        self.min_alignment
    }

    /// Byte offset of the slice belonging to `frame`.
    pub fn offset(&self, frame: &FrameInfo) -> u64 {
        self.aligned_element_size * u64::from(frame.frame_index)
    }

    /// The writable CPU window for the active frame's slice.
    pub fn current_slice(&mut self) -> &mut [u8] {
        &mut self.staging
    }

    /// Makes the active slice's window visible to the GPU.
    ///
    /// Must run before the frame's fence is signalled; the engine calls it
    /// after per-frame recording, before submission.
    pub fn flush_current(&self, device: &GpuDevice) -> Result<(), ResourceError> {
        let frame = device.frame_info();
        device.write_buffer(self.buffer, self.offset(&frame), &self.staging)
    }

    /// Releases the backing buffer through the device release list.
    pub fn destroy(self, device: &mut GpuDevice) {
        log::trace!("FrameRingBuffer({}): releasing backing buffer", self.label);
        device.release(self.buffer);
    }
}
