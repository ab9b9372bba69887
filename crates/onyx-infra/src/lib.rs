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

//! # Onyx Infra
//!
//! Concrete implementations of the core's [`GpuBackend`] boundary: the
//! [`WgpuBackend`] (primary — wgpu fronts Vulkan, Metal, DX12, and GL-ES)
//! and the [`HeadlessBackend`] (secondary — records command streams,
//! used headless and across the workspace's tests), plus winit
//! window/surface plumbing.
//!
//! [`GpuBackend`]: onyx_core::gpu::GpuBackend

#![warn(missing_docs)]

pub mod headless;
pub mod wgpu;
pub mod window;

pub use headless::{HeadlessBackend, HeadlessSink, RecordedOp};
pub use self::wgpu::WgpuBackend;
pub use window::GpuWindow;
