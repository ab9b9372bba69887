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

//! Window/surface plumbing between winit and the wgpu backend.
//!
//! The application owns the winit event loop; this module owns the window
//! handle, backend construction against its surface, and the resize path:
//! `mark_resized` queues the new size and the backend reconfigures its
//! swapchain at the next `begin_frame` instead of mid-frame.

use crate::wgpu::WgpuBackend;
use onyx_core::gpu::{GpuDevice, TextureId};
use std::sync::Arc;
use winit::dpi::LogicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

/// A window with a wgpu surface attached.
pub struct GpuWindow {
    window: Arc<Window>,
}

impl GpuWindow {
    /// Opens a window on the running event loop.
    pub fn new(
        event_loop: &ActiveEventLoop,
        title: &str,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self> {
        let attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width, height));
        let window = event_loop
            .create_window(attributes)
            .map_err(|err| anyhow::anyhow!("failed to create window: {err}"))?;
        Ok(Self { window: Arc::new(window) })
    }

    /// The underlying winit window.
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Current inner size in physical pixels, at least 1x1.
    pub fn size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width.max(1), size.height.max(1))
    }

    /// Builds a wgpu backend presenting to this window.
    pub fn create_backend(&self, vsync: bool) -> anyhow::Result<WgpuBackend> {
        let (width, height) = self.size();
        WgpuBackend::for_window(self.window.clone(), width, height, vsync)
    }

    /// Schedules another redraw.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// The raw window handle, for integrations that bring their own
    /// surface.
    pub fn raw_window_handle(
        &self,
    ) -> Result<raw_window_handle::WindowHandle<'_>, raw_window_handle::HandleError> {
        use raw_window_handle::HasWindowHandle;
        self.window.window_handle()
    }

    /// Notifies the device's backend that the window resized. The swapchain
    /// reconfigures at the next `begin_frame`.
    pub fn mark_resized(&self, device: &GpuDevice, width: u32, height: u32) {
        if let Some(backend) = device.backend().as_any().downcast_ref::<WgpuBackend>() {
            backend.mark_resized(width, height);
        }
    }
}

/// Selects the texture the wgpu backend copies to the surface at
/// `end_frame`. No-op on other backends.
pub fn set_present_source(device: &GpuDevice, texture: TextureId) {
    if let Some(backend) = device.backend().as_any().downcast_ref::<WgpuBackend>() {
        backend.set_present_source(texture);
    }
}

/// The surface size of a device backed by a window, when there is one.
pub fn surface_size(device: &GpuDevice) -> Option<(u32, u32)> {
    device
        .backend()
        .as_any()
        .downcast_ref::<WgpuBackend>()
        .and_then(WgpuBackend::surface_size)
}
