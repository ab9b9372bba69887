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

//! The per-frame driver.
//!
//! One renderer owns the device and every view. A frame is a plain
//! pipeline: `begin_frame` (skip the frame when it returns false) →
//! callers record into view queues → `submit_view` per view (camera
//! upload, renderpass, queues flushed opaque → transparent → overlay-scene
//! → screen-overlay) → `end_frame` (present, cache aging, release-list
//! drain). View resize and delete requests queue up and apply at the next
//! frame boundary so GPU objects never change while a frame is recording.

use crate::camera::{Camera, CameraUniform};
use crate::view::{RenderView, ViewFlags, ViewId, ViewStore};
use onyx_core::error::{RenderError, ResourceError};
use onyx_core::gpu::{
    AttachmentInfo, AttachmentRef, BufferUsage, ClearValue, CommandList, DescSetBind,
    DescriptorSetInfo, FrameRingBuffer, GpuBackend, GpuDevice, ImageLayout, RenderPassInfo,
    RenderQueue, RendererSettings, SubpassInfo, TextureDescriptor, TextureFlags, TextureFormat,
    TextureId,
};
use onyx_core::math::{Extent3D, Rgba};

/// Loads renderer settings from a JSON file; missing files fall back to
/// defaults so a fresh checkout runs without configuration.
pub fn load_settings(path: &std::path::Path) -> anyhow::Result<RendererSettings> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no settings at {}; using defaults", path.display());
            Ok(RendererSettings::default())
        }
        Err(err) => Err(err.into()),
    }
}

/// The renderer: device + views + frame driver. See the module docs.
pub struct Renderer {
    device: GpuDevice,
    views: ViewStore,
    color_format: TextureFormat,
    pending_resizes: Vec<(ViewId, u32, u32)>,
    pending_deletes: Vec<ViewId>,
}

impl Renderer {
    /// Wraps a concrete backend with the device frontend and an empty view
    /// list. The color format of view targets follows the surface format
    /// when the backend has one.
    pub fn new(backend: Box<dyn GpuBackend>, settings: &RendererSettings) -> Self {
        let color_format = backend.surface_format().unwrap_or(TextureFormat::Rgba8Unorm);
        let device = GpuDevice::new(backend, settings);
        Self {
            device,
            views: ViewStore::default(),
            color_format,
            pending_resizes: Vec::new(),
            pending_deletes: Vec::new(),
        }
    }

    /// The device, for resource creation (painter, fonts, textures).
    pub fn device_mut(&mut self) -> &mut GpuDevice {
        &mut self.device
    }

    /// The device, read-only.
    pub fn device(&self) -> &GpuDevice {
        &self.device
    }

    /// Creates a view with its render target(s) and camera ring.
    pub fn create_view(
        &mut self,
        width: u32,
        height: u32,
        flags: ViewFlags,
    ) -> Result<ViewId, ResourceError> {
        let (color_target, depth_target) =
            self.create_view_targets(width.max(1), height.max(1), flags)?;
        let camera_ring = FrameRingBuffer::new(
            &mut self.device,
            std::mem::size_of::<CameraUniform>() as u64,
            BufferUsage::UNIFORM,
            "view-camera",
        )?;

        let view = RenderView {
            camera: Camera::screen(width as f32, height as f32),
            opaque_queue: RenderQueue::opaque(),
            transparent_queue: RenderQueue::transparent(),
            overlay_scene_queue: RenderQueue::overlay_scene(),
            screen_overlay_queue: RenderQueue::screen_overlay(),
            clear_color: Rgba::BLACK,
            width: width.max(1),
            height: height.max(1),
            flags,
            color_target,
            depth_target,
            camera_ring,
        };
        let id = self.views.insert(view);
        log::debug!("created view {id:?} ({width}x{height}, {flags:?})");
        Ok(id)
    }

    /// A view by handle; stale handles return `None`.
    pub fn view(&self, id: ViewId) -> Option<&RenderView> {
        self.views.get(id)
    }

    /// A view by handle, mutable, for queue recording and camera updates.
    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut RenderView> {
        self.views.get_mut(id)
    }

    /// Queues a resize; the target is recreated at the next frame boundary.
    pub fn queue_view_resize(&mut self, id: ViewId, width: u32, height: u32) {
        self.pending_resizes.push((id, width.max(1), height.max(1)));
    }

    /// Queues a delete; the view's resources release at the next frame
    /// boundary.
    pub fn queue_view_delete(&mut self, id: ViewId) {
        self.pending_deletes.push(id);
    }

    /// Starts a frame after applying queued view changes. Returns `false`
    /// when the caller must skip the frame entirely.
    pub fn begin_frame(&mut self) -> bool {
        self.apply_pending_view_ops();
        self.device.begin_frame()
    }

    /// Ends the frame: present, cache aging, release-list drain.
    pub fn end_frame(&mut self) {
        self.device.end_frame();
    }

    /// Renders one view: uploads its camera, opens its renderpass, and
    /// flushes the four queues in order.
    pub fn submit_view(&mut self, id: ViewId) -> Result<(), RenderError> {
        let view = self.views.get_mut(id).ok_or(ResourceError::InvalidHandle)?;

        // Camera upload for this frame's slot.
        let uniform = CameraUniform::new(&view.camera, view.width, view.height);
        view.camera_ring
            .current_slice()
            .copy_from_slice(bytemuck::bytes_of(&uniform));
        view.camera_ring.flush_current(&self.device)?;

        let frame = self.device.frame_info();
        let mut camera_binding = DescriptorSetInfo::new();
        camera_binding.add_uniform_buffer(
            0,
            view.camera_ring.buffer(),
            view.camera_ring.offset(&frame),
            view.camera_ring.element_size(),
        );
        let camera_binding = DescSetBind::Immediate(camera_binding);

        // The pass over the view's targets.
        let mut info = RenderPassInfo::new();
        let color = info.add_attachment(AttachmentInfo {
            texture: view.color_target,
            format: self.color_format,
            samples: Default::default(),
            final_layout: if view.flags.contains(ViewFlags::MAIN_OUTPUT) {
                ImageLayout::TransferSrc
            } else {
                ImageLayout::ShaderReadOnly
            },
            may_alias: false,
        });
        let mut clears = vec![ClearValue::Color(view.clear_color)];
        let mut clear_mask = 1u32 << color;
        let depth_ref = view.depth_target.map(|depth| {
            let attachment = info.add_attachment(AttachmentInfo {
                texture: depth,
                format: TextureFormat::Depth32Float,
                samples: Default::default(),
                final_layout: ImageLayout::DepthStencilAttachment,
                may_alias: false,
            });
            clears.push(ClearValue::DepthStencil { depth: 1.0, stencil: 0 });
            clear_mask |= 1 << attachment;
            AttachmentRef { attachment, layout: ImageLayout::DepthStencilAttachment }
        });
        info.add_subpass(SubpassInfo {
            input_refs: Vec::new(),
            color_refs: vec![AttachmentRef {
                attachment: color,
                layout: ImageLayout::ColorAttachment,
            }],
            depth_ref,
        });
        info.clears(clear_mask).stores(1 << color);

        let mut attachments = vec![view.color_target];
        if let Some(depth) = view.depth_target {
            attachments.push(depth);
        }

        // Borrow juggling: queues move out of the view while the device is
        // borrowed mutably by the command list.
        let mut opaque = std::mem::replace(&mut view.opaque_queue, RenderQueue::opaque());
        let mut transparent =
            std::mem::replace(&mut view.transparent_queue, RenderQueue::transparent());
        let mut overlay_scene =
            std::mem::replace(&mut view.overlay_scene_queue, RenderQueue::overlay_scene());
        let mut screen_overlay =
            std::mem::replace(&mut view.screen_overlay_queue, RenderQueue::screen_overlay());

        let mut list = CommandList::begin(&self.device, "view");
        list.set_renderpass_info(&mut self.device, &info)?;
        list.set_attachments(&mut self.device, &attachments)?;
        list.set_clear_values(&clears);
        list.begin_render_pass()?;

        opaque.flush(&mut list, &mut self.device, &camera_binding)?;
        transparent.flush(&mut list, &mut self.device, &camera_binding)?;
        overlay_scene.flush(&mut list, &mut self.device, &camera_binding)?;
        screen_overlay.flush(&mut list, &mut self.device, &camera_binding)?;

        list.end_render_pass();
        list.end(&mut self.device);

        // The drained queues go back so their capacity survives the frame.
        if let Some(view) = self.views.get_mut(id) {
            view.opaque_queue = opaque;
            view.transparent_queue = transparent;
            view.overlay_scene_queue = overlay_scene;
            view.screen_overlay_queue = screen_overlay;
        }
        Ok(())
    }

    /// The main-output view's color target, for surface presentation.
    pub fn main_output_texture(&self, id: ViewId) -> Option<TextureId> {
        self.views
            .get(id)
            .filter(|view| view.flags.contains(ViewFlags::MAIN_OUTPUT))
            .map(|view| view.color_target)
    }

    /// Waits for the GPU and destroys everything pending. Used on shutdown.
    pub fn shutdown(&mut self) {
        for view in self.views.drain() {
            release_view(&mut self.device, view);
        }
        self.device.flush();
        self.device.shutdown();
    }

    fn apply_pending_view_ops(&mut self) {
        let resizes = std::mem::take(&mut self.pending_resizes);
        for (id, width, height) in resizes {
            if let Err(err) = self.resize_view_now(id, width, height) {
                log::warn!("view resize failed: {err}");
            }
        }
        for id in std::mem::take(&mut self.pending_deletes) {
            if let Some(view) = self.views.remove(id) {
                release_view(&mut self.device, view);
            }
        }
    }

    fn resize_view_now(
        &mut self,
        id: ViewId,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        let Some(view) = self.views.get(id) else {
            return Ok(());
        };
        let flags = view.flags;
        let (color_target, depth_target) = self.create_view_targets(width, height, flags)?;

        let view = self.views.get_mut(id).ok_or(ResourceError::InvalidHandle)?;
        let old_color = std::mem::replace(&mut view.color_target, color_target);
        let old_depth = std::mem::replace(&mut view.depth_target, depth_target);
        view.width = width;
        view.height = height;
        view.camera = Camera::screen(width as f32, height as f32);

        self.device.release(old_color);
        if let Some(depth) = old_depth {
            self.device.release(depth);
        }
        Ok(())
    }

    fn create_view_targets(
        &mut self,
        width: u32,
        height: u32,
        flags: ViewFlags,
    ) -> Result<(TextureId, Option<TextureId>), ResourceError> {
        let mut color_flags = TextureFlags::COLOR_ATTACHMENT | TextureFlags::SAMPLED;
        if flags.contains(ViewFlags::MAIN_OUTPUT) {
            // The main output is copied into the surface image to present.
            color_flags.insert(TextureFlags::TRANSFER_SRC);
        }
        let color = self.device.create_texture(&TextureDescriptor {
            label: Some("view-color".into()),
            extent: Extent3D::new(width, height, 1),
            mip_levels: 1,
            sample_count: Default::default(),
            format: self.color_format,
            flags: color_flags,
        })?;

        let depth = if flags.contains(ViewFlags::DEPTH) {
            // A pure depth target: renderbuffer-class, no view fetch.
            Some(self.device.create_texture(&TextureDescriptor {
                label: Some("view-depth".into()),
                extent: Extent3D::new(width, height, 1),
                mip_levels: 1,
                sample_count: Default::default(),
                format: TextureFormat::Depth32Float,
                flags: TextureFlags::DEPTH_ATTACHMENT,
            })?)
        } else {
            None
        };
        Ok((color, depth))
    }
}

fn release_view(device: &mut GpuDevice, view: RenderView) {
    device.release(view.color_target);
    if let Some(depth) = view.depth_target {
        device.release(depth);
    }
    view.camera_ring.destroy(device);
}
