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

//! Render views: one camera, four render queues, and a render target.
//!
//! Views live in a generational store; handles stay cheap copies and go
//! stale safely when a view is deleted. Structural changes (resize,
//! delete) are queued on the renderer and applied at frame boundaries so
//! GPU objects never change mid-frame.

use crate::camera::Camera;
use onyx_core::gpu::{FrameRingBuffer, RenderQueue, TextureId};
use onyx_core::onyx_bitflags;

onyx_bitflags! {
    /// Behavior flags of a render view.
    pub struct ViewFlags: u32 {
        /// The view's color target presents to the window surface.
        const MAIN_OUTPUT = 1 << 0;
        /// The view owns a depth buffer.
        const DEPTH = 1 << 1;
    }
}

/// A stable, generation-checked handle to a render view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// One render view. See the module docs.
pub struct RenderView {
    /// The camera the view renders with.
    pub camera: Camera,
    /// Opaque scene draws, sorted front-to-back.
    pub opaque_queue: RenderQueue,
    /// Transparent scene draws, sorted back-to-front.
    pub transparent_queue: RenderQueue,
    /// Scene-space overlays (debug lines), submission-ordered by state.
    pub overlay_scene_queue: RenderQueue,
    /// Screen-space overlays (2D painter), strict submission order.
    pub screen_overlay_queue: RenderQueue,
    /// Clear color of the color target.
    pub clear_color: onyx_core::math::Rgba,

    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) flags: ViewFlags,
    pub(crate) color_target: TextureId,
    pub(crate) depth_target: Option<TextureId>,
    pub(crate) camera_ring: FrameRingBuffer,
}

impl RenderView {
    /// View extent in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The view's behavior flags.
    pub fn flags(&self) -> ViewFlags {
        self.flags
    }

    /// The color target the view renders into.
    pub fn color_target(&self) -> TextureId {
        self.color_target
    }

    /// Drops any commands left in the queues without executing them.
    pub fn clear_queues(&mut self) {
        self.opaque_queue.clear();
        self.transparent_queue.clear();
        self.overlay_scene_queue.clear();
        self.screen_overlay_queue.clear();
    }
}

#[derive(Default)]
struct ViewSlot {
    generation: u32,
    view: Option<RenderView>,
}

/// The generational view store.
#[derive(Default)]
pub(crate) struct ViewStore {
    slots: Vec<ViewSlot>,
}

impl ViewStore {
    pub(crate) fn insert(&mut self, view: RenderView) -> ViewId {
        match self.slots.iter_mut().position(|slot| slot.view.is_none()) {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.view = Some(view);
                ViewId { index: index as u32, generation: slot.generation }
            }
            None => {
                self.slots.push(ViewSlot { generation: 0, view: Some(view) });
                ViewId { index: (self.slots.len() - 1) as u32, generation: 0 }
            }
        }
    }

    pub(crate) fn get(&self, id: ViewId) -> Option<&RenderView> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.view.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: ViewId) -> Option<&mut RenderView> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.view.as_mut()
    }

    /// Removes the view behind `id`, bumping the slot generation so stale
    /// handles miss.
    pub(crate) fn remove(&mut self, id: ViewId) -> Option<RenderView> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let view = slot.view.take();
        if view.is_some() {
            slot.generation += 1;
        }
        view
    }

    pub(crate) fn drain(&mut self) -> Vec<RenderView> {
        self.slots
            .iter_mut()
            .filter_map(|slot| {
                let view = slot.view.take();
                if view.is_some() {
                    slot.generation += 1;
                }
                view
            })
            .collect()
    }
}
