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

//! The device frontend: sole owner of every GPU object.
//!
//! Wraps a concrete [`GpuBackend`] with frame bookkeeping, the deferred
//! release list, and the four frame-aged resource caches. Creation returns
//! typed IDs; destruction always goes through [`GpuDevice::release`] so
//! nothing dies while a frame that used it is still in flight.

use crate::error::{PipelineError, ResourceError};
use crate::gpu::cache::ResourceCache;
use crate::gpu::{
    BufferDescriptor, BufferId, DescriptorSetId, DescriptorSetInfo, FramebufferDescriptor,
    FramebufferId, GpuBackend, GpuHandle, GpuLimits, PipelineDescriptor, PipelineId, PipelineState,
    ProgramDescriptor, ProgramId, RenderPassId, RenderPassInfo, RenderStats, RendererSettings,
    SamplerDescriptor, SamplerId, ShaderModuleDescriptor, ShaderModuleId, TextureDescriptor,
    TextureFlags, TextureId, TextureViewDescriptor, TextureViewId, VertexLayoutId, VertexLayoutSet,
};
use crate::math::{Extent3D, Origin3D};
use crate::utils::hash;
use std::collections::{HashMap, VecDeque};

/// Frame bookkeeping shared with everything that rotates per-frame data.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// `frame_count % num_frame_indices`: which frame slot is active.
    pub frame_index: u32,
    /// Monotonic frame counter.
    pub frame_count: u64,
    /// Number of frame slots (frames in flight).
    pub num_frame_indices: u32,
}

#[derive(Debug)]
struct PendingRelease {
    handle: GpuHandle,
    released_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FramebufferKey {
    attachments: Vec<TextureId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DescriptorSetKey {
    program: ProgramId,
    set_index: u32,
    info: DescriptorSetInfo,
}

/// The device frontend. See the module docs.
#[derive(Debug)]
pub struct GpuDevice {
    backend: Box<dyn GpuBackend>,
    frame: FrameInfo,
    cache_age_limit: u64,
    release_list: VecDeque<PendingRelease>,
    render_passes: ResourceCache<RenderPassInfo, RenderPassId>,
    pipelines: ResourceCache<PipelineState, PipelineId>,
    framebuffers: ResourceCache<FramebufferKey, FramebufferId>,
    descriptor_sets: ResourceCache<DescriptorSetKey, DescriptorSetId>,
    vertex_layouts: Vec<VertexLayoutSet>,
    view_parents: HashMap<TextureViewId, TextureId>,
    texture_extents: HashMap<TextureId, Extent3D>,
    texture_flags: HashMap<TextureId, TextureFlags>,
    buffer_sizes: HashMap<BufferId, u64>,
    stats: RenderStats,
}

impl GpuDevice {
    /// Wraps `backend` with frontend bookkeeping configured by `settings`.
    pub fn new(backend: Box<dyn GpuBackend>, settings: &RendererSettings) -> Self {
        let num_frame_indices = settings.clamped_frames_in_flight();
        log::debug!(
            "GpuDevice: backend {:?}, {} frames in flight, cache age limit {}",
            backend.backend_type(),
            num_frame_indices,
            settings.cache_age_limit
        );
        Self {
            backend,
            frame: FrameInfo { frame_index: 0, frame_count: 0, num_frame_indices },
            cache_age_limit: settings.cache_age_limit,
            release_list: VecDeque::new(),
            render_passes: ResourceCache::new(),
            pipelines: ResourceCache::new(),
            framebuffers: ResourceCache::new(),
            descriptor_sets: ResourceCache::new(),
            vertex_layouts: Vec::new(),
            view_parents: HashMap::new(),
            texture_extents: HashMap::new(),
            texture_flags: HashMap::new(),
            buffer_sizes: HashMap::new(),
            stats: RenderStats::default(),
        }
    }

    /// The raw backend, for recording sinks and capability queries.
    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    /// Current frame bookkeeping.
    pub fn frame_info(&self) -> FrameInfo {
        self.frame
    }

    /// Device limits.
    pub fn limits(&self) -> GpuLimits {
        self.backend.limits()
    }

    /// Last frame's counters.
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Bumps the frame draw-call counter; called by command lists.
    pub(crate) fn count_draw_call(&mut self) {
        self.stats.draw_calls += 1;
    }

    // --- Frame pacing ---

    /// Starts a frame. Returns `false` when the caller should skip the frame
    /// entirely (surface unavailable or the slot's fence has not retired).
    pub fn begin_frame(&mut self) -> bool {
        if !self.backend.begin_frame() {
            return false;
        }
        self.stats = RenderStats::default();
        true
    }

    /// Ends the frame: presents, ages the caches, destroys retired releases,
    /// and advances the frame index.
    pub fn end_frame(&mut self) {
        self.backend.end_frame();

        // Age out cache entries nobody touched for cache_age_limit frames.
        let min_frame = self.frame.frame_count.saturating_sub(self.cache_age_limit);
        if min_frame > 0 {
            let mut evicted: Vec<GpuHandle> = Vec::new();
            evicted.extend(self.render_passes.evict_older_than(min_frame).into_iter().map(GpuHandle::from));
            evicted.extend(self.pipelines.evict_older_than(min_frame).into_iter().map(GpuHandle::from));
            evicted.extend(self.framebuffers.evict_older_than(min_frame).into_iter().map(GpuHandle::from));
            evicted.extend(self.descriptor_sets.evict_older_than(min_frame).into_iter().map(GpuHandle::from));
            self.stats.cache_evictions += evicted.len() as u64;
            for handle in evicted {
                self.push_release(handle);
            }
        }

        // Destroy releases whose guarding fence is known retired: the entry
        // has sat through a full rotation of frame slots.
        let in_flight = u64::from(self.frame.num_frame_indices);
        while let Some(front) = self.release_list.front() {
            if self.frame.frame_count < front.released_at + in_flight {
                break;
            }
            let pending = self.release_list.pop_front().expect("front checked above");
            self.finalize_release(pending.handle);
        }

        self.frame.frame_count += 1;
        self.frame.frame_index = (self.frame.frame_count % u64::from(self.frame.num_frame_indices)) as u32;
    }

    /// Blocks until the GPU is idle and destroys everything pending release.
    /// Used at shutdown and on window resize.
    pub fn flush(&mut self) {
        self.backend.wait_idle();
        while let Some(pending) = self.release_list.pop_front() {
            self.finalize_release(pending.handle);
        }
    }

    /// Tears down every cached object and pending release. The device is
    /// unusable for rendering afterwards.
    pub fn shutdown(&mut self) {
        self.backend.wait_idle();
        let cached: Vec<GpuHandle> = self
            .render_passes
            .drain_all()
            .into_iter()
            .map(GpuHandle::from)
            .chain(self.pipelines.drain_all().into_iter().map(GpuHandle::from))
            .chain(self.framebuffers.drain_all().into_iter().map(GpuHandle::from))
            .chain(self.descriptor_sets.drain_all().into_iter().map(GpuHandle::from))
            .collect();
        for handle in cached {
            self.destroy_now(handle);
        }
        while let Some(pending) = self.release_list.pop_front() {
            self.destroy_now(pending.handle);
        }
    }

    // --- Resource creation ---

    /// Creates a buffer.
    pub fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = self.backend.create_buffer(desc)?;
        self.buffer_sizes.insert(id, desc.size);
        Ok(id)
    }

    /// The creation-time size of `id`, or 0 when unknown.
    pub fn buffer_size(&self, id: BufferId) -> u64 {
        self.buffer_sizes.get(&id).copied().unwrap_or(0)
    }

    /// The creation-time extent of `id`.
    pub fn texture_extent(&self, id: TextureId) -> Option<Extent3D> {
        self.texture_extents.get(&id).copied()
    }

    /// Creates a texture.
    pub fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let id = self.backend.create_texture(desc)?;
        self.texture_extents.insert(id, desc.extent);
        self.texture_flags.insert(id, desc.flags);
        Ok(id)
    }

    /// Creates a view over `texture`.
    ///
    /// A renderbuffer-class depth target (not sampled, not an input
    /// attachment) has no fetchable view; requesting one is a programmer
    /// error.
    pub fn create_texture_view(
        &mut self,
        texture: TextureId,
        desc: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let flags = self.texture_flags.get(&texture).copied().unwrap_or(TextureFlags::EMPTY);
        if flags.is_renderbuffer_class() {
            log::error!("create_texture_view: {texture:?} is renderbuffer-class (no view fetch)");
            debug_assert!(false, "view requested on a renderbuffer-class texture");
            return Err(ResourceError::InvalidHandle);
        }
        let view = self.backend.create_texture_view(texture, desc)?;
        self.view_parents.insert(view, texture);
        Ok(view)
    }

    /// Creates a sampler.
    pub fn create_sampler(&mut self, desc: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        self.backend.create_sampler(desc)
    }

    /// Compiles a shader module.
    pub fn create_shader_module(
        &mut self,
        desc: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        self.backend.create_shader_module(desc)
    }

    /// Links a program.
    pub fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        self.backend.create_program(desc)
    }

    /// Registers a vertex layout and returns its ID. Layouts are CPU-side
    /// and live for the device's lifetime.
    pub fn create_vertex_layout(&mut self, layout: VertexLayoutSet) -> VertexLayoutId {
        self.vertex_layouts.push(layout);
        VertexLayoutId(self.vertex_layouts.len() - 1)
    }

    /// The registered layout behind `id`.
    pub fn vertex_layout(&self, id: VertexLayoutId) -> Option<&VertexLayoutSet> {
        self.vertex_layouts.get(id.0)
    }

    /// Writes bytes into a buffer.
    pub fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.backend.write_buffer(id, offset, data)
    }

    /// Uploads texel data into a texture region.
    pub fn write_texture(
        &self,
        id: TextureId,
        data: &[u8],
        bytes_per_row: Option<u32>,
        origin: Origin3D,
        size: Extent3D,
    ) -> Result<(), ResourceError> {
        self.backend.write_texture(id, data, bytes_per_row, origin, size)
    }

    // --- Cached object resolution ---

    /// Resolves a renderpass object for `info`, creating on miss.
    pub fn render_pass(&mut self, info: &RenderPassInfo) -> Result<RenderPassId, ResourceError> {
        let now = self.frame.frame_count;
        let key = info.hash64();
        if let Some(id) = self.render_passes.get(key, |k| k.cache_eq(info), now) {
            return Ok(id);
        }
        let id = self.create_with_pressure_relief(|backend| backend.create_render_pass(info))?;
        if let Some(displaced) = self.render_passes.insert(key, info.clone(), id, now) {
            self.push_release(GpuHandle::from(displaced));
        }
        Ok(id)
    }

    /// Resolves a framebuffer for an attachment tuple, creating on miss.
    ///
    /// All attachments must agree on extent.
    pub fn framebuffer(
        &mut self,
        attachments: &[TextureId],
        render_pass: RenderPassId,
    ) -> Result<FramebufferId, ResourceError> {
        let extent = self.common_extent(attachments)?;
        let now = self.frame.frame_count;
        let mut key_hash = hash::SEED;
        for a in attachments {
            key_hash = hash::add_usize(key_hash, a.0);
        }
        if let Some(id) = self
            .framebuffers
            .get(key_hash, |k| k.attachments.as_slice() == attachments, now)
        {
            return Ok(id);
        }
        let desc = FramebufferDescriptor {
            label: None,
            attachments,
            render_pass,
            width: extent.width,
            height: extent.height,
        };
        let id = self.create_with_pressure_relief(|backend| backend.create_framebuffer(&desc))?;
        let key = FramebufferKey { attachments: attachments.to_vec() };
        if let Some(displaced) = self.framebuffers.insert(key_hash, key, id, now) {
            self.push_release(GpuHandle::from(displaced));
        }
        Ok(id)
    }

    /// Resolves a pipeline object for `state`, creating on miss.
    ///
    /// The cache key is the state's masked hash: values flagged dynamic do
    /// not contribute, so state differing only dynamically shares a pipeline.
    pub fn pipeline(&mut self, state: &PipelineState) -> Result<PipelineId, ResourceError> {
        let program = state.program.ok_or(PipelineError::MissingProgram)?;
        let render_pass = state.render_pass.ok_or(PipelineError::MissingRenderPass)?;
        let layout_id = state.vertex_layout.ok_or(PipelineError::MissingVertexLayout)?;

        let now = self.frame.frame_count;
        let key = state.hash64();
        if let Some(id) = self.pipelines.get(key, |k| k.dynamic_masked_eq(state), now) {
            self.stats.pipeline_cache_hits += 1;
            return Ok(id);
        }
        self.stats.pipeline_cache_misses += 1;

        let layout = self
            .vertex_layouts
            .get(layout_id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        let desc = PipelineDescriptor {
            label: None,
            state,
            program,
            vertex_layout: layout,
            render_pass,
            subpass: state.subpass_index,
        };
        let id = match self.backend.create_pipeline(&desc) {
            Ok(id) => id,
            Err(ResourceError::OutOfMemory) => {
                // Cache bypass path: shed cached objects and retry once so a
                // full device still makes progress.
                self.relieve_pressure();
                let layout = self
                    .vertex_layouts
                    .get(layout_id.0)
                    .ok_or(ResourceError::InvalidHandle)?;
                let desc = PipelineDescriptor {
                    label: None,
                    state,
                    program,
                    vertex_layout: layout,
                    render_pass,
                    subpass: state.subpass_index,
                };
                self.backend.create_pipeline(&desc)?
            }
            Err(err) => return Err(err),
        };
        if let Some(displaced) = self.pipelines.insert(key, *state, id, now) {
            self.push_release(GpuHandle::from(displaced));
        }
        Ok(id)
    }

    /// Resolves an allocated descriptor set for `info` against `set_index`
    /// of `program`, allocating on miss.
    pub fn descriptor_set(
        &mut self,
        program: ProgramId,
        set_index: u32,
        info: &DescriptorSetInfo,
    ) -> Result<DescriptorSetId, ResourceError> {
        let now = self.frame.frame_count;
        let mut key_hash = info.hash64();
        key_hash = hash::add_usize(key_hash, program.0);
        key_hash = hash::add_u32(key_hash, set_index);
        if let Some(id) = self.descriptor_sets.get(
            key_hash,
            |k| k.program == program && k.set_index == set_index && k.info == *info,
            now,
        ) {
            return Ok(id);
        }
        let id = self.create_with_pressure_relief(|backend| {
            backend.allocate_descriptor_set(program, set_index, info)
        })?;
        let key = DescriptorSetKey { program, set_index, info: info.clone() };
        if let Some(displaced) = self.descriptor_sets.insert(key_hash, key, id, now) {
            self.push_release(GpuHandle::from(displaced));
        }
        Ok(id)
    }

    // --- Release ---

    /// Appends `handle` to the release list. The object is destroyed at the
    /// end of the frame after its guarding fence is known retired.
    ///
    /// Releasing a texture first sweeps it out of every cache entry that
    /// references it (framebuffers and descriptor sets), so no cached object
    /// can dangle.
    pub fn release(&mut self, handle: impl Into<GpuHandle>) {
        let handle = handle.into();
        if let GpuHandle::Texture(texture) = handle {
            self.sweep_texture_references(texture);
        }
        self.push_release(handle);
    }

    fn push_release(&mut self, handle: GpuHandle) {
        self.release_list.push_back(PendingRelease { handle, released_at: self.frame.frame_count });
    }

    /// Drops every framebuffer and descriptor-set cache entry that references
    /// `texture` (through any of its views), releasing the cached objects.
    fn sweep_texture_references(&mut self, texture: TextureId) {
        let views: Vec<TextureViewId> = self
            .view_parents
            .iter()
            .filter_map(|(view, parent)| (*parent == texture).then_some(*view))
            .collect();

        let dead_framebuffers = self
            .framebuffers
            .evict_matching(|key| key.attachments.contains(&texture));
        for fb in dead_framebuffers {
            self.push_release(GpuHandle::from(fb));
        }

        if !views.is_empty() {
            let dead_sets = self
                .descriptor_sets
                .evict_matching(|key| views.iter().any(|v| key.info.references_view(*v)));
            for set in dead_sets {
                self.push_release(GpuHandle::from(set));
            }
        }
    }

    /// Destroys a retired release unless a cache still holds the object, in
    /// which case the cache keeps ownership and will re-release on eviction.
    fn finalize_release(&mut self, handle: GpuHandle) {
        if self.is_cache_referenced(handle) {
            return;
        }
        self.destroy_now(handle);
    }

    fn is_cache_referenced(&self, handle: GpuHandle) -> bool {
        match handle {
            GpuHandle::RenderPass(id) => self.render_passes.contains_id(id),
            GpuHandle::Pipeline(id) => self.pipelines.contains_id(id),
            GpuHandle::Framebuffer(id) => self.framebuffers.contains_id(id),
            GpuHandle::DescriptorSet(id) => self.descriptor_sets.contains_id(id),
            _ => false,
        }
    }

    fn destroy_now(&mut self, handle: GpuHandle) {
        let result = match handle {
            GpuHandle::Buffer(id) => {
                self.buffer_sizes.remove(&id);
                self.backend.destroy_buffer(id)
            }
            GpuHandle::Texture(id) => {
                self.texture_extents.remove(&id);
                self.texture_flags.remove(&id);
                self.view_parents.retain(|_, parent| *parent != id);
                self.backend.destroy_texture(id)
            }
            GpuHandle::TextureView(id) => {
                self.view_parents.remove(&id);
                self.backend.destroy_texture_view(id)
            }
            GpuHandle::Sampler(id) => self.backend.destroy_sampler(id),
            GpuHandle::ShaderModule(id) => self.backend.destroy_shader_module(id),
            GpuHandle::Program(id) => self.backend.destroy_program(id),
            GpuHandle::RenderPass(id) => self.backend.destroy_render_pass(id),
            GpuHandle::Framebuffer(id) => self.backend.destroy_framebuffer(id),
            GpuHandle::Pipeline(id) => self.backend.destroy_pipeline(id),
            GpuHandle::DescriptorSet(id) => self.backend.free_descriptor_set(id),
        };
        match result {
            Ok(()) => self.stats.objects_released += 1,
            Err(err) => log::warn!("destroy of {handle:?} failed: {err}"),
        }
    }

    /// Sheds cached objects after an out-of-memory creation failure.
    fn relieve_pressure(&mut self) {
        log::warn!("GPU allocation failed; shedding cached objects and retrying");
        let now = self.frame.frame_count;
        let mut shed: Vec<GpuHandle> = Vec::new();
        shed.extend(self.render_passes.evict_older_than(now).into_iter().map(GpuHandle::from));
        shed.extend(self.pipelines.evict_older_than(now).into_iter().map(GpuHandle::from));
        shed.extend(self.framebuffers.evict_older_than(now).into_iter().map(GpuHandle::from));
        shed.extend(self.descriptor_sets.evict_older_than(now).into_iter().map(GpuHandle::from));
        for handle in shed {
            self.push_release(handle);
        }
        self.flush();
    }

    fn create_with_pressure_relief<I>(
        &mut self,
        create: impl Fn(&dyn GpuBackend) -> Result<I, ResourceError>,
    ) -> Result<I, ResourceError> {
        match create(self.backend.as_ref()) {
            Ok(id) => Ok(id),
            Err(ResourceError::OutOfMemory) => {
                self.relieve_pressure();
                create(self.backend.as_ref())
            }
            Err(err) => Err(err),
        }
    }

    fn common_extent(&self, attachments: &[TextureId]) -> Result<Extent3D, ResourceError> {
        let mut iter = attachments.iter();
        let first = iter.next().ok_or(ResourceError::InvalidHandle)?;
        let extent = *self.texture_extents.get(first).ok_or(ResourceError::InvalidHandle)?;
        for id in iter {
            let other = self.texture_extents.get(id).ok_or(ResourceError::InvalidHandle)?;
            if other.width != extent.width || other.height != extent.height || other.depth != extent.depth
            {
                log::error!("framebuffer attachments disagree on extent: {extent:?} vs {other:?}");
                debug_assert!(false, "framebuffer attachments must share an extent");
                return Err(ResourceError::InvalidHandle);
            }
        }
        Ok(extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::test_backend::NullBackend;
    use crate::gpu::{
        AttachmentInfo, AttachmentRef, BufferUsage, CullFace, DynamicStateFlags, ImageLayout,
        MemoryProps, SampleCount, SubpassInfo, TextureFormat,
    };
    use crate::math::Viewport;

    fn test_device() -> GpuDevice {
        GpuDevice::new(Box::new(NullBackend::new()), &RendererSettings::default())
    }

    fn null_backend(device: &GpuDevice) -> &NullBackend {
        device.backend().as_any().downcast_ref::<NullBackend>().unwrap()
    }

    fn tick(device: &mut GpuDevice) {
        assert!(device.begin_frame());
        device.end_frame();
    }

    fn color_target(device: &mut GpuDevice) -> TextureId {
        device
            .create_texture(&TextureDescriptor {
                label: None,
                extent: Extent3D::new(64, 64, 1),
                mip_levels: 1,
                sample_count: SampleCount::X1,
                format: TextureFormat::Rgba8Unorm,
                flags: TextureFlags::COLOR_ATTACHMENT | TextureFlags::SAMPLED,
            })
            .unwrap()
    }

    fn pass_over(device: &mut GpuDevice, texture: TextureId) -> RenderPassInfo {
        let mut info = RenderPassInfo::new();
        let _ = device;
        let color = info.add_attachment(AttachmentInfo {
            texture,
            format: TextureFormat::Rgba8Unorm,
            samples: SampleCount::X1,
            final_layout: ImageLayout::ShaderReadOnly,
            may_alias: false,
        });
        info.add_subpass(SubpassInfo {
            input_refs: Vec::new(),
            color_refs: vec![AttachmentRef { attachment: color, layout: ImageLayout::ColorAttachment }],
            depth_ref: None,
        });
        info.clears(1).stores(1);
        info
    }

    fn drawable_state(device: &mut GpuDevice, pass: RenderPassId) -> PipelineState {
        let program = device
            .create_program(&ProgramDescriptor::new("test", &[], 1))
            .unwrap();
        let layout = device.create_vertex_layout(VertexLayoutSet::new());
        let mut state = PipelineState::default();
        state.program = Some(program);
        state.render_pass = Some(pass);
        state.vertex_layout = Some(layout);
        state
    }

    #[test]
    fn begin_frame_skips_when_backend_says_so() {
        let mut device = test_device();
        null_backend(&device).skip_frames.store(1, std::sync::atomic::Ordering::Relaxed);
        assert!(!device.begin_frame());
        assert!(device.begin_frame());
    }

    #[test]
    fn dynamic_only_state_differences_share_one_pipeline() {
        let mut device = test_device();
        let texture = color_target(&mut device);
        let info = pass_over(&mut device, texture);
        let pass = device.render_pass(&info).unwrap();
        let mut state = drawable_state(&mut device, pass);
        state.set_dynamic_states(DynamicStateFlags::VIEWPORT);

        let a = device.pipeline(&state).unwrap();
        state.viewport = Viewport::from_extent(800.0, 600.0);
        let b = device.pipeline(&state).unwrap();

        assert_eq!(a, b);
        assert_eq!(device.stats().pipeline_cache_hits, 1);
        assert_eq!(device.stats().pipeline_cache_misses, 1);
    }

    #[test]
    fn static_state_differences_bake_two_pipelines() {
        let mut device = test_device();
        let texture = color_target(&mut device);
        let info = pass_over(&mut device, texture);
        let pass = device.render_pass(&info).unwrap();
        let mut state = drawable_state(&mut device, pass);

        let a = device.pipeline(&state).unwrap();
        state.set_cull_face(CullFace::Back);
        let b = device.pipeline(&state).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn released_buffer_survives_until_fences_retire() {
        let mut device = test_device();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(
                "b",
                16,
                BufferUsage::VERTEX,
                MemoryProps::DEVICE_LOCAL,
            ))
            .unwrap();
        device.release(buffer);

        // With two frames in flight the object must outlive two more frames.
        tick(&mut device);
        assert!(null_backend(&device).destroyed_buffers.lock().unwrap().is_empty());
        tick(&mut device);
        assert!(null_backend(&device).destroyed_buffers.lock().unwrap().is_empty());
        tick(&mut device);
        assert_eq!(null_backend(&device).destroyed_buffers.lock().unwrap().as_slice(), &[buffer]);
    }

    #[test]
    fn released_but_cached_object_is_reusable_and_not_destroyed() {
        let mut device = test_device();
        let texture = color_target(&mut device);
        let info = pass_over(&mut device, texture);
        let pass = device.render_pass(&info).unwrap();
        let a = device.framebuffer(&[texture], pass).unwrap();

        // Releasing the framebuffer handle directly leaves the cache entry
        // alone; resolving again yields the same handle.
        device.release(GpuHandle::from(a));
        let b = device.framebuffer(&[texture], pass).unwrap();
        assert_eq!(a, b);

        // When the release retires, the cache still holds the object, so the
        // destroy is skipped.
        for _ in 0..4 {
            tick(&mut device);
        }
        assert!(null_backend(&device).destroyed_framebuffers.lock().unwrap().is_empty());
    }

    #[test]
    fn untouched_cache_entries_evict_after_age_limit() {
        let settings = RendererSettings { cache_age_limit: 5, ..Default::default() };
        let mut device = GpuDevice::new(Box::new(NullBackend::new()), &settings);
        let texture = color_target(&mut device);
        let info = pass_over(&mut device, texture);
        let pass = device.render_pass(&info).unwrap();
        let state = drawable_state(&mut device, pass);
        let pipeline = device.pipeline(&state).unwrap();

        // Age limit (5) + in-flight delay (2) frames with no touches.
        for _ in 0..9 {
            tick(&mut device);
        }
        assert!(null_backend(&device)
            .destroyed_pipelines
            .lock()
            .unwrap()
            .contains(&pipeline));

        // A fresh resolve bakes a new pipeline.
        let again = device.pipeline(&state).unwrap();
        assert_ne!(again, pipeline);
    }

    #[test]
    fn touched_cache_entries_never_evict() {
        let settings = RendererSettings { cache_age_limit: 5, ..Default::default() };
        let mut device = GpuDevice::new(Box::new(NullBackend::new()), &settings);
        let texture = color_target(&mut device);
        let info = pass_over(&mut device, texture);
        let pass = device.render_pass(&info).unwrap();
        let state = drawable_state(&mut device, pass);
        let pipeline = device.pipeline(&state).unwrap();

        for _ in 0..20 {
            assert!(device.begin_frame());
            assert_eq!(device.pipeline(&state).unwrap(), pipeline);
            device.end_frame();
        }
        assert!(null_backend(&device).destroyed_pipelines.lock().unwrap().is_empty());
    }

    #[test]
    fn releasing_a_texture_sweeps_framebuffers_that_reference_it() {
        let mut device = test_device();
        let texture = color_target(&mut device);
        let info = pass_over(&mut device, texture);
        let pass = device.render_pass(&info).unwrap();
        let fb = device.framebuffer(&[texture], pass).unwrap();

        device.release(texture);
        // The framebuffer entry is gone; resolving again creates a new one.
        let other_texture = color_target(&mut device);
        let fb2 = device.framebuffer(&[other_texture], pass).unwrap();
        assert_ne!(fb, fb2);
    }

    #[test]
    fn oom_creation_sheds_cache_pressure_and_retries() {
        let mut device = test_device();
        let texture = color_target(&mut device);
        let info = pass_over(&mut device, texture);
        let pass = device.render_pass(&info).unwrap();
        let state = drawable_state(&mut device, pass);

        null_backend(&device).fail_next_creates.store(1, std::sync::atomic::Ordering::Relaxed);
        // First attempt fails with OutOfMemory, pressure relief runs, the
        // retry succeeds.
        assert!(device.pipeline(&state).is_ok());
    }
}
