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

//! The wgpu backend: the primary concrete [`GpuBackend`].
//!
//! wgpu fronts Vulkan, Metal, DX12, and GL-ES, so one implementation covers
//! every real target. Resources live in `Mutex<HashMap>` registries keyed by
//! the core's typed IDs; IDs are minted from one atomic counter. Renderpass
//! and framebuffer objects are CPU-side descriptions here — wgpu builds its
//! pass state at replay time, so "creating" them just records what replay
//! will need. Multi-subpass passes replay as one wgpu pass per subpass with
//! load-preserving ops, which matches what subpasses mean on the hardware
//! wgpu targets without input-attachment support.

use crate::wgpu::conversions::{
    binding_slot, buffer_usages, from_wgpu_texture_format, layout_entries, IntoWgpu,
};
use crate::wgpu::sink::{SinkCommand, WgpuSink};
use onyx_core::error::ResourceError;
use onyx_core::gpu::{
    AdapterInfo, BufferDescriptor, BufferId, ClearValue, CommandSink, DescriptorBindingData,
    DescriptorSetId, DescriptorSetInfo, FramebufferDescriptor, FramebufferId, GpuBackend,
    GpuBackendType, GpuDeviceType, GpuLimits, PipelineDescriptor, PipelineId, ProgramDescriptor,
    ProgramId, RenderPassId, RenderPassInfo, SamplerDescriptor, SamplerId, SetLayout,
    ShaderModuleDescriptor, ShaderModuleId, ShaderSource, ShaderStage, TextureDescriptor,
    TextureFormat, TextureId, TextureViewDescriptor, TextureViewId,
};
use onyx_core::math::{Extent3D, Origin3D};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct BufferEntry {
    buffer: wgpu::Buffer,
}

struct TextureEntry {
    texture: wgpu::Texture,
    format: TextureFormat,
}

struct ProgramEntry {
    modules: Vec<ShaderModuleId>,
    set_layouts: Vec<SetLayout>,
    bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
}

struct ModuleEntry {
    module: wgpu::ShaderModule,
    stage: ShaderStage,
    entry_point: String,
}

struct FramebufferEntry {
    attachments: Vec<TextureId>,
    width: u32,
    height: u32,
}

#[derive(Default)]
struct Registries {
    buffers: HashMap<BufferId, BufferEntry>,
    textures: HashMap<TextureId, TextureEntry>,
    views: HashMap<TextureViewId, wgpu::TextureView>,
    samplers: HashMap<SamplerId, wgpu::Sampler>,
    modules: HashMap<ShaderModuleId, ModuleEntry>,
    programs: HashMap<ProgramId, ProgramEntry>,
    render_passes: HashMap<RenderPassId, RenderPassInfo>,
    framebuffers: HashMap<FramebufferId, FramebufferEntry>,
    pipelines: HashMap<PipelineId, wgpu::RenderPipeline>,
    bind_groups: HashMap<DescriptorSetId, wgpu::BindGroup>,
}

struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    current: Option<wgpu::SurfaceTexture>,
    pending_resize: Option<(u32, u32)>,
    /// Texture copied to the acquired surface image at `end_frame`.
    present_source: Option<TextureId>,
}

/// Clamps a core scissor rect to the render target's extent; wgpu rejects
/// scissors that reach outside the target. `None` for empty results.
fn clamp_scissor(
    scissor: onyx_core::math::ScissorRect,
    extent: (u32, u32),
) -> Option<(u32, u32, u32, u32)> {
    let x = scissor.x.max(0) as u32;
    let y = scissor.y.max(0) as u32;
    if x >= extent.0 || y >= extent.1 {
        return None;
    }
    let width = scissor.width.min(extent.0 - x);
    let height = scissor.height.min(extent.1 - y);
    if width == 0 || height == 0 {
        return None;
    }
    Some((x, y, width, height))
}

/// The wgpu backend. See the module docs.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
    next_id: AtomicUsize,
    registries: Mutex<Registries>,
    surface: Mutex<Option<SurfaceState>>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}

impl WgpuBackend {
    /// Creates a backend without a surface; render targets are offscreen
    /// textures only.
    pub fn new_headless() -> anyhow::Result<Self> {
        Self::create(None)
    }

    /// Creates a backend presenting to `window`'s surface.
    pub fn for_window(
        window: Arc<winit::window::Window>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> anyhow::Result<Self> {
        Self::create(Some((window, width, height, vsync)))
    }

    fn create(
        window: Option<(Arc<winit::window::Window>, u32, u32, bool)>,
    ) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = match &window {
            Some((window, ..)) => Some(
                instance
                    .create_surface(window.clone())
                    .map_err(|err| anyhow::anyhow!("failed to create wgpu surface: {err}"))?,
            ),
            None => None,
        };

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface.as_ref(),
            force_fallback_adapter: false,
        }))
        .map_err(|err| anyhow::anyhow!("no suitable GPU adapter: {err}"))?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("onyx device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|err| anyhow::anyhow!("failed to create wgpu device: {err}"))?;

        let surface_state = match (surface, window) {
            (Some(surface), Some((_, width, height, vsync))) => {
                let caps = surface.get_capabilities(&adapter);
                let format = caps
                    .formats
                    .iter()
                    .copied()
                    .find(|format| from_wgpu_texture_format(*format).is_some())
                    .unwrap_or(caps.formats[0]);
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
                    format,
                    width: width.max(1),
                    height: height.max(1),
                    present_mode: if vsync {
                        wgpu::PresentMode::AutoVsync
                    } else {
                        wgpu::PresentMode::AutoNoVsync
                    },
                    alpha_mode: caps.alpha_modes[0],
                    view_formats: vec![],
                    desired_maximum_frame_latency: 2,
                };
                surface.configure(&device, &config);
                Some(SurfaceState {
                    surface,
                    config,
                    current: None,
                    pending_resize: None,
                    present_source: None,
                })
            }
            _ => None,
        };

        Ok(Self {
            device,
            queue,
            adapter,
            next_id: AtomicUsize::new(1),
            registries: Mutex::new(Registries::default()),
            surface: Mutex::new(surface_state),
        })
    }

    /// Queues a surface reconfigure for the next `begin_frame`. Called from
    /// window plumbing when the window reports a resize.
    pub fn mark_resized(&self, width: u32, height: u32) {
        if let Some(state) = self.surface.lock().unwrap().as_mut() {
            state.pending_resize = Some((width.max(1), height.max(1)));
        }
    }

    /// Selects the texture copied into the acquired surface image at
    /// `end_frame`. The texture must match the surface format and carry
    /// transfer-src usage.
    pub fn set_present_source(&self, texture: TextureId) {
        if let Some(state) = self.surface.lock().unwrap().as_mut() {
            state.present_source = Some(texture);
        }
    }

    /// Current surface size, when a surface exists.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface
            .lock()
            .unwrap()
            .as_ref()
            .map(|state| (state.config.width, state.config.height))
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn replay(&self, commands: &[SinkCommand], encoder: &mut wgpu::CommandEncoder) {
        let registries = self.registries.lock().unwrap();
        let mut pass: Option<wgpu::RenderPass<'static>> = None;
        let mut current_scope: Option<(RenderPassId, FramebufferId)> = None;
        let mut target_extent = (0u32, 0u32);
        let mut subpass_index = 0u32;
        // Bindings issued outside a pass are replayed at the next begin.
        let mut pending_vertex: Vec<(u32, BufferId, u64)> = Vec::new();
        let mut pending_index: Option<(BufferId, u64, onyx_core::gpu::IndexFormat)> = None;

        for command in commands {
            match command {
                SinkCommand::BeginRenderPass {
                    render_pass,
                    framebuffer,
                    render_area,
                    clear_values,
                } => {
                    subpass_index = 0;
                    current_scope = Some((*render_pass, *framebuffer));
                    target_extent = registries
                        .framebuffers
                        .get(framebuffer)
                        .map_or((0, 0), |fb| (fb.width, fb.height));
                    pass = self.open_subpass(
                        &registries,
                        encoder,
                        *render_pass,
                        *framebuffer,
                        subpass_index,
                        Some(clear_values),
                    );
                    if let Some(pass) = pass.as_mut() {
                        if let Some((x, y, width, height)) =
                            clamp_scissor(*render_area, target_extent)
                        {
                            pass.set_scissor_rect(x, y, width, height);
                        }
                        for (binding, buffer, offset) in pending_vertex.drain(..) {
                            if let Some(entry) = registries.buffers.get(&buffer) {
                                pass.set_vertex_buffer(binding, entry.buffer.slice(offset..));
                            }
                        }
                        if let Some((buffer, offset, format)) = pending_index.take() {
                            if let Some(entry) = registries.buffers.get(&buffer) {
                                pass.set_index_buffer(
                                    entry.buffer.slice(offset..),
                                    format.into_wgpu(),
                                );
                            }
                        }
                    }
                }
                SinkCommand::NextSubpass => {
                    // No subpasses under wgpu: close the pass and open the
                    // next one over the same attachments, preserving
                    // contents.
                    pass = None;
                    subpass_index += 1;
                    if let Some((render_pass, framebuffer)) = current_scope {
                        pass = self.open_subpass(
                            &registries,
                            encoder,
                            render_pass,
                            framebuffer,
                            subpass_index,
                            None,
                        );
                    }
                }
                SinkCommand::EndRenderPass => {
                    pass = None;
                    current_scope = None;
                }
                SinkCommand::BindPipeline(id) => {
                    if let (Some(pass), Some(pipeline)) =
                        (pass.as_mut(), registries.pipelines.get(id))
                    {
                        pass.set_pipeline(pipeline);
                    }
                }
                SinkCommand::BindDescriptorSet { set_index, set, dynamic_offsets } => {
                    if let (Some(pass), Some(bind_group)) =
                        (pass.as_mut(), registries.bind_groups.get(set))
                    {
                        pass.set_bind_group(*set_index, bind_group, dynamic_offsets);
                    }
                }
                SinkCommand::BindVertexBuffer { binding, buffer, offset } => match pass.as_mut() {
                    Some(pass) => {
                        if let Some(entry) = registries.buffers.get(buffer) {
                            pass.set_vertex_buffer(*binding, entry.buffer.slice(*offset..));
                        }
                    }
                    None => pending_vertex.push((*binding, *buffer, *offset)),
                },
                SinkCommand::BindIndexBuffer { buffer, offset, format } => match pass.as_mut() {
                    Some(pass) => {
                        if let Some(entry) = registries.buffers.get(buffer) {
                            pass.set_index_buffer(entry.buffer.slice(*offset..), format.into_wgpu());
                        }
                    }
                    None => pending_index = Some((*buffer, *offset, *format)),
                },
                SinkCommand::SetViewport(viewport) => {
                    if let Some(pass) = pass.as_mut() {
                        if viewport.width > 0.0 && viewport.height > 0.0 {
                            pass.set_viewport(
                                viewport.x,
                                viewport.y,
                                viewport.width,
                                viewport.height,
                                viewport.min_depth,
                                viewport.max_depth,
                            );
                        }
                    }
                }
                SinkCommand::SetScissor(scissor) => {
                    if let Some(pass) = pass.as_mut() {
                        if let Some((x, y, width, height)) = clamp_scissor(*scissor, target_extent)
                        {
                            pass.set_scissor_rect(x, y, width, height);
                        }
                    }
                }
                SinkCommand::SetBlendConstants(constants) => {
                    if let Some(pass) = pass.as_mut() {
                        pass.set_blend_constant(wgpu::Color {
                            r: f64::from(constants[0]),
                            g: f64::from(constants[1]),
                            b: f64::from(constants[2]),
                            a: f64::from(constants[3]),
                        });
                    }
                }
                SinkCommand::SetStencilReference(reference) => {
                    if let Some(pass) = pass.as_mut() {
                        pass.set_stencil_reference(*reference);
                    }
                }
                SinkCommand::Draw { first_vertex, num_vertices, first_instance, num_instances } => {
                    if let Some(pass) = pass.as_mut() {
                        pass.draw(
                            *first_vertex..*first_vertex + *num_vertices,
                            *first_instance..*first_instance + *num_instances,
                        );
                    }
                }
                SinkCommand::DrawIndexed {
                    num_indices,
                    index_offset,
                    vertex_offset,
                    first_instance,
                    num_instances,
                } => {
                    if let Some(pass) = pass.as_mut() {
                        pass.draw_indexed(
                            *index_offset..*index_offset + *num_indices,
                            *vertex_offset,
                            *first_instance..*first_instance + *num_instances,
                        );
                    }
                }
            }
        }
    }

    /// Opens one wgpu render pass for `subpass_index` of the core
    /// renderpass. With `clear_values` the declared clear ops apply; without
    /// them (subpass transitions) everything loads.
    fn open_subpass(
        &self,
        registries: &Registries,
        encoder: &mut wgpu::CommandEncoder,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        subpass_index: u32,
        clear_values: Option<&[ClearValue]>,
    ) -> Option<wgpu::RenderPass<'static>> {
        let info = registries.render_passes.get(&render_pass)?;
        let fb = registries.framebuffers.get(&framebuffer)?;
        let subpass = info.subpasses.get(subpass_index as usize)?;

        let view_for = |attachment: u32| -> Option<wgpu::TextureView> {
            let texture = fb.attachments.get(attachment as usize)?;
            let entry = registries.textures.get(texture)?;
            Some(entry.texture.create_view(&wgpu::TextureViewDescriptor::default()))
        };

        let mut clear_cursor = 0usize;
        let mut clear_for = |attachment: u32| -> Option<ClearValue> {
            let clears = clear_values?;
            if info.clear_ops & (1 << attachment) == 0 {
                return None;
            }
            let value = clears.get(clear_cursor).copied();
            clear_cursor += 1;
            value
        };

        // Views are built first; the pass keeps its own references to the
        // underlying textures once recorded, so these locals may drop with
        // the function scope.
        let color_preps: Vec<Option<(wgpu::TextureView, wgpu::Operations<wgpu::Color>)>> = subpass
            .color_refs
            .iter()
            .map(|attachment_ref| {
                let view = view_for(attachment_ref.attachment)?;
                let load = match clear_for(attachment_ref.attachment) {
                    Some(ClearValue::Color(color)) => wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(color.r),
                        g: f64::from(color.g),
                        b: f64::from(color.b),
                        a: f64::from(color.a),
                    }),
                    Some(ClearValue::DepthStencil { .. }) | None => wgpu::LoadOp::Load,
                };
                let store = if info.store_ops & (1 << attachment_ref.attachment) != 0 {
                    wgpu::StoreOp::Store
                } else {
                    wgpu::StoreOp::Discard
                };
                Some((view, wgpu::Operations { load, store }))
            })
            .collect();

        let depth_prep = subpass.depth_ref.and_then(|attachment_ref| {
            let view = view_for(attachment_ref.attachment)?;
            let load = match clear_for(attachment_ref.attachment) {
                Some(ClearValue::DepthStencil { depth, .. }) => wgpu::LoadOp::Clear(depth),
                _ => wgpu::LoadOp::Load,
            };
            Some((view, load))
        });

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = color_preps
            .iter()
            .map(|prep| {
                prep.as_ref().map(|(view, ops)| wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: *ops,
                })
            })
            .collect();
        let depth_stencil_attachment =
            depth_prep.as_ref().map(|(view, load)| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations { load: *load, store: wgpu::StoreOp::Store }),
                stencil_ops: None,
            });

        let pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("onyx pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();
        Some(pass)
    }
}

impl GpuBackend for WgpuBackend {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: buffer_usages(desc.usage, desc.memory_props),
            mapped_at_creation: false,
        });
        let id = BufferId(self.next());
        self.registries.lock().unwrap().buffers.insert(id, BufferEntry { buffer });
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match self.registries.lock().unwrap().buffers.remove(&id) {
            Some(entry) => {
                entry.buffer.destroy();
                Ok(())
            }
            None => Err(ResourceError::InvalidHandle),
        }
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let registries = self.registries.lock().unwrap();
        let entry = registries.buffers.get(&id).ok_or(ResourceError::InvalidHandle)?;
        if offset + data.len() as u64 > entry.buffer.size() {
            return Err(ResourceError::OutOfBounds);
        }
        self.queue.write_buffer(&entry.buffer, offset, data);
        Ok(())
    }

    fn copy_buffer_to_buffer(
        &self,
        src: BufferId,
        src_offset: u64,
        dst: BufferId,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError> {
        let registries = self.registries.lock().unwrap();
        let src = registries.buffers.get(&src).ok_or(ResourceError::InvalidHandle)?;
        let dst = registries.buffers.get(&dst).ok_or(ResourceError::InvalidHandle)?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("onyx copy") });
        encoder.copy_buffer_to_buffer(&src.buffer, src_offset, &dst.buffer, dst_offset, size);
        self.queue.submit([encoder.finish()]);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.extent.width,
                height: desc.extent.height,
                depth_or_array_layers: desc.extent.depth,
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: desc.sample_count.into_wgpu(),
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.into_wgpu(),
            usage: desc.flags.into_wgpu(),
            view_formats: &[],
        });
        let id = TextureId(self.next());
        self.registries
            .lock()
            .unwrap()
            .textures
            .insert(id, TextureEntry { texture, format: desc.format });
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        match self.registries.lock().unwrap().textures.remove(&id) {
            Some(entry) => {
                entry.texture.destroy();
                Ok(())
            }
            None => Err(ResourceError::InvalidHandle),
        }
    }

    fn write_texture(
        &self,
        id: TextureId,
        data: &[u8],
        bytes_per_row: Option<u32>,
        origin: Origin3D,
        size: Extent3D,
    ) -> Result<(), ResourceError> {
        let registries = self.registries.lock().unwrap();
        let entry = registries.textures.get(&id).ok_or(ResourceError::InvalidHandle)?;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: origin.x, y: origin.y, z: origin.z },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row,
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: size.depth,
            },
        );
        Ok(())
    }

    fn create_texture_view(
        &self,
        texture: TextureId,
        desc: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let mut registries = self.registries.lock().unwrap();
        let entry = registries.textures.get(&texture).ok_or(ResourceError::InvalidHandle)?;
        let view = entry.texture.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label.as_deref(),
            aspect: desc.aspect.map_or(wgpu::TextureAspect::All, |aspect| aspect.into_wgpu()),
            base_mip_level: desc.base_mip_level,
            mip_level_count: desc.mip_level_count,
            ..Default::default()
        });
        let id = TextureViewId(self.next());
        registries.views.insert(id, view);
        Ok(id)
    }

    fn destroy_texture_view(&self, id: TextureViewId) -> Result<(), ResourceError> {
        self.registries.lock().unwrap().views.remove(&id);
        Ok(())
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: desc.address_mode.into_wgpu(),
            address_mode_v: desc.address_mode.into_wgpu(),
            address_mode_w: desc.address_mode.into_wgpu(),
            mag_filter: desc.mag_filter.into_wgpu(),
            min_filter: desc.min_filter.into_wgpu(),
            ..Default::default()
        });
        let id = SamplerId(self.next());
        self.registries.lock().unwrap().samplers.insert(id, sampler);
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        self.registries.lock().unwrap().samplers.remove(&id);
        Ok(())
    }

    fn create_shader_module(
        &self,
        desc: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let source = match &desc.source {
            ShaderSource::Wgsl(text) => {
                wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(text.as_ref()))
            }
            ShaderSource::SpirV(words) => {
                wgpu::ShaderSource::SpirV(std::borrow::Cow::Borrowed(words.as_ref()))
            }
        };
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: desc.label.as_deref(),
            source,
        });
        let id = ShaderModuleId(self.next());
        self.registries.lock().unwrap().modules.insert(
            id,
            ModuleEntry {
                module,
                stage: desc.stage,
                entry_point: desc.entry_point.to_string(),
            },
        );
        Ok(id)
    }

    fn destroy_shader_module(&self, id: ShaderModuleId) -> Result<(), ResourceError> {
        self.registries.lock().unwrap().modules.remove(&id);
        Ok(())
    }

    fn create_program(&self, desc: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        let mut registries = self.registries.lock().unwrap();

        let bind_group_layouts: Vec<wgpu::BindGroupLayout> = desc
            .set_layouts
            .iter()
            .enumerate()
            .map(|(set, layout)| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = layout
                    .bindings
                    .iter()
                    .flat_map(|binding| {
                        layout_entries(binding.binding, binding.ty, binding.count, binding.stages)
                    })
                    .collect();
                self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("onyx set {set}")),
                    entries: &entries,
                })
            })
            .collect();

        let layout_refs: Vec<Option<&wgpu::BindGroupLayout>> =
            bind_group_layouts.iter().map(Some).collect();
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: desc.label.as_deref(),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        let id = ProgramId(self.next());
        registries.programs.insert(
            id,
            ProgramEntry {
                modules: desc.modules.clone(),
                set_layouts: desc.set_layouts.clone(),
                bind_group_layouts,
                pipeline_layout,
            },
        );
        Ok(id)
    }

    fn destroy_program(&self, id: ProgramId) -> Result<(), ResourceError> {
        self.registries.lock().unwrap().programs.remove(&id);
        Ok(())
    }

    fn create_render_pass(&self, info: &RenderPassInfo) -> Result<RenderPassId, ResourceError> {
        if info.subpasses.is_empty() {
            log::error!("renderpass declared with no subpasses");
            return Err(ResourceError::InvalidHandle);
        }
        let id = RenderPassId(self.next());
        self.registries.lock().unwrap().render_passes.insert(id, info.clone());
        Ok(id)
    }

    fn destroy_render_pass(&self, id: RenderPassId) -> Result<(), ResourceError> {
        self.registries.lock().unwrap().render_passes.remove(&id);
        Ok(())
    }

    fn create_framebuffer(&self, desc: &FramebufferDescriptor) -> Result<FramebufferId, ResourceError> {
        let id = FramebufferId(self.next());
        self.registries.lock().unwrap().framebuffers.insert(
            id,
            FramebufferEntry {
                attachments: desc.attachments.to_vec(),
                width: desc.width,
                height: desc.height,
            },
        );
        Ok(id)
    }

    fn destroy_framebuffer(&self, id: FramebufferId) -> Result<(), ResourceError> {
        self.registries.lock().unwrap().framebuffers.remove(&id);
        Ok(())
    }

    fn create_pipeline(&self, desc: &PipelineDescriptor) -> Result<PipelineId, ResourceError> {
        let mut registries = self.registries.lock().unwrap();
        let state = desc.state;

        let program = registries.programs.get(&desc.program).ok_or(ResourceError::InvalidHandle)?;
        let pass_info =
            registries.render_passes.get(&desc.render_pass).ok_or(ResourceError::InvalidHandle)?;
        let subpass = pass_info
            .subpasses
            .get(desc.subpass as usize)
            .ok_or(ResourceError::InvalidHandle)?;

        let mut vertex_module = None;
        let mut fragment_module = None;
        for module_id in &program.modules {
            let entry = registries.modules.get(module_id).ok_or(ResourceError::InvalidHandle)?;
            match entry.stage {
                ShaderStage::Vertex => vertex_module = Some(entry),
                ShaderStage::Fragment => fragment_module = Some(entry),
            }
        }
        let vertex_module = vertex_module.ok_or(ResourceError::InvalidHandle)?;

        // Attributes get shader locations in declaration order; buffers keep
        // their binding indices.
        let mut per_binding: Vec<Vec<wgpu::VertexAttribute>> =
            vec![Vec::new(); desc.vertex_layout.bindings().len()];
        for (location, attribute) in desc.vertex_layout.attributes().iter().enumerate() {
            per_binding[attribute.binding as usize].push(wgpu::VertexAttribute {
                format: attribute.format.into_wgpu(),
                offset: attribute.offset,
                shader_location: location as u32,
            });
        }
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex_layout
            .bindings()
            .iter()
            .zip(per_binding.iter())
            .map(|(binding, attributes)| wgpu::VertexBufferLayout {
                array_stride: binding.stride,
                step_mode: binding.step_mode.into_wgpu(),
                attributes,
            })
            .collect();

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = subpass
            .color_refs
            .iter()
            .enumerate()
            .map(|(target, attachment_ref)| {
                let format = pass_info
                    .attachments
                    .get(attachment_ref.attachment as usize)
                    .map(|attachment| attachment.format)?;
                let blend_state = state.blend.get(target).copied().unwrap_or_default();
                Some(wgpu::ColorTargetState {
                    format: format.into_wgpu(),
                    blend: state.blend_enabled(target).then(|| blend_state.into_wgpu()),
                    write_mask: blend_state.write_mask.into_wgpu(),
                })
            })
            .collect();

        let depth_stencil = subpass.depth_ref.and_then(|attachment_ref| {
            let format = pass_info.attachments.get(attachment_ref.attachment as usize)?.format;
            Some(wgpu::DepthStencilState {
                format: format.into_wgpu(),
                depth_write_enabled: Some(state.depth_write()),
                depth_compare: if state.depth_testing() {
                    Some(state.depth_op().into_wgpu())
                } else {
                    Some(wgpu::CompareFunction::Always)
                },
                stencil: if state.stencil_testing() {
                    wgpu::StencilState {
                        front: state.stencil_front().into_wgpu(),
                        back: state.stencil_back().into_wgpu(),
                        read_mask: u32::from(state.stencil_compare_mask()),
                        write_mask: u32::from(state.stencil_write_mask()),
                    }
                } else {
                    wgpu::StencilState::default()
                },
                bias: wgpu::DepthBiasState {
                    constant: state.depth_bias.constant as i32,
                    slope_scale: state.depth_bias.slope,
                    clamp: state.depth_bias.clamp,
                },
            })
        });

        let fragment = fragment_module.map(|module| wgpu::FragmentState {
            module: &module.module,
            entry_point: Some(module.entry_point.as_str()),
            compilation_options: Default::default(),
            targets: &color_targets,
        });

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: desc.label.as_deref(),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module.module,
                entry_point: Some(vertex_module.entry_point.as_str()),
                compilation_options: Default::default(),
                buffers: &vertex_buffers,
            },
            primitive: wgpu::PrimitiveState {
                topology: state.draw_mode().into_wgpu(),
                strip_index_format: None,
                front_face: state.front_face().into_wgpu(),
                cull_mode: state.cull_face().into_wgpu(),
                unclipped_depth: false,
                polygon_mode: state.fill_mode().into_wgpu(),
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: state.sample_count.into_wgpu(),
                mask: u64::from(state.sample_mask),
                alpha_to_coverage_enabled: state.alpha_to_coverage(),
            },
            fragment,
            multiview_mask: None,
            cache: None,
        });

        let id = PipelineId(self.next());
        registries.pipelines.insert(id, pipeline);
        Ok(id)
    }

    fn destroy_pipeline(&self, id: PipelineId) -> Result<(), ResourceError> {
        self.registries.lock().unwrap().pipelines.remove(&id);
        Ok(())
    }

    fn allocate_descriptor_set(
        &self,
        program: ProgramId,
        set_index: u32,
        info: &DescriptorSetInfo,
    ) -> Result<DescriptorSetId, ResourceError> {
        let mut registries = self.registries.lock().unwrap();
        let program_entry =
            registries.programs.get(&program).ok_or(ResourceError::InvalidHandle)?;
        let layout = program_entry
            .bind_group_layouts
            .get(set_index as usize)
            .ok_or(ResourceError::InvalidHandle)?;
        let declared = program_entry
            .set_layouts
            .get(set_index as usize)
            .ok_or(ResourceError::InvalidHandle)?;
        for binding in &info.bindings {
            if !declared.bindings.iter().any(|entry| entry.binding == binding.binding) {
                log::error!(
                    "descriptor set binds binding {} that set {set_index} never declared",
                    binding.binding
                );
                return Err(ResourceError::InvalidHandle);
            }
        }

        // Entries borrow registry resources, so resolve everything first.
        let mut entries: Vec<wgpu::BindGroupEntry> = Vec::new();
        for binding in &info.bindings {
            let slot = binding_slot(binding.binding);
            match &binding.data {
                DescriptorBindingData::UniformBuffers(buffers)
                | DescriptorBindingData::DynamicUniformBuffers(buffers) => {
                    let range = buffers.first().ok_or(ResourceError::InvalidHandle)?;
                    let entry =
                        registries.buffers.get(&range.buffer).ok_or(ResourceError::InvalidHandle)?;
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &entry.buffer,
                            offset: range.offset,
                            size: std::num::NonZeroU64::new(range.size),
                        }),
                    });
                }
                DescriptorBindingData::ImageSamplers(images) => {
                    let image = images.first().ok_or(ResourceError::InvalidHandle)?;
                    let view =
                        registries.views.get(&image.view).ok_or(ResourceError::InvalidHandle)?;
                    let sampler = registries
                        .samplers
                        .get(&image.sampler)
                        .ok_or(ResourceError::InvalidHandle)?;
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot,
                        resource: wgpu::BindingResource::TextureView(view),
                    });
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot + 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    });
                }
                DescriptorBindingData::InputAttachments(views) => {
                    let view_id = views.first().ok_or(ResourceError::InvalidHandle)?;
                    let view =
                        registries.views.get(view_id).ok_or(ResourceError::InvalidHandle)?;
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot,
                        resource: wgpu::BindingResource::TextureView(view),
                    });
                }
            }
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("onyx descriptor set"),
            layout,
            entries: &entries,
        });
        drop(entries);

        let id = DescriptorSetId(self.next());
        registries.bind_groups.insert(id, bind_group);
        Ok(id)
    }

    fn free_descriptor_set(&self, id: DescriptorSetId) -> Result<(), ResourceError> {
        self.registries.lock().unwrap().bind_groups.remove(&id);
        Ok(())
    }

    fn create_command_sink(&self, label: Option<&str>) -> Box<dyn CommandSink> {
        Box::new(WgpuSink::new(label))
    }

    fn submit(&self, mut sink: Box<dyn CommandSink>) {
        let sink = sink
            .as_any_mut()
            .downcast_mut::<WgpuSink>()
            .expect("WgpuBackend only submits its own sinks");
        let commands = std::mem::take(&mut sink.commands);
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: sink.label.as_deref(),
        });
        self.replay(&commands, &mut encoder);
        self.queue.submit([encoder.finish()]);
    }

    fn begin_frame(&self) -> bool {
        let mut surface = self.surface.lock().unwrap();
        let Some(state) = surface.as_mut() else {
            return true;
        };

        if let Some((width, height)) = state.pending_resize.take() {
            state.config.width = width;
            state.config.height = height;
            state.surface.configure(&self.device, &state.config);
        }

        match state.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture)
            | wgpu::CurrentSurfaceTexture::Suboptimal(texture) => {
                state.current = Some(texture);
                true
            }
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                log::debug!("surface lost/outdated; reconfiguring and skipping the frame");
                state.surface.configure(&self.device, &state.config);
                false
            }
            other => {
                log::warn!("surface acquire failed: {other:?}; skipping the frame");
                false
            }
        }
    }

    fn end_frame(&self) {
        let mut surface = self.surface.lock().unwrap();
        let Some(state) = surface.as_mut() else {
            return;
        };
        let Some(frame) = state.current.take() else {
            return;
        };

        if let Some(source) = state.present_source {
            let registries = self.registries.lock().unwrap();
            if let Some(entry) = registries.textures.get(&source) {
                if from_wgpu_texture_format(state.config.format) != Some(entry.format) {
                    log::warn!(
                        "present source format {:?} does not match the surface; skipping copy",
                        entry.format
                    );
                    drop(registries);
                    frame.present();
                    return;
                }
                let mut encoder =
                    self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("onyx present"),
                    });
                let extent = entry.texture.size();
                encoder.copy_texture_to_texture(
                    entry.texture.as_image_copy(),
                    frame.texture.as_image_copy(),
                    wgpu::Extent3d {
                        width: extent.width.min(state.config.width),
                        height: extent.height.min(state.config.height),
                        depth_or_array_layers: 1,
                    },
                );
                self.queue.submit([encoder.finish()]);
            }
        }
        frame.present();
    }

    fn wait_idle(&self) {
        if let Err(err) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
            log::warn!("device poll failed: {err:?}");
        }
    }

    fn limits(&self) -> GpuLimits {
        let downlevel = self.adapter.get_downlevel_capabilities();
        GpuLimits {
            min_uniform_offset_alignment: u64::from(
                self.device.limits().min_uniform_buffer_offset_alignment,
            ),
            supports_base_vertex: downlevel
                .flags
                .contains(wgpu::DownlevelFlags::BASE_VERTEX),
        }
    }

    fn backend_type(&self) -> GpuBackendType {
        match self.adapter.get_info().backend {
            wgpu::Backend::Vulkan => GpuBackendType::Vulkan,
            wgpu::Backend::Metal => GpuBackendType::Metal,
            wgpu::Backend::Dx12 => GpuBackendType::Dx12,
            wgpu::Backend::Gl => GpuBackendType::OpenGl,
            wgpu::Backend::BrowserWebGpu => GpuBackendType::WebGpu,
            _ => GpuBackendType::Unknown,
        }
    }

    fn adapter_info(&self) -> AdapterInfo {
        let info = self.adapter.get_info();
        AdapterInfo {
            name: info.name,
            backend_type: self.backend_type(),
            device_type: match info.device_type {
                wgpu::DeviceType::IntegratedGpu => GpuDeviceType::IntegratedGpu,
                wgpu::DeviceType::DiscreteGpu => GpuDeviceType::DiscreteGpu,
                wgpu::DeviceType::VirtualGpu => GpuDeviceType::VirtualGpu,
                wgpu::DeviceType::Cpu => GpuDeviceType::Cpu,
                wgpu::DeviceType::Other => GpuDeviceType::Unknown,
            },
        }
    }

    fn surface_format(&self) -> Option<TextureFormat> {
        self.surface
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|state| from_wgpu_texture_format(state.config.format))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
