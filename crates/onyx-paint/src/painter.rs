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

//! The 2D vector painter.
//!
//! Recording is cheap: every `paint_*` call appends one command to the
//! per-frame arenas. [`Painter2D::render_to_queue`] does the heavy lifting
//! once per frame: it sorts commands into overlap-safe batches (preserving
//! painter's-algorithm order while merging non-overlapping compatible
//! commands into one draw), sizes and fills the frame slot's GPU buffers,
//! and emits one indexed draw per batch into the view's render queue.

use crate::brush::{Brush, BrushId, GradientStop};
use crate::command::{ClipId, IndexRange, PaintCommand, PaintShape, PointRange, TextRange};
use crate::geometry::{
    arc_index_count, arc_segment_count, arc_vertex_count, rounded_rect_counts, AxisQuad,
    ShadowVertex, Vertex2D, VertexWriter, INDICES_PER_RECT, VERTS_PER_RECT,
};
use crate::polyline::{tessellate, PolylineEnd, PolylineGeometry, PolylineJoin};
use crate::shaders;
use crate::text::{FontId, PainterFont};
use onyx_core::error::ResourceError;
use onyx_core::gpu::{
    BufferDescriptor, BufferId, BufferUsage, CullFace, DescSetBind, DescriptorSetInfo,
    DynamicStateFlags, GpuDevice, IndexFormat, MemoryProps, PipelineState, ProgramId, RenderCommand,
    RenderQueue, SamplerDescriptor, SamplerId, ShaderStage, ShaderStageFlags, TextureDescriptor,
    TextureFormat, TextureViewDescriptor, TextureViewId, VertexBufferBinding, VertexFormat,
    VertexLayoutId, VertexLayoutSet,
};
use onyx_core::math::{
    Extent3D, Origin3D, Rect2, Rgba, ScissorRect, Vec2, Viewport, EPSILON, TAU,
};

/// Shared GPU resources of the painter: programs, layouts, the white 1x1
/// texture, and the sampler.
struct PaintResources {
    textured_program: ProgramId,
    rect_shadow_program: ProgramId,
    rounded_shadow_program: ProgramId,
    standard_layout: VertexLayoutId,
    shadow_layout: VertexLayoutId,
    white_view: TextureViewId,
    white_texture: onyx_core::gpu::TextureId,
    sampler: SamplerId,
}

/// One bucket (normal or shadow) of one frame slot's GPU buffers.
/// Grow-only: `reserve` is a no-op while capacity suffices.
#[derive(Debug, Default)]
struct BucketBuffers {
    vertex: Option<BufferId>,
    vertex_capacity: u64,
    index: Option<BufferId>,
    index_capacity: u64,
}

impl BucketBuffers {
    fn reserve(
        &mut self,
        device: &mut GpuDevice,
        vertex_bytes: u64,
        index_bytes: u64,
        label: &'static str,
    ) -> Result<(), ResourceError> {
        if vertex_bytes > self.vertex_capacity {
            if let Some(old) = self.vertex.take() {
                device.release(old);
            }
            self.vertex = Some(device.create_buffer(&BufferDescriptor::new(
                label,
                vertex_bytes,
                BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
                MemoryProps::HOST_VISIBLE | MemoryProps::HOST_COHERENT,
            ))?);
            self.vertex_capacity = vertex_bytes;
        }
        if index_bytes > self.index_capacity {
            if let Some(old) = self.index.take() {
                device.release(old);
            }
            self.index = Some(device.create_buffer(&BufferDescriptor::new(
                label,
                index_bytes,
                BufferUsage::INDEX | BufferUsage::TRANSFER_DST,
                MemoryProps::HOST_VISIBLE | MemoryProps::HOST_COHERENT,
            ))?);
            self.index_capacity = index_bytes;
        }
        Ok(())
    }

    fn release(&mut self, device: &mut GpuDevice) {
        if let Some(buffer) = self.vertex.take() {
            device.release(buffer);
        }
        if let Some(buffer) = self.index.take() {
            device.release(buffer);
        }
        self.vertex_capacity = 0;
        self.index_capacity = 0;
    }
}

#[derive(Debug, Default)]
struct FrameBuffers {
    normal: BucketBuffers,
    shadow: BucketBuffers,
}

/// One command prepared for batching.
struct Element {
    command: usize,
    bounds: Rect2,
    drawn: bool,
    in_current_batch: bool,
    num_vertices: u32,
    num_indices: u32,
    polyline: Option<PolylineGeometry>,
}

/// A contiguous draw: compatible commands whose bounds did not overlap any
/// earlier undrawn command when they were placed.
struct Batch {
    members: Vec<usize>,
    blurred: bool,
    brush: BrushId,
    clip: ClipId,
    first_index: u32,
    num_indices: u32,
}

/// The 2D painter. See the module docs.
pub struct Painter2D {
    resources: PaintResources,
    frame_buffers: Vec<FrameBuffers>,
    fonts: Vec<PainterFont>,

    // Per-frame arenas, rewound by `begin`.
    brushes: Vec<Brush>,
    commands: Vec<PaintCommand>,
    points: Vec<Vec2>,
    triangle_indices: Vec<u32>,
    text_arena: String,
    clips: Vec<ScissorRect>,
    clip_stack: Vec<ClipId>,
    screen: Rect2,
}

impl Painter2D {
    /// Creates the painter's GPU resources on `device`.
    pub fn new(device: &mut GpuDevice) -> Result<Self, ResourceError> {
        let textured_vs = shaders::create_module(
            device,
            "painter.textured.vs",
            ShaderStage::Vertex,
            "vs_main",
            shaders::PAINTER_TEXTURED,
        )?;
        let textured_fs = shaders::create_module(
            device,
            "painter.textured.fs",
            ShaderStage::Fragment,
            "fs_main",
            shaders::PAINTER_TEXTURED,
        )?;
        let shadow_vs = shaders::create_module(
            device,
            "painter.shadow.vs",
            ShaderStage::Vertex,
            "vs_main",
            shaders::DROP_SHADOW_VS,
        )?;
        let shadow_rect_fs = shaders::create_module(
            device,
            "painter.shadow_rect.fs",
            ShaderStage::Fragment,
            "fs_main",
            shaders::DROP_SHADOW_RECT_FS,
        )?;
        let shadow_rounded_fs = shaders::create_module(
            device,
            "painter.shadow_rounded.fs",
            ShaderStage::Fragment,
            "fs_main",
            shaders::DROP_SHADOW_ROUNDED_FS,
        )?;

        let textured_program = shaders::create_program(
            device,
            "Painter2D.Textured",
            [textured_vs, textured_fs],
            2,
            |descriptor| {
                descriptor
                    .with_uniform_buffer(0, 0, 1, ShaderStageFlags::VERTEX)
                    .with_image_sampler(1, 0, 1, ShaderStageFlags::FRAGMENT)
            },
        )?;
        let rect_shadow_program = shaders::create_program(
            device,
            "Painter2D.ShadowRect",
            [shadow_vs, shadow_rect_fs],
            1,
            |descriptor| descriptor.with_uniform_buffer(0, 0, 1, ShaderStageFlags::VERTEX),
        )?;
        let rounded_shadow_program = shaders::create_program(
            device,
            "Painter2D.ShadowRoundedRect",
            [shadow_vs, shadow_rounded_fs],
            1,
            |descriptor| descriptor.with_uniform_buffer(0, 0, 1, ShaderStageFlags::VERTEX),
        )?;

        let mut standard = VertexLayoutSet::new();
        let binding = standard.add_binding(std::mem::size_of::<Vertex2D>() as u64);
        standard.add_attribute(binding, VertexFormat::Float32x2, 0);
        standard.add_attribute(binding, VertexFormat::Float32x2, 8);
        standard.add_attribute(binding, VertexFormat::Unorm8x4, 16);
        let standard_layout = device.create_vertex_layout(standard);

        let mut shadow = VertexLayoutSet::new();
        let binding = shadow.add_binding(std::mem::size_of::<ShadowVertex>() as u64);
        shadow.add_attribute(binding, VertexFormat::Float32x2, 0);
        shadow.add_attribute(binding, VertexFormat::Float32, 8);
        shadow.add_attribute(binding, VertexFormat::Float32, 12);
        shadow.add_attribute(binding, VertexFormat::Float32x4, 16);
        shadow.add_attribute(binding, VertexFormat::Unorm8x4, 32);
        let shadow_layout = device.create_vertex_layout(shadow);

        let white_texture = device.create_texture(&TextureDescriptor::sampled_2d(
            "painter-white",
            1,
            1,
            TextureFormat::Rgba8Unorm,
        ))?;
        device.write_texture(
            white_texture,
            &[0xFF, 0xFF, 0xFF, 0xFF],
            Some(4),
            Origin3D::default(),
            Extent3D::new(1, 1, 1),
        )?;
        let white_view = device.create_texture_view(white_texture, &TextureViewDescriptor::default())?;
        let sampler = device.create_sampler(&SamplerDescriptor::nearest_clamp("painter"))?;

        let num_slots = device.frame_info().num_frame_indices as usize;
        let mut frame_buffers = Vec::with_capacity(num_slots);
        frame_buffers.resize_with(num_slots, FrameBuffers::default);

        Ok(Self {
            resources: PaintResources {
                textured_program,
                rect_shadow_program,
                rounded_shadow_program,
                standard_layout,
                shadow_layout,
                white_view,
                white_texture,
                sampler,
            },
            frame_buffers,
            fonts: Vec::new(),
            brushes: Vec::new(),
            commands: Vec::new(),
            points: Vec::new(),
            triangle_indices: Vec::new(),
            text_arena: String::new(),
            clips: Vec::new(),
            clip_stack: Vec::new(),
            screen: Rect2::default(),
        })
    }

    /// Registers a font with the painter; the ID is stable for the
    /// painter's lifetime.
    pub fn add_font(&mut self, font: PainterFont) -> FontId {
        self.fonts.push(font);
        FontId(self.fonts.len() - 1)
    }

    /// A registered font.
    pub fn font_mut(&mut self, id: FontId) -> Option<&mut PainterFont> {
        self.fonts.get_mut(id.0)
    }

    /// Rewinds the per-frame arenas and installs the default clip covering
    /// `screen`.
    pub fn begin(&mut self, screen: Rect2) {
        self.brushes.clear();
        self.commands.clear();
        self.points.clear();
        self.triangle_indices.clear();
        self.text_arena.clear();
        self.clips.clear();
        self.clip_stack.clear();
        self.screen = screen;
        self.push_clip_rect(ScissorRect::new(
            screen.min.x as i32,
            screen.min.y as i32,
            screen.width().max(0.0) as u32,
            screen.height().max(0.0) as u32,
        ));
    }

    // --- Brushes ---

    /// Records a brush in the frame arena.
    pub fn make_brush(&mut self, brush: Brush) -> BrushId {
        self.brushes.push(brush);
        BrushId(self.brushes.len() - 1)
    }

    /// A flat-color brush.
    pub fn color_brush(&mut self, color: Rgba) -> BrushId {
        self.make_brush(Brush::colored(color))
    }

    /// A two-stop gradient brush with the identity remap.
    pub fn gradient_brush(&mut self, a: Rgba, b: Rgba) -> BrushId {
        self.make_brush(Brush::linear_gradient(a, b))
    }

    /// An n-ary gradient brush over sorted stops.
    pub fn nary_gradient_brush(&mut self, stops: &[GradientStop]) -> BrushId {
        debug_assert!(stops.len() >= 2, "an n-ary gradient needs at least two stops");
        debug_assert!(
            stops.windows(2).all(|pair| pair[0].percent <= pair[1].percent),
            "gradient stops must be sorted by percent"
        );
        self.make_brush(Brush::NaryLinearGradient {
            stops: stops.to_vec(),
            uv_remap: AxisQuad::default(),
        })
    }

    /// A textured brush.
    pub fn texture_brush(&mut self, view: TextureViewId, tint: Rgba) -> BrushId {
        self.make_brush(Brush::Textured { view, tint, uv_remap: AxisQuad::default() })
    }

    /// A font brush for text commands.
    pub fn font_brush(&mut self, font: FontId, tint: Rgba) -> BrushId {
        self.make_brush(Brush::Font { font, tint })
    }

    // --- Clip state ---

    /// Pushes a clip rect; subsequent commands are scissored to it. Clipped
    /// to non-negative coordinates.
    pub fn push_clip_rect(&mut self, rect: ScissorRect) -> ClipId {
        let clamped = ScissorRect::new(rect.x.max(0), rect.y.max(0), rect.width, rect.height);
        self.clips.push(clamped);
        let id = ClipId(self.clips.len() - 1);
        self.clip_stack.push(id);
        id
    }

    /// Pops the current clip rect. The default clip installed by `begin`
    /// stays.
    pub fn pop_clip_rect(&mut self) {
        debug_assert!(self.clip_stack.len() > 1, "mismatched clip push/pop");
        if self.clip_stack.len() > 1 {
            self.clip_stack.pop();
        }
    }

    fn current_clip(&self) -> ClipId {
        *self.clip_stack.last().expect("begin() installs the default clip")
    }

    fn record(&mut self, brush: BrushId, shape: PaintShape) {
        self.commands.push(PaintCommand { brush, clip: self.current_clip(), shape });
    }

    // --- Draw routines ---

    /// Fills a quad.
    pub fn fill_rect(&mut self, brush: BrushId, rect: AxisQuad) {
        self.record(brush, PaintShape::FillRect { rect });
    }

    /// Fills a quad with rounded corners. The radius clamps to half the
    /// shorter side, so oversized radii degrade to a pill or circle.
    pub fn fill_rounded_rect(&mut self, brush: BrushId, rect: AxisQuad, border_radius: f32) {
        let border_radius = border_radius
            .min(rect.width() * 0.5)
            .min(rect.height() * 0.5)
            .max(0.0);
        self.record(brush, PaintShape::FillRoundedRect { rect, border_radius });
    }

    /// Draws an analytically blurred rectangle with one shared corner
    /// radius.
    pub fn blurred_rect(&mut self, brush: BrushId, rect: Rect2, sigma: f32, border_radius: f32) {
        self.blurred_rect_radii(brush, rect, sigma, [border_radius; 4]);
    }

    /// Draws an analytically blurred rectangle with per-corner radii
    /// (top-left, top-right, bottom-right, bottom-left).
    pub fn blurred_rect_radii(
        &mut self,
        brush: BrushId,
        rect: Rect2,
        sigma: f32,
        border_radii: [f32; 4],
    ) {
        self.record(brush, PaintShape::BlurredRect { rect, sigma, border_radii });
    }

    /// Fills a quad as nine slices split by border insets (top, bottom,
    /// left, right); every slice samples the brush across the whole quad.
    pub fn nine_slice_rect(&mut self, brush: BrushId, rect: AxisQuad, border_area: [f32; 4]) {
        self.record(brush, PaintShape::NineSliceRect { rect, border_area });
    }

    /// Fills an arc fan. Non-positive radii or sweeps record a command that
    /// draws nothing; sweeps clamp to a full turn.
    pub fn fill_arc(
        &mut self,
        brush: BrushId,
        position: Vec2,
        radius: f32,
        start_angle: f32,
        arc_angle: f32,
    ) {
        self.record(
            brush,
            PaintShape::FillArc { position, radius, start_angle, arc_angle: arc_angle.min(TAU) },
        );
    }

    /// Fills a full circle.
    pub fn fill_circle(&mut self, brush: BrushId, center: Vec2, radius: f32) {
        self.fill_arc(brush, center, radius, 0.0, TAU);
    }

    /// Strokes a path.
    pub fn polyline(
        &mut self,
        brush: BrushId,
        points: &[Vec2],
        thickness: f32,
        join_style: PolylineJoin,
        end_style: PolylineEnd,
        overlap_allowed: bool,
    ) {
        let start = self.points.len();
        self.points.extend_from_slice(points);
        self.record(
            brush,
            PaintShape::Polyline {
                points: PointRange { start, len: points.len() },
                thickness,
                join_style,
                end_style,
                overlap_allowed,
            },
        );
    }

    /// Draws caller-provided triangles through the brush sampler.
    pub fn fill_triangles(&mut self, brush: BrushId, points: &[Vec2], indices: &[u32]) {
        debug_assert!(
            indices.iter().all(|&index| (index as usize) < points.len()),
            "triangle index out of range"
        );
        debug_assert!(indices.len() % 3 == 0, "triangle index count must be a multiple of 3");
        let point_start = self.points.len();
        self.points.extend_from_slice(points);
        let index_start = self.triangle_indices.len();
        self.triangle_indices.extend_from_slice(indices);
        self.record(
            brush,
            PaintShape::FillTriangles {
                points: PointRange { start: point_start, len: points.len() },
                indices: IndexRange { start: index_start, len: indices.len() },
            },
        );
    }

    /// Draws a UTF-8 text run with its baseline origin at `position`. The
    /// brush must be a font brush.
    pub fn text(&mut self, brush: BrushId, position: Vec2, text: &str) {
        self.text_scaled(brush, position, text, 1.0);
    }

    /// Draws a UTF-8 text run scaled uniformly around the pen.
    pub fn text_scaled(&mut self, brush: BrushId, position: Vec2, text: &str, scale: f32) {
        let Some(Brush::Font { font, .. }) = self.brushes.get(brush.0) else {
            log::error!("text() requires a font brush");
            debug_assert!(false, "text() requires a font brush");
            return;
        };
        let font_id = *font;
        let Some(font) = self.fonts.get_mut(font_id.0) else {
            log::error!("text() with an unregistered font {font_id:?}");
            return;
        };
        let (size, num_glyphs) = font.measure(text);
        let descent = font.descent() * scale;

        let start = self.text_arena.len();
        self.text_arena.push_str(text);
        self.record(
            brush,
            PaintShape::Text {
                position,
                text: TextRange { start, len: text.len() },
                bounds_size: size * scale,
                num_glyphs,
                scale,
                descent,
            },
        );
    }

    /// Measures a UTF-8 run with a registered font: maximum line width by
    /// total line height, kerning included.
    pub fn measure_text(&mut self, font: FontId, text: &str) -> Vec2 {
        self.fonts
            .get_mut(font.0)
            .map(|font| font.measure(text).0)
            .unwrap_or(Vec2::ZERO)
    }

    /// Commands recorded since `begin`.
    pub fn num_commands(&self) -> usize {
        self.commands.len()
    }

    // --- Frame rendering ---

    /// Converts the recorded command stream into batched indexed draws on
    /// `queue`. Buffers for the current frame slot are sized, filled, and
    /// referenced by the emitted commands; the queue flushes them into a
    /// command list later in the frame.
    pub fn render_to_queue(
        &mut self,
        device: &mut GpuDevice,
        queue: &mut RenderQueue,
    ) -> Result<(), ResourceError> {
        if self.commands.is_empty() {
            return Ok(());
        }

        let mut elements = self.build_elements();
        let mut batches = batch_elements(&self.commands, &self.brushes, &mut elements);

        // Counts pass: tessellate what needs tessellating and total up each
        // bucket.
        let mut totals = Counts::default();
        for element in &mut elements {
            if !element.in_any_batch() {
                continue;
            }
            let command = &self.commands[element.command];
            let (num_vertices, num_indices, geometry) = command_counts(command, &self.points);
            element.num_vertices = num_vertices;
            element.num_indices = num_indices;
            element.polyline = geometry;
            if command.is_blurred() {
                totals.shadow_vertices += num_vertices;
                totals.shadow_indices += num_indices;
            } else {
                totals.vertices += num_vertices;
                totals.indices += num_indices;
            }
        }

        // Write pass: fill CPU staging, then upload into the frame slot's
        // grow-only buffers.
        let mut staging = Staging::new(&totals);
        self.write_batches(&mut batches, &mut elements, &mut staging);

        let frame_index = device.frame_info().frame_index as usize;
        let slot = &mut self.frame_buffers[frame_index];
        slot.normal.reserve(
            device,
            (staging.vertices.len() * std::mem::size_of::<Vertex2D>()) as u64,
            (staging.indices.len() * std::mem::size_of::<u32>()) as u64,
            "painter-2d",
        )?;
        slot.shadow.reserve(
            device,
            (staging.shadow_vertices.len() * std::mem::size_of::<ShadowVertex>()) as u64,
            (staging.shadow_indices.len() * std::mem::size_of::<u32>()) as u64,
            "painter-2d-shadow",
        )?;
        if let Some(buffer) = slot.normal.vertex.filter(|_| !staging.vertices.is_empty()) {
            device.write_buffer(buffer, 0, bytemuck::cast_slice(&staging.vertices))?;
        }
        if let Some(buffer) = slot.normal.index.filter(|_| !staging.indices.is_empty()) {
            device.write_buffer(buffer, 0, bytemuck::cast_slice(&staging.indices))?;
        }
        if let Some(buffer) = slot.shadow.vertex.filter(|_| !staging.shadow_vertices.is_empty()) {
            device.write_buffer(buffer, 0, bytemuck::cast_slice(&staging.shadow_vertices))?;
        }
        if let Some(buffer) = slot.shadow.index.filter(|_| !staging.shadow_indices.is_empty()) {
            device.write_buffer(buffer, 0, bytemuck::cast_slice(&staging.shadow_indices))?;
        }

        self.emit_batches(device, queue, &batches)
    }

    /// Releases every GPU resource the painter owns.
    pub fn destroy(mut self, device: &mut GpuDevice) {
        for mut slot in self.frame_buffers.drain(..) {
            slot.normal.release(device);
            slot.shadow.release(device);
        }
        for font in self.fonts.drain(..) {
            font.destroy(device);
        }
        device.release(self.resources.white_texture);
        device.release(self.resources.textured_program);
        device.release(self.resources.rect_shadow_program);
        device.release(self.resources.rounded_shadow_program);
    }

    fn build_elements(&self) -> Vec<Element> {
        self.commands
            .iter()
            .enumerate()
            .map(|(index, command)| {
                let bounds = command.bounds(&self.points);
                Element {
                    command: index,
                    bounds,
                    // Zero-size commands never draw and never join a batch.
                    drawn: bounds.area() == 0.0,
                    in_current_batch: false,
                    num_vertices: 0,
                    num_indices: 0,
                    polyline: None,
                }
            })
            .collect()
    }

    fn write_batches(
        &mut self,
        batches: &mut [Batch],
        elements: &mut [Element],
        staging: &mut Staging,
    ) {
        let mut vertex_offset = 0u32;
        let mut index_count = 0u32;
        let mut shadow_vertex_offset = 0u32;
        let mut shadow_index_count = 0u32;

        for batch in batches.iter_mut() {
            batch.first_index = if batch.blurred { shadow_index_count } else { index_count };

            for &member in &batch.members {
                let element = &mut elements[member];
                let command = self.commands[element.command];
                let bounds = element.bounds;

                if batch.blurred {
                    let PaintShape::BlurredRect { rect, sigma, border_radii } = command.shape
                    else {
                        continue;
                    };
                    write_shadow_rect(
                        &mut staging.shadow_vertices[shadow_vertex_offset as usize..]
                            [..element.num_vertices as usize],
                        &mut staging.shadow_indices[shadow_index_count as usize..]
                            [..element.num_indices as usize],
                        shadow_vertex_offset,
                        &self.brushes[command.brush.0],
                        rect,
                        sigma,
                        border_radii,
                    );
                    shadow_vertex_offset += element.num_vertices;
                    shadow_index_count += element.num_indices;
                } else {
                    let vertex_slice = &mut staging.vertices[vertex_offset as usize
                        ..(vertex_offset + element.num_vertices) as usize];
                    let index_slice = &mut staging.indices
                        [index_count as usize..(index_count + element.num_indices) as usize];
                    let brush = &self.brushes[command.brush.0];
                    let mut writer =
                        VertexWriter::new(vertex_slice, index_slice, vertex_offset, brush, bounds);

                    match command.shape {
                        PaintShape::FillRect { rect } => writer.add_rect(&rect),
                        PaintShape::FillRoundedRect { rect, border_radius } => {
                            writer.add_rounded_rect(&rect, border_radius)
                        }
                        PaintShape::NineSliceRect { rect, border_area } => {
                            write_nine_slice(&mut writer, &rect, border_area)
                        }
                        PaintShape::FillArc { position, radius, start_angle, arc_angle } => {
                            writer.add_arc(position, radius, start_angle, arc_angle)
                        }
                        PaintShape::Polyline { .. } => {
                            if let Some(geometry) = element.polyline.take() {
                                write_polyline(&mut writer, &geometry);
                            }
                        }
                        PaintShape::FillTriangles { points, indices } => {
                            write_triangles(
                                &mut writer,
                                &self.points[points.start..points.start + points.len],
                                &self.triangle_indices
                                    [indices.start..indices.start + indices.len],
                            );
                        }
                        PaintShape::Text { position, text, scale, .. } => {
                            let brush_data = self.brushes[command.brush.0].clone();
                            let Brush::Font { font, tint } = brush_data else { continue };
                            let Some(font) = self.fonts.get_mut(font.0) else { continue };
                            let text = &self.text_arena[text.start..text.start + text.len];
                            write_text(&mut writer, font, position, text, scale, tint);
                        }
                        PaintShape::BlurredRect { .. } => unreachable!("blurred batches only"),
                    }

                    debug_assert_eq!(
                        writer.counts(),
                        (element.num_vertices, element.num_indices),
                        "counts pass disagrees with write pass"
                    );
                    vertex_offset += element.num_vertices;
                    index_count += element.num_indices;
                }
            }

            batch.num_indices =
                (if batch.blurred { shadow_index_count } else { index_count }) - batch.first_index;
        }
    }

    fn emit_batches(
        &mut self,
        device: &mut GpuDevice,
        queue: &mut RenderQueue,
        batches: &[Batch],
    ) -> Result<(), ResourceError> {
        let frame_index = device.frame_info().frame_index;
        let slot_index = frame_index as usize;

        for batch in batches {
            if batch.num_indices == 0 {
                continue;
            }

            let (vertex_buffer, index_buffer, program, layout) = if batch.blurred {
                let program = if self.batch_radii_are_zero(batch) {
                    self.resources.rect_shadow_program
                } else {
                    self.resources.rounded_shadow_program
                };
                let slot = &self.frame_buffers[slot_index];
                (
                    slot.shadow.vertex.ok_or(ResourceError::InvalidHandle)?,
                    slot.shadow.index.ok_or(ResourceError::InvalidHandle)?,
                    program,
                    self.resources.shadow_layout,
                )
            } else {
                let slot = &self.frame_buffers[slot_index];
                (
                    slot.normal.vertex.ok_or(ResourceError::InvalidHandle)?,
                    slot.normal.index.ok_or(ResourceError::InvalidHandle)?,
                    self.resources.textured_program,
                    self.resources.standard_layout,
                )
            };

            let mut state = PipelineState::default_alpha_blended();
            state.set_cull_face(CullFace::None);
            state.set_dynamic_states(DynamicStateFlags::VIEWPORT | DynamicStateFlags::SCISSOR);
            state.viewport = Viewport::from_extent(self.screen.width(), self.screen.height());
            state.scissor = ScissorRect::new(
                self.screen.min.x as i32,
                self.screen.min.y as i32,
                self.screen.width().max(0.0) as u32,
                self.screen.height().max(0.0) as u32,
            );
            state.program = Some(program);
            state.vertex_layout = Some(layout);

            let mut command = RenderCommand::draw_indexed(
                state,
                index_buffer,
                IndexFormat::Uint32,
                batch.num_indices,
                batch.first_index,
            );
            command.vertex_buffers.push(VertexBufferBinding {
                binding: 0,
                buffer: vertex_buffer,
                offset: 0,
            });
            command.scissor = Some(self.clips[batch.clip.0]);

            if !batch.blurred {
                let view = match &self.brushes[batch.brush.0] {
                    Brush::Textured { view, .. } => *view,
                    Brush::Font { font, .. } => {
                        let font = self
                            .fonts
                            .get_mut(font.0)
                            .ok_or(ResourceError::InvalidHandle)?;
                        font.prepare_slot(device, frame_index)?
                    }
                    _ => self.resources.white_view,
                };
                let mut material = DescriptorSetInfo::new();
                material.add_image_sampler(0, view, self.resources.sampler);
                command.material_binding = DescSetBind::Immediate(material);
            }

            queue.submit(command, 0.0);
        }
        Ok(())
    }

    /// A blurred batch where every member has all-zero corner radii can
    /// draw with the cheaper sharp-rect shadow shader.
    fn batch_radii_are_zero(&self, batch: &Batch) -> bool {
        batch.members.iter().all(|&member| match self.commands.get(member) {
            Some(PaintCommand { shape: PaintShape::BlurredRect { border_radii, .. }, .. }) => {
                border_radii.iter().all(|radius| radius.abs() < EPSILON)
            }
            _ => true,
        })
    }
}

impl Element {
    fn in_any_batch(&self) -> bool {
        // Zero-size commands were pre-marked drawn and never entered a
        // batch; everything else did by the time batching finishes.
        self.bounds.area() != 0.0
    }
}

#[derive(Debug, Default)]
struct Counts {
    vertices: u32,
    indices: u32,
    shadow_vertices: u32,
    shadow_indices: u32,
}

struct Staging {
    vertices: Vec<Vertex2D>,
    indices: Vec<u32>,
    shadow_vertices: Vec<ShadowVertex>,
    shadow_indices: Vec<u32>,
}

impl Staging {
    fn new(totals: &Counts) -> Self {
        use bytemuck::Zeroable;
        Self {
            vertices: vec![Vertex2D::zeroed(); totals.vertices as usize],
            indices: vec![0; totals.indices as usize],
            shadow_vertices: vec![ShadowVertex::zeroed(); totals.shadow_vertices as usize],
            shadow_indices: vec![0; totals.shadow_indices as usize],
        }
    }
}

/// The overlap-safe batching pass.
///
/// Commands are processed in recorded (back-to-front) order, repeatedly: a
/// command is placeable only when its bounds intersect no earlier command
/// that is still pending or sits in a still-open batch — an intersection
/// with either would reorder overlapping draws. Placed commands join the
/// first compatible open batch or open a new one. Between passes, every
/// open batch except the most recently extended one is closed; a pass that
/// places nothing closes all open batches so blocked commands make progress
/// in the next pass. Closed batches emit in close order, which preserves
/// painter's-algorithm semantics while merging aggressively.
fn batch_elements(
    commands: &[PaintCommand],
    brushes: &[Brush],
    elements: &mut [Element],
) -> Vec<Batch> {
    let compatible = |batch: &Batch, command: &PaintCommand| {
        let batch_command = &commands[batch.members[0]];
        batch.blurred == command.is_blurred()
            && batch.clip == command.clip
            && brushes[batch_command.brush.0].can_batch_with(&brushes[command.brush.0])
    };

    let mut remaining = elements.iter().filter(|element| !element.drawn).count();
    let mut working: Vec<Batch> = Vec::new();
    let mut final_batches: Vec<Batch> = Vec::new();

    while remaining > 0 {
        let mut last_touched: Option<usize> = None;
        for index in 0..elements.len() {
            if elements[index].drawn {
                continue;
            }
            let blocked = (0..index).any(|earlier| {
                let behind = &elements[earlier];
                (behind.in_current_batch || !behind.drawn)
                    && elements[index].bounds.intersects(&behind.bounds)
            });
            if blocked {
                continue;
            }

            let command = &commands[elements[index].command];
            let slot = working.iter_mut().position(|batch| compatible(batch, command));
            let batch_index = match slot {
                Some(batch_index) => {
                    working[batch_index].members.push(index);
                    batch_index
                }
                None => {
                    working.push(Batch {
                        members: vec![index],
                        blurred: command.is_blurred(),
                        brush: command.brush,
                        clip: command.clip,
                        first_index: 0,
                        num_indices: 0,
                    });
                    working.len() - 1
                }
            };
            last_touched = Some(batch_index);
            elements[index].drawn = true;
            elements[index].in_current_batch = true;
            remaining -= 1;
        }

        // Close everything except the batch still absorbing commands; a
        // pass with no placements closes all so blocked commands can go
        // next pass. Members of closed batches stop blocking.
        let keep_open = match last_touched {
            Some(batch_index) if batch_index + 1 == working.len() && remaining > 0 => {
                working.pop()
            }
            _ => None,
        };
        for batch in &working {
            for &member in &batch.members {
                elements[member].in_current_batch = false;
            }
        }
        final_batches.append(&mut working);
        if let Some(batch) = keep_open {
            working.push(batch);
        }
    }
    final_batches.append(&mut working);
    final_batches
}

/// Per-command vertex/index counts, plus pre-tessellated geometry where the
/// command needs it.
fn command_counts(
    command: &PaintCommand,
    points: &[Vec2],
) -> (u32, u32, Option<PolylineGeometry>) {
    match command.shape {
        PaintShape::FillRect { .. } | PaintShape::BlurredRect { .. } => {
            (VERTS_PER_RECT, INDICES_PER_RECT, None)
        }
        PaintShape::FillRoundedRect { border_radius, .. } => {
            let (vertices, indices) = rounded_rect_counts(border_radius);
            (vertices, indices, None)
        }
        PaintShape::NineSliceRect { .. } => (9 * VERTS_PER_RECT, 9 * INDICES_PER_RECT, None),
        PaintShape::FillArc { radius, arc_angle, .. } => {
            if radius <= 0.0 || arc_angle <= 0.0 {
                (0, 0, None)
            } else {
                let segments = arc_segment_count(radius);
                (arc_vertex_count(segments), arc_index_count(segments), None)
            }
        }
        PaintShape::Polyline { points: range, thickness, join_style, end_style, overlap_allowed } => {
            let geometry = tessellate(
                &points[range.start..range.start + range.len],
                thickness,
                join_style,
                end_style,
                overlap_allowed,
            );
            (
                geometry.positions.len() as u32,
                geometry.indices.len() as u32,
                Some(geometry),
            )
        }
        PaintShape::FillTriangles { points: point_range, indices } => {
            (point_range.len as u32, indices.len as u32, None)
        }
        PaintShape::Text { num_glyphs, .. } => {
            (num_glyphs * VERTS_PER_RECT, num_glyphs * INDICES_PER_RECT, None)
        }
    }
}

fn write_nine_slice(writer: &mut VertexWriter<'_>, rect: &AxisQuad, border_area: [f32; 4]) {
    let [top, bottom, left, right] = border_area;
    let width = rect.width();
    let height = rect.height();
    let middle_width = (width - left - right).max(0.0);
    let middle_height = (height - top - bottom).max(0.0);

    let column_widths = [left, middle_width, right];
    let row_heights = [top, middle_height, bottom];

    let mut offset_y = 0.0;
    for row_height in row_heights {
        let mut offset_x = 0.0;
        for column_width in column_widths {
            writer.add_rect(&rect.mutated(
                Vec2::new(offset_x, offset_y),
                column_width,
                row_height,
            ));
            offset_x += column_width;
        }
        offset_y += row_height;
    }
}

fn write_polyline(writer: &mut VertexWriter<'_>, geometry: &PolylineGeometry) {
    let mut base = None;
    for &position in &geometry.positions {
        let id = writer.push_sampled(position);
        base.get_or_insert(id);
    }
    // Tessellated indices are command-local; rebase them to the bucket.
    let base = base.unwrap_or(0);
    for triangle in geometry.indices.chunks_exact(3) {
        writer.push_triangle(base + triangle[0], base + triangle[1], base + triangle[2]);
    }
}

fn write_triangles(writer: &mut VertexWriter<'_>, points: &[Vec2], indices: &[u32]) {
    let mut base = None;
    for &point in points {
        let id = writer.push_sampled(point);
        base.get_or_insert(id);
    }
    let base = base.unwrap_or(0);
    for triangle in indices.chunks_exact(3) {
        writer.push_triangle(base + triangle[0], base + triangle[1], base + triangle[2]);
    }
}

fn write_text(
    writer: &mut VertexWriter<'_>,
    font: &mut PainterFont,
    position: Vec2,
    text: &str,
    scale: f32,
    tint: Rgba,
) {
    let color = tint.packed();
    let newline_height = font.newline_height() * scale;
    let mut x = position.x;
    let mut y = position.y;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' || c == '\n' {
            if c == '\r' && chars.peek() == Some(&'\n') {
                chars.next();
            }
            x = position.x;
            y += newline_height;
            continue;
        }

        let glyph = font.glyph(c);
        let uvs = font.cache().glyph_uvs(&glyph);
        let size_x = Vec2::new(glyph.size.x * scale, 0.0);
        let size_y = Vec2::new(0.0, glyph.size.y * scale);

        // Glyphs align to pixel boundaries for crisp rendering.
        let mut p0 = Vec2::new(x, y) + glyph.offset * scale;
        p0.x = p0.x.round();
        p0.y = p0.y.round();
        let p1 = p0 + size_x;
        let p2 = p0 + size_x + size_y;
        let p3 = p0 + size_y;

        let v0 = writer.push_raw(Vertex2D { pos: p0, uv: Vec2::new(uvs[0], uvs[1]), color });
        let v1 = writer.push_raw(Vertex2D { pos: p1, uv: Vec2::new(uvs[2], uvs[1]), color });
        let v2 = writer.push_raw(Vertex2D { pos: p2, uv: Vec2::new(uvs[2], uvs[3]), color });
        let v3 = writer.push_raw(Vertex2D { pos: p3, uv: Vec2::new(uvs[0], uvs[3]), color });
        writer.push_triangle(v0, v3, v2);
        writer.push_triangle(v0, v2, v1);

        x += glyph.advance_x * scale;
        if let Some(&next) = chars.peek() {
            x += font.kern(c, next) * scale;
        }
    }
}

fn write_shadow_rect(
    vertices: &mut [ShadowVertex],
    indices: &mut [u32],
    base_vertex: u32,
    brush: &Brush,
    rect: Rect2,
    sigma: f32,
    border_radii: [f32; 4],
) {
    let border = sigma * 3.0;
    let tl = rect.top_left() - Vec2::splat(border);
    let tr = rect.top_right() + Vec2::new(border, -border);
    let br = rect.bottom_right() + Vec2::splat(border);
    let bl = rect.bottom_left() + Vec2::new(-border, border);

    let corner_uvs =
        [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
    let positions = [tl, tr, br, bl];

    for (index, (&pos, &uv)) in positions.iter().zip(corner_uvs.iter()).enumerate() {
        let (_, color) = brush.sample(uv, index as u32);
        vertices[index] = ShadowVertex {
            pos,
            sigma,
            corner_radius: border_radii[index],
            box_min: rect.min,
            box_max: rect.max,
            color: color.packed(),
        };
    }

    let order = [0u32, 2, 1, 0, 3, 2];
    for (slot, &offset) in indices.iter_mut().zip(order.iter()) {
        *slot = base_vertex + offset;
    }
}
