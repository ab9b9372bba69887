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

//! Text layout and debug-line lifetime scenarios over the headless backend.

use onyx_core::gpu::{GpuDevice, RenderQueue, RendererSettings};
use onyx_core::math::{Rect2, Rgba, Vec2, Vec3};
use onyx_infra::{HeadlessBackend, RecordedOp};
use onyx_paint::{
    DebugLineRenderer, GlyphRasterizer, LineMetrics, Painter2D, PainterFont, RasterizedGlyph,
    Vertex2D,
};

/// A synthetic monospace face: every glyph a filled box, fixed advance.
struct MonoFace {
    advance: f32,
    newline_height: f32,
}

impl GlyphRasterizer for MonoFace {
    fn rasterize(&self, _codepoint: char) -> RasterizedGlyph {
        RasterizedGlyph {
            coverage: vec![0xFF; 64],
            width: 8,
            height: 8,
            offset: Vec2::ZERO,
            advance_x: self.advance,
        }
    }

    fn kern(&self, _left: char, _right: char) -> f32 {
        0.0
    }

    fn line_metrics(&self) -> LineMetrics {
        LineMetrics { newline_height: self.newline_height, ascent: 8.0, descent: 0.0 }
    }
}

fn fixture() -> (GpuDevice, Painter2D) {
    let mut device =
        GpuDevice::new(Box::new(HeadlessBackend::new()), &RendererSettings::default());
    let painter = Painter2D::new(&mut device).unwrap();
    (device, painter)
}

fn backend(device: &GpuDevice) -> &HeadlessBackend {
    device.backend().as_any().downcast_ref::<HeadlessBackend>().unwrap()
}

#[test]
fn text_lays_out_glyphs_with_newline_reset() {
    // S6: "AB\nC" with advance 10 and newline height 20 places glyph quads
    // at (0,0), (10,0), (0,20).
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());

    let font = painter
        .add_font(PainterFont::new(Box::new(MonoFace { advance: 10.0, newline_height: 20.0 })));
    painter.begin(Rect2::from_pos_size(Vec2::ZERO, Vec2::new(640.0, 480.0)));
    let brush = painter.font_brush(font, Rgba::BLACK);
    painter.text(brush, Vec2::ZERO, "AB\nC");

    let mut queue = RenderQueue::screen_overlay();
    painter.render_to_queue(&mut device, &mut queue).unwrap();
    assert_eq!(queue.len(), 1);

    // Pull vertices straight out of the uploaded buffer by flushing the
    // queue through a command list.
    let target = device
        .create_texture(&onyx_core::gpu::TextureDescriptor::sampled_2d(
            "target",
            640,
            480,
            onyx_core::gpu::TextureFormat::Rgba8Unorm,
        ))
        .unwrap();
    let mut info = onyx_core::gpu::RenderPassInfo::new();
    let color = info.add_attachment(onyx_core::gpu::AttachmentInfo {
        texture: target,
        format: onyx_core::gpu::TextureFormat::Rgba8Unorm,
        samples: onyx_core::gpu::SampleCount::X1,
        final_layout: onyx_core::gpu::ImageLayout::Present,
        may_alias: false,
    });
    info.add_subpass(onyx_core::gpu::SubpassInfo {
        input_refs: Vec::new(),
        color_refs: vec![onyx_core::gpu::AttachmentRef {
            attachment: color,
            layout: onyx_core::gpu::ImageLayout::ColorAttachment,
        }],
        depth_ref: None,
    });
    info.clears(1).stores(1);

    let mut list = onyx_core::gpu::CommandList::begin(&device, "text-test");
    list.set_renderpass_info(&mut device, &info).unwrap();
    list.set_attachments(&mut device, &[target]).unwrap();
    list.begin_render_pass().unwrap();
    queue.flush(&mut list, &mut device, &onyx_core::gpu::DescSetBind::None).unwrap();
    list.end_render_pass();
    list.end(&mut device);

    let ops = backend(&device).submissions().last().cloned().unwrap();
    let buffer = ops
        .iter()
        .find_map(|op| match op {
            RecordedOp::BindVertexBuffer { buffer, .. } => Some(*buffer),
            _ => None,
        })
        .unwrap();
    let vertices: Vec<Vertex2D> = bytemuck::pod_collect_to_vec(&backend(&device).buffer_contents(buffer));

    // Three glyph quads: 12 vertices; quad origins at the pen positions.
    assert_eq!(vertices.len(), 12);
    assert_eq!(vertices[0].pos, Vec2::new(0.0, 0.0));
    assert_eq!(vertices[4].pos, Vec2::new(10.0, 0.0));
    assert_eq!(vertices[8].pos, Vec2::new(0.0, 20.0));

    // One draw of 18 indices, glyph color preserved.
    assert!(ops.iter().any(|op| matches!(
        op,
        RecordedOp::DrawIndexed { num_indices: 18, index_offset: 0, .. }
    )));
    assert!(vertices.iter().all(|vertex| vertex.color == Rgba::BLACK.packed()));
    device.end_frame();
}

#[test]
fn glyph_uvs_point_into_the_atlas() {
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());

    let font = painter
        .add_font(PainterFont::new(Box::new(MonoFace { advance: 10.0, newline_height: 20.0 })));
    painter.begin(Rect2::from_pos_size(Vec2::ZERO, Vec2::new(640.0, 480.0)));
    let brush = painter.font_brush(font, Rgba::WHITE);
    painter.text(brush, Vec2::new(5.0, 50.0), "AB");

    let mut queue = RenderQueue::screen_overlay();
    painter.render_to_queue(&mut device, &mut queue).unwrap();

    let font = painter.font_mut(font).unwrap();
    let a = font.glyph('A');
    let b = font.glyph('B');
    let a_uvs = font.cache().glyph_uvs(&a);
    let b_uvs = font.cache().glyph_uvs(&b);
    // Distinct glyphs occupy distinct atlas regions with valid UV ranges.
    assert_ne!(a_uvs, b_uvs);
    for uvs in [a_uvs, b_uvs] {
        assert!(uvs[0] < uvs[2]);
        assert!(uvs[1] < uvs[3]);
        assert!(uvs.iter().all(|uv| (0.0..=1.0).contains(uv)));
    }
    device.end_frame();
}

#[test]
fn debug_lines_expire_after_their_duration() {
    // S5: one 0.1-second line at a 60 Hz tick draws for 6 frames, then the
    // command list is empty.
    let mut device =
        GpuDevice::new(Box::new(HeadlessBackend::new()), &RendererSettings::default());
    let mut debug = DebugLineRenderer::new(&mut device).unwrap();

    debug.add_line(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Rgba::GREEN, 0.1, true);

    let dt = 1.0 / 60.0;
    let mut frames_with_draws = 0;
    for _ in 0..10 {
        assert!(device.begin_frame());
        let mut queue = RenderQueue::screen_overlay();
        debug.draw(&mut device, &mut queue, true).unwrap();
        if !queue.is_empty() {
            frames_with_draws += 1;
        }
        debug.update(dt);
        device.end_frame();
    }
    assert_eq!(frames_with_draws, 6);
    assert_eq!(debug.num_commands(true), 0);
    debug.destroy(&mut device);
}

#[test]
fn aabbs_expand_to_twelve_segments() {
    let mut device =
        GpuDevice::new(Box::new(HeadlessBackend::new()), &RendererSettings::default());
    let mut debug = DebugLineRenderer::new(&mut device).unwrap();

    assert!(device.begin_frame());
    debug.add_aabb(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0), Rgba::RED, 0.0, false);
    let mut queue = RenderQueue::overlay_scene();
    debug.draw(&mut device, &mut queue, false).unwrap();

    // One block, 12 edges * 6 vertices.
    assert_eq!(queue.len(), 1);
    device.end_frame();
    debug.destroy(&mut device);
}

#[test]
fn debug_blocks_recycle_between_frames() {
    let mut device =
        GpuDevice::new(Box::new(HeadlessBackend::new()), &RendererSettings::default());
    let mut debug = DebugLineRenderer::new(&mut device).unwrap();
    let backend_buffers_after = |device: &GpuDevice| {
        backend(device).destroyed_buffers().len()
    };

    // Many frames of a persistent line must not allocate per frame; the
    // pooled block rotates its ring slices instead.
    debug.add_line(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), Rgba::BLUE, 10.0, false);
    for _ in 0..8 {
        assert!(device.begin_frame());
        let mut queue = RenderQueue::overlay_scene();
        debug.draw(&mut device, &mut queue, false).unwrap();
        debug.update(1.0 / 60.0);
        device.end_frame();
    }
    assert_eq!(backend_buffers_after(&device), 0, "no buffer churn while drawing");
    debug.destroy(&mut device);
}
