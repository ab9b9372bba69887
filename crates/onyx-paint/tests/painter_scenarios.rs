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

//! End-to-end painter scenarios over the headless backend: record, batch,
//! upload, flush into a command list, and assert on the exact submitted
//! stream and buffer contents.

use onyx_core::gpu::{
    AttachmentInfo, AttachmentRef, CommandList, GpuDevice, ImageLayout, RenderPassInfo,
    RenderQueue, RendererSettings, SampleCount, SubpassInfo, TextureDescriptor, TextureFlags,
    TextureFormat,
};
use onyx_core::math::{Extent3D, Rect2, Rgba, Vec2};
use onyx_infra::{HeadlessBackend, RecordedOp};
use onyx_paint::{AxisQuad, Brush, Painter2D, Vertex2D};

const SCREEN: Rect2 = Rect2 {
    min: Vec2 { x: 0.0, y: 0.0 },
    max: Vec2 { x: 640.0, y: 480.0 },
};

fn fixture() -> (GpuDevice, Painter2D) {
    let mut device =
        GpuDevice::new(Box::new(HeadlessBackend::new()), &RendererSettings::default());
    let painter = Painter2D::new(&mut device).unwrap();
    (device, painter)
}

/// Flushes the painter into a render queue, replays the queue through a
/// command list over a fresh color target, and returns the submitted ops.
fn render(device: &mut GpuDevice, painter: &mut Painter2D) -> Vec<RecordedOp> {
    let mut queue = RenderQueue::screen_overlay();
    painter.render_to_queue(device, &mut queue).unwrap();

    let target = device
        .create_texture(&TextureDescriptor {
            label: None,
            extent: Extent3D::new(640, 480, 1),
            mip_levels: 1,
            sample_count: SampleCount::X1,
            format: TextureFormat::Rgba8Unorm,
            flags: TextureFlags::COLOR_ATTACHMENT,
        })
        .unwrap();
    let mut info = RenderPassInfo::new();
    let color = info.add_attachment(AttachmentInfo {
        texture: target,
        format: TextureFormat::Rgba8Unorm,
        samples: SampleCount::X1,
        final_layout: ImageLayout::Present,
        may_alias: false,
    });
    info.add_subpass(SubpassInfo {
        input_refs: Vec::new(),
        color_refs: vec![AttachmentRef { attachment: color, layout: ImageLayout::ColorAttachment }],
        depth_ref: None,
    });
    info.clears(1).stores(1);

    let mut list = CommandList::begin(device, "painter-test");
    list.set_renderpass_info(device, &info).unwrap();
    list.set_attachments(device, &[target]).unwrap();
    list.begin_render_pass().unwrap();
    queue.flush(&mut list, device, &onyx_core::gpu::DescSetBind::None).unwrap();
    list.end_render_pass();
    list.end(device);

    let backend = device.backend().as_any().downcast_ref::<HeadlessBackend>().unwrap();
    backend.submissions().last().cloned().unwrap_or_default()
}

fn indexed_draws(ops: &[RecordedOp]) -> Vec<(u32, u32)> {
    ops.iter()
        .filter_map(|op| match op {
            RecordedOp::DrawIndexed { num_indices, index_offset, .. } => {
                Some((*num_indices, *index_offset))
            }
            _ => None,
        })
        .collect()
}

/// The vertex-buffer contents behind the first vertex bind in the stream.
fn vertex_data(device: &GpuDevice, ops: &[RecordedOp]) -> Vec<Vertex2D> {
    let buffer = ops
        .iter()
        .find_map(|op| match op {
            RecordedOp::BindVertexBuffer { buffer, .. } => Some(*buffer),
            _ => None,
        })
        .expect("no vertex buffer bound");
    let backend = device.backend().as_any().downcast_ref::<HeadlessBackend>().unwrap();
    let bytes = backend.buffer_contents(buffer);
    bytemuck::pod_collect_to_vec(&bytes)
}

#[test]
fn two_disjoint_rects_merge_into_one_draw() {
    // S1: red at (10,10,100,50), blue at (200,200,50,50).
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let red = painter.color_brush(Rgba::RED);
    let blue = painter.color_brush(Rgba::BLUE);
    painter.fill_rect(
        red,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(10.0, 10.0), Vec2::new(100.0, 50.0))),
    );
    painter.fill_rect(
        blue,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(200.0, 200.0), Vec2::new(50.0, 50.0))),
    );

    let ops = render(&mut device, &mut painter);
    assert_eq!(indexed_draws(&ops), vec![(12, 0)], "one batch of two quads");

    let vertices = vertex_data(&device, &ops);
    assert_eq!(vertices.len(), 8);
    assert!(vertices[..4].iter().all(|vertex| vertex.color == Rgba::RED.packed()));
    assert!(vertices[4..].iter().all(|vertex| vertex.color == Rgba::BLUE.packed()));
    device.end_frame();
}

#[test]
fn overlapping_rect_lands_in_a_later_batch() {
    // S2: green overlaps red, blue is disjoint. Red and blue merge; green
    // draws after them so the overlap renders in recorded order.
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let red = painter.color_brush(Rgba::RED);
    let green = painter.color_brush(Rgba::GREEN);
    let blue = painter.color_brush(Rgba::BLUE);
    painter.fill_rect(
        red,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(10.0, 10.0), Vec2::new(100.0, 100.0))),
    );
    painter.fill_rect(
        green,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(50.0, 50.0), Vec2::new(100.0, 100.0))),
    );
    painter.fill_rect(
        blue,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(200.0, 10.0), Vec2::new(40.0, 40.0))),
    );

    let ops = render(&mut device, &mut painter);
    // Two batches: [red, blue] then [green].
    assert_eq!(indexed_draws(&ops), vec![(12, 0), (6, 12)]);

    let vertices = vertex_data(&device, &ops);
    assert_eq!(vertices.len(), 12);
    assert!(vertices[..4].iter().all(|vertex| vertex.color == Rgba::RED.packed()));
    assert!(vertices[4..8].iter().all(|vertex| vertex.color == Rgba::BLUE.packed()));
    assert!(vertices[8..].iter().all(|vertex| vertex.color == Rgba::GREEN.packed()));
    device.end_frame();
}

#[test]
fn rounded_rect_with_vertical_gradient_shades_top_to_bottom() {
    // S3: white-to-black vertical gradient across a 100x100 rounded rect.
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let brush = painter.make_brush(Brush::LinearGradient {
        colors: [Rgba::WHITE, Rgba::BLACK],
        uv_remap: AxisQuad::new(Vec2::ZERO, Vec2::Y, Vec2::X),
    });
    painter.fill_rounded_rect(
        brush,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::ZERO, Vec2::new(100.0, 100.0))),
        10.0,
    );

    let ops = render(&mut device, &mut painter);
    let vertices = vertex_data(&device, &ops);
    assert!(!vertices.is_empty());

    // Every vertex color follows the linear gradient; rasterization
    // interpolates linearly between them, so the top edge comes out white,
    // the bottom edge black, and the middle 50% grey.
    for vertex in &vertices {
        let expected = 1.0 - (vertex.pos.y / 100.0).clamp(0.0, 1.0);
        let actual = f32::from(vertex.color.r) / 255.0;
        assert!(
            (actual - expected).abs() < 0.02,
            "vertex at y={} has r={actual}, expected {expected}",
            vertex.pos.y
        );
        assert_eq!(vertex.color.r, vertex.color.g);
        assert_eq!(vertex.color.g, vertex.color.b);
    }
    let top = vertices.iter().find(|vertex| vertex.pos.y == 0.0).unwrap();
    let bottom = vertices.iter().find(|vertex| vertex.pos.y == 100.0).unwrap();
    assert!(top.color.r >= 250);
    assert!(bottom.color.r <= 5);
    device.end_frame();
}

#[test]
fn incompatible_brushes_split_batches_in_order() {
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());

    // A texture to draw with.
    let texture = device
        .create_texture(&TextureDescriptor::sampled_2d("t", 4, 4, TextureFormat::Rgba8Unorm))
        .unwrap();
    let view = device
        .create_texture_view(texture, &Default::default())
        .unwrap();

    painter.begin(SCREEN);
    let colored = painter.color_brush(Rgba::RED);
    let textured = painter.texture_brush(view, Rgba::WHITE);
    painter.fill_rect(
        colored,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(0.0, 0.0), Vec2::new(50.0, 50.0))),
    );
    painter.fill_rect(
        textured,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(100.0, 0.0), Vec2::new(50.0, 50.0))),
    );
    painter.fill_rect(
        colored,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(200.0, 0.0), Vec2::new(50.0, 50.0))),
    );

    let ops = render(&mut device, &mut painter);
    // The two colored rects merge even across the textured one; two draws.
    assert_eq!(indexed_draws(&ops).len(), 2);
    assert_eq!(indexed_draws(&ops)[0].0, 12);
    assert_eq!(indexed_draws(&ops)[1].0, 6);
    device.end_frame();
}

#[test]
fn blurred_rects_draw_through_the_shadow_path() {
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let brush = painter.color_brush(Rgba::BLACK);
    painter.blurred_rect(
        brush,
        Rect2::from_pos_size(Vec2::new(50.0, 50.0), Vec2::new(80.0, 40.0)),
        6.0,
        8.0,
    );
    let plain = painter.color_brush(Rgba::RED);
    painter.fill_rect(
        plain,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(300.0, 50.0), Vec2::new(40.0, 40.0))),
    );

    let ops = render(&mut device, &mut painter);
    // Blur and fill cannot share a batch even though their bounds are
    // disjoint: two draws, each a single quad.
    let draws = indexed_draws(&ops);
    assert_eq!(draws.len(), 2);
    assert!(draws.iter().all(|(num_indices, _)| *num_indices == 6));
    device.end_frame();
}

#[test]
fn clip_rects_split_batches_and_emit_scissors() {
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let brush = painter.color_brush(Rgba::RED);
    painter.fill_rect(
        brush,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(0.0, 0.0), Vec2::new(40.0, 40.0))),
    );
    painter.push_clip_rect(onyx_core::math::ScissorRect::new(0, 0, 100, 100));
    painter.fill_rect(
        brush,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::new(200.0, 0.0), Vec2::new(40.0, 40.0))),
    );
    painter.pop_clip_rect();

    let ops = render(&mut device, &mut painter);
    // Same brush, disjoint bounds, but different clips: two draws with a
    // scissor change between them.
    assert_eq!(indexed_draws(&ops).len(), 2);
    let scissors = ops
        .iter()
        .filter(|op| matches!(op, RecordedOp::SetScissor(_)))
        .count();
    assert!(scissors >= 2, "clip change must push a new scissor");
    device.end_frame();
}

#[test]
fn zero_size_commands_emit_nothing() {
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let brush = painter.color_brush(Rgba::RED);
    // Zero-radius arc and non-positive sweep both draw nothing.
    painter.fill_arc(brush, Vec2::new(50.0, 50.0), 0.0, 0.0, 3.0);
    painter.fill_arc(brush, Vec2::new(50.0, 50.0), 10.0, 0.0, 0.0);

    let mut queue = RenderQueue::screen_overlay();
    painter.render_to_queue(&mut device, &mut queue).unwrap();
    assert!(queue.is_empty());
    device.end_frame();
}

#[test]
fn oversized_corner_radius_degenerates_to_a_pill() {
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let brush = painter.color_brush(Rgba::GREEN);
    // Radius far beyond min(w, h) / 2 clamps to 20 (a pill shape).
    painter.fill_rounded_rect(
        brush,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::ZERO, Vec2::new(100.0, 40.0))),
        500.0,
    );

    let ops = render(&mut device, &mut painter);
    let vertices = vertex_data(&device, &ops);
    // No vertex escapes the rect: the clamp never inverts geometry.
    for vertex in &vertices {
        assert!(vertex.pos.x >= -0.5 && vertex.pos.x <= 100.5, "x {}", vertex.pos.x);
        assert!(vertex.pos.y >= -0.5 && vertex.pos.y <= 40.5, "y {}", vertex.pos.y);
    }
    device.end_frame();
}

#[test]
fn nine_slice_covers_the_full_quad_with_nine_pieces() {
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let brush = painter.color_brush(Rgba::WHITE);
    painter.nine_slice_rect(
        brush,
        AxisQuad::from_rect(Rect2::from_pos_size(Vec2::ZERO, Vec2::new(90.0, 90.0))),
        [10.0, 10.0, 10.0, 10.0],
    );

    let ops = render(&mut device, &mut painter);
    assert_eq!(indexed_draws(&ops), vec![(54, 0)], "nine quads in one draw");
    let vertices = vertex_data(&device, &ops);
    assert_eq!(vertices.len(), 36);
    device.end_frame();
}

#[test]
fn fill_triangles_pass_caller_geometry_through_the_brush() {
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let brush = painter.color_brush(Rgba::BLUE);
    let points = [Vec2::new(0.0, 0.0), Vec2::new(40.0, 0.0), Vec2::new(20.0, 30.0)];
    painter.fill_triangles(brush, &points, &[0, 1, 2]);

    let ops = render(&mut device, &mut painter);
    assert_eq!(indexed_draws(&ops), vec![(3, 0)]);
    let vertices = vertex_data(&device, &ops);
    assert_eq!(vertices.len(), 3);
    assert_eq!(vertices[0].pos, points[0]);
    assert!(vertices.iter().all(|vertex| vertex.color == Rgba::BLUE.packed()));
    device.end_frame();
}

#[test]
fn painting_preserves_recorded_order_across_many_overlaps() {
    // A stack of mutually overlapping rects must produce one batch per
    // rect, emitted in recorded order (painter's algorithm).
    let (mut device, mut painter) = fixture();
    assert!(device.begin_frame());
    painter.begin(SCREEN);
    let brush = painter.color_brush(Rgba::RED);
    for layer in 0..4 {
        let offset = layer as f32 * 10.0;
        painter.fill_rect(
            brush,
            AxisQuad::from_rect(Rect2::from_pos_size(
                Vec2::new(offset, offset),
                Vec2::new(50.0, 50.0),
            )),
        );
    }

    let ops = render(&mut device, &mut painter);
    let draws = indexed_draws(&ops);
    assert_eq!(draws.len(), 4);
    // Index offsets must ascend with draw order: earlier rects first.
    for (draw_index, (num_indices, index_offset)) in draws.iter().enumerate() {
        assert_eq!(*num_indices, 6);
        assert_eq!(*index_offset, draw_index as u32 * 6);
    }
    device.end_frame();
}
