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

//! The Onyx sandbox: opens a window and exercises the 2D painter and the
//! debug line renderer every frame.

use anyhow::Context;
use onyx_core::gpu::RenderQueue;
use onyx_core::math::{Rect2, Rgba, Vec2, Vec3};
use onyx_engine::{load_settings, Renderer, ViewFlags, ViewId};
use onyx_infra::{window, GpuWindow};
use onyx_paint::{
    AxisQuad, DebugLineRenderer, FontId, GradientStop, Painter2D, PainterFont, PolylineEnd,
    PolylineJoin,
};
use std::path::Path;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

/// Common system font locations; text drawing is skipped when none exist.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

struct App {
    state: Option<State>,
}

struct State {
    window: GpuWindow,
    renderer: Renderer,
    painter: Painter2D,
    debug: DebugLineRenderer,
    view: ViewId,
    font: Option<FontId>,
    started: Instant,
    last_frame: Instant,
}

impl State {
    fn new(event_loop: &ActiveEventLoop) -> anyhow::Result<Self> {
        let settings = load_settings(Path::new("renderer.json"))?;
        let window = GpuWindow::new(event_loop, "Onyx sandbox", 1024, 768)?;
        let backend = window.create_backend(settings.vsync)?;
        let mut renderer = Renderer::new(Box::new(backend), &settings);

        let (width, height) = window.size();
        let view = renderer
            .create_view(width, height, ViewFlags::MAIN_OUTPUT)
            .context("failed to create the main view")?;

        let mut painter = Painter2D::new(renderer.device_mut())?;
        let debug = DebugLineRenderer::new(renderer.device_mut())?;

        let font = FONT_CANDIDATES.iter().find_map(|path| {
            let bytes = std::fs::read(path).ok()?;
            match PainterFont::from_bytes(&bytes, 24.0) {
                Ok(font) => Some(painter.add_font(font)),
                Err(err) => {
                    log::warn!("failed to parse {path}: {err}");
                    None
                }
            }
        });
        if font.is_none() {
            log::warn!("no usable font found; text drawing disabled");
        }

        Ok(Self {
            window,
            renderer,
            painter,
            debug,
            view,
            font,
            started: Instant::now(),
            last_frame: Instant::now(),
        })
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let delta_time = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;
        let time = (now - self.started).as_secs_f32();

        if !self.renderer.begin_frame() {
            // Surface unavailable or fences still in flight; try again.
            self.window.request_redraw();
            return Ok(());
        }

        let Some(view) = self.renderer.view(self.view) else {
            self.renderer.end_frame();
            return Ok(());
        };
        let (width, height) = view.size();
        self.paint_scene(time, width, height);

        // Populate the view's queues and submit.
        let mut screen_overlay = RenderQueue::screen_overlay();
        self.painter.render_to_queue(self.renderer.device_mut(), &mut screen_overlay)?;
        let mut overlay_scene = RenderQueue::overlay_scene();
        self.debug.draw(self.renderer.device_mut(), &mut overlay_scene, true)?;

        if let Some(view) = self.renderer.view_mut(self.view) {
            view.clear_color = Rgba::new(0.08, 0.08, 0.1, 1.0);
            view.screen_overlay_queue = screen_overlay;
            view.overlay_scene_queue = overlay_scene;
        }

        self.renderer.submit_view(self.view)?;
        if let Some(texture) = self.renderer.main_output_texture(self.view) {
            window::set_present_source(self.renderer.device(), texture);
        }
        self.renderer.end_frame();
        self.debug.update(delta_time);

        self.window.request_redraw();
        Ok(())
    }

    fn paint_scene(&mut self, time: f32, width: u32, height: u32) {
        let painter = &mut self.painter;
        painter.begin(Rect2::from_pos_size(
            Vec2::ZERO,
            Vec2::new(width as f32, height as f32),
        ));

        // A drop shadow under a rounded panel.
        let shadow = painter.color_brush(Rgba::new(0.0, 0.0, 0.0, 0.6));
        painter.blurred_rect(
            shadow,
            Rect2::from_pos_size(Vec2::new(48.0, 48.0), Vec2::new(420.0, 260.0)),
            12.0,
            16.0,
        );
        let panel = painter.gradient_brush(
            Rgba::new(0.22, 0.24, 0.3, 1.0),
            Rgba::new(0.12, 0.13, 0.18, 1.0),
        );
        painter.fill_rounded_rect(
            panel,
            AxisQuad::from_rect(Rect2::from_pos_size(
                Vec2::new(40.0, 40.0),
                Vec2::new(420.0, 260.0),
            )),
            16.0,
        );

        // An n-ary gradient bar.
        let bar = painter.nary_gradient_brush(&[
            GradientStop { percent: 0.0, color: Rgba::RED },
            GradientStop { percent: 0.5, color: Rgba::GREEN },
            GradientStop { percent: 1.0, color: Rgba::BLUE },
        ]);
        painter.fill_rect(
            bar,
            AxisQuad::from_rect(Rect2::from_pos_size(
                Vec2::new(64.0, 220.0),
                Vec2::new(372.0, 24.0),
            )),
        );

        // A spinning arc.
        let accent = painter.color_brush(Rgba::new(0.95, 0.6, 0.2, 1.0));
        painter.fill_arc(
            accent,
            Vec2::new(560.0, 170.0),
            60.0,
            time,
            std::f32::consts::PI * 1.5,
        );

        // A zig-zag polyline cycling its join style.
        let stroke = painter.color_brush(Rgba::new(0.4, 0.8, 1.0, 1.0));
        let joins = [PolylineJoin::Miter, PolylineJoin::Bevel, PolylineJoin::Round];
        let join = joins[(time as usize) % joins.len()];
        let points: Vec<Vec2> = (0..8)
            .map(|index| {
                let x = 60.0 + index as f32 * 55.0;
                let y = 380.0 + if index % 2 == 0 { 0.0 } else { 60.0 };
                Vec2::new(x, y)
            })
            .collect();
        painter.polyline(stroke, &points, 12.0, join, PolylineEnd::Round, false);

        // Text, when a font was found.
        if let Some(font) = self.font {
            let ink = painter.font_brush(font, Rgba::WHITE);
            painter.text(
                ink,
                Vec2::new(64.0, 96.0),
                "Onyx sandbox\npainter + debug lines",
            );
        }

        // Debug overlay: an orbiting box outline and an occasional pulse
        // line with a quarter-second lifetime.
        self.debug.add_aabb(
            Vec3::new(0.2 * time.cos(), 0.2 * time.sin(), 0.5),
            Vec3::new(0.4, 0.4, 0.2),
            Rgba::GREEN,
            0.0,
            true,
        );
        if (time * 2.0).fract() < 0.05 {
            self.debug.add_line(
                Vec3::new(-0.8, -0.8, 0.5),
                Vec3::new(0.8, 0.8, 0.5),
                Rgba::new(1.0, 0.3, 0.3, 1.0),
                0.25,
                true,
            );
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_none() {
            match State::new(event_loop) {
                Ok(state) => {
                    state.window.request_redraw();
                    self.state = Some(state);
                }
                Err(err) => {
                    log::error!("failed to start: {err:#}");
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.window.mark_resized(state.renderer.device(), size.width, size.height);
                state.renderer.queue_view_resize(state.view, size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = state.redraw() {
                    log::error!("frame failed: {err:#}");
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            let State { mut renderer, painter, debug, .. } = state;
            painter.destroy(renderer.device_mut());
            debug.destroy(renderer.device_mut());
            renderer.shutdown();
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = EventLoop::new().context("failed to create the event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut App { state: None })?;
    Ok(())
}
