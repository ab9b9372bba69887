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

//! Text rendering support: glyph rasterisation, the dynamic CPU atlas, and
//! the per-frame-slot GPU atlas textures.
//!
//! Rasterisation sits behind the [`GlyphRasterizer`] seam so the cache and
//! layout logic are independent of the font backend; [`FontdueRasterizer`]
//! is the production implementation. The CPU atlas is shelf-packed RGBA8
//! (white RGB, coverage in alpha) and grows by doubling. Each frame slot
//! owns its own GPU copy with its own dirty flags: a CPU atlas change marks
//! every slot, and each slot refreshes independently the next time it is
//! drawn with.

use onyx_core::error::ResourceError;
use onyx_core::gpu::{GpuDevice, TextureDescriptor, TextureViewDescriptor, TextureViewId};
use onyx_core::math::{Extent3D, Origin3D, Vec2};
use std::collections::HashMap;
use std::fmt;

/// Index of a font registered with the painter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontId(pub(crate) usize);

/// An error loading or parsing a font face.
#[derive(Debug, Clone)]
pub struct FontError(pub String);

impl fmt::Display for FontError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to load font: {}", self.0)
    }
}

impl std::error::Error for FontError {}

/// Vertical metrics of a font face at its pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Baseline-to-baseline distance.
    pub newline_height: f32,
    /// Height above the baseline.
    pub ascent: f32,
    /// Depth below the baseline, as a non-negative value.
    pub descent: f32,
}

/// One rasterised glyph bitmap plus its layout metrics.
#[derive(Debug, Clone)]
pub struct RasterizedGlyph {
    /// Coverage values, row-major, `width * height` bytes.
    pub coverage: Vec<u8>,
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// Offset from the pen position (on the baseline) to the bitmap's
    /// top-left corner, y-down.
    pub offset: Vec2,
    /// Horizontal pen advance after this glyph.
    pub advance_x: f32,
}

/// The rasterisation seam between the glyph cache and a font backend.
pub trait GlyphRasterizer {
    /// Rasterises one codepoint at the face's pixel size.
    fn rasterize(&self, codepoint: char) -> RasterizedGlyph;

    /// Extra advance between a codepoint pair, zero when the face has no
    /// kerning for it.
    fn kern(&self, left: char, right: char) -> f32;

    /// The face's vertical metrics.
    fn line_metrics(&self) -> LineMetrics;
}

/// The production rasteriser over a `fontdue` face.
pub struct FontdueRasterizer {
    font: fontdue::Font,
    px_size: f32,
}

impl FontdueRasterizer {
    /// Parses a TrueType/OpenType face and fixes its pixel size.
    pub fn from_bytes(bytes: &[u8], px_size: f32) -> Result<Self, FontError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|err| FontError(err.to_string()))?;
        Ok(Self { font, px_size })
    }
}

impl GlyphRasterizer for FontdueRasterizer {
    fn rasterize(&self, codepoint: char) -> RasterizedGlyph {
        let (metrics, coverage) = self.font.rasterize(codepoint, self.px_size);
        RasterizedGlyph {
            coverage,
            width: metrics.width as u32,
            height: metrics.height as u32,
            // fontdue metrics are y-up relative to the baseline; the painter
            // wants the y-down offset to the bitmap's top-left.
            offset: Vec2::new(
                metrics.xmin as f32,
                -(metrics.height as f32 + metrics.ymin as f32),
            ),
            advance_x: metrics.advance_width,
        }
    }

    fn kern(&self, left: char, right: char) -> f32 {
        self.font.horizontal_kern(left, right, self.px_size).unwrap_or(0.0)
    }

    fn line_metrics(&self) -> LineMetrics {
        match self.font.horizontal_line_metrics(self.px_size) {
            Some(metrics) => LineMetrics {
                newline_height: metrics.new_line_size,
                ascent: metrics.ascent,
                descent: -metrics.descent,
            },
            None => LineMetrics {
                newline_height: self.px_size * 1.2,
                ascent: self.px_size,
                descent: 0.0,
            },
        }
    }
}

/// Placement data of one cached glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphInfo {
    /// Top-left texel of the glyph in the CPU atlas.
    pub atlas_pos: (u32, u32),
    /// Bitmap size in pixels.
    pub size: Vec2,
    /// Pen-relative offset of the quad's top-left corner, y-down.
    pub offset: Vec2,
    /// Horizontal pen advance after this glyph.
    pub advance_x: f32,
}

const INITIAL_ATLAS_SIZE: u32 = 256;
const ATLAS_PADDING: u32 = 1;

/// The CPU-side dynamic glyph atlas: shelf-packed RGBA8 pixels (white RGB,
/// coverage alpha) plus the glyph placement map.
pub struct GlyphCache {
    glyphs: HashMap<char, GlyphInfo>,
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    cursor_x: u32,
    cursor_y: u32,
    row_height: u32,
    dirty: bool,
    resized: bool,
}

impl GlyphCache {
    fn new() -> Self {
        Self {
            glyphs: HashMap::new(),
            pixels: vec![0; (INITIAL_ATLAS_SIZE * INITIAL_ATLAS_SIZE * 4) as usize],
            width: INITIAL_ATLAS_SIZE,
            height: INITIAL_ATLAS_SIZE,
            cursor_x: ATLAS_PADDING,
            cursor_y: ATLAS_PADDING,
            row_height: 0,
            dirty: false,
            resized: false,
        }
    }

    /// Current atlas dimensions in texels.
    pub fn atlas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The raw RGBA8 atlas pixels.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Normalised UV rect `(u0, v0, u1, v1)` of a cached glyph against the
    /// current atlas size.
    pub fn glyph_uvs(&self, glyph: &GlyphInfo) -> [f32; 4] {
        let inv_w = 1.0 / self.width as f32;
        let inv_h = 1.0 / self.height as f32;
        [
            glyph.atlas_pos.0 as f32 * inv_w,
            glyph.atlas_pos.1 as f32 * inv_h,
            (glyph.atlas_pos.0 as f32 + glyph.size.x) * inv_w,
            (glyph.atlas_pos.1 as f32 + glyph.size.y) * inv_h,
        ]
    }

    /// The placement of `codepoint`, rasterising and packing it on first
    /// use.
    pub fn ensure_glyph(&mut self, rasterizer: &dyn GlyphRasterizer, codepoint: char) -> GlyphInfo {
        if let Some(glyph) = self.glyphs.get(&codepoint) {
            return *glyph;
        }

        let raster = rasterizer.rasterize(codepoint);
        let (x, y) = self.place(raster.width, raster.height);
        for row in 0..raster.height {
            for col in 0..raster.width {
                let coverage = raster.coverage[(row * raster.width + col) as usize];
                let at = (((y + row) * self.width + x + col) * 4) as usize;
                self.pixels[at] = 0xFF;
                self.pixels[at + 1] = 0xFF;
                self.pixels[at + 2] = 0xFF;
                self.pixels[at + 3] = coverage;
            }
        }
        self.dirty = true;

        let glyph = GlyphInfo {
            atlas_pos: (x, y),
            size: Vec2::new(raster.width as f32, raster.height as f32),
            offset: raster.offset,
            advance_x: raster.advance_x,
        };
        self.glyphs.insert(codepoint, glyph);
        glyph
    }

    /// Shelf-packs a `width * height` region, growing the atlas when the
    /// current shelf row and remaining rows cannot hold it.
    fn place(&mut self, width: u32, height: u32) -> (u32, u32) {
        loop {
            if self.cursor_x + width + ATLAS_PADDING > self.width {
                self.cursor_x = ATLAS_PADDING;
                self.cursor_y += self.row_height + ATLAS_PADDING;
                self.row_height = 0;
            }
            if self.cursor_y + height + ATLAS_PADDING > self.height
                || width + 2 * ATLAS_PADDING > self.width
            {
                self.grow();
                continue;
            }
            let position = (self.cursor_x, self.cursor_y);
            self.cursor_x += width + ATLAS_PADDING;
            self.row_height = self.row_height.max(height);
            return position;
        }
    }

    /// Doubles the atlas; existing texels keep their positions, so packed
    /// glyph rects stay valid and only the normalised UVs change.
    fn grow(&mut self) {
        let new_width = self.width * 2;
        let new_height = self.height * 2;
        log::debug!("glyph atlas growing to {new_width}x{new_height}");
        let mut new_pixels = vec![0u8; (new_width * new_height * 4) as usize];
        for row in 0..self.height {
            let src = (row * self.width * 4) as usize;
            let dst = (row * new_width * 4) as usize;
            let len = (self.width * 4) as usize;
            new_pixels[dst..dst + len].copy_from_slice(&self.pixels[src..src + len]);
        }
        self.pixels = new_pixels;
        self.width = new_width;
        self.height = new_height;
        self.dirty = true;
        self.resized = true;
    }

    /// Reads and clears the (dirty, resized) status pair.
    fn take_status(&mut self) -> (bool, bool) {
        let status = (self.dirty, self.resized);
        self.dirty = false;
        self.resized = false;
        status
    }
}

/// One frame slot's GPU copy of the atlas.
#[derive(Debug, Default)]
struct AtlasSlot {
    texture: Option<onyx_core::gpu::TextureId>,
    view: Option<TextureViewId>,
    needs_upload: bool,
    needs_resize: bool,
}

/// A font usable by the painter: rasteriser, glyph cache, and one GPU
/// atlas per frame slot.
pub struct PainterFont {
    rasterizer: Box<dyn GlyphRasterizer>,
    metrics: LineMetrics,
    cache: GlyphCache,
    slots: Vec<AtlasSlot>,
}

impl PainterFont {
    /// Wraps an arbitrary rasteriser.
    pub fn new(rasterizer: Box<dyn GlyphRasterizer>) -> Self {
        let metrics = rasterizer.line_metrics();
        Self { rasterizer, metrics, cache: GlyphCache::new(), slots: Vec::new() }
    }

    /// Loads a fontdue-backed face from raw font bytes at `px_size`.
    pub fn from_bytes(bytes: &[u8], px_size: f32) -> Result<Self, FontError> {
        Ok(Self::new(Box::new(FontdueRasterizer::from_bytes(bytes, px_size)?)))
    }

    /// Baseline-to-baseline distance.
    pub fn newline_height(&self) -> f32 {
        self.metrics.newline_height
    }

    /// Depth below the baseline, non-negative.
    pub fn descent(&self) -> f32 {
        self.metrics.descent
    }

    /// The CPU atlas, for UV resolution at vertex-write time.
    pub fn cache(&self) -> &GlyphCache {
        &self.cache
    }

    /// The placement of `codepoint`, rasterising on first use.
    pub fn glyph(&mut self, codepoint: char) -> GlyphInfo {
        self.cache.ensure_glyph(self.rasterizer.as_ref(), codepoint)
    }

    /// Kerning between a codepoint pair.
    pub fn kern(&self, left: char, right: char) -> f32 {
        self.rasterizer.kern(left, right)
    }

    /// Measures a UTF-8 run: maximum line width (kerning included) by total
    /// line height, and the number of glyph quads it will produce. `\n` and
    /// `\r\n` both break lines.
    pub fn measure(&mut self, text: &str) -> (Vec2, u32) {
        let mut max_width = 0.0f32;
        let mut current_width = 0.0f32;
        let mut current_height = 0.0f32;
        let mut num_glyphs = 0u32;

        if !text.is_empty() {
            current_height += self.metrics.newline_height;
            let mut chars = text.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\r' || c == '\n' {
                    if c == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    max_width = max_width.max(current_width);
                    current_width = 0.0;
                    current_height += self.metrics.newline_height;
                    continue;
                }
                let glyph = self.glyph(c);
                current_width += glyph.advance_x;
                if let Some(&next) = chars.peek() {
                    current_width += self.kern(c, next);
                }
                num_glyphs += 1;
            }
        }

        (Vec2::new(max_width.max(current_width), current_height), num_glyphs)
    }

    /// Propagates CPU atlas changes to every frame slot's dirty flags.
    /// Called once per recorded text command batch so no slot misses an
    /// update that happened while another slot was current.
    pub fn sync_slot_flags(&mut self, num_slots: u32) {
        if self.slots.len() < num_slots as usize {
            self.slots.resize_with(num_slots as usize, AtlasSlot::default);
        }
        let (dirty, resized) = self.cache.take_status();
        if dirty || resized {
            for slot in &mut self.slots {
                slot.needs_upload |= dirty;
                slot.needs_resize |= resized;
            }
        }
    }

    /// Makes the current frame slot's GPU atlas match the CPU atlas and
    /// returns its view: recreates the texture when the slot saw a resize,
    /// re-uploads when it saw an update, and clears only this slot's flags.
    pub fn prepare_slot(
        &mut self,
        device: &mut GpuDevice,
        frame_index: u32,
    ) -> Result<TextureViewId, ResourceError> {
        let num_slots = device.frame_info().num_frame_indices;
        self.sync_slot_flags(num_slots);

        let slot = &mut self.slots[frame_index as usize];
        let (width, height) = self.cache.atlas_size();

        if slot.needs_resize && slot.texture.is_some() {
            if let Some(texture) = slot.texture.take() {
                device.release(texture);
            }
            slot.view = None;
        }
        slot.needs_resize = false;

        if slot.texture.is_none() {
            let texture = device.create_texture(&TextureDescriptor::sampled_2d(
                "glyph-atlas",
                width,
                height,
                onyx_core::gpu::TextureFormat::Rgba8Unorm,
            ))?;
            let view = device.create_texture_view(texture, &TextureViewDescriptor::default())?;
            slot.texture = Some(texture);
            slot.view = Some(view);
            slot.needs_upload = true;
        }

        if slot.needs_upload {
            let texture = slot.texture.ok_or(ResourceError::InvalidHandle)?;
            device.write_texture(
                texture,
                self.cache.pixels(),
                Some(width * 4),
                Origin3D::default(),
                Extent3D::new(width, height, 1),
            )?;
            slot.needs_upload = false;
        }

        slot.view.ok_or(ResourceError::InvalidHandle)
    }

    /// Releases every slot's GPU atlas through the device release list.
    pub fn destroy(mut self, device: &mut GpuDevice) {
        for slot in self.slots.drain(..) {
            if let Some(texture) = slot.texture {
                device.release(texture);
            }
        }
    }
}

impl fmt::Debug for PainterFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PainterFont")
            .field("atlas", &self.cache.atlas_size())
            .field("glyphs", &self.cache.glyphs.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A synthetic face: every glyph is a fixed-size box with a fixed
    /// advance, kerning is a constant for one specific pair.
    struct BoxFace {
        advance: f32,
        size: u32,
    }

    impl GlyphRasterizer for BoxFace {
        fn rasterize(&self, _codepoint: char) -> RasterizedGlyph {
            RasterizedGlyph {
                coverage: vec![0xFF; (self.size * self.size) as usize],
                width: self.size,
                height: self.size,
                offset: Vec2::ZERO,
                advance_x: self.advance,
            }
        }

        fn kern(&self, left: char, right: char) -> f32 {
            if left == 'A' && right == 'V' {
                -2.0
            } else {
                0.0
            }
        }

        fn line_metrics(&self) -> LineMetrics {
            LineMetrics { newline_height: 20.0, ascent: 16.0, descent: 4.0 }
        }
    }

    fn box_font() -> PainterFont {
        PainterFont::new(Box::new(BoxFace { advance: 10.0, size: 8 }))
    }

    #[test]
    fn measure_accounts_for_lines_and_kerning() {
        let mut font = box_font();
        let (size, glyphs) = font.measure("AB\nC");
        assert_eq!(glyphs, 3);
        assert_eq!(size.x, 20.0);
        assert_eq!(size.y, 40.0);

        let (kerned, _) = font.measure("AV");
        assert_eq!(kerned.x, 18.0);

        let (crlf, _) = font.measure("A\r\nB");
        assert_eq!(crlf.y, 40.0);
    }

    #[test]
    fn glyphs_pack_into_distinct_atlas_regions() {
        let mut font = box_font();
        let a = font.glyph('A');
        let b = font.glyph('B');
        assert_ne!(a.atlas_pos, b.atlas_pos);
        // Same glyph twice resolves to the same slot.
        assert_eq!(font.glyph('A').atlas_pos, a.atlas_pos);

        let uvs = font.cache().glyph_uvs(&a);
        assert!(uvs[0] < uvs[2] && uvs[1] < uvs[3]);
    }

    #[test]
    fn atlas_pixels_carry_white_rgb_and_coverage_alpha() {
        let mut font = box_font();
        let a = font.glyph('A');
        let (width, _) = font.cache().atlas_size();
        let at = ((a.atlas_pos.1 * width + a.atlas_pos.0) * 4) as usize;
        let pixels = font.cache().pixels();
        assert_eq!(&pixels[at..at + 4], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn atlas_grows_by_doubling_and_keeps_placements() {
        let mut font = PainterFont::new(Box::new(BoxFace { advance: 70.0, size: 64 }));
        let before = font.cache().atlas_size();
        let a = font.glyph('A');

        // 64px glyphs at 1px padding: 3 per shelf, 3 shelves fit in 256.
        // Forcing more than 12 distinct glyphs must grow the atlas.
        for c in 'B'..='Z' {
            font.glyph(c);
        }
        let after = font.cache().atlas_size();
        assert!(after.0 > before.0 || after.1 > before.1);
        assert_eq!(after.0 % before.0, 0, "doubling keeps power-of-two dims");

        // Placements recorded before the resize are untouched.
        assert_eq!(font.glyph('A').atlas_pos, a.atlas_pos);
    }

    #[test]
    fn atlas_updates_mark_every_slot_dirty() {
        let mut font = box_font();
        font.glyph('A');
        font.sync_slot_flags(2);
        assert!(font.slots.iter().all(|slot| slot.needs_upload));

        // One slot refreshing clears only itself; a later glyph re-marks
        // every slot.
        font.slots[0].needs_upload = false;
        font.glyph('B');
        font.sync_slot_flags(2);
        assert!(font.slots[0].needs_upload);
        assert!(font.slots[1].needs_upload);
    }

    #[test]
    fn resize_flags_reach_all_slots() {
        let mut font = PainterFont::new(Box::new(BoxFace { advance: 70.0, size: 64 }));
        font.sync_slot_flags(2);
        font.slots.iter_mut().for_each(|slot| {
            slot.needs_upload = false;
            slot.needs_resize = false;
        });

        for c in 'A'..='Z' {
            font.glyph(c);
        }
        font.sync_slot_flags(2);
        assert!(font.slots.iter().all(|slot| slot.needs_resize));
    }
}
