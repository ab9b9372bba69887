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

//! The hashable fixed-function pipeline state.
//!
//! Scalar toggles live packed in two 64-bit words so hashing and comparison
//! stay cheap per draw; larger values (viewport, blend targets, references to
//! program / renderpass / vertex layout) are plain fields folded into the key
//! after the words. Values flagged dynamic are masked out of the key so they
//! never force a new pipeline object.

use crate::gpu::{PipelineId, ProgramId, RenderPassId, SampleCount, VertexLayoutId, VertexLayoutSet};
use crate::math::{ScissorRect, Viewport};
use crate::onyx_bitflags;
use crate::utils::hash;
use std::borrow::Cow;

/// Maximum simultaneous color targets.
pub const MAX_COLOR_TARGETS: usize = 8;

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    /// Each vertex is a point.
    PointList = 0,
    /// Every two vertices form a line.
    LineList = 1,
    /// Consecutive vertices form connected lines.
    LineStrip = 2,
    /// Every three vertices form a triangle.
    #[default]
    TriangleList = 3,
    /// Consecutive vertices form connected triangles.
    TriangleStrip = 4,
    /// Triangles fan out from the first vertex.
    TriangleFan = 5,
}

/// Winding order that defines the front face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    /// Counterclockwise is front.
    #[default]
    Ccw = 0,
    /// Clockwise is front.
    Cw = 1,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    /// Cull nothing.
    #[default]
    None = 0,
    /// Cull front faces.
    Front = 1,
    /// Cull back faces.
    Back = 2,
    /// Cull everything.
    Both = 3,
}

/// Polygon rasterization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Filled polygons.
    #[default]
    Fill = 0,
    /// Outlines only.
    Line = 1,
    /// Vertices only.
    Point = 2,
}

/// Comparison function for depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareOp {
    /// Never passes.
    Never = 0,
    /// Passes when incoming < stored.
    Less = 1,
    /// Passes when equal.
    Equal = 2,
    /// Passes when incoming <= stored.
    #[default]
    LessOrEqual = 3,
    /// Passes when incoming > stored.
    Greater = 4,
    /// Passes when not equal.
    NotEqual = 5,
    /// Passes when incoming >= stored.
    GreaterOrEqual = 6,
    /// Always passes.
    Always = 7,
}

/// Stencil buffer update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    /// Keep the stored value.
    #[default]
    Keep = 0,
    /// Write zero.
    Zero = 1,
    /// Write the reference value.
    Replace = 2,
    /// Increment, clamping at max.
    IncrementClamp = 3,
    /// Decrement, clamping at zero.
    DecrementClamp = 4,
    /// Bitwise-invert the stored value.
    Invert = 5,
    /// Increment with wrap.
    IncrementWrap = 6,
    /// Decrement with wrap.
    DecrementWrap = 7,
}

/// Framebuffer logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicOp {
    /// Output zero.
    Clear = 0,
    /// src AND dst.
    And = 1,
    /// src AND NOT dst.
    AndReverse = 2,
    /// src.
    #[default]
    Copy = 3,
    /// NOT src AND dst.
    AndInverted = 4,
    /// dst.
    NoOp = 5,
    /// src XOR dst.
    Xor = 6,
    /// src OR dst.
    Or = 7,
    /// NOT (src OR dst).
    Nor = 8,
    /// NOT (src XOR dst).
    Equivalent = 9,
    /// NOT dst.
    Invert = 10,
    /// src OR NOT dst.
    OrReverse = 11,
    /// NOT src.
    CopyInverted = 12,
    /// NOT src OR dst.
    OrInverted = 13,
    /// NOT (src AND dst).
    Nand = 14,
    /// Output all ones.
    Set = 15,
}

/// Blend equation input factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// `0`.
    Zero = 0,
    /// `1`.
    One = 1,
    /// Source color.
    SrcColor = 2,
    /// One minus source color.
    OneMinusSrcColor = 3,
    /// Destination color.
    DstColor = 4,
    /// One minus destination color.
    OneMinusDstColor = 5,
    /// Source alpha.
    SrcAlpha = 6,
    /// One minus source alpha.
    OneMinusSrcAlpha = 7,
    /// Destination alpha.
    DstAlpha = 8,
    /// One minus destination alpha.
    OneMinusDstAlpha = 9,
    /// Blend-constant color.
    ConstantColor = 10,
    /// One minus blend-constant color.
    OneMinusConstantColor = 11,
    /// Blend-constant alpha.
    ConstantAlpha = 12,
    /// One minus blend-constant alpha.
    OneMinusConstantAlpha = 13,
    /// min(src alpha, 1 - dst alpha).
    SrcAlphaSaturate = 14,
}

/// Operation combining the blend factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    /// src + dst.
    #[default]
    Add = 0,
    /// src - dst.
    Subtract = 1,
    /// dst - src.
    ReverseSubtract = 2,
    /// min(src, dst).
    Min = 3,
    /// max(src, dst).
    Max = 4,
}

onyx_bitflags! {
    /// Which color channels a target writes.
    pub struct ColorWrites: u8 {
        /// The red channel.
        const R = 0b0001;
        /// The green channel.
        const G = 0b0010;
        /// The blue channel.
        const B = 0b0100;
        /// The alpha channel.
        const A = 0b1000;
        /// All channels.
        const ALL = 0b1111;
    }
}

onyx_bitflags! {
    /// Pipeline state values the driver accepts per-command instead of baking
    /// into the pipeline object. Flagged values are masked out of the
    /// pipeline cache key.
    pub struct DynamicStateFlags: u32 {
        /// Viewport rectangle.
        const VIEWPORT = 1 << 0;
        /// Scissor rectangle.
        const SCISSOR = 1 << 1;
        /// Blend constant color.
        const BLEND_CONSTANTS = 1 << 2;
        /// Rasterized line width.
        const LINE_WIDTH = 1 << 3;
        /// Depth bias parameters.
        const DEPTH_BIAS = 1 << 4;
        /// Depth bounds range.
        const DEPTH_BOUNDS = 1 << 5;
        /// Stencil compare mask.
        const STENCIL_CMP_MASK = 1 << 6;
        /// Stencil write mask.
        const STENCIL_WRITE_MASK = 1 << 7;
        /// Stencil reference value.
        const STENCIL_REFERENCE = 1 << 8;
        /// Every dynamic flag.
        const ALL = (1 << 9) - 1;
    }
}

/// Blend state for one color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendTargetState {
    /// Color source factor.
    pub src_color: BlendFactor,
    /// Color destination factor.
    pub dst_color: BlendFactor,
    /// Color combine operation.
    pub color_op: BlendOp,
    /// Alpha source factor.
    pub src_alpha: BlendFactor,
    /// Alpha destination factor.
    pub dst_alpha: BlendFactor,
    /// Alpha combine operation.
    pub alpha_op: BlendOp,
    /// Channel write mask.
    pub write_mask: ColorWrites,
}

impl Default for BlendTargetState {
    fn default() -> Self {
        Self {
            src_color: BlendFactor::One,
            dst_color: BlendFactor::Zero,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
            write_mask: ColorWrites::ALL,
        }
    }
}

impl BlendTargetState {
    /// Standard straight-alpha blending.
    pub const fn alpha_blending() -> Self {
        Self {
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::OneMinusSrcAlpha,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
            alpha_op: BlendOp::Add,
            write_mask: ColorWrites::ALL,
        }
    }
}

/// Depth bias parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DepthBias {
    /// Constant bias added to every fragment.
    pub constant: f32,
    /// Bias scaling with the fragment's depth slope.
    pub slope: f32,
    /// Maximum applied bias.
    pub clamp: f32,
}

/// Depth bounds test range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBounds {
    /// Minimum bound.
    pub min: f32,
    /// Maximum bound.
    pub max: f32,
}

impl Default for DepthBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Stencil operations for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StencilFaceOps {
    /// Applied when the stencil test fails.
    pub fail_op: StencilOp,
    /// Applied when both tests pass.
    pub pass_op: StencilOp,
    /// Applied when the stencil test passes but depth fails.
    pub depth_fail_op: StencilOp,
    /// The stencil comparison function.
    pub compare: CompareOp,
}

// Word 0 layout.
const DRAW_MODE_SHIFT: u32 = 0; // 3 bits
const FRONT_FACE_SHIFT: u32 = 3; // 1 bit
const CULL_FACE_SHIFT: u32 = 4; // 2 bits
const FILL_MODE_SHIFT: u32 = 6; // 2 bits
const DEPTH_TEST_SHIFT: u32 = 8; // 1 bit
const DEPTH_WRITE_SHIFT: u32 = 9; // 1 bit
const DEPTH_OP_SHIFT: u32 = 10; // 3 bits
const STENCIL_TEST_SHIFT: u32 = 13; // 1 bit
const PRIMITIVE_RESTART_SHIFT: u32 = 14; // 1 bit
const RASTERIZER_DISCARD_SHIFT: u32 = 15; // 1 bit
const ALPHA_TO_COVERAGE_SHIFT: u32 = 16; // 1 bit
const ALPHA_TO_ONE_SHIFT: u32 = 17; // 1 bit
const LOGIC_OP_ENABLE_SHIFT: u32 = 18; // 1 bit
const LOGIC_OP_SHIFT: u32 = 19; // 4 bits
const DYNAMIC_STATE_SHIFT: u32 = 23; // 9 bits
const BLEND_ENABLE_SHIFT: u32 = 32; // 8 bits, one per color target
const SAMPLE_SHADING_SHIFT: u32 = 40; // 1 bit

// Word 1 layout.
const STENCIL_FRONT_SHIFT: u32 = 0; // 12 bits (fail/pass/depth-fail/compare, 3 each)
const STENCIL_BACK_SHIFT: u32 = 12; // 12 bits
const STENCIL_CMP_MASK_SHIFT: u32 = 24; // 8 bits, shared between faces
const STENCIL_WRITE_MASK_SHIFT: u32 = 32; // 8 bits
const STENCIL_REFERENCE_SHIFT: u32 = 40; // 8 bits

#[inline]
const fn field(word: u64, shift: u32, bits: u32) -> u64 {
    (word >> shift) & ((1u64 << bits) - 1)
}

#[inline]
const fn with_field(word: u64, shift: u32, bits: u32, value: u64) -> u64 {
    let mask = ((1u64 << bits) - 1) << shift;
    (word & !mask) | ((value << shift) & mask)
}

/// The complete fixed-function state a draw is issued with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineState {
    word0: u64,
    word1: u64,
    /// The viewport rectangle.
    pub viewport: Viewport,
    /// The scissor rectangle.
    pub scissor: ScissorRect,
    /// The blend constant color.
    pub blend_constants: [f32; 4],
    /// Rasterized line width.
    pub line_width: f32,
    /// Depth bias parameters.
    pub depth_bias: DepthBias,
    /// Depth bounds range.
    pub depth_bounds: DepthBounds,
    /// Samples per pixel.
    pub sample_count: SampleCount,
    /// Minimum fraction of sample shading.
    pub min_sample_shading: f32,
    /// Sample coverage mask.
    pub sample_mask: u32,
    /// Subpass index within the bound renderpass.
    pub subpass_index: u32,
    /// Per-target blend state; `blend_enabled` gates each entry.
    pub blend: [BlendTargetState; MAX_COLOR_TARGETS],
    /// How many entries of `blend` are live.
    pub num_color_targets: u32,
    /// The shader program drawn with.
    pub program: Option<ProgramId>,
    /// The renderpass the pipeline targets.
    pub render_pass: Option<RenderPassId>,
    /// The vertex layout vertices are fetched with.
    pub vertex_layout: Option<VertexLayoutId>,
}

impl Default for PipelineState {
    fn default() -> Self {
        let mut state = Self {
            word0: 0,
            word1: 0,
            viewport: Viewport::default(),
            scissor: ScissorRect::default(),
            blend_constants: [0.0; 4],
            line_width: 1.0,
            depth_bias: DepthBias::default(),
            depth_bounds: DepthBounds::default(),
            sample_count: SampleCount::X1,
            min_sample_shading: 0.0,
            sample_mask: u32::MAX,
            subpass_index: 0,
            blend: [BlendTargetState::default(); MAX_COLOR_TARGETS],
            num_color_targets: 1,
            program: None,
            render_pass: None,
            vertex_layout: None,
        };
        state.set_draw_mode(DrawMode::TriangleList);
        state.set_depth_op(CompareOp::LessOrEqual);
        state.set_stencil_compare_mask(0xFF);
        state.set_stencil_write_mask(0xFF);
        state
    }
}

impl PipelineState {
    /// The state preset the 2D painter draws with: alpha blending on target
    /// 0, no depth, back-face culling left to the caller.
    pub fn default_alpha_blended() -> Self {
        let mut state = Self::default();
        state.set_blend_enabled(0, true);
        state.blend[0] = BlendTargetState::alpha_blending();
        state.set_depth_testing(false);
        state.set_depth_write(false);
        state
    }

    // --- Word 0 accessors ---

    /// Sets the primitive assembly mode.
    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        self.word0 = with_field(self.word0, DRAW_MODE_SHIFT, 3, mode as u64);
    }

    /// The primitive assembly mode.
    pub fn draw_mode(&self) -> DrawMode {
        match field(self.word0, DRAW_MODE_SHIFT, 3) {
            0 => DrawMode::PointList,
            1 => DrawMode::LineList,
            2 => DrawMode::LineStrip,
            4 => DrawMode::TriangleStrip,
            5 => DrawMode::TriangleFan,
            _ => DrawMode::TriangleList,
        }
    }

    /// Sets the front-face winding.
    pub fn set_front_face(&mut self, face: FrontFace) {
        self.word0 = with_field(self.word0, FRONT_FACE_SHIFT, 1, face as u64);
    }

    /// The front-face winding.
    pub fn front_face(&self) -> FrontFace {
        if field(self.word0, FRONT_FACE_SHIFT, 1) == 0 { FrontFace::Ccw } else { FrontFace::Cw }
    }

    /// Sets the face culling mode.
    pub fn set_cull_face(&mut self, cull: CullFace) {
        self.word0 = with_field(self.word0, CULL_FACE_SHIFT, 2, cull as u64);
    }

    /// The face culling mode.
    pub fn cull_face(&self) -> CullFace {
        match field(self.word0, CULL_FACE_SHIFT, 2) {
            1 => CullFace::Front,
            2 => CullFace::Back,
            3 => CullFace::Both,
            _ => CullFace::None,
        }
    }

    /// Sets the polygon fill mode.
    pub fn set_fill_mode(&mut self, mode: FillMode) {
        self.word0 = with_field(self.word0, FILL_MODE_SHIFT, 2, mode as u64);
    }

    /// The polygon fill mode.
    pub fn fill_mode(&self) -> FillMode {
        match field(self.word0, FILL_MODE_SHIFT, 2) {
            1 => FillMode::Line,
            2 => FillMode::Point,
            _ => FillMode::Fill,
        }
    }

    /// Enables or disables the depth test.
    pub fn set_depth_testing(&mut self, enabled: bool) {
        self.word0 = with_field(self.word0, DEPTH_TEST_SHIFT, 1, u64::from(enabled));
    }

    /// Whether the depth test is enabled.
    pub fn depth_testing(&self) -> bool {
        field(self.word0, DEPTH_TEST_SHIFT, 1) != 0
    }

    /// Enables or disables depth writes.
    pub fn set_depth_write(&mut self, enabled: bool) {
        self.word0 = with_field(self.word0, DEPTH_WRITE_SHIFT, 1, u64::from(enabled));
    }

    /// Whether depth writes are enabled.
    pub fn depth_write(&self) -> bool {
        field(self.word0, DEPTH_WRITE_SHIFT, 1) != 0
    }

    /// Sets the depth comparison function.
    pub fn set_depth_op(&mut self, op: CompareOp) {
        self.word0 = with_field(self.word0, DEPTH_OP_SHIFT, 3, op as u64);
    }

    /// The depth comparison function.
    pub fn depth_op(&self) -> CompareOp {
        compare_from_bits(field(self.word0, DEPTH_OP_SHIFT, 3))
    }

    /// Enables or disables the stencil test.
    pub fn set_stencil_testing(&mut self, enabled: bool) {
        self.word0 = with_field(self.word0, STENCIL_TEST_SHIFT, 1, u64::from(enabled));
    }

    /// Whether the stencil test is enabled.
    pub fn stencil_testing(&self) -> bool {
        field(self.word0, STENCIL_TEST_SHIFT, 1) != 0
    }

    /// Enables or disables primitive restart for strip topologies.
    pub fn set_primitive_restart(&mut self, enabled: bool) {
        self.word0 = with_field(self.word0, PRIMITIVE_RESTART_SHIFT, 1, u64::from(enabled));
    }

    /// Whether primitive restart is enabled.
    pub fn primitive_restart(&self) -> bool {
        field(self.word0, PRIMITIVE_RESTART_SHIFT, 1) != 0
    }

    /// Enables or disables rasterizer discard.
    pub fn set_rasterizer_discard(&mut self, enabled: bool) {
        self.word0 = with_field(self.word0, RASTERIZER_DISCARD_SHIFT, 1, u64::from(enabled));
    }

    /// Whether rasterizer discard is enabled.
    pub fn rasterizer_discard(&self) -> bool {
        field(self.word0, RASTERIZER_DISCARD_SHIFT, 1) != 0
    }

    /// Enables or disables alpha-to-coverage.
    pub fn set_alpha_to_coverage(&mut self, enabled: bool) {
        self.word0 = with_field(self.word0, ALPHA_TO_COVERAGE_SHIFT, 1, u64::from(enabled));
    }

    /// Whether alpha-to-coverage is enabled.
    pub fn alpha_to_coverage(&self) -> bool {
        field(self.word0, ALPHA_TO_COVERAGE_SHIFT, 1) != 0
    }

    /// Enables or disables alpha-to-one.
    pub fn set_alpha_to_one(&mut self, enabled: bool) {
        self.word0 = with_field(self.word0, ALPHA_TO_ONE_SHIFT, 1, u64::from(enabled));
    }

    /// Whether alpha-to-one is enabled.
    pub fn alpha_to_one(&self) -> bool {
        field(self.word0, ALPHA_TO_ONE_SHIFT, 1) != 0
    }

    /// Sets or clears the framebuffer logic op.
    pub fn set_logic_op(&mut self, op: Option<LogicOp>) {
        self.word0 = with_field(self.word0, LOGIC_OP_ENABLE_SHIFT, 1, u64::from(op.is_some()));
        self.word0 = with_field(self.word0, LOGIC_OP_SHIFT, 4, op.unwrap_or(LogicOp::Copy) as u64);
    }

    /// The framebuffer logic op, when enabled.
    pub fn logic_op(&self) -> Option<LogicOp> {
        if field(self.word0, LOGIC_OP_ENABLE_SHIFT, 1) == 0 {
            return None;
        }
        Some(logic_from_bits(field(self.word0, LOGIC_OP_SHIFT, 4)))
    }

    /// Marks which state values are set through the dynamic-state path.
    pub fn set_dynamic_states(&mut self, flags: DynamicStateFlags) {
        self.word0 = with_field(self.word0, DYNAMIC_STATE_SHIFT, 9, u64::from(flags.bits()));
    }

    /// The state values flagged dynamic.
    pub fn dynamic_states(&self) -> DynamicStateFlags {
        DynamicStateFlags::from_bits(field(self.word0, DYNAMIC_STATE_SHIFT, 9) as u32)
    }

    /// Enables or disables blending on one color target.
    pub fn set_blend_enabled(&mut self, target: usize, enabled: bool) {
        debug_assert!(target < MAX_COLOR_TARGETS);
        let shift = BLEND_ENABLE_SHIFT + target as u32;
        self.word0 = with_field(self.word0, shift, 1, u64::from(enabled));
    }

    /// Whether blending is enabled on one color target.
    pub fn blend_enabled(&self, target: usize) -> bool {
        debug_assert!(target < MAX_COLOR_TARGETS);
        field(self.word0, BLEND_ENABLE_SHIFT + target as u32, 1) != 0
    }

    /// Enables or disables per-sample shading.
    pub fn set_sample_shading(&mut self, enabled: bool) {
        self.word0 = with_field(self.word0, SAMPLE_SHADING_SHIFT, 1, u64::from(enabled));
    }

    /// Whether per-sample shading is enabled.
    pub fn sample_shading(&self) -> bool {
        field(self.word0, SAMPLE_SHADING_SHIFT, 1) != 0
    }

    // --- Word 1 accessors ---

    /// Sets the front-face stencil operations.
    pub fn set_stencil_front(&mut self, ops: StencilFaceOps) {
        self.word1 = with_field(self.word1, STENCIL_FRONT_SHIFT, 12, pack_stencil_face(ops));
    }

    /// The front-face stencil operations.
    pub fn stencil_front(&self) -> StencilFaceOps {
        unpack_stencil_face(field(self.word1, STENCIL_FRONT_SHIFT, 12))
    }

    /// Sets the back-face stencil operations.
    pub fn set_stencil_back(&mut self, ops: StencilFaceOps) {
        self.word1 = with_field(self.word1, STENCIL_BACK_SHIFT, 12, pack_stencil_face(ops));
    }

    /// The back-face stencil operations.
    pub fn stencil_back(&self) -> StencilFaceOps {
        unpack_stencil_face(field(self.word1, STENCIL_BACK_SHIFT, 12))
    }

    /// Sets the stencil compare mask (shared between faces).
    pub fn set_stencil_compare_mask(&mut self, mask: u8) {
        self.word1 = with_field(self.word1, STENCIL_CMP_MASK_SHIFT, 8, u64::from(mask));
    }

    /// The stencil compare mask.
    pub fn stencil_compare_mask(&self) -> u8 {
        field(self.word1, STENCIL_CMP_MASK_SHIFT, 8) as u8
    }

    /// Sets the stencil write mask (shared between faces).
    pub fn set_stencil_write_mask(&mut self, mask: u8) {
        self.word1 = with_field(self.word1, STENCIL_WRITE_MASK_SHIFT, 8, u64::from(mask));
    }

    /// The stencil write mask.
    pub fn stencil_write_mask(&self) -> u8 {
        field(self.word1, STENCIL_WRITE_MASK_SHIFT, 8) as u8
    }

    /// Sets the stencil reference value (shared between faces).
    pub fn set_stencil_reference(&mut self, reference: u8) {
        self.word1 = with_field(self.word1, STENCIL_REFERENCE_SHIFT, 8, u64::from(reference));
    }

    /// The stencil reference value.
    pub fn stencil_reference(&self) -> u8 {
        field(self.word1, STENCIL_REFERENCE_SHIFT, 8) as u8
    }

    // --- Hashing ---

    /// Word 1 with dynamically-set subfields zeroed.
    fn masked_word1(&self) -> u64 {
        let dynamic = self.dynamic_states();
        let mut word = self.word1;
        if dynamic.contains(DynamicStateFlags::STENCIL_CMP_MASK) {
            word = with_field(word, STENCIL_CMP_MASK_SHIFT, 8, 0);
        }
        if dynamic.contains(DynamicStateFlags::STENCIL_WRITE_MASK) {
            word = with_field(word, STENCIL_WRITE_MASK_SHIFT, 8, 0);
        }
        if dynamic.contains(DynamicStateFlags::STENCIL_REFERENCE) {
            word = with_field(word, STENCIL_REFERENCE_SHIFT, 8, 0);
        }
        word
    }

    /// Computes the pipeline cache key, masking out dynamic state.
    pub fn hash64(&self) -> u64 {
        let dynamic = self.dynamic_states();
        let mut state = hash::SEED;
        state = hash::add_u64(state, self.word0);
        state = hash::add_u64(state, self.masked_word1());

        if !dynamic.contains(DynamicStateFlags::VIEWPORT) {
            state = hash::add_f32(state, self.viewport.x);
            state = hash::add_f32(state, self.viewport.y);
            state = hash::add_f32(state, self.viewport.width);
            state = hash::add_f32(state, self.viewport.height);
            state = hash::add_f32(state, self.viewport.min_depth);
            state = hash::add_f32(state, self.viewport.max_depth);
        }
        if !dynamic.contains(DynamicStateFlags::SCISSOR) {
            state = hash::add_i32(state, self.scissor.x);
            state = hash::add_i32(state, self.scissor.y);
            state = hash::add_u32(state, self.scissor.width);
            state = hash::add_u32(state, self.scissor.height);
        }
        if !dynamic.contains(DynamicStateFlags::BLEND_CONSTANTS) {
            for &c in &self.blend_constants {
                state = hash::add_f32(state, c);
            }
        }
        if !dynamic.contains(DynamicStateFlags::LINE_WIDTH) {
            state = hash::add_f32(state, self.line_width);
        }
        if !dynamic.contains(DynamicStateFlags::DEPTH_BIAS) {
            state = hash::add_f32(state, self.depth_bias.constant);
            state = hash::add_f32(state, self.depth_bias.slope);
            state = hash::add_f32(state, self.depth_bias.clamp);
        }
        if !dynamic.contains(DynamicStateFlags::DEPTH_BOUNDS) {
            state = hash::add_f32(state, self.depth_bounds.min);
            state = hash::add_f32(state, self.depth_bounds.max);
        }

        state = hash::add_u32(state, self.sample_count.as_u32());
        state = hash::add_f32(state, self.min_sample_shading);
        state = hash::add_u32(state, self.sample_mask);
        state = hash::add_u32(state, self.subpass_index);

        state = hash::add_u32(state, self.num_color_targets);
        for target in self.blend.iter().take(self.num_color_targets as usize) {
            state = hash::add_u32(state, target.src_color as u32);
            state = hash::add_u32(state, target.dst_color as u32);
            state = hash::add_u32(state, target.color_op as u32);
            state = hash::add_u32(state, target.src_alpha as u32);
            state = hash::add_u32(state, target.dst_alpha as u32);
            state = hash::add_u32(state, target.alpha_op as u32);
            state = hash::add_u32(state, u32::from(target.write_mask.bits()));
        }

        state = hash::add_usize(state, self.program.map_or(usize::MAX, |p| p.0));
        state = hash::add_usize(state, self.render_pass.map_or(usize::MAX, |p| p.0));
        state = hash::add_usize(state, self.vertex_layout.map_or(usize::MAX, |p| p.0));
        state
    }

    /// Equality under the dynamic-state mask: `true` when both states bake to
    /// the same pipeline object.
    pub fn dynamic_masked_eq(&self, other: &Self) -> bool {
        if self.word0 != other.word0 || self.masked_word1() != other.masked_word1() {
            return false;
        }
        let dynamic = self.dynamic_states();
        if !dynamic.contains(DynamicStateFlags::VIEWPORT) && self.viewport != other.viewport {
            return false;
        }
        if !dynamic.contains(DynamicStateFlags::SCISSOR) && self.scissor != other.scissor {
            return false;
        }
        if !dynamic.contains(DynamicStateFlags::BLEND_CONSTANTS)
            && self.blend_constants != other.blend_constants
        {
            return false;
        }
        if !dynamic.contains(DynamicStateFlags::LINE_WIDTH) && self.line_width != other.line_width {
            return false;
        }
        if !dynamic.contains(DynamicStateFlags::DEPTH_BIAS) && self.depth_bias != other.depth_bias {
            return false;
        }
        if !dynamic.contains(DynamicStateFlags::DEPTH_BOUNDS)
            && self.depth_bounds != other.depth_bounds
        {
            return false;
        }
        self.sample_count == other.sample_count
            && self.min_sample_shading == other.min_sample_shading
            && self.sample_mask == other.sample_mask
            && self.subpass_index == other.subpass_index
            && self.num_color_targets == other.num_color_targets
            && self.blend[..self.num_color_targets as usize]
                == other.blend[..other.num_color_targets as usize]
            && self.program == other.program
            && self.render_pass == other.render_pass
            && self.vertex_layout == other.vertex_layout
    }
}

fn compare_from_bits(bits: u64) -> CompareOp {
    match bits {
        0 => CompareOp::Never,
        1 => CompareOp::Less,
        2 => CompareOp::Equal,
        4 => CompareOp::Greater,
        5 => CompareOp::NotEqual,
        6 => CompareOp::GreaterOrEqual,
        7 => CompareOp::Always,
        _ => CompareOp::LessOrEqual,
    }
}

fn stencil_from_bits(bits: u64) -> StencilOp {
    match bits {
        1 => StencilOp::Zero,
        2 => StencilOp::Replace,
        3 => StencilOp::IncrementClamp,
        4 => StencilOp::DecrementClamp,
        5 => StencilOp::Invert,
        6 => StencilOp::IncrementWrap,
        7 => StencilOp::DecrementWrap,
        _ => StencilOp::Keep,
    }
}

fn logic_from_bits(bits: u64) -> LogicOp {
    match bits {
        0 => LogicOp::Clear,
        1 => LogicOp::And,
        2 => LogicOp::AndReverse,
        4 => LogicOp::AndInverted,
        5 => LogicOp::NoOp,
        6 => LogicOp::Xor,
        7 => LogicOp::Or,
        8 => LogicOp::Nor,
        9 => LogicOp::Equivalent,
        10 => LogicOp::Invert,
        11 => LogicOp::OrReverse,
        12 => LogicOp::CopyInverted,
        13 => LogicOp::OrInverted,
        14 => LogicOp::Nand,
        15 => LogicOp::Set,
        _ => LogicOp::Copy,
    }
}

fn pack_stencil_face(ops: StencilFaceOps) -> u64 {
    (ops.fail_op as u64) | ((ops.pass_op as u64) << 3) | ((ops.depth_fail_op as u64) << 6) | ((ops.compare as u64) << 9)
}

fn unpack_stencil_face(bits: u64) -> StencilFaceOps {
    StencilFaceOps {
        fail_op: stencil_from_bits(bits & 0x7),
        pass_op: stencil_from_bits((bits >> 3) & 0x7),
        depth_fail_op: stencil_from_bits((bits >> 6) & 0x7),
        compare: compare_from_bits((bits >> 9) & 0x7),
    }
}

/// Everything the backend needs to bake one pipeline object.
#[derive(Debug)]
pub struct PipelineDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The fixed-function state.
    pub state: &'a PipelineState,
    /// The resolved program.
    pub program: ProgramId,
    /// The resolved vertex layout.
    pub vertex_layout: &'a VertexLayoutSet,
    /// The resolved renderpass.
    pub render_pass: RenderPassId,
    /// The subpass index within the renderpass.
    pub subpass: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_accessors_round_trip() {
        let mut state = PipelineState::default();
        state.set_draw_mode(DrawMode::LineStrip);
        state.set_front_face(FrontFace::Cw);
        state.set_cull_face(CullFace::Back);
        state.set_depth_testing(true);
        state.set_depth_write(true);
        state.set_depth_op(CompareOp::Greater);
        state.set_logic_op(Some(LogicOp::Xor));
        state.set_stencil_front(StencilFaceOps {
            fail_op: StencilOp::Replace,
            pass_op: StencilOp::IncrementWrap,
            depth_fail_op: StencilOp::Keep,
            compare: CompareOp::Equal,
        });

        assert_eq!(state.draw_mode(), DrawMode::LineStrip);
        assert_eq!(state.front_face(), FrontFace::Cw);
        assert_eq!(state.cull_face(), CullFace::Back);
        assert!(state.depth_testing());
        assert!(state.depth_write());
        assert_eq!(state.depth_op(), CompareOp::Greater);
        assert_eq!(state.logic_op(), Some(LogicOp::Xor));
        let front = state.stencil_front();
        assert_eq!(front.fail_op, StencilOp::Replace);
        assert_eq!(front.pass_op, StencilOp::IncrementWrap);
        assert_eq!(front.compare, CompareOp::Equal);
    }

    #[test]
    fn dynamic_viewport_does_not_change_key() {
        let mut a = PipelineState::default();
        a.set_dynamic_states(DynamicStateFlags::VIEWPORT | DynamicStateFlags::SCISSOR);
        let mut b = a;
        b.viewport = Viewport::from_extent(1920.0, 1080.0);
        b.scissor = ScissorRect::from_extent(1920, 1080);

        assert_eq!(a.hash64(), b.hash64());
        assert!(a.dynamic_masked_eq(&b));
    }

    #[test]
    fn static_viewport_changes_key() {
        let a = PipelineState::default();
        let mut b = a;
        b.viewport = Viewport::from_extent(1920.0, 1080.0);

        assert_ne!(a.hash64(), b.hash64());
        assert!(!a.dynamic_masked_eq(&b));
    }

    #[test]
    fn dynamic_stencil_reference_is_masked() {
        let mut a = PipelineState::default();
        a.set_stencil_testing(true);
        a.set_dynamic_states(DynamicStateFlags::STENCIL_REFERENCE);
        let mut b = a;
        b.set_stencil_reference(0x80);

        assert_eq!(a.hash64(), b.hash64());
        assert!(a.dynamic_masked_eq(&b));

        // The same edit without the dynamic flag must split the key.
        let mut c = a;
        c.set_dynamic_states(DynamicStateFlags::EMPTY);
        let mut d = c;
        d.set_stencil_reference(0x80);
        assert_ne!(c.hash64(), d.hash64());
    }

    #[test]
    fn program_identity_is_part_of_the_key() {
        let a = PipelineState::default();
        let mut b = a;
        b.program = Some(ProgramId(3));
        assert_ne!(a.hash64(), b.hash64());
    }

    #[test]
    fn blend_enable_bits_are_per_target() {
        let mut state = PipelineState::default();
        state.set_blend_enabled(0, true);
        state.set_blend_enabled(3, true);
        assert!(state.blend_enabled(0));
        assert!(!state.blend_enabled(1));
        assert!(state.blend_enabled(3));
    }
}
