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

//! Conversions between the core's backend-agnostic GPU types and wgpu's.

use onyx_core::gpu::{
    BlendFactor, BlendOp, BlendTargetState, BufferUsage, ColorWrites, CompareOp, CullFace,
    DescriptorType, DrawMode, FillMode, FilterMode, FrontFace, IndexFormat, MemoryProps,
    SampleCount, ShaderStage, ShaderStageFlags, StencilFaceOps, StencilOp, TextureAspect,
    TextureFlags, TextureFormat, VertexFormat, VertexStepMode,
};
use onyx_core::gpu::AddressMode;

/// Conversion into the wgpu equivalent of a core type.
pub trait IntoWgpu<W> {
    /// Converts the value.
    fn into_wgpu(self) -> W;
}

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Rg8Unorm => wgpu::TextureFormat::Rg8Unorm,
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        }
    }
}

/// The core format for a wgpu surface format, where one exists.
pub fn from_wgpu_texture_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    match format {
        wgpu::TextureFormat::R8Unorm => Some(TextureFormat::R8Unorm),
        wgpu::TextureFormat::Rg8Unorm => Some(TextureFormat::Rg8Unorm),
        wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgba16Float => Some(TextureFormat::Rgba16Float),
        wgpu::TextureFormat::Rgba32Float => Some(TextureFormat::Rgba32Float),
        wgpu::TextureFormat::Depth32Float => Some(TextureFormat::Depth32Float),
        wgpu::TextureFormat::Depth24PlusStencil8 => Some(TextureFormat::Depth24PlusStencil8),
        _ => None,
    }
}

/// Buffer usages from the core's usage + memory property pair. Host-visible
/// buffers are written through the queue, so they always accept copies.
pub fn buffer_usages(usage: BufferUsage, memory: MemoryProps) -> wgpu::BufferUsages {
    let mut usages = wgpu::BufferUsages::empty();
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        usages |= wgpu::BufferUsages::COPY_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        usages |= wgpu::BufferUsages::COPY_DST;
    }
    if usage.contains(BufferUsage::VERTEX) {
        usages |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        usages |= wgpu::BufferUsages::INDEX;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        usages |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(BufferUsage::STORAGE) {
        usages |= wgpu::BufferUsages::STORAGE;
    }
    if usage.contains(BufferUsage::INDIRECT) {
        usages |= wgpu::BufferUsages::INDIRECT;
    }
    if memory.is_mappable() {
        usages |= wgpu::BufferUsages::COPY_DST;
    }
    usages
}

impl IntoWgpu<wgpu::TextureUsages> for TextureFlags {
    fn into_wgpu(self) -> wgpu::TextureUsages {
        let mut usages = wgpu::TextureUsages::empty();
        if self.intersects(
            TextureFlags::COLOR_ATTACHMENT
                .with(TextureFlags::DEPTH_ATTACHMENT)
                .with(TextureFlags::STENCIL_ATTACHMENT),
        ) {
            usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if self.intersects(TextureFlags::SAMPLED.with(TextureFlags::INPUT_ATTACHMENT)) {
            usages |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if self.contains(TextureFlags::TRANSFER_SRC) {
            usages |= wgpu::TextureUsages::COPY_SRC;
        }
        if self.contains(TextureFlags::TRANSFER_DST) {
            usages |= wgpu::TextureUsages::COPY_DST;
        }
        usages
    }
}

impl IntoWgpu<u32> for SampleCount {
    fn into_wgpu(self) -> u32 {
        self.as_u32()
    }
}

impl IntoWgpu<wgpu::FilterMode> for FilterMode {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::AddressMode> for AddressMode {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

impl IntoWgpu<wgpu::TextureAspect> for TextureAspect {
    fn into_wgpu(self) -> wgpu::TextureAspect {
        match self {
            TextureAspect::Color => wgpu::TextureAspect::All,
            TextureAspect::Depth => wgpu::TextureAspect::DepthOnly,
            TextureAspect::DepthStencil => wgpu::TextureAspect::All,
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareOp {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareOp::Never => wgpu::CompareFunction::Never,
            CompareOp::Less => wgpu::CompareFunction::Less,
            CompareOp::Equal => wgpu::CompareFunction::Equal,
            CompareOp::LessOrEqual => wgpu::CompareFunction::LessEqual,
            CompareOp::Greater => wgpu::CompareFunction::Greater,
            CompareOp::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareOp::GreaterOrEqual => wgpu::CompareFunction::GreaterEqual,
            CompareOp::Always => wgpu::CompareFunction::Always,
        }
    }
}

impl IntoWgpu<wgpu::StencilOperation> for StencilOp {
    fn into_wgpu(self) -> wgpu::StencilOperation {
        match self {
            StencilOp::Keep => wgpu::StencilOperation::Keep,
            StencilOp::Zero => wgpu::StencilOperation::Zero,
            StencilOp::Replace => wgpu::StencilOperation::Replace,
            StencilOp::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
            StencilOp::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
            StencilOp::Invert => wgpu::StencilOperation::Invert,
            StencilOp::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
            StencilOp::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
        }
    }
}

impl IntoWgpu<wgpu::StencilFaceState> for StencilFaceOps {
    fn into_wgpu(self) -> wgpu::StencilFaceState {
        wgpu::StencilFaceState {
            compare: self.compare.into_wgpu(),
            fail_op: self.fail_op.into_wgpu(),
            depth_fail_op: self.depth_fail_op.into_wgpu(),
            pass_op: self.pass_op.into_wgpu(),
        }
    }
}

impl IntoWgpu<wgpu::PrimitiveTopology> for DrawMode {
    fn into_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            DrawMode::PointList => wgpu::PrimitiveTopology::PointList,
            DrawMode::LineList => wgpu::PrimitiveTopology::LineList,
            DrawMode::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            DrawMode::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            DrawMode::TriangleStrip | DrawMode::TriangleFan => {
                wgpu::PrimitiveTopology::TriangleStrip
            }
        }
    }
}

impl IntoWgpu<Option<wgpu::Face>> for CullFace {
    fn into_wgpu(self) -> Option<wgpu::Face> {
        match self {
            CullFace::None => None,
            CullFace::Front | CullFace::Both => Some(wgpu::Face::Front),
            CullFace::Back => Some(wgpu::Face::Back),
        }
    }
}

impl IntoWgpu<wgpu::FrontFace> for FrontFace {
    fn into_wgpu(self) -> wgpu::FrontFace {
        match self {
            FrontFace::Ccw => wgpu::FrontFace::Ccw,
            FrontFace::Cw => wgpu::FrontFace::Cw,
        }
    }
}

impl IntoWgpu<wgpu::PolygonMode> for FillMode {
    fn into_wgpu(self) -> wgpu::PolygonMode {
        match self {
            FillMode::Fill => wgpu::PolygonMode::Fill,
            FillMode::Line => wgpu::PolygonMode::Line,
            FillMode::Point => wgpu::PolygonMode::Point,
        }
    }
}

impl IntoWgpu<wgpu::BlendFactor> for BlendFactor {
    fn into_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcColor => wgpu::BlendFactor::Src,
            BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::DstColor => wgpu::BlendFactor::Dst,
            BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
            // wgpu folds constant-alpha factors into the constant color.
            BlendFactor::ConstantColor | BlendFactor::ConstantAlpha => wgpu::BlendFactor::Constant,
            BlendFactor::OneMinusConstantColor | BlendFactor::OneMinusConstantAlpha => {
                wgpu::BlendFactor::OneMinusConstant
            }
            BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
        }
    }
}

impl IntoWgpu<wgpu::BlendOperation> for BlendOp {
    fn into_wgpu(self) -> wgpu::BlendOperation {
        match self {
            BlendOp::Add => wgpu::BlendOperation::Add,
            BlendOp::Subtract => wgpu::BlendOperation::Subtract,
            BlendOp::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
            BlendOp::Min => wgpu::BlendOperation::Min,
            BlendOp::Max => wgpu::BlendOperation::Max,
        }
    }
}

impl IntoWgpu<wgpu::BlendState> for BlendTargetState {
    fn into_wgpu(self) -> wgpu::BlendState {
        wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: self.src_color.into_wgpu(),
                dst_factor: self.dst_color.into_wgpu(),
                operation: self.color_op.into_wgpu(),
            },
            alpha: wgpu::BlendComponent {
                src_factor: self.src_alpha.into_wgpu(),
                dst_factor: self.dst_alpha.into_wgpu(),
                operation: self.alpha_op.into_wgpu(),
            },
        }
    }
}

impl IntoWgpu<wgpu::ColorWrites> for ColorWrites {
    fn into_wgpu(self) -> wgpu::ColorWrites {
        wgpu::ColorWrites::from_bits_truncate(u32::from(self.bits()))
    }
}

impl IntoWgpu<wgpu::VertexFormat> for VertexFormat {
    fn into_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
            VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        }
    }
}

impl IntoWgpu<wgpu::VertexStepMode> for VertexStepMode {
    fn into_wgpu(self) -> wgpu::VertexStepMode {
        match self {
            VertexStepMode::Vertex => wgpu::VertexStepMode::Vertex,
            VertexStepMode::Instance => wgpu::VertexStepMode::Instance,
        }
    }
}

impl IntoWgpu<wgpu::IndexFormat> for IndexFormat {
    fn into_wgpu(self) -> wgpu::IndexFormat {
        match self {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }
}

impl IntoWgpu<wgpu::ShaderStages> for ShaderStageFlags {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        let mut stages = wgpu::ShaderStages::empty();
        if self.contains(ShaderStageFlags::VERTEX) {
            stages |= wgpu::ShaderStages::VERTEX;
        }
        if self.contains(ShaderStageFlags::FRAGMENT) {
            stages |= wgpu::ShaderStages::FRAGMENT;
        }
        stages
    }
}

impl IntoWgpu<wgpu::ShaderStages> for ShaderStage {
    fn into_wgpu(self) -> wgpu::ShaderStages {
        match self {
            ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
            ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
        }
    }
}

/// The wgpu binding slot of a core layout binding.
///
/// wgpu has no combined image-samplers, so every core binding *b* spreads
/// over a pair of wgpu slots: `2b` carries the resource (buffer or
/// texture), `2b + 1` the sampler half of a combined binding. WGSL sources
/// follow the same convention.
pub fn binding_slot(binding: u32) -> u32 {
    binding * 2
}

/// Bind-group-layout entries for one core layout binding.
pub fn layout_entries(
    binding: u32,
    ty: DescriptorType,
    count: u32,
    stages: ShaderStageFlags,
) -> Vec<wgpu::BindGroupLayoutEntry> {
    let visibility = stages.into_wgpu();
    let slot = binding_slot(binding);
    let _ = count;
    match ty {
        DescriptorType::UniformBuffer => vec![wgpu::BindGroupLayoutEntry {
            binding: slot,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        DescriptorType::DynamicUniformBuffer => vec![wgpu::BindGroupLayoutEntry {
            binding: slot,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: None,
            },
            count: None,
        }],
        DescriptorType::CombinedImageSampler => vec![
            wgpu::BindGroupLayoutEntry {
                binding: slot,
                visibility,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: slot + 1,
                visibility,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        // Input attachments read as plain sampled textures under wgpu.
        DescriptorType::InputAttachment => vec![wgpu::BindGroupLayoutEntry {
            binding: slot,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }],
        DescriptorType::BufferView => vec![wgpu::BindGroupLayoutEntry {
            binding: slot,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_samplers_split_over_adjacent_slots() {
        let entries = layout_entries(
            1,
            DescriptorType::CombinedImageSampler,
            1,
            ShaderStageFlags::FRAGMENT,
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].binding, 2);
        assert_eq!(entries[1].binding, 3);
    }

    #[test]
    fn mappable_buffers_accept_queue_writes() {
        let usages = buffer_usages(BufferUsage::VERTEX, MemoryProps::HOST_VISIBLE);
        assert!(usages.contains(wgpu::BufferUsages::COPY_DST));
        assert!(usages.contains(wgpu::BufferUsages::VERTEX));
    }

    #[test]
    fn depth_formats_round_trip() {
        let format = TextureFormat::Depth32Float;
        assert_eq!(from_wgpu_texture_format(format.into_wgpu()), Some(format));
    }
}
