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

//! Data structures describing GPU texture resources, views, and samplers.

use crate::error::ResourceError;
use crate::math::Extent3D;
use crate::onyx_bitflags;
use std::borrow::Cow;

/// The memory format of pixels in a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// One 8-bit unsigned normalized component.
    R8Unorm,
    /// Two 8-bit unsigned normalized components.
    Rg8Unorm,
    /// Four 8-bit unsigned normalized components.
    Rgba8Unorm,
    /// Four 8-bit unsigned normalized components in sRGB space.
    Rgba8UnormSrgb,
    /// Four 8-bit unsigned normalized components, blue first.
    Bgra8Unorm,
    /// Four 8-bit unsigned normalized components, blue first, sRGB space.
    Bgra8UnormSrgb,
    /// Four 16-bit float components.
    Rgba16Float,
    /// Four 32-bit float components.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with an 8-bit stencil component.
    Depth24PlusStencil8,
}

impl TextureFormat {
    /// `true` for formats with a depth component.
    pub const fn has_depth(&self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24PlusStencil8)
    }

    /// `true` for formats with a stencil component.
    pub const fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    /// Bytes per texel for uncompressed color formats; depth formats report
    /// their packed size.
    pub const fn bytes_per_texel(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rg8Unorm => 2,
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth32Float
            | Self::Depth24PlusStencil8 => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// The number of samples per pixel for multisampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    /// 1 sample per pixel (MSAA disabled).
    #[default]
    X1,
    /// 2 samples per pixel.
    X2,
    /// 4 samples per pixel.
    X4,
    /// 8 samples per pixel.
    X8,
}

impl SampleCount {
    /// The raw sample count.
    pub const fn as_u32(&self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }
}

onyx_bitflags! {
    /// Usage flags for a texture.
    pub struct TextureFlags: u32 {
        /// Renderable as a color attachment.
        const COLOR_ATTACHMENT = 1 << 0;
        /// Renderable as a depth attachment.
        const DEPTH_ATTACHMENT = 1 << 1;
        /// Renderable as a stencil attachment.
        const STENCIL_ATTACHMENT = 1 << 2;
        /// Sampleable from shaders.
        const SAMPLED = 1 << 3;
        /// Readable as a subpass input attachment.
        const INPUT_ATTACHMENT = 1 << 4;
        /// Source of transfer (copy) operations.
        const TRANSFER_SRC = 1 << 5;
        /// Destination of transfer (copy/upload) operations.
        const TRANSFER_DST = 1 << 6;
    }
}

impl TextureFlags {
    /// A depth/stencil attachment that is neither sampled nor used as an
    /// input attachment is a renderbuffer-class object: it has no fetchable
    /// image view.
    pub const fn is_renderbuffer_class(&self) -> bool {
        self.intersects(Self::DEPTH_ATTACHMENT.with(Self::STENCIL_ATTACHMENT))
            && !self.intersects(Self::SAMPLED.with(Self::INPUT_ATTACHMENT))
    }
}

/// Which aspect of a texture a view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAspect {
    /// The color aspect.
    Color,
    /// The depth aspect only.
    Depth,
    /// Depth and stencil aspects.
    DepthStencil,
}

/// A descriptor used to create a [`TextureId`](crate::gpu::TextureId).
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Texture extent; `depth` doubles as array layer count.
    pub extent: Extent3D,
    /// Number of mip levels, at least 1.
    pub mip_levels: u32,
    /// Samples per texel.
    pub sample_count: SampleCount,
    /// Pixel format.
    pub format: TextureFormat,
    /// Usage flags.
    pub flags: TextureFlags,
}

impl<'a> TextureDescriptor<'a> {
    /// A sampled + upload-target 2D color texture, the common case.
    pub fn sampled_2d(label: &'a str, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            extent: Extent3D::new(width, height, 1),
            mip_levels: 1,
            sample_count: SampleCount::X1,
            format,
            flags: TextureFlags::SAMPLED | TextureFlags::TRANSFER_DST,
        }
    }

    /// Chooses the view aspect implied by this texture's format and usage.
    ///
    /// Renderbuffer-class depth targets reject view creation.
    pub fn inferred_aspect(&self) -> Result<TextureAspect, ResourceError> {
        if self.flags.is_renderbuffer_class() {
            return Err(ResourceError::InvalidHandle);
        }
        Ok(if self.format.has_stencil() {
            TextureAspect::DepthStencil
        } else if self.format.has_depth() {
            TextureAspect::Depth
        } else {
            TextureAspect::Color
        })
    }
}

/// A descriptor used to create a texture view.
#[derive(Debug, Clone)]
pub struct TextureViewDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Aspect the view exposes; `None` infers it from the texture.
    pub aspect: Option<TextureAspect>,
    /// First mip level visible through the view.
    pub base_mip_level: u32,
    /// Number of mip levels visible, or `None` for all remaining.
    pub mip_level_count: Option<u32>,
}

impl Default for TextureViewDescriptor<'_> {
    fn default() -> Self {
        Self { label: None, aspect: None, base_mip_level: 0, mip_level_count: None }
    }
}

/// Texel filtering mode for samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest-texel sampling.
    #[default]
    Nearest,
    /// Linear interpolation between texels.
    Linear,
}

/// How texture coordinates outside `[0, 1]` are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Repeat the texture.
    Repeat,
    /// Repeat, mirrored every other tile.
    MirrorRepeat,
}

/// A descriptor used to create a [`SamplerId`](crate::gpu::SamplerId).
#[derive(Debug, Clone, Default)]
pub struct SamplerDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Address mode on both axes.
    pub address_mode: AddressMode,
}

impl<'a> SamplerDescriptor<'a> {
    /// The nearest/clamp-to-edge sampler the 2D painter uses for atlases.
    pub fn nearest_clamp(label: &'a str) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            address_mode: AddressMode::ClampToEdge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderbuffer_class_rules() {
        let plain_depth = TextureFlags::DEPTH_ATTACHMENT;
        let sampled_depth = TextureFlags::DEPTH_ATTACHMENT | TextureFlags::SAMPLED;
        let input_depth = TextureFlags::DEPTH_ATTACHMENT | TextureFlags::INPUT_ATTACHMENT;
        let color = TextureFlags::COLOR_ATTACHMENT | TextureFlags::SAMPLED;

        assert!(plain_depth.is_renderbuffer_class());
        assert!(!sampled_depth.is_renderbuffer_class());
        assert!(!input_depth.is_renderbuffer_class());
        assert!(!color.is_renderbuffer_class());
    }

    #[test]
    fn aspect_inference() {
        let mut desc = TextureDescriptor::sampled_2d("t", 4, 4, TextureFormat::Rgba8Unorm);
        assert_eq!(desc.inferred_aspect().unwrap(), TextureAspect::Color);

        desc.format = TextureFormat::Depth32Float;
        assert_eq!(desc.inferred_aspect().unwrap(), TextureAspect::Depth);

        desc.format = TextureFormat::Depth24PlusStencil8;
        assert_eq!(desc.inferred_aspect().unwrap(), TextureAspect::DepthStencil);
    }

    #[test]
    fn renderbuffer_class_rejects_views() {
        let desc = TextureDescriptor {
            label: None,
            extent: Extent3D::new(4, 4, 1),
            mip_levels: 1,
            sample_count: SampleCount::X1,
            format: TextureFormat::Depth32Float,
            flags: TextureFlags::DEPTH_ATTACHMENT,
        };
        assert!(desc.inferred_aspect().is_err());
    }
}
