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

//! Renderpass description: attachments, subpasses, and per-attachment
//! load/store/clear operation bitmasks.

use crate::gpu::{SampleCount, TextureFormat, TextureId};
use crate::math::Rgba;
use crate::utils::hash;

/// Maximum attachments per renderpass / framebuffer.
pub const MAX_ATTACHMENTS: usize = 8;
/// Maximum subpasses per renderpass.
pub const MAX_SUBPASSES: usize = 8;

/// Image layout a texture is in for a given use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined; cheapest source layout.
    Undefined,
    /// General-purpose layout.
    General,
    /// Optimal for color attachment writes.
    ColorAttachment,
    /// Optimal for depth/stencil attachment writes.
    DepthStencilAttachment,
    /// Optimal for sampled reads.
    ShaderReadOnly,
    /// Optimal for transfer reads.
    TransferSrc,
    /// Optimal for transfer writes.
    TransferDst,
    /// Ready for presentation.
    Present,
}

/// One attachment declared by a renderpass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentInfo {
    /// The texture backing the attachment.
    pub texture: TextureId,
    /// Pixel format of the attachment.
    pub format: TextureFormat,
    /// Samples per texel.
    pub samples: SampleCount,
    /// Layout the attachment transitions to when the pass ends.
    pub final_layout: ImageLayout,
    /// Whether this attachment may alias memory with another.
    pub may_alias: bool,
}

/// A reference from a subpass to an attachment index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Index into the renderpass attachment list.
    pub attachment: u32,
    /// Layout the attachment is in during the subpass.
    pub layout: ImageLayout,
}

/// One subpass: its input, color, and optional depth attachment references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubpassInfo {
    /// Input attachment references.
    pub input_refs: Vec<AttachmentRef>,
    /// Color output references.
    pub color_refs: Vec<AttachmentRef>,
    /// Optional depth/stencil reference.
    pub depth_ref: Option<AttachmentRef>,
}

/// An execution/memory dependency between two subpasses.
///
/// `SUBPASS_EXTERNAL` marks a dependency edge to work outside the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpassDependency {
    /// Source subpass index or [`SUBPASS_EXTERNAL`].
    pub src_subpass: u32,
    /// Destination subpass index or [`SUBPASS_EXTERNAL`].
    pub dst_subpass: u32,
    /// `true` when the dependency may be framebuffer-local.
    pub by_region: bool,
}

/// Sentinel subpass index for external dependencies.
pub const SUBPASS_EXTERNAL: u32 = u32::MAX;

/// Clear value for one attachment at `begin_renderpass`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear a color attachment.
    Color(Rgba),
    /// Clear a depth/stencil attachment.
    DepthStencil {
        /// Depth clear value.
        depth: f32,
        /// Stencil clear value.
        stencil: u32,
    },
}

/// A complete renderpass description.
///
/// The op fields are bitmasks keyed by attachment index: bit *i* set in
/// `load_ops` means attachment *i* loads its previous contents, bit *i* in
/// `clear_ops` means it clears, neither means don't-care. `store_ops` bit *i*
/// set means the attachment's results are stored. The `stencil_*` masks are
/// the same scheme for the stencil aspect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPassInfo {
    /// Declared attachments, at most [`MAX_ATTACHMENTS`].
    pub attachments: Vec<AttachmentInfo>,
    /// Subpasses, at most [`MAX_SUBPASSES`]. At least one.
    pub subpasses: Vec<SubpassInfo>,
    /// Dependencies between subpasses.
    pub dependencies: Vec<SubpassDependency>,
    /// Per-attachment load bits.
    pub load_ops: u32,
    /// Per-attachment store bits.
    pub store_ops: u32,
    /// Per-attachment clear bits.
    pub clear_ops: u32,
    /// Per-attachment stencil load bits.
    pub stencil_load_ops: u32,
    /// Per-attachment stencil store bits.
    pub stencil_store_ops: u32,
    /// Per-attachment stencil clear bits.
    pub stencil_clear_ops: u32,
}

impl RenderPassInfo {
    /// Creates an empty renderpass description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an attachment and returns its index.
    pub fn add_attachment(&mut self, info: AttachmentInfo) -> u32 {
        debug_assert!(self.attachments.len() < MAX_ATTACHMENTS, "too many attachments");
        self.attachments.push(info);
        (self.attachments.len() - 1) as u32
    }

    /// Declares a subpass and returns its index.
    pub fn add_subpass(&mut self, subpass: SubpassInfo) -> u32 {
        debug_assert!(self.subpasses.len() < MAX_SUBPASSES, "too many subpasses");
        self.subpasses.push(subpass);
        (self.subpasses.len() - 1) as u32
    }

    /// Sets the attachments (by index bitmask) that load previous contents.
    pub fn loads(&mut self, mask: u32) -> &mut Self {
        self.load_ops = mask;
        self
    }

    /// Sets the attachments (by index bitmask) that clear on pass begin.
    pub fn clears(&mut self, mask: u32) -> &mut Self {
        self.clear_ops = mask;
        self
    }

    /// Sets the attachments (by index bitmask) whose results are stored.
    pub fn stores(&mut self, mask: u32) -> &mut Self {
        self.store_ops = mask;
        self
    }

    /// Folds the pass description into a cache key.
    ///
    /// Attachment identity is represented by format/samples/layout/aliasing
    /// only, so passes over different textures of identical shape share one
    /// renderpass object.
    pub fn hash64(&self) -> u64 {
        let mut state = hash::SEED;
        state = hash::add_u32(state, self.load_ops);
        state = hash::add_u32(state, self.stencil_load_ops);
        state = hash::add_u32(state, self.clear_ops);
        state = hash::add_u32(state, self.stencil_clear_ops);
        state = hash::add_u32(state, self.store_ops);
        state = hash::add_u32(state, self.stencil_store_ops);

        state = hash::add_usize(state, self.subpasses.len());
        for subpass in &self.subpasses {
            state = hash::add_usize(state, subpass.color_refs.len());
            for r in &subpass.color_refs {
                state = hash_ref(state, r);
            }
            state = hash::add_usize(state, subpass.input_refs.len());
            for r in &subpass.input_refs {
                state = hash_ref(state, r);
            }
            match &subpass.depth_ref {
                Some(r) => state = hash_ref(hash::add_u32(state, 1), r),
                None => state = hash::add_u32(state, 0),
            }
        }

        state = hash::add_usize(state, self.attachments.len());
        for attachment in &self.attachments {
            state = hash::add_u32(state, attachment.format as u32);
            state = hash::add_u32(state, attachment.samples.as_u32());
            state = hash::add_u32(state, attachment.final_layout as u32);
            state = hash::add_u32(state, u32::from(attachment.may_alias));
        }

        for dep in &self.dependencies {
            state = hash::add_u32(state, dep.src_subpass);
            state = hash::add_u32(state, dep.dst_subpass);
            state = hash::add_u32(state, u32::from(dep.by_region));
        }

        state
    }

    /// `true` when the hash inputs of `self` and `other` agree; used by the
    /// cache to confirm a key match.
    pub fn cache_eq(&self, other: &Self) -> bool {
        self.load_ops == other.load_ops
            && self.store_ops == other.store_ops
            && self.clear_ops == other.clear_ops
            && self.stencil_load_ops == other.stencil_load_ops
            && self.stencil_store_ops == other.stencil_store_ops
            && self.stencil_clear_ops == other.stencil_clear_ops
            && self.subpasses == other.subpasses
            && self.dependencies == other.dependencies
            && self.attachments.len() == other.attachments.len()
            && self
                .attachments
                .iter()
                .zip(&other.attachments)
                .all(|(a, b)| {
                    a.format == b.format
                        && a.samples == b.samples
                        && a.final_layout == b.final_layout
                        && a.may_alias == b.may_alias
                })
    }
}

fn hash_ref(state: u64, r: &AttachmentRef) -> u64 {
    hash::add_u32(hash::add_u32(state, r.attachment), r.layout as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_pass(format: TextureFormat, texture: TextureId) -> RenderPassInfo {
        let mut info = RenderPassInfo::new();
        let color = info.add_attachment(AttachmentInfo {
            texture,
            format,
            samples: SampleCount::X1,
            final_layout: ImageLayout::Present,
            may_alias: false,
        });
        info.add_subpass(SubpassInfo {
            input_refs: Vec::new(),
            color_refs: vec![AttachmentRef { attachment: color, layout: ImageLayout::ColorAttachment }],
            depth_ref: None,
        });
        info.clears(1 << color).stores(1 << color);
        info
    }

    #[test]
    fn identical_shape_hashes_equal_across_textures() {
        let a = simple_pass(TextureFormat::Bgra8UnormSrgb, TextureId(1));
        let b = simple_pass(TextureFormat::Bgra8UnormSrgb, TextureId(99));
        assert_eq!(a.hash64(), b.hash64());
        assert!(a.cache_eq(&b));
    }

    #[test]
    fn ops_change_the_key() {
        let a = simple_pass(TextureFormat::Bgra8UnormSrgb, TextureId(1));
        let mut b = a.clone();
        b.loads(1).clears(0);
        assert_ne!(a.hash64(), b.hash64());
        assert!(!a.cache_eq(&b));
    }

    #[test]
    fn format_changes_the_key() {
        let a = simple_pass(TextureFormat::Bgra8UnormSrgb, TextureId(1));
        let b = simple_pass(TextureFormat::Rgba16Float, TextureId(1));
        assert_ne!(a.hash64(), b.hash64());
    }
}
