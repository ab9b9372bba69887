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

//! Embedded WGSL sources for the painter and debug programs.
//!
//! Descriptor-set convention shared by every program here: set 0 binding 0
//! is the per-view camera uniform (`view_proj` + viewport); set 1 binding 0
//! is the material's combined image-sampler where one exists.

use onyx_core::error::ResourceError;
use onyx_core::gpu::{
    GpuDevice, ProgramDescriptor, ProgramId, ShaderModuleDescriptor, ShaderModuleId, ShaderSource,
    ShaderStage,
};
use std::borrow::Cow;

/// The textured 2D painter program source.
pub const PAINTER_TEXTURED: &str = include_str!("shaders/painter_textured.wgsl");
/// The shared drop-shadow vertex stage.
pub const DROP_SHADOW_VS: &str = include_str!("shaders/drop_shadow_vs.wgsl");
/// The sharp-cornered analytic shadow fragment stage.
pub const DROP_SHADOW_RECT_FS: &str = include_str!("shaders/drop_shadow_rect_fs.wgsl");
/// The rounded-corner analytic shadow fragment stage.
pub const DROP_SHADOW_ROUNDED_FS: &str = include_str!("shaders/drop_shadow_rounded_fs.wgsl");
/// The debug line-expansion program source.
pub const DEBUG_LINE: &str = include_str!("shaders/debug_line.wgsl");

/// Compiles one WGSL module.
pub(crate) fn create_module(
    device: &mut GpuDevice,
    label: &str,
    stage: ShaderStage,
    entry_point: &'static str,
    source: &'static str,
) -> Result<ShaderModuleId, ResourceError> {
    device.create_shader_module(&ShaderModuleDescriptor {
        label: Some(Cow::Owned(label.to_string())),
        stage,
        entry_point: Cow::Borrowed(entry_point),
        source: ShaderSource::Wgsl(Cow::Borrowed(source)),
    })
}

/// Links a vertex + fragment module pair into a program with `num_sets`
/// descriptor-set layouts declared by `declare`.
pub(crate) fn create_program(
    device: &mut GpuDevice,
    label: &str,
    modules: [ShaderModuleId; 2],
    num_sets: usize,
    declare: impl FnOnce(ProgramDescriptor<'_>) -> ProgramDescriptor<'_>,
) -> Result<ProgramId, ResourceError> {
    let descriptor = declare(ProgramDescriptor::new(label, &modules, num_sets));
    device.create_program(&descriptor)
}
