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

//! Defines the hierarchy of error types for the rendering core.

use crate::gpu::{PipelineId, ShaderModuleId};
use std::fmt;

/// An error related to the creation, loading, or compilation of a shader
/// module or program.
#[derive(Debug)]
pub enum ShaderError {
    /// An error occurred while loading shader source bytes.
    LoadError {
        /// The path or label of the source that failed to load.
        path: String,
        /// The underlying I/O or source error.
        source_error: String,
    },
    /// The shader source failed to compile into a backend module.
    ///
    /// Compile failures are fatal at asset-load time; the driver's info log
    /// is carried in `details`.
    CompilationError {
        /// A descriptive label for the shader, if available.
        label: String,
        /// Detailed messages from the shader compiler.
        details: String,
    },
    /// The requested shader module does not exist.
    NotFound {
        /// The ID of the shader module that was not found.
        id: ShaderModuleId,
    },
    /// Program linking failed (bad module combination or set layouts).
    LinkError {
        /// A descriptive label for the program.
        label: String,
        /// Detailed messages from the linker.
        details: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::LoadError { path, source_error } => {
                write!(f, "Failed to load shader source from '{path}': {source_error}")
            }
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Shader module not found for ID: {id:?}")
            }
            ShaderError::LinkError { label, details } => {
                write!(f, "Program link failed for '{label}': {details}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation of a graphics pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// The backend failed to compile the full pipeline state object.
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed messages from the backend.
        details: String,
    },
    /// The pipeline state referenced no program.
    MissingProgram,
    /// The pipeline state referenced no renderpass.
    MissingRenderPass,
    /// The pipeline state referenced no vertex layout.
    MissingVertexLayout,
    /// The specified pipeline ID is not valid.
    InvalidPipeline {
        /// The ID of the invalid pipeline.
        id: PipelineId,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::CompilationFailed { label, details } => {
                write!(
                    f,
                    "Pipeline compilation failed for '{}': {}",
                    label.as_deref().unwrap_or("Unknown"),
                    details
                )
            }
            PipelineError::MissingProgram => {
                write!(f, "Pipeline state has no shader program bound.")
            }
            PipelineError::MissingRenderPass => {
                write!(f, "Pipeline state has no renderpass bound.")
            }
            PipelineError::MissingVertexLayout => {
                write!(f, "Pipeline state has no vertex layout bound.")
            }
            PipelineError::InvalidPipeline { id } => {
                write!(f, "Invalid pipeline ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// The device has no memory left for the resource. Callers tolerate this
    /// by retrying smaller or skipping the frame.
    OutOfMemory,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// A generic resource could not be found.
    NotFound,
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
    /// An error originating from the specific graphics backend.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::OutOfMemory => write!(f, "Out of GPU memory."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::NotFound => write!(f, "Resource not found."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::BackendError(msg) => write!(f, "Backend-specific resource error: {msg}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A high-level error from the rendering system or device frontend.
#[derive(Debug)]
pub enum RenderError {
    /// A failure occurred while initializing the graphics backend.
    InitializationFailed(String),
    /// Failed to acquire the next frame from the surface for rendering.
    SurfaceAcquisitionFailed(String),
    /// An error occurred while managing a GPU resource.
    Resource(ResourceError),
    /// The graphics device was lost; requires reinitialization.
    DeviceLost,
    /// An unexpected internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire surface for rendering: {msg}")
            }
            RenderError::Resource(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => {
                write!(f, "The graphics device was lost and needs to be reinitialized.")
            }
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationError {
            label: "painter.textured".to_string(),
            details: "unexpected token at line 5".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Shader compilation failed for 'painter.textured': unexpected token at line 5"
        );
    }

    #[test]
    fn resource_error_wraps_shader_error() {
        let err: ResourceError = ShaderError::NotFound { id: ShaderModuleId(42) }.into();
        assert_eq!(
            format!("{err}"),
            "Shader resource error: Shader module not found for ID: ShaderModuleId(42)"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn render_error_chain_has_two_sources() {
        let resource: ResourceError = PipelineError::MissingProgram.into();
        let render: RenderError = resource.into();
        assert!(render.source().is_some());
        assert!(render.source().unwrap().source().is_some());
    }
}
