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

//! # Onyx Core
//!
//! Backend-agnostic GPU command-submission core: math types, the abstract
//! device surface, frame-aged resource caches, command lists, and render
//! queues. Concrete backends live in `onyx-infra`; the 2D painter and the
//! debug line renderer in `onyx-paint`.

#![warn(missing_docs)]

pub mod error;
pub mod gpu;
pub mod math;
pub mod utils;

pub use error::{PipelineError, RenderError, ResourceError, ShaderError};
