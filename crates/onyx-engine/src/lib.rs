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

//! # Onyx Engine
//!
//! Frame wiring over the rendering core: [`RenderView`]s (camera + four
//! render queues + targets), the [`Renderer`] frame driver, and queued
//! view resize/delete applied at frame boundaries.

#![warn(missing_docs)]

pub mod camera;
pub mod renderer;
pub mod view;

pub use camera::{Camera, CameraUniform, Mat4};
pub use renderer::{load_settings, Renderer};
pub use view::{RenderView, ViewFlags, ViewId};
