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

//! User-facing renderer configuration.

use serde::{Deserialize, Serialize};

/// Renderer configuration knobs, loadable from application config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// How many frames may be in flight at once. Clamped to `1..=3`.
    pub frames_in_flight: u32,
    /// Whether presentation waits for vertical sync.
    pub vsync: bool,
    /// MSAA samples for view targets; 1 disables multisampling.
    pub msaa_samples: u32,
    /// Frames a cached GPU object may go untouched before eviction.
    pub cache_age_limit: u64,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            vsync: true,
            msaa_samples: 1,
            cache_age_limit: 60,
        }
    }
}

impl RendererSettings {
    /// `frames_in_flight` clamped to the supported range.
    pub fn clamped_frames_in_flight(&self) -> u32 {
        self.frames_in_flight.clamp(1, 3)
    }
}

/// Counters accumulated by the device frontend, reset per frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenderStats {
    /// Draw calls issued this frame.
    pub draw_calls: u64,
    /// Pipeline cache hits this frame.
    pub pipeline_cache_hits: u64,
    /// Pipeline cache misses (bakes) this frame.
    pub pipeline_cache_misses: u64,
    /// GPU objects destroyed by the release list this frame.
    pub objects_released: u64,
    /// Cache entries evicted by aging this frame.
    pub cache_evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_knobs() {
        let settings = RendererSettings::default();
        assert_eq!(settings.frames_in_flight, 2);
        assert_eq!(settings.cache_age_limit, 60);
        assert!(settings.vsync);
    }

    #[test]
    fn frames_in_flight_clamps() {
        let mut settings = RendererSettings::default();
        settings.frames_in_flight = 0;
        assert_eq!(settings.clamped_frames_in_flight(), 1);
        settings.frames_in_flight = 9;
        assert_eq!(settings.clamped_frames_in_flight(), 3);
    }
}
