// Copyright 2025 eraflo
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

//! One-shot device capability detection.
//!
//! Every field of the profile is probed independently; any query that fails
//! or is unsupported falls back to the conservative default for that field.

use vigil_core::platform::CapabilitySource;
use vigil_core::CapabilityProfile;

/// Builds the [`CapabilityProfile`] at engine construction.
pub struct CapabilityProbe;

impl CapabilityProbe {
    /// Detects the capabilities exposed by `source`.
    ///
    /// With no source at all, returns the conservative default profile.
    pub fn detect(source: Option<&dyn CapabilitySource>) -> CapabilityProfile {
        let defaults = CapabilityProfile::default();
        let Some(source) = source else {
            log::warn!("CapabilityProbe: No capability source, using conservative defaults.");
            return defaults;
        };

        let cores = source
            .hardware_concurrency()
            .filter(|&c| c > 0)
            .unwrap_or_else(|| {
                log::debug!("CapabilityProbe: Core count unavailable.");
                defaults.cores
            });

        let memory_mb = source
            .device_memory_mb()
            .filter(|&m| m > 0)
            .unwrap_or_else(|| {
                log::debug!("CapabilityProbe: Device memory unavailable.");
                defaults.memory_mb
            });

        let mobile = source.is_mobile().unwrap_or(defaults.mobile);

        let device_pixel_ratio = source
            .device_pixel_ratio()
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(defaults.device_pixel_ratio);

        let (max_texture_size, max_lights, gpu_tier) = match source.probe_gpu() {
            Ok(limits) if limits.max_texture_size > 0 => (
                limits.max_texture_size,
                limits.max_lights.max(1),
                limits.tier,
            ),
            Ok(_) => {
                log::warn!("CapabilityProbe: GPU reported no texture support, using defaults.");
                (defaults.max_texture_size, defaults.max_lights, defaults.gpu_tier)
            }
            Err(err) => {
                log::warn!("CapabilityProbe: {err}. Using default GPU limits.");
                (defaults.max_texture_size, defaults.max_lights, defaults.gpu_tier)
            }
        };

        let profile = CapabilityProfile {
            cores,
            memory_mb,
            gpu_tier,
            mobile,
            device_pixel_ratio,
            max_texture_size,
            max_lights,
        };

        log::info!(
            "CapabilityProbe: {} cores, {} MB, GPU {:?}, mobile={}, max texture {}, max lights {}",
            profile.cores,
            profile.memory_mb,
            profile.gpu_tier,
            profile.mobile,
            profile.max_texture_size,
            profile.max_lights
        );

        profile
    }
}
