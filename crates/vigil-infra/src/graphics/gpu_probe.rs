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

//! GPU limits gathered from a throwaway `wgpu` adapter.

use vigil_core::platform::{GpuLimits, GpuProbe};
use vigil_core::{GpuTier, QualityError, QualityResult};

/// Bytes of uniform data consumed by one dynamic light.
const BYTES_PER_LIGHT: u64 = 64;
/// Upper bound on the light count derived from uniform buffer limits.
const MAX_PROBED_LIGHTS: u64 = 64;

/// Requests the default adapter once and reads its limits.
///
/// No device or surface is created; the adapter is dropped as soon as the
/// limits are read.
#[derive(Debug, Default, Clone, Copy)]
pub struct WgpuGpuProbe;

impl WgpuGpuProbe {
    /// Creates the probe.
    pub fn new() -> Self {
        Self
    }

    fn tier_for(device_type: wgpu::DeviceType) -> GpuTier {
        match device_type {
            wgpu::DeviceType::DiscreteGpu => GpuTier::High,
            wgpu::DeviceType::IntegratedGpu => GpuTier::Medium,
            wgpu::DeviceType::VirtualGpu | wgpu::DeviceType::Cpu => GpuTier::Low,
            _ => GpuTier::Unknown,
        }
    }

    fn lights_for(uniform_binding_size: u64) -> u32 {
        (uniform_binding_size / BYTES_PER_LIGHT).clamp(1, MAX_PROBED_LIGHTS) as u32
    }
}

impl GpuProbe for WgpuGpuProbe {
    fn probe(&self) -> QualityResult<GpuLimits> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .map_err(|e| QualityError::ProbeUnavailable(format!("no GPU adapter: {e}")))?;

        let info = adapter.get_info();
        let limits = adapter.limits();
        let probed = GpuLimits {
            max_texture_size: limits.max_texture_dimension_2d,
            max_lights: Self::lights_for(limits.max_uniform_buffer_binding_size as u64),
            tier: Self::tier_for(info.device_type),
        };

        log::info!(
            "WgpuGpuProbe: {} ({:?}, {:?}) max texture {}, max lights {}.",
            info.name,
            info.device_type,
            info.backend,
            probed.max_texture_size,
            probed.max_lights
        );

        Ok(probed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_mapping() {
        assert_eq!(WgpuGpuProbe::tier_for(wgpu::DeviceType::DiscreteGpu), GpuTier::High);
        assert_eq!(WgpuGpuProbe::tier_for(wgpu::DeviceType::IntegratedGpu), GpuTier::Medium);
        assert_eq!(WgpuGpuProbe::tier_for(wgpu::DeviceType::Cpu), GpuTier::Low);
        assert_eq!(WgpuGpuProbe::tier_for(wgpu::DeviceType::Other), GpuTier::Unknown);
    }

    #[test]
    fn test_light_count_from_uniform_limit() {
        assert_eq!(WgpuGpuProbe::lights_for(16_384), 64);
        assert_eq!(WgpuGpuProbe::lights_for(512), 8);
        assert_eq!(WgpuGpuProbe::lights_for(0), 1);
    }

    #[test]
    fn test_probe_succeeds_or_reports_unavailable() {
        // Headless CI usually has no adapter.
        match WgpuGpuProbe::new().probe() {
            Ok(limits) => assert!(limits.max_texture_size > 0),
            Err(err) => assert!(matches!(err, QualityError::ProbeUnavailable(_))),
        }
    }
}
