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

//! Device capability description, created once at startup.

use crate::quality::QualityLevel;
use serde::{Deserialize, Serialize};

/// Frame rate the controller aims for on mobile devices.
pub const MOBILE_TARGET_FPS: f64 = 30.0;
/// Frame rate the controller aims for on every other device.
pub const DESKTOP_TARGET_FPS: f64 = 60.0;

/// A coarse classification of the GPU's capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum GpuTier {
    /// Software, virtual, or otherwise unknown GPU.
    #[default]
    Unknown,
    /// Weak GPU (software rasterizer, low-end mobile).
    Low,
    /// Integrated GPU.
    Medium,
    /// Discrete GPU.
    High,
}

/// Immutable description of the host device.
///
/// Built exactly once by the capability probe and owned by the engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    /// Number of logical cores available to the process.
    pub cores: u32,
    /// Approximate device memory in megabytes.
    pub memory_mb: u64,
    /// Coarse GPU classification.
    pub gpu_tier: GpuTier,
    /// `true` on phones and tablets.
    pub mobile: bool,
    /// Ratio between physical and logical pixels of the primary display.
    pub device_pixel_ratio: f32,
    /// Largest supported 2D texture dimension, in texels.
    pub max_texture_size: u32,
    /// Largest number of simultaneous dynamic lights the GPU path supports.
    pub max_lights: u32,
}

impl Default for CapabilityProfile {
    /// The conservative profile substituted when probing fails.
    fn default() -> Self {
        Self {
            cores: 4,
            memory_mb: 4096,
            gpu_tier: GpuTier::Unknown,
            mobile: false,
            device_pixel_ratio: 1.0,
            max_texture_size: 2048,
            max_lights: 8,
        }
    }
}

impl CapabilityProfile {
    /// The level the controller starts at for this device.
    ///
    /// | Condition | Level |
    /// |---|---|
    /// | mobile, or fewer than 4 cores, or less than 4096 MB | Low |
    /// | at least 8 cores and at least 8192 MB | High |
    /// | otherwise | Medium |
    pub fn initial_level(&self) -> QualityLevel {
        if self.mobile || self.cores < 4 || self.memory_mb < 4096 {
            QualityLevel::Low
        } else if self.cores >= 8 && self.memory_mb >= 8192 {
            QualityLevel::High
        } else {
            QualityLevel::Medium
        }
    }

    /// Target frame rate, fixed for the lifetime of the engine.
    pub fn target_fps(&self) -> f64 {
        if self.mobile {
            MOBILE_TARGET_FPS
        } else {
            DESKTOP_TARGET_FPS
        }
    }

    /// Memory budget in bytes, keeping `1 - fraction` of device memory as headroom.
    pub fn memory_budget_bytes(&self, fraction: f64) -> u64 {
        (self.memory_mb as f64 * fraction * 1024.0 * 1024.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weak_mobile_device_starts_low_at_30fps() {
        let profile = CapabilityProfile {
            cores: 2,
            memory_mb: 2048,
            mobile: true,
            ..Default::default()
        };
        assert_eq!(profile.initial_level(), QualityLevel::Low);
        assert_eq!(profile.target_fps(), 30.0);
    }

    #[test]
    fn test_default_profile_starts_medium_at_60fps() {
        let profile = CapabilityProfile::default();
        assert_eq!(profile.initial_level(), QualityLevel::Medium);
        assert_eq!(profile.target_fps(), 60.0);
    }

    #[test]
    fn test_strong_desktop_starts_high() {
        let profile = CapabilityProfile {
            cores: 8,
            memory_mb: 16384,
            ..Default::default()
        };
        assert_eq!(profile.initial_level(), QualityLevel::High);
    }

    #[test]
    fn test_low_memory_desktop_starts_low() {
        let profile = CapabilityProfile {
            cores: 16,
            memory_mb: 3072,
            ..Default::default()
        };
        assert_eq!(profile.initial_level(), QualityLevel::Low);
    }

    #[test]
    fn test_memory_budget_reserves_headroom() {
        let profile = CapabilityProfile {
            memory_mb: 1000,
            ..Default::default()
        };
        assert_eq!(profile.memory_budget_bytes(0.7), 700 * 1024 * 1024);
    }
}
