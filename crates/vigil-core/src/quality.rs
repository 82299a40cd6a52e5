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

//! Quality levels, their static presets, and the derived resource budget.

use crate::capability::CapabilityProfile;
use crate::error::QualityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Frame rate cap imposed while the battery saver clamp is active.
pub const BATTERY_SAVER_FPS_CAP: u32 = 30;

/// Smallest texture dimension a budget will ever hand out.
const MIN_TEXTURE_SIZE: u32 = 256;

/// Discrete rendering quality level. Totally ordered: `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum QualityLevel {
    /// Minimum budgets.
    Low,
    /// Balanced budgets.
    #[default]
    Medium,
    /// Maximum budgets.
    High,
}

impl QualityLevel {
    /// All levels in ascending order.
    pub const ALL: [QualityLevel; 3] = [QualityLevel::Low, QualityLevel::Medium, QualityLevel::High];

    /// Returns the level's position in the total order (`Low` = 0).
    pub fn index(self) -> i32 {
        match self {
            QualityLevel::Low => 0,
            QualityLevel::Medium => 1,
            QualityLevel::High => 2,
        }
    }

    /// The next level down, or `None` at `Low`.
    pub fn step_down(self) -> Option<QualityLevel> {
        match self {
            QualityLevel::Low => None,
            QualityLevel::Medium => Some(QualityLevel::Low),
            QualityLevel::High => Some(QualityLevel::Medium),
        }
    }

    /// The next level up, or `None` at `High`.
    pub fn step_up(self) -> Option<QualityLevel> {
        match self {
            QualityLevel::Low => Some(QualityLevel::Medium),
            QualityLevel::Medium => Some(QualityLevel::High),
            QualityLevel::High => None,
        }
    }

    /// Converts a raw level, clamping out-of-range requests to the nearest valid level.
    ///
    /// Out-of-range values are logged, never rejected with an error.
    pub fn from_raw_clamped(raw: i32) -> QualityLevel {
        match QualityLevel::try_from(raw) {
            Ok(level) => level,
            Err(err) => {
                let clamped = if raw < 0 {
                    QualityLevel::Low
                } else {
                    QualityLevel::High
                };
                log::warn!("{err}; clamped to {clamped}");
                clamped
            }
        }
    }

    /// Returns the static preset for this level.
    pub fn preset(self) -> &'static QualityPreset {
        &PRESETS[self.index() as usize]
    }
}

impl TryFrom<i32> for QualityLevel {
    type Error = QualityError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(QualityLevel::Low),
            1 => Ok(QualityLevel::Medium),
            2 => Ok(QualityLevel::High),
            _ => Err(QualityError::InvalidTransitionRequest {
                requested: raw,
                max: QualityLevel::High.index(),
            }),
        }
    }
}

impl FromStr for QualityLevel {
    type Err = QualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityLevel::Low),
            "medium" => Ok(QualityLevel::Medium),
            "high" => Ok(QualityLevel::High),
            other => Err(QualityError::InvalidConfig(format!(
                "unknown quality level '{other}'"
            ))),
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Shadow rendering quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShadowQuality {
    /// Shadows disabled.
    None,
    /// Low resolution shadow maps.
    Low,
    /// Full resolution shadow maps.
    High,
}

/// A named bundle of resource limits applied atomically for one level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityPreset {
    /// Upper bound on live particles.
    pub max_particles: u32,
    /// Shadow map quality.
    pub shadow_quality: ShadowQuality,
    /// Texture resolution multiplier in `(0, 1]`.
    pub texture_scale: f32,
    /// Distance at which objects reach their coarsest LOD.
    pub lod_distance: f32,
    /// Upper bound on simultaneous dynamic lights.
    pub max_lights: u32,
}

/// Static preset table, indexed by [`QualityLevel::index`].
///
/// Every field is non-decreasing from `Low` to `High`.
pub const PRESETS: [QualityPreset; 3] = [
    QualityPreset {
        max_particles: 500,
        shadow_quality: ShadowQuality::None,
        texture_scale: 0.5,
        lod_distance: 50.0,
        max_lights: 2,
    },
    QualityPreset {
        max_particles: 2_000,
        shadow_quality: ShadowQuality::Low,
        texture_scale: 0.75,
        lod_distance: 100.0,
        max_lights: 4,
    },
    QualityPreset {
        max_particles: 5_000,
        shadow_quality: ShadowQuality::High,
        texture_scale: 1.0,
        lod_distance: 200.0,
        max_lights: 8,
    },
];

/// One distance band of the LOD table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodBand {
    /// Distance at which this band starts applying.
    pub distance: f32,
    /// Detail multiplier for objects in this band.
    pub scale: f32,
}

impl QualityPreset {
    /// Builds the LOD band table for this preset, sorted ascending by distance.
    pub fn lod_bands(&self) -> Vec<LodBand> {
        let far = self.lod_distance;
        vec![
            LodBand {
                distance: far * 0.25,
                scale: 1.0,
            },
            LodBand {
                distance: far * 0.5,
                scale: 0.5,
            },
            LodBand {
                distance: far,
                scale: 0.25,
            },
        ]
    }
}

/// Selects the LOD band for an object at `distance`.
///
/// `bands` must be sorted ascending by distance. Returns the band with the
/// largest `distance <= distance`, or the first band when the object is closer
/// than every band. Returns `None` only for an empty table.
pub fn select_lod_band(bands: &[LodBand], distance: f32) -> Option<(usize, &LodBand)> {
    if bands.is_empty() {
        return None;
    }
    // Number of bands whose start distance is <= `distance`.
    let qualifying = bands.partition_point(|band| band.distance <= distance);
    let index = qualifying.saturating_sub(1);
    Some((index, &bands[index]))
}

/// The enforced resource limits for the active level and battery state.
///
/// A stateless snapshot; two budgets derived from the same inputs compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// The level this budget was derived from.
    pub level: QualityLevel,
    /// Upper bound on live particles.
    pub max_particles: u32,
    /// Shadow map quality.
    pub shadow_quality: ShadowQuality,
    /// Texture resolution multiplier in `(0, 1]`.
    pub texture_scale: f32,
    /// Largest texture dimension to upload, after applying `texture_scale`.
    pub max_texture_size: u32,
    /// Distance at which objects reach their coarsest LOD.
    pub lod_distance: f32,
    /// LOD band table, sorted ascending by distance.
    pub lod_bands: Vec<LodBand>,
    /// Upper bound on simultaneous dynamic lights.
    pub max_lights: u32,
    /// `true` while the low-battery clamp is active.
    pub battery_saver: bool,
    /// Frame rate the host should cap presentation at, if any.
    pub frame_rate_cap: Option<u32>,
}

impl ResourceBudget {
    /// Derives the budget for `level` on the given device.
    pub fn derive(
        level: QualityLevel,
        profile: &CapabilityProfile,
        battery_cap_active: bool,
    ) -> ResourceBudget {
        let preset = level.preset();

        let scaled = (profile.max_texture_size as f32 * preset.texture_scale) as u32;
        let max_texture_size = floor_power_of_two(scaled)
            .max(MIN_TEXTURE_SIZE)
            .min(profile.max_texture_size.max(MIN_TEXTURE_SIZE));

        let mut budget = ResourceBudget {
            level,
            max_particles: preset.max_particles,
            shadow_quality: preset.shadow_quality,
            texture_scale: preset.texture_scale,
            max_texture_size,
            lod_distance: preset.lod_distance,
            lod_bands: preset.lod_bands(),
            max_lights: preset.max_lights.min(profile.max_lights),
            battery_saver: false,
            frame_rate_cap: None,
        };

        if battery_cap_active {
            budget.battery_saver = true;
            budget.shadow_quality = ShadowQuality::None;
            budget.frame_rate_cap = Some(BATTERY_SAVER_FPS_CAP);
        }

        budget
    }
}

fn floor_power_of_two(value: u32) -> u32 {
    if value == 0 {
        0
    } else {
        1 << (31 - value.leading_zeros())
    }
}
