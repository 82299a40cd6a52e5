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

//! Tunable configuration for the quality engine.
//!
//! Every field has a default; a partial JSON document only needs to name
//! the values it overrides.

use serde::{Deserialize, Serialize};
use vigil_core::{QualityError, QualityResult};

/// Hysteresis and smoothing parameters of the quality controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// EMA smoothing factor in `(0, 1]`. `1.0` tracks the instant FPS.
    pub ema_alpha: f64,
    /// A sample breaches low when `ema_fps < target_fps * downgrade_ratio`.
    pub downgrade_ratio: f64,
    /// A sample breaches high when `ema_fps > target_fps * upgrade_ratio`.
    pub upgrade_ratio: f64,
    /// Consecutive low breaches required before stepping down.
    pub k_down: u32,
    /// Consecutive high breaches required before stepping up. Must exceed `k_down`.
    pub k_up: u32,
    /// Minimum time between two performance-driven transitions.
    pub dwell_time_ms: f64,
    /// Battery level under which (while discharging) the clamp engages.
    pub battery_low_threshold: f32,
    /// Battery level at or above which the clamp releases.
    pub battery_recover_threshold: f32,
    /// Replaces the capability-derived target frame rate.
    pub target_fps_override: Option<f64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.1,
            downgrade_ratio: 0.8,
            upgrade_ratio: 1.1,
            k_down: 10,
            k_up: 20,
            dwell_time_ms: 5_000.0,
            battery_low_threshold: 0.2,
            battery_recover_threshold: 0.5,
            target_fps_override: None,
        }
    }
}

/// Memory guard parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryGuardConfig {
    /// Fraction of device memory granted to tracked resources.
    pub budget_fraction: f64,
    /// Fixed budget in megabytes, replacing the device-derived one.
    pub budget_override_mb: Option<u64>,
}

impl Default for MemoryGuardConfig {
    fn default() -> Self {
        Self {
            budget_fraction: 0.7,
            budget_override_mb: None,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Controller hysteresis parameters.
    pub controller: ControllerConfig,
    /// Memory guard parameters.
    pub memory: MemoryGuardConfig,
    /// Interval of the low-frequency timer (memory sample + guard tick).
    pub memory_sample_interval_ms: f64,
    /// Capacity of the quality event channel. Events are dropped when full.
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            memory: MemoryGuardConfig::default(),
            memory_sample_interval_ms: 5_000.0,
            event_buffer_size: 64,
        }
    }
}

impl EngineConfig {
    /// Checks every value against its valid range.
    pub fn validate(&self) -> QualityResult<()> {
        let c = &self.controller;
        if !(c.ema_alpha > 0.0 && c.ema_alpha <= 1.0) {
            return Err(invalid(format!("ema_alpha must be in (0, 1], got {}", c.ema_alpha)));
        }
        if !(c.downgrade_ratio > 0.0 && c.downgrade_ratio < c.upgrade_ratio) {
            return Err(invalid(format!(
                "downgrade_ratio ({}) must be positive and below upgrade_ratio ({})",
                c.downgrade_ratio, c.upgrade_ratio
            )));
        }
        if c.k_down == 0 || c.k_up <= c.k_down {
            return Err(invalid(format!(
                "k_up ({}) must exceed k_down ({}) and k_down must be non-zero",
                c.k_up, c.k_down
            )));
        }
        if !(c.dwell_time_ms >= 0.0) {
            return Err(invalid("dwell_time_ms must be non-negative".to_string()));
        }
        if !(c.battery_low_threshold < c.battery_recover_threshold) {
            return Err(invalid(format!(
                "battery_low_threshold ({}) must be below battery_recover_threshold ({})",
                c.battery_low_threshold, c.battery_recover_threshold
            )));
        }
        if let Some(fps) = c.target_fps_override {
            if !(fps > 0.0) {
                return Err(invalid(format!("target_fps_override must be positive, got {fps}")));
            }
        }
        if !(self.memory.budget_fraction > 0.0 && self.memory.budget_fraction <= 1.0) {
            return Err(invalid(format!(
                "memory.budget_fraction must be in (0, 1], got {}",
                self.memory.budget_fraction
            )));
        }
        if !(self.memory_sample_interval_ms > 0.0) {
            return Err(invalid("memory_sample_interval_ms must be positive".to_string()));
        }
        if self.event_buffer_size == 0 {
            return Err(invalid("event_buffer_size must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> QualityError {
    QualityError::InvalidConfig(message)
}
