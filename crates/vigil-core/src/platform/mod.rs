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

//! Provides abstractions over platform-specific capabilities.
//!
//! Every capability here is optional. Implementations live in `vigil-infra`;
//! the engine always has a deterministic fallback when one is missing.

use crate::capability::GpuTier;
use crate::error::{QualityError, QualityResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Power state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    /// Charge level in `[0, 1]`.
    pub level: f32,
    /// `true` when connected to external power.
    pub charging: bool,
}

impl BatteryStatus {
    /// Creates a status, clamping `level` into `[0, 1]`.
    pub fn new(level: f32, charging: bool) -> Self {
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self { level, charging }
    }
}

const PRESENT_BIT: u64 = 1 << 63;
const CHARGING_BIT: u64 = 1 << 32;
const LEVEL_MASK: u64 = 0xFFFF_FFFF;

/// Write side of the shared battery cell.
///
/// The level and charging flag are packed into a single atomic word so a reader
/// always observes a consistent pair, whichever thread the platform delivers
/// notifications on.
#[derive(Debug, Clone, Default)]
pub struct BatteryNotifier {
    cell: Arc<AtomicU64>,
}

impl BatteryNotifier {
    /// Creates an empty cell (no status published yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a new power state.
    pub fn publish(&self, status: BatteryStatus) {
        let mut word = PRESENT_BIT | status.level.to_bits() as u64;
        if status.charging {
            word |= CHARGING_BIT;
        }
        self.cell.store(word, Ordering::Release);
    }

    /// Reads the most recently published state, if any.
    pub fn latest(&self) -> Option<BatteryStatus> {
        let word = self.cell.load(Ordering::Acquire);
        if word & PRESENT_BIT == 0 {
            return None;
        }
        Some(BatteryStatus {
            level: f32::from_bits((word & LEVEL_MASK) as u32),
            charging: word & CHARGING_BIT != 0,
        })
    }
}

/// An active battery notification subscription.
pub trait BatterySubscription: Send {
    /// Stops delivery of notifications. Must be idempotent.
    fn unsubscribe(&mut self);
}

/// A platform service that pushes battery notifications.
pub trait BatterySource: Send + Sync {
    /// Starts delivering notifications into `notifier`.
    ///
    /// Returns `None` when the platform exposes no battery information.
    fn subscribe(&self, notifier: BatteryNotifier) -> Option<Box<dyn BatterySubscription>>;
}

/// GPU limits gathered by a throwaway probe context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuLimits {
    /// Largest supported 2D texture dimension.
    pub max_texture_size: u32,
    /// Largest number of simultaneous dynamic lights.
    pub max_lights: u32,
    /// Coarse GPU classification.
    pub tier: GpuTier,
}

/// A one-shot GPU capability probe.
pub trait GpuProbe: Send + Sync {
    /// Queries the GPU limits, failing if no context can be created.
    fn probe(&self) -> QualityResult<GpuLimits>;
}

/// Source of raw device capabilities. Every query is best-effort.
pub trait CapabilitySource: Send + Sync {
    /// Number of logical cores.
    fn hardware_concurrency(&self) -> Option<u32>;
    /// Approximate device memory in megabytes.
    fn device_memory_mb(&self) -> Option<u64>;
    /// Whether the device is a phone or tablet.
    fn is_mobile(&self) -> Option<bool>;
    /// Ratio between physical and logical pixels.
    fn device_pixel_ratio(&self) -> Option<f32> {
        None
    }
    /// Probes the GPU limits.
    fn probe_gpu(&self) -> QualityResult<GpuLimits> {
        Err(QualityError::ProbeUnavailable(
            "no GPU probe configured".to_string(),
        ))
    }
}
