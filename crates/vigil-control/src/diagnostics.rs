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

//! Read-only state published for presentation and telemetry layers.

use std::sync::{Arc, RwLock};
use vigil_core::QualityLevel;

/// The engine's observable state after the latest evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// Smoothed frame rate.
    pub ema_fps: f64,
    /// The frame rate the controller aims for.
    pub target_fps: f64,
    /// Duration of the newest frame, if any frame was sampled.
    pub last_frame_time_ms: Option<f64>,
    /// Latest measured process memory, if the platform can measure it.
    pub memory_used_mb: Option<f64>,
    /// Sum of the registered resource estimates.
    pub memory_estimate_mb: f64,
    /// The memory guard budget.
    pub memory_budget_mb: f64,
    /// Active level.
    pub current_level: QualityLevel,
    /// `true` while the low-battery clamp is engaged.
    pub battery_cap_active: bool,
    /// Usage stayed over budget after the last eviction pass.
    pub budget_violation: bool,
    /// Eviction is disabled because memory cannot be measured.
    pub advisory_memory_mode: bool,
    /// Level pinned by the presentation layer.
    pub user_override: Option<QualityLevel>,
}

impl MetricsSnapshot {
    /// A snapshot for an engine that has not sampled anything yet.
    pub fn initial(level: QualityLevel, target_fps: f64) -> Self {
        Self {
            ema_fps: target_fps,
            target_fps,
            last_frame_time_ms: None,
            memory_used_mb: None,
            memory_estimate_mb: 0.0,
            memory_budget_mb: 0.0,
            current_level: level,
            battery_cap_active: false,
            budget_violation: false,
            advisory_memory_mode: false,
            user_override: None,
        }
    }
}

/// Shared, cloneable reader of the latest [`MetricsSnapshot`].
///
/// The engine is the only writer and replaces the whole snapshot at once, so
/// readers on other threads always see a consistent value.
#[derive(Debug, Clone)]
pub struct DiagnosticsHandle {
    inner: Arc<RwLock<MetricsSnapshot>>,
}

impl DiagnosticsHandle {
    pub(crate) fn new(initial: MetricsSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub(crate) fn publish(&self, snapshot: MetricsSnapshot) {
        match self.inner.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Returns a copy of the latest snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_published_snapshot_is_visible_to_clones() {
        let handle = DiagnosticsHandle::new(MetricsSnapshot::initial(QualityLevel::Medium, 60.0));
        let reader = handle.clone();

        let mut next = reader.snapshot();
        next.current_level = QualityLevel::Low;
        next.battery_cap_active = true;
        handle.publish(next.clone());

        assert_eq!(reader.snapshot(), next);
    }

    #[test]
    fn test_snapshot_readable_from_other_thread() {
        let handle = DiagnosticsHandle::new(MetricsSnapshot::initial(QualityLevel::High, 60.0));
        let reader = handle.clone();
        let level = std::thread::spawn(move || reader.snapshot().current_level)
            .join()
            .unwrap();
        assert_eq!(level, QualityLevel::High);
    }
}
