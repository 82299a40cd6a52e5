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

//! Advisory recommendations for the presentation layer.
//!
//! The `HeuristicEngine` reads the published snapshot and the frame time and
//! memory histories and produces human-readable advice. Its output is informational
//! only and never feeds back into the controller.

use crate::diagnostics::MetricsSnapshot;
use crate::metrics::SeriesStats;
use vigil_core::QualityLevel;

/// Frame time variance (ms²) above which frames are considered to stutter.
const FRAME_TIME_VARIANCE_THRESHOLD: f32 = 16.0;
/// Rise of the mean frame time (ms) between the two halves of the history.
const FRAME_TIME_TREND_THRESHOLD: f32 = 2.0;
/// Minimum samples before the history statistics are trusted.
const MIN_HISTORY_SAMPLES: usize = 10;
/// Fraction of the budget above which memory usage is reported as high.
const MEMORY_HIGH_RATIO: f64 = 0.9;
/// Growth of the mean measured memory (MB) between the two halves of the history.
const MEMORY_GROWTH_THRESHOLD_MB: f32 = 64.0;
/// Memory is sampled on the slow timer, so fewer samples are required.
const MIN_MEMORY_SAMPLES: usize = 4;

/// Rolling statistics handed to the [`HeuristicEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoryStats {
    /// Frame time series, in milliseconds.
    pub frame_times: Option<SeriesStats>,
    /// Measured memory series, in megabytes.
    pub memory_used: Option<SeriesStats>,
}

/// Derives recommendations from snapshot thresholds.
pub struct HeuristicEngine;

impl HeuristicEngine {
    /// Analyzes the snapshot and the metric histories.
    pub fn analyze(&self, snapshot: &MetricsSnapshot, history: &HistoryStats) -> Vec<String> {
        let mut alerts = Vec::new();

        // ── Frame rate ──────────────────────────────────────────────────
        if snapshot.ema_fps < snapshot.target_fps {
            alerts.push(format!(
                "Frame rate below target ({:.1} of {:.0} FPS).",
                snapshot.ema_fps, snapshot.target_fps
            ));
            if snapshot.current_level == QualityLevel::Low && !snapshot.battery_cap_active {
                alerts.push(
                    "Already at the lowest quality level; performance is degraded on this device."
                        .into(),
                );
            }
        }

        // ── History ─────────────────────────────────────────────────────
        if let Some(stats) = history
            .frame_times
            .filter(|s| s.count >= MIN_HISTORY_SAMPLES)
        {
            if stats.variance > FRAME_TIME_VARIANCE_THRESHOLD {
                alerts.push(format!(
                    "Frame times are unstable (variance {:.1} ms²), expect stutter.",
                    stats.variance
                ));
            }
            if stats.trend > FRAME_TIME_TREND_THRESHOLD {
                alerts.push(format!(
                    "Frame times are rising (+{:.1} ms over the recent history).",
                    stats.trend
                ));
            }
        }

        // ── Memory ──────────────────────────────────────────────────────
        if snapshot.budget_violation {
            alerts.push(format!(
                "Memory budget exceeded ({:.0} of {:.0} MB) and only pinned resources remain.",
                snapshot.memory_estimate_mb, snapshot.memory_budget_mb
            ));
        } else if snapshot.memory_budget_mb > 0.0
            && snapshot.memory_estimate_mb > snapshot.memory_budget_mb * MEMORY_HIGH_RATIO
        {
            alerts.push(format!(
                "Memory usage high ({:.0} of {:.0} MB).",
                snapshot.memory_estimate_mb, snapshot.memory_budget_mb
            ));
        }
        if snapshot.advisory_memory_mode && snapshot.memory_estimate_mb > snapshot.memory_budget_mb {
            alerts.push(
                "Memory estimate over budget; eviction is disabled because usage cannot be measured."
                    .into(),
            );
        }
        if let Some(stats) = history
            .memory_used
            .filter(|s| s.count >= MIN_MEMORY_SAMPLES)
        {
            if stats.trend > MEMORY_GROWTH_THRESHOLD_MB {
                alerts.push(format!(
                    "Process memory is growing (+{:.0} MB over the recent samples, peak {:.0} MB).",
                    stats.trend, stats.max
                ));
            }
        }

        // ── Power and overrides ─────────────────────────────────────────
        if snapshot.battery_cap_active {
            alerts.push("Battery low: quality capped at Low until charging.".into());
        }
        if let Some(level) = snapshot.user_override {
            alerts.push(format!("Quality pinned at {level} by user override."));
        }

        alerts
    }
}
