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

//! Per-frame and periodic metric sampling.

use crate::metrics::{MetricStore, RingBuffer, SeriesStats, HISTORY_LEN};
use vigil_core::telemetry::{MetricId, MonitoredResourceType};
use vigil_telemetry::MonitorRegistry;

/// One frame's measurements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricSample {
    /// Time at which the frame completed.
    pub timestamp_ms: f64,
    /// `1000 / frame_time_ms`.
    pub instant_fps: f64,
    /// Duration of the frame.
    pub frame_time_ms: f64,
    /// Most recent memory measurement, if memory can be measured.
    pub memory_used_mb: Option<f64>,
}

/// Converts raw frame deltas into samples and maintains the smoothed FPS.
///
/// Runs synchronously inside the render loop tick; never blocks.
#[derive(Debug)]
pub struct MetricsSampler {
    alpha: f64,
    target_fps: f64,
    ema_fps: Option<f64>,
    history: RingBuffer<MetricSample, HISTORY_LEN>,
    store: MetricStore,
    monitors: MonitorRegistry,
    last_memory_mb: Option<f64>,
}

impl MetricsSampler {
    /// Creates a sampler whose EMA starts at `target_fps`.
    pub fn new(alpha: f64, target_fps: f64, monitors: MonitorRegistry) -> Self {
        Self {
            alpha,
            target_fps,
            ema_fps: None,
            history: RingBuffer::new(),
            store: MetricStore::new(),
            monitors,
            last_memory_mb: None,
        }
    }

    /// Records one frame.
    ///
    /// Returns `None` for a missing or nonsensical delta (non-finite or not
    /// positive); the caller skips evaluation for that frame.
    pub fn on_frame(&mut self, delta_time_ms: f64, timestamp_ms: f64) -> Option<MetricSample> {
        if !delta_time_ms.is_finite() || delta_time_ms <= 0.0 {
            log::trace!("MetricsSampler: Ignoring frame delta {delta_time_ms}.");
            return None;
        }

        let instant_fps = 1000.0 / delta_time_ms;
        // Seeded at the target so a cold start does not read as a slowdown.
        let previous = self.ema_fps.unwrap_or(self.target_fps);
        let ema = previous * (1.0 - self.alpha) + instant_fps * self.alpha;
        self.ema_fps = Some(ema);

        let sample = MetricSample {
            timestamp_ms,
            instant_fps,
            frame_time_ms: delta_time_ms,
            memory_used_mb: self.last_memory_mb,
        };

        self.history.push(sample);
        self.store.push(MetricId::frame_time(), delta_time_ms as f32);

        Some(sample)
    }

    /// Measures process memory through the registered monitors.
    ///
    /// Meant for the low-frequency timer. Returns `None` when no memory monitor
    /// is registered or the platform cannot report usage.
    pub fn sample_memory(&mut self) -> Option<f64> {
        let Some(report) = self.monitors.usage(MonitoredResourceType::SystemRam) else {
            log::trace!("MetricsSampler: Memory measurement unavailable.");
            self.last_memory_mb = None;
            return None;
        };
        let used_mb = report.current_mb();
        self.last_memory_mb = Some(used_mb);
        self.store.push(MetricId::memory_used(), used_mb as f32);
        log::debug!("MetricsSampler: Memory in use {:.1} MB.", used_mb);
        Some(used_mb)
    }

    /// Returns `true` if memory can be measured on this host.
    pub fn memory_supported(&self) -> bool {
        self.monitors.has_monitor(MonitoredResourceType::SystemRam)
    }

    /// Current smoothed FPS, or `None` before the first sample.
    pub fn ema_fps(&self) -> Option<f64> {
        self.ema_fps
    }

    /// The frame rate the EMA was seeded with.
    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// The newest sample.
    pub fn last_sample(&self) -> Option<MetricSample> {
        self.history.latest()
    }

    /// The most recent memory measurement.
    pub fn last_memory_mb(&self) -> Option<f64> {
        self.last_memory_mb
    }

    /// The retained samples, oldest first.
    pub fn recent_samples(&self) -> Vec<MetricSample> {
        self.history.iter().copied().collect()
    }

    /// Rolling statistics of the frame time series.
    pub fn frame_time_stats(&self) -> Option<SeriesStats> {
        self.store.stats(&MetricId::frame_time())
    }

    /// Rolling statistics of the measured memory series.
    pub fn memory_stats(&self) -> Option<SeriesStats> {
        self.store.stats(&MetricId::memory_used())
    }
}
