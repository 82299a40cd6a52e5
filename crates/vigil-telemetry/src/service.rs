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

//! Service for the coarse, non frame-locked telemetry timer.

use crate::monitoring::registry::MonitorRegistry;

/// Drives resource monitors on a fixed interval.
///
/// The service is polled by its host. `tick` reports whether the interval has
/// elapsed, in which case all monitors have just been refreshed and the caller
/// should run its low-frequency work.
#[derive(Debug)]
pub struct TelemetryService {
    monitors: MonitorRegistry,
    last_update_ms: Option<f64>,
    update_interval_ms: f64,
}

impl TelemetryService {
    /// Creates a new telemetry service with the given update interval.
    pub fn new(update_interval_ms: f64) -> Self {
        Self {
            monitors: MonitorRegistry::new(),
            last_update_ms: None,
            update_interval_ms,
        }
    }

    /// Returns `true` if the interval has elapsed at `now_ms`.
    pub fn is_due(&self, now_ms: f64) -> bool {
        match self.last_update_ms {
            None => true,
            Some(last) => now_ms - last >= self.update_interval_ms,
        }
    }

    /// Updates all registered resource monitors if the interval has passed.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        if self.is_due(now_ms) {
            self.force_update(now_ms);
            true
        } else {
            false
        }
    }

    /// Updates all monitors immediately and restarts the interval.
    pub fn force_update(&mut self, now_ms: f64) {
        log::trace!("Updating all resource monitors...");
        self.monitors.update_all();
        self.last_update_ms = Some(now_ms);
    }

    /// The configured interval in milliseconds.
    pub fn update_interval_ms(&self) -> f64 {
        self.update_interval_ms
    }

    /// Returns a reference to the monitor registry.
    pub fn monitor_registry(&self) -> &MonitorRegistry {
        &self.monitors
    }
}

impl Default for TelemetryService {
    fn default() -> Self {
        Self::new(5_000.0)
    }
}
