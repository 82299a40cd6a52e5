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

//! Registry for managing resource monitors.

use vigil_core::telemetry::{MonitoredResourceType, ResourceMonitor, ResourceUsageReport};
use std::sync::{Arc, Mutex};

/// A thread-safe registry for resource monitors.
#[derive(Debug, Clone, Default)]
pub struct MonitorRegistry {
    monitors: Arc<Mutex<Vec<Arc<dyn ResourceMonitor>>>>,
}

impl MonitorRegistry {
    /// Creates a new, empty monitor registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new resource monitor.
    pub fn register(&self, monitor: Arc<dyn ResourceMonitor>) {
        let monitor_id = monitor.monitor_id().to_string();
        if let Ok(mut monitors) = self.monitors.lock() {
            monitors.push(monitor);
            log::info!("Registered resource monitor: {}", monitor_id);
        }
    }

    /// Calls the `update` method on all registered monitors.
    pub fn update_all(&self) {
        if let Ok(monitors) = self.monitors.lock() {
            for monitor in monitors.iter() {
                monitor.update();
            }
        }
    }

    /// Returns `true` if at least one monitor of `resource_type` is registered.
    pub fn has_monitor(&self, resource_type: MonitoredResourceType) -> bool {
        self.monitors
            .lock()
            .map(|m| m.iter().any(|mon| mon.resource_type() == resource_type))
            .unwrap_or(false)
    }

    /// Returns the first available usage report for `resource_type`.
    pub fn usage(&self, resource_type: MonitoredResourceType) -> Option<ResourceUsageReport> {
        let monitors = self.monitors.lock().ok()?;
        monitors
            .iter()
            .filter(|m| m.resource_type() == resource_type)
            .find_map(|m| m.get_usage_report())
    }
}
