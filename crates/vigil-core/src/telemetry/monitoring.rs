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

//! Provides traits and data structures for active resource monitoring.
//!
//! "Monitoring" involves actively polling a system resource (like process
//! memory) to get a snapshot of its state, on a timer that is independent of
//! the per-frame path.

use std::borrow::Cow;
use std::fmt::Debug;

/// The core trait for a resource monitor.
///
/// A `ResourceMonitor` is a stateful object, typically living in `vigil-infra`,
/// that knows how to query a specific system resource. The telemetry service
/// holds a collection of these and periodically calls `update`.
pub trait ResourceMonitor: Send + Sync + Debug + 'static {
    /// Returns a unique, human-readable identifier for this monitor instance.
    fn monitor_id(&self) -> Cow<'static, str>;

    /// Returns the general type of resource being monitored.
    fn resource_type(&self) -> MonitoredResourceType;

    /// Returns a snapshot of the current usage, or `None` if the resource
    /// cannot be measured on this platform.
    fn get_usage_report(&self) -> Option<ResourceUsageReport>;

    /// Triggers the monitor to update its internal state by polling the resource.
    /// This default implementation does nothing, for monitors that update passively.
    fn update(&self) {}
}

/// An enumeration of the types of resources that can be monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitoredResourceType {
    /// Video RAM on a GPU.
    Vram,
    /// Main system RAM.
    SystemRam,
}

/// A generic, unified report of resource usage, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsageReport {
    /// The number of bytes currently in use.
    pub current_bytes: u64,
    /// The peak number of bytes ever in use simultaneously, if tracked.
    pub peak_bytes: Option<u64>,
    /// The total capacity of the resource in bytes, if known.
    pub total_capacity_bytes: Option<u64>,
}

impl ResourceUsageReport {
    /// Returns the current usage in megabytes (MB).
    pub fn current_mb(&self) -> f64 {
        self.current_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Returns the peak usage in megabytes (MB), if tracked.
    pub fn peak_mb(&self) -> Option<f64> {
        self.peak_bytes.map(|b| b as f64 / (1024.0 * 1024.0))
    }
}
