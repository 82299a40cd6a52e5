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

//! Process Memory Resource Monitor
//!
//! Reports the resident set size of the current process, refreshed through
//! `sysinfo` whenever the telemetry service updates its monitors.

use std::borrow::Cow;
use std::sync::Mutex;

use sysinfo::{Pid, ProcessesToUpdate, System};
use vigil_core::telemetry::{MonitoredResourceType, ResourceMonitor, ResourceUsageReport};

/// Process memory resource monitor.
///
/// Reports nothing until the first [`ResourceMonitor::update`], and nothing at
/// all on platforms where the process cannot be inspected.
#[derive(Debug)]
pub struct ProcessMemoryMonitor {
    id: String,
    pid: Option<Pid>,
    system: Mutex<System>,
    last_report: Mutex<Option<ResourceUsageReport>>,
}

impl ProcessMemoryMonitor {
    /// Creates a monitor for the current process.
    pub fn new(id: impl Into<String>) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(err) => {
                log::warn!("ProcessMemoryMonitor: Cannot identify current process: {err}");
                None
            }
        };
        Self {
            id: id.into(),
            pid,
            system: Mutex::new(System::new()),
            last_report: Mutex::new(None),
        }
    }

    fn refresh(&self) -> Option<ResourceUsageReport> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let current = system.process(pid)?.memory();

        let mut last = self.last_report.lock().ok()?;
        let peak = last
            .and_then(|r| r.peak_bytes)
            .map_or(current, |p| p.max(current));
        let report = ResourceUsageReport {
            current_bytes: current,
            peak_bytes: Some(peak),
            total_capacity_bytes: None,
        };
        *last = Some(report);
        Some(report)
    }
}

impl ResourceMonitor for ProcessMemoryMonitor {
    fn monitor_id(&self) -> Cow<'static, str> {
        Cow::Owned(self.id.clone())
    }

    fn resource_type(&self) -> MonitoredResourceType {
        MonitoredResourceType::SystemRam
    }

    fn get_usage_report(&self) -> Option<ResourceUsageReport> {
        self.last_report.lock().ok().and_then(|r| *r)
    }

    fn update(&self) {
        if self.refresh().is_none() {
            log::trace!("ProcessMemoryMonitor: Process memory unavailable.");
        }
    }
}
