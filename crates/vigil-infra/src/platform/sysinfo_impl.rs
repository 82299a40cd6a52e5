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

//! sysinfo-based implementation of the CapabilitySource trait.

use std::sync::Mutex;
use sysinfo::System;
use vigil_core::platform::{CapabilitySource, GpuLimits, GpuProbe};
use vigil_core::{QualityError, QualityResult};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// A capability source that uses the `sysinfo` crate.
///
/// GPU limits come from an optional [`GpuProbe`]; without one the GPU query
/// reports [`QualityError::ProbeUnavailable`].
pub struct SysinfoCapabilitySource {
    system: Mutex<System>,
    gpu_probe: Option<Box<dyn GpuProbe>>,
}

impl SysinfoCapabilitySource {
    /// Creates a new source, refreshing CPU and memory information once.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
            gpu_probe: None,
        }
    }

    /// Attaches a GPU probe.
    pub fn with_gpu_probe(mut self, probe: impl GpuProbe + 'static) -> Self {
        self.gpu_probe = Some(Box::new(probe));
        self
    }
}

impl CapabilitySource for SysinfoCapabilitySource {
    fn hardware_concurrency(&self) -> Option<u32> {
        let system = self.system.lock().ok()?;
        let cores = system.cpus().len() as u32;
        (cores > 0).then_some(cores)
    }

    fn device_memory_mb(&self) -> Option<u64> {
        let system = self.system.lock().ok()?;
        let total_mb = system.total_memory() / BYTES_PER_MB;
        (total_mb > 0).then_some(total_mb)
    }

    fn is_mobile(&self) -> Option<bool> {
        Some(cfg!(any(target_os = "android", target_os = "ios")))
    }

    fn probe_gpu(&self) -> QualityResult<GpuLimits> {
        match &self.gpu_probe {
            Some(probe) => probe.probe(),
            None => Err(QualityError::ProbeUnavailable(
                "no GPU probe attached".to_string(),
            )),
        }
    }
}

impl Default for SysinfoCapabilitySource {
    fn default() -> Self {
        Self::new()
    }
}
