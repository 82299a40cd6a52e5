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

//! # Vigil Infra
//!
//! Concrete implementations of the platform contracts defined in `vigil-core`:
//! device capabilities and process memory through `sysinfo`, battery state
//! through the Linux power-supply class, and GPU limits through a throwaway
//! `wgpu` adapter.

#![warn(missing_docs)]

#[cfg(feature = "gpu-probe")]
pub mod graphics;
pub mod platform;
pub mod telemetry;

#[cfg(feature = "gpu-probe")]
pub use graphics::gpu_probe::WgpuGpuProbe;
pub use platform::battery::SysfsBatterySource;
pub use platform::sysinfo_impl::SysinfoCapabilitySource;
pub use telemetry::memory_monitor::ProcessMemoryMonitor;
