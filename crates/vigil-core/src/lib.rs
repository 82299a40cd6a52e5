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

//! # Vigil Core
//!
//! Foundational crate containing the types and interface contracts shared by
//! the adaptive quality control engine: device capabilities, quality levels and
//! presets, resource budgets, tracked resource handles, and the traits through
//! which the engine talks to the platform and to the scene it governs.

#![warn(missing_docs)]

pub mod capability;
pub mod error;
pub mod memory;
pub mod platform;
pub mod quality;
pub mod scene;
pub mod telemetry;
pub mod time;

pub use capability::{CapabilityProfile, GpuTier};
pub use error::{QualityError, QualityResult};
pub use quality::{LodBand, QualityLevel, QualityPreset, ResourceBudget, ShadowQuality};
pub use time::{Clock, ManualClock, MonotonicClock};
