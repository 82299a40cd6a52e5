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

//! # Vigil Control
//!
//! The adaptive quality control engine.
//!
//! A host render loop feeds frame deltas into a [`QualityEngine`]. The engine
//! smooths them into an EMA frame rate, drives the hysteretic
//! [`QualityController`], pushes the resulting [`vigil_core::ResourceBudget`]
//! to the scene, and on a coarse timer samples memory and lets the
//! [`MemoryGuard`] evict resources when the ledger exceeds its budget.

#![warn(missing_docs)]

pub mod analysis;
pub mod applier;
pub mod battery;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod engine;
pub mod memory_guard;
pub mod metrics;
pub mod probe;
pub mod sampler;

pub use applier::ResourceBudgetApplier;
pub use battery::BatteryMonitor;
pub use config::{ControllerConfig, EngineConfig, MemoryGuardConfig};
pub use controller::{ControllerState, QualityController, Transition, TransitionCause};
pub use diagnostics::{DiagnosticsHandle, MetricsSnapshot};
pub use engine::{QualityEngine, QualityEngineBuilder, QualityEvent};
pub use memory_guard::{EvictionReport, MemoryGuard, MemoryStats};
pub use probe::CapabilityProbe;
pub use sampler::{MetricSample, MetricsSampler};
