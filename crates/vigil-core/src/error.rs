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

//! Error taxonomy for the quality control engine.
//!
//! None of these conditions is fatal to the host. They are produced at API
//! boundaries (conversions, configuration validation, probes) and are otherwise
//! recovered locally and logged.

use thiserror::Error;

/// A specialized `Result` type for quality-control operations.
pub type QualityResult<T> = Result<T, QualityError>;

/// An error that can occur within the quality control engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QualityError {
    /// A capability or battery API is missing on this platform.
    #[error("Probe unavailable: {0}")]
    ProbeUnavailable(String),

    /// No frame-time or memory sample could be produced for this tick.
    #[error("Metric unavailable: {0}")]
    MetricUnavailable(String),

    /// Memory usage is still over budget after every evictable handle was disposed.
    #[error("Memory budget exceeded: {usage_bytes} bytes in use, budget is {budget_bytes} bytes")]
    BudgetViolationPersistent {
        /// Estimated bytes still registered.
        usage_bytes: u64,
        /// The active memory budget in bytes.
        budget_bytes: u64,
    },

    /// A caller asked for a quality level outside the valid range.
    #[error("Invalid quality level request: {requested} (valid range is 0..={max})")]
    InvalidTransitionRequest {
        /// The raw level that was requested.
        requested: i32,
        /// The highest valid raw level.
        max: i32,
    },

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
