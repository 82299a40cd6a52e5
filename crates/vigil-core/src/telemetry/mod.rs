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

//! Provides the foundational traits and data structures for engine telemetry.
//!
//! This module defines the abstract "what" of telemetry, while `vigil-telemetry`
//! provides the service that polls monitors on a coarse timer, and `vigil-infra`
//! provides the concrete implementations for collecting it.

pub mod metrics;
pub mod monitoring;

pub use self::metrics::MetricId;
pub use self::monitoring::{MonitoredResourceType, ResourceMonitor, ResourceUsageReport};
