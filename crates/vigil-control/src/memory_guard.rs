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

//! Ledger of GPU-visible resources and budget-driven eviction.
//!
//! Usage is the sum of the registered estimates. When a tick finds usage over
//! budget, evictable handles are disposed oldest-registered first until usage
//! fits or only pinned handles remain. Pinned handles are never disposed
//! automatically.

use vigil_core::memory::{ResourceHandle, ResourceId, BYTES_PER_MB};
use vigil_core::QualityError;

/// Outcome of one [`MemoryGuard::tick`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvictionReport {
    /// Resources disposed during the tick, in eviction order.
    pub evicted: Vec<ResourceId>,
    /// Estimated bytes released.
    pub freed_bytes: u64,
    /// Set when usage is still over budget after eviction.
    pub violation: Option<QualityError>,
}

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MemoryStats {
    /// Registered handles, pinned included.
    pub registered: usize,
    /// Registered pinned handles.
    pub pinned: usize,
    /// Handles evicted since creation.
    pub evicted_total: u64,
    /// Sum of the registered estimates.
    pub usage_bytes: u64,
    /// Active budget.
    pub budget_bytes: u64,
    /// `true` when eviction is disabled because memory cannot be measured.
    pub advisory: bool,
    /// `true` while the last tick left usage over budget.
    pub violation: bool,
}

/// The memory governor.
#[derive(Debug)]
pub struct MemoryGuard {
    /// Registration order, oldest first.
    ledger: Vec<ResourceHandle>,
    pending_disposal: Vec<ResourceHandle>,
    usage_bytes: u64,
    budget_bytes: u64,
    advisory: bool,
    violation: bool,
    evicted_total: u64,
}

impl MemoryGuard {
    /// Creates a guard with the given budget.
    ///
    /// In advisory mode the guard keeps the ledger and the estimate but never
    /// evicts.
    pub fn new(budget_bytes: u64, advisory: bool) -> Self {
        log::info!(
            "MemoryGuard: Budget {:.0} MB{}.",
            budget_bytes as f64 / BYTES_PER_MB as f64,
            if advisory { " (advisory mode, eviction disabled)" } else { "" }
        );
        Self {
            ledger: Vec::new(),
            pending_disposal: Vec::new(),
            usage_bytes: 0,
            budget_bytes,
            advisory,
            violation: false,
            evicted_total: 0,
        }
    }

    /// Adds a handle to the ledger.
    ///
    /// Registering an id that is already tracked replaces the previous entry
    /// (its estimate and callback) and makes it the newest registration.
    pub fn register(&mut self, handle: ResourceHandle) {
        if let Some(previous) = self.remove(handle.id) {
            log::debug!(
                "MemoryGuard: Re-registering {} ({} -> {} bytes).",
                handle.id,
                previous.estimated_bytes,
                handle.estimated_bytes
            );
        }
        self.usage_bytes = self.usage_bytes.saturating_add(handle.estimated_bytes);
        self.ledger.push(handle);
    }

    /// Removes a handle without disposing it; the caller has freed the resource.
    ///
    /// Returns the handle, or `None` if the id was not registered.
    pub fn unregister(&mut self, id: ResourceId) -> Option<ResourceHandle> {
        let removed = self.remove(id);
        if removed.is_none() {
            log::trace!("MemoryGuard: Unregister of unknown {}.", id);
        }
        removed
    }

    fn remove(&mut self, id: ResourceId) -> Option<ResourceHandle> {
        let position = self.ledger.iter().position(|h| h.id == id)?;
        let handle = self.ledger.remove(position);
        self.usage_bytes = self.usage_bytes.saturating_sub(handle.estimated_bytes);
        Some(handle)
    }

    /// Enforces the budget. Meant for the low-frequency timer.
    pub fn tick(&mut self) -> EvictionReport {
        let mut report = EvictionReport::default();

        if self.usage_bytes <= self.budget_bytes {
            self.violation = false;
            return report;
        }

        if self.advisory {
            self.violation = false;
            log::debug!(
                "MemoryGuard: Estimate {} bytes over budget {} bytes (advisory only).",
                self.usage_bytes,
                self.budget_bytes
            );
            return report;
        }

        // The ledger is already in registration order; pinned entries are skipped.
        let mut index = 0;
        while self.usage_bytes > self.budget_bytes && index < self.ledger.len() {
            if !self.ledger[index].is_evictable() {
                index += 1;
                continue;
            }
            let victim = self.ledger.remove(index);
            self.usage_bytes = self.usage_bytes.saturating_sub(victim.estimated_bytes);
            report.freed_bytes += victim.estimated_bytes;
            report.evicted.push(victim.id);
            self.pending_disposal.push(victim);
        }

        self.flush();
        self.evicted_total += report.evicted.len() as u64;

        if !report.evicted.is_empty() {
            log::info!(
                "MemoryGuard: Evicted {} resource(s), freed {:.1} MB.",
                report.evicted.len(),
                report.freed_bytes as f64 / BYTES_PER_MB as f64
            );
        }

        self.violation = self.usage_bytes > self.budget_bytes;
        if self.violation {
            let err = QualityError::BudgetViolationPersistent {
                usage_bytes: self.usage_bytes,
                budget_bytes: self.budget_bytes,
            };
            log::warn!("MemoryGuard: {err}. Only pinned resources remain.");
            report.violation = Some(err);
        }

        report
    }

    /// Runs every queued dispose callback.
    pub fn flush(&mut self) {
        for handle in self.pending_disposal.drain(..) {
            log::trace!("MemoryGuard: Disposing {}.", handle.id);
            handle.dispose();
        }
    }

    /// Releases the whole ledger at teardown.
    ///
    /// Queued disposals are flushed and every evictable handle is disposed.
    /// Pinned handles are dropped without disposal; their owner releases them.
    pub fn shutdown(&mut self) {
        let (evictable, pinned): (Vec<_>, Vec<_>) =
            self.ledger.drain(..).partition(ResourceHandle::is_evictable);
        self.pending_disposal.extend(evictable);
        let disposed = self.pending_disposal.len();
        self.flush();
        self.usage_bytes = 0;
        self.violation = false;
        log::debug!(
            "MemoryGuard: Shutdown disposed {} resource(s), released {} pinned.",
            disposed,
            pinned.len()
        );
    }

    /// Enables or disables advisory mode.
    ///
    /// Entering advisory mode clears the violation flag, since an estimate
    /// alone never counts as a violation.
    pub fn set_advisory(&mut self, advisory: bool) {
        if self.advisory == advisory {
            return;
        }
        self.advisory = advisory;
        if advisory {
            self.violation = false;
            log::warn!("MemoryGuard: Memory cannot be measured, eviction disabled.");
        } else {
            log::info!("MemoryGuard: Memory measurement available, eviction enabled.");
        }
    }

    /// Sum of the registered estimates.
    pub fn current_usage_bytes(&self) -> u64 {
        self.usage_bytes
    }

    /// The active budget.
    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    /// `true` when eviction is disabled.
    pub fn is_advisory(&self) -> bool {
        self.advisory
    }

    /// `true` while the last tick left usage over budget.
    pub fn has_violation(&self) -> bool {
        self.violation
    }

    /// Returns `true` if an evictable handle is registered.
    pub fn has_evictable(&self) -> bool {
        self.ledger.iter().any(ResourceHandle::is_evictable)
    }

    /// Returns a view of the ledger.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            registered: self.ledger.len(),
            pinned: self.ledger.iter().filter(|h| !h.is_evictable()).count(),
            evicted_total: self.evicted_total,
            usage_bytes: self.usage_bytes,
            budget_bytes: self.budget_bytes,
            advisory: self.advisory,
            violation: self.violation,
        }
    }
}

impl Drop for MemoryGuard {
    fn drop(&mut self) {
        self.flush();
    }
}
