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

//! Asynchronous power-state observer.
//!
//! The platform delivers notifications on its own schedule (and possibly its
//! own thread) into a [`BatteryNotifier`]. The controller reads the latest
//! status at the start of each evaluation.

use vigil_core::platform::{BatteryNotifier, BatterySource, BatteryStatus, BatterySubscription};

/// Owns the battery subscription and the shared status cell.
pub struct BatteryMonitor {
    notifier: BatteryNotifier,
    subscription: Option<Box<dyn BatterySubscription>>,
}

impl BatteryMonitor {
    /// Creates a monitor with no platform subscription.
    ///
    /// Statuses can still be injected through [`BatteryMonitor::notifier`].
    pub fn new() -> Self {
        Self {
            notifier: BatteryNotifier::new(),
            subscription: None,
        }
    }

    /// Subscribes to `source`. Returns `false` if the platform has no battery API.
    pub fn attach(&mut self, source: &dyn BatterySource) -> bool {
        self.detach();
        match source.subscribe(self.notifier.clone()) {
            Some(subscription) => {
                log::info!("BatteryMonitor: Subscribed to platform battery notifications.");
                self.subscription = Some(subscription);
                true
            }
            None => {
                log::info!("BatteryMonitor: Battery API unavailable, assuming mains power.");
                false
            }
        }
    }

    /// Returns a write handle for delivering notifications.
    pub fn notifier(&self) -> BatteryNotifier {
        self.notifier.clone()
    }

    /// The most recently delivered status.
    pub fn latest(&self) -> Option<BatteryStatus> {
        self.notifier.latest()
    }

    /// Returns `true` while a platform subscription is active.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Cancels the platform subscription, if any.
    pub fn detach(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
            log::debug!("BatteryMonitor: Unsubscribed.");
        }
    }
}

impl Default for BatteryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatteryMonitor {
    fn drop(&mut self) {
        self.detach();
    }
}
