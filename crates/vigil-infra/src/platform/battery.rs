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

//! Battery state from the Linux power-supply class.
//!
//! A watcher thread reads `BAT*/capacity` and `BAT*/status` under
//! `/sys/class/power_supply` and publishes into the engine's notifier whenever
//! the state changes. Hosts without a battery get no subscription and the
//! engine assumes mains power.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vigil_core::platform::{BatteryNotifier, BatterySource, BatteryStatus, BatterySubscription};

const DEFAULT_ROOT: &str = "/sys/class/power_supply";

/// A battery source that watches the sysfs power-supply class.
#[derive(Debug, Clone)]
pub struct SysfsBatterySource {
    root: PathBuf,
    poll_interval: Duration,
}

impl SysfsBatterySource {
    /// Watches `/sys/class/power_supply`.
    pub fn new() -> Self {
        Self::with_root(DEFAULT_ROOT)
    }

    /// Watches the power-supply class rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            poll_interval: Duration::from_secs(5),
        }
    }

    /// Sets how often the watcher re-reads the battery state.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn find_battery(&self) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.root).ok()?;
        let mut batteries: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("BAT"))
            .map(|entry| entry.path())
            .collect();
        batteries.sort();
        batteries.into_iter().next()
    }
}

impl Default for SysfsBatterySource {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the state of one `BAT*` directory.
fn read_status(battery: &Path) -> Option<BatteryStatus> {
    let capacity: f32 = fs::read_to_string(battery.join("capacity"))
        .ok()?
        .trim()
        .parse()
        .ok()?;
    let status = fs::read_to_string(battery.join("status")).unwrap_or_default();
    let charging = matches!(status.trim(), "Charging" | "Full");
    Some(BatteryStatus::new(capacity / 100.0, charging))
}

impl BatterySource for SysfsBatterySource {
    fn subscribe(&self, notifier: BatteryNotifier) -> Option<Box<dyn BatterySubscription>> {
        let battery = self.find_battery()?;
        let initial = read_status(&battery)?;
        notifier.publish(initial);
        log::info!(
            "SysfsBatterySource: Watching {} ({:.0}%, charging={}).",
            battery.display(),
            initial.level * 100.0,
            initial.charging
        );

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let interval = self.poll_interval;

        let spawned = thread::Builder::new()
            .name("vigil-battery".into())
            .spawn(move || {
                let mut last = initial;
                while thread_running.load(Ordering::Relaxed) {
                    thread::park_timeout(interval);
                    if !thread_running.load(Ordering::Relaxed) {
                        break;
                    }
                    match read_status(&battery) {
                        Some(status) if status != last => {
                            log::debug!(
                                "SysfsBatterySource: {:.0}%, charging={}.",
                                status.level * 100.0,
                                status.charging
                            );
                            notifier.publish(status);
                            last = status;
                        }
                        Some(_) => {}
                        None => log::trace!("SysfsBatterySource: Battery state unreadable."),
                    }
                }
                log::debug!("SysfsBatterySource: Watcher stopped.");
            });

        match spawned {
            Ok(handle) => Some(Box::new(SysfsSubscription {
                running,
                handle: Some(handle),
            })),
            Err(err) => {
                log::warn!("SysfsBatterySource: Failed to start watcher thread: {err}");
                None
            }
        }
    }
}

struct SysfsSubscription {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BatterySubscription for SysfsSubscription {
    fn unsubscribe(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::warn!("SysfsBatterySource: Watcher thread panicked.");
            }
        }
    }
}

impl Drop for SysfsSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn write_battery(root: &Path, capacity: &str, status: &str) {
        let dir = root.join("BAT0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("capacity"), capacity).unwrap();
        fs::write(dir.join("status"), status).unwrap();
    }

    #[test]
    fn test_no_battery_means_no_subscription() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("AC")).unwrap();
        let source = SysfsBatterySource::with_root(root.path());
        assert!(source.subscribe(BatteryNotifier::new()).is_none());
    }

    #[test]
    fn test_initial_state_is_published() {
        let root = tempfile::tempdir().unwrap();
        write_battery(root.path(), "15\n", "Discharging\n");
        let notifier = BatteryNotifier::new();
        let mut subscription = SysfsBatterySource::with_root(root.path())
            .subscribe(notifier.clone())
            .unwrap();

        let status = notifier.latest().unwrap();
        assert!((status.level - 0.15).abs() < 1e-6);
        assert!(!status.charging);
        subscription.unsubscribe();
    }

    #[test]
    fn test_watcher_publishes_changes() {
        let root = tempfile::tempdir().unwrap();
        write_battery(root.path(), "15", "Discharging");
        let notifier = BatteryNotifier::new();
        let mut subscription = SysfsBatterySource::with_root(root.path())
            .poll_interval(Duration::from_millis(10))
            .subscribe(notifier.clone())
            .unwrap();

        write_battery(root.path(), "16", "Charging");
        let deadline = Instant::now() + Duration::from_secs(5);
        while !notifier.latest().map_or(false, |s| s.charging) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(notifier.latest().unwrap().charging);

        subscription.unsubscribe();
        subscription.unsubscribe();
    }

    #[test]
    fn test_full_battery_counts_as_charging() {
        let root = tempfile::tempdir().unwrap();
        write_battery(root.path(), "100", "Full");
        let status = read_status(&root.path().join("BAT0")).unwrap();
        assert!(status.charging);
        assert_eq!(status.level, 1.0);
    }
}
