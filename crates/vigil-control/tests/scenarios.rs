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

//! End-to-end behaviour of the quality engine driven through its public API.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;
use vigil_control::{
    EngineConfig, QualityEngine, QualityEvent, ResourceBudgetApplier, TransitionCause,
};
use vigil_core::memory::{ResourceHandle, ResourceId, BYTES_PER_MB};
use vigil_core::platform::BatteryStatus;
use vigil_core::scene::{Renderable, SceneCollaborator};
use vigil_core::telemetry::{MonitoredResourceType, ResourceMonitor, ResourceUsageReport};
use vigil_core::{CapabilityProfile, ManualClock, QualityLevel, ResourceBudget};

const MB: u64 = BYTES_PER_MB;

#[derive(Clone, Default)]
struct RecordingScene {
    budgets: Arc<Mutex<Vec<ResourceBudget>>>,
}

impl RecordingScene {
    fn pushed(&self) -> Vec<ResourceBudget> {
        self.budgets.lock().unwrap().clone()
    }
}

impl SceneCollaborator for RecordingScene {
    fn list_renderables(&self) -> Vec<Renderable> {
        Vec::new()
    }

    fn on_budget_changed(&mut self, budget: &ResourceBudget) {
        self.budgets.lock().unwrap().push(budget.clone());
    }
}

#[derive(Debug)]
struct FixedMemory;

impl ResourceMonitor for FixedMemory {
    fn monitor_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("fixed_memory")
    }

    fn resource_type(&self) -> MonitoredResourceType {
        MonitoredResourceType::SystemRam
    }

    fn get_usage_report(&self) -> Option<ResourceUsageReport> {
        Some(ResourceUsageReport {
            current_bytes: 300 * MB,
            ..Default::default()
        })
    }
}

/// A memory monitor that can lose its measurement, like a process lookup
/// that fails.
#[derive(Debug, Default)]
struct FlakyMemory {
    available: AtomicBool,
}

impl ResourceMonitor for FlakyMemory {
    fn monitor_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("flaky_memory")
    }

    fn resource_type(&self) -> MonitoredResourceType {
        MonitoredResourceType::SystemRam
    }

    fn get_usage_report(&self) -> Option<ResourceUsageReport> {
        self.available
            .load(Ordering::SeqCst)
            .then(|| ResourceUsageReport {
                current_bytes: 300 * MB,
                ..Default::default()
            })
    }
}

struct Harness {
    engine: QualityEngine,
    events: Receiver<QualityEvent>,
    clock: ManualClock,
    scene: RecordingScene,
}

impl Harness {
    fn new(profile: CapabilityProfile, config: EngineConfig) -> Self {
        let clock = ManualClock::new(0.0);
        let scene = RecordingScene::default();
        let (engine, events) = QualityEngine::builder()
            .config(config)
            .with_profile(profile)
            .with_clock(Arc::new(clock.clone()))
            .with_scene(scene.clone())
            .build()
            .unwrap();
        Self {
            engine,
            events,
            clock,
            scene,
        }
    }

    /// Advances the clock by `step_ms` and delivers a frame at `fps`.
    fn frames(&mut self, fps: f64, count: usize, step_ms: f64) -> Vec<QualityLevel> {
        (0..count)
            .map(|_| {
                self.clock.advance(step_ms);
                self.engine.on_frame(1000.0 / fps);
                self.engine.get_current_level()
            })
            .collect()
    }

    fn drain_events(&self) -> Vec<QualityEvent> {
        self.events.try_iter().collect()
    }
}

fn desktop_high() -> CapabilityProfile {
    CapabilityProfile {
        cores: 8,
        memory_mb: 16_384,
        ..Default::default()
    }
}

/// Configuration where the EMA follows the instantaneous frame rate.
fn responsive_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.controller.ema_alpha = 1.0;
    config
}

fn level_changes(events: &[QualityEvent]) -> Vec<(QualityLevel, QualityLevel, TransitionCause)> {
    events
        .iter()
        .filter_map(|e| match e {
            QualityEvent::LevelChanged {
                from, to, cause, ..
            } => Some((*from, *to, *cause)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_weak_mobile_device_starts_low() {
    let profile = CapabilityProfile {
        cores: 2,
        memory_mb: 2048,
        mobile: true,
        ..Default::default()
    };
    let h = Harness::new(profile, EngineConfig::default());
    assert_eq!(h.engine.get_current_level(), QualityLevel::Low);
    assert_eq!(h.engine.get_metrics_snapshot().target_fps, 30.0);
    // The starting budget is delivered once at construction.
    assert_eq!(h.scene.pushed().len(), 1);
    assert_eq!(h.scene.pushed()[0].level, QualityLevel::Low);
}

#[test]
fn test_sustained_slowdown_steps_down_one_level() {
    let mut h = Harness::new(desktop_high(), responsive_config());
    let levels = h.frames(20.0, 10, 50.0);

    assert!(levels[..9].iter().all(|&l| l == QualityLevel::High));
    assert_eq!(levels[9], QualityLevel::Medium);
    assert_eq!(
        level_changes(&h.drain_events()),
        vec![(
            QualityLevel::High,
            QualityLevel::Medium,
            TransitionCause::PerformanceDowngrade
        )]
    );
    assert_eq!(h.scene.pushed().last().unwrap().level, QualityLevel::Medium);
}

#[test]
fn test_recovery_waits_for_dwell_time() {
    let mut h = Harness::new(desktop_high(), responsive_config());
    h.frames(20.0, 10, 50.0);
    let downgraded_at = h.engine.controller_state().last_transition_ms.unwrap();
    assert_eq!(downgraded_at, 500.0);

    let levels = h.frames(70.0, 25, 1.0);
    assert!(levels.iter().all(|&l| l == QualityLevel::Medium));
    assert!(h.engine.controller_state().consecutive_high_breaches >= 20);

    h.clock.set(downgraded_at + 4_999.0);
    h.engine.on_frame(1000.0 / 70.0);
    assert_eq!(h.engine.get_current_level(), QualityLevel::Medium);

    h.clock.set(downgraded_at + 5_000.0);
    let transition = h.engine.on_frame(1000.0 / 70.0).unwrap();
    assert_eq!(transition.to, QualityLevel::High);
    assert_eq!(transition.cause, TransitionCause::PerformanceUpgrade);
}

#[test]
fn test_default_smoothing_delays_the_downgrade() {
    let mut h = Harness::new(desktop_high(), EngineConfig::default());
    // Seeded at 60 FPS, the EMA needs several slow frames to cross 48.
    let levels = h.frames(20.0, 10, 50.0);
    assert!(levels.iter().all(|&l| l == QualityLevel::High));

    let levels = h.frames(20.0, 10, 50.0);
    assert_eq!(levels.last(), Some(&QualityLevel::Medium));
    assert_eq!(
        levels.iter().filter(|&&l| l == QualityLevel::Medium).count(),
        levels.len() - levels.iter().position(|&l| l == QualityLevel::Medium).unwrap()
    );
}

#[test]
fn test_low_battery_clamps_and_blocks_upgrades() {
    let mut h = Harness::new(desktop_high(), responsive_config());
    let battery = h.engine.battery_notifier();

    battery.publish(BatteryStatus::new(0.15, false));
    h.frames(70.0, 1, 16.0);
    assert_eq!(h.engine.get_current_level(), QualityLevel::Low);
    assert!(h.engine.get_metrics_snapshot().battery_cap_active);

    let events = h.drain_events();
    assert!(events.contains(&QualityEvent::BatteryCapChanged {
        active: true,
        timestamp_ms: 16.0
    }));
    assert_eq!(
        level_changes(&events),
        vec![(QualityLevel::High, QualityLevel::Low, TransitionCause::BatteryClamp)]
    );
    let capped = h.scene.pushed().last().cloned().unwrap();
    assert!(capped.battery_saver);
    assert_eq!(capped.frame_rate_cap, Some(30));

    let levels = h.frames(70.0, 200, 100.0);
    assert!(levels.iter().all(|&l| l == QualityLevel::Low));

    // Still inside the hysteresis band.
    battery.publish(BatteryStatus::new(0.3, false));
    h.frames(70.0, 1, 100.0);
    assert!(h.engine.get_metrics_snapshot().battery_cap_active);

    battery.publish(BatteryStatus::new(0.3, true));
    h.frames(70.0, 1, 100.0);
    assert!(!h.engine.get_metrics_snapshot().battery_cap_active);
    assert_eq!(h.engine.get_current_level(), QualityLevel::Low);
    assert!(!h.scene.pushed().last().unwrap().battery_saver);

    let levels = h.frames(70.0, 20, 100.0);
    assert_eq!(levels.last(), Some(&QualityLevel::Medium));
}

#[test]
fn test_battery_clamp_applies_without_frames() {
    let mut h = Harness::new(desktop_high(), EngineConfig::default());
    h.engine.battery_notifier().publish(BatteryStatus::new(0.1, false));
    let transition = h.engine.on_battery_changed().unwrap();
    assert_eq!(transition.to, QualityLevel::Low);
}

#[test]
fn test_memory_tick_evicts_oldest_handle() {
    let mut config = EngineConfig::default();
    config.memory.budget_override_mb = Some(500);
    let clock = ManualClock::new(0.0);
    let (mut engine, events) = QualityEngine::builder()
        .config(config)
        .with_profile(desktop_high())
        .with_clock(Arc::new(clock))
        .with_memory_monitor(Arc::new(FixedMemory))
        .build()
        .unwrap();

    let disposed = Arc::new(Mutex::new(Vec::new()));
    for id in 1..=3 {
        let disposed = disposed.clone();
        engine.register_resource(ResourceHandle::new(ResourceId(id), 200 * MB, move || {
            disposed.lock().unwrap().push(id)
        }));
    }

    engine.on_timer();

    assert_eq!(*disposed.lock().unwrap(), vec![1]);
    let stats = engine.memory_stats();
    assert_eq!(stats.usage_bytes, 400 * MB);
    assert!(!stats.violation);
    let snapshot = engine.get_metrics_snapshot();
    assert_eq!(snapshot.memory_used_mb, Some(300.0));
    assert_eq!(snapshot.memory_estimate_mb, 400.0);
    assert!(events.try_iter().any(|e| e
        == QualityEvent::ResourcesEvicted {
            ids: vec![ResourceId(1)],
            freed_bytes: 200 * MB,
        }));
}

#[test]
fn test_unmeasurable_memory_is_advisory_only() {
    let mut config = EngineConfig::default();
    config.memory.budget_override_mb = Some(100);
    let mut h = Harness::new(desktop_high(), config);
    h.engine
        .register_resource(ResourceHandle::new(ResourceId(1), 400 * MB, || {}));
    h.engine.on_timer();

    let snapshot = h.engine.get_metrics_snapshot();
    assert!(snapshot.advisory_memory_mode);
    assert_eq!(snapshot.memory_estimate_mb, 400.0);
    assert_eq!(h.engine.memory_stats().evicted_total, 0);
    assert!(h
        .engine
        .get_recommendations()
        .iter()
        .any(|r| r.contains("eviction is disabled")));
}

#[test]
fn test_registered_monitor_without_measurement_never_evicts() {
    let mut config = EngineConfig::default();
    config.memory.budget_override_mb = Some(100);
    let monitor = Arc::new(FlakyMemory::default());
    let (mut engine, _events) = QualityEngine::builder()
        .config(config)
        .with_profile(desktop_high())
        .with_clock(Arc::new(ManualClock::new(0.0)))
        .with_memory_monitor(monitor.clone())
        .build()
        .unwrap();

    let disposed = Arc::new(Mutex::new(Vec::new()));
    let sink = disposed.clone();
    engine.register_resource(ResourceHandle::new(ResourceId(1), 400 * MB, move || {
        sink.lock().unwrap().push(1)
    }));

    engine.on_timer();
    let snapshot = engine.get_metrics_snapshot();
    assert_eq!(snapshot.memory_used_mb, None);
    assert!(snapshot.advisory_memory_mode);
    assert!(!snapshot.budget_violation);
    assert!(disposed.lock().unwrap().is_empty());

    // Eviction resumes once a real measurement comes back.
    monitor.available.store(true, Ordering::SeqCst);
    engine.on_timer();
    assert_eq!(*disposed.lock().unwrap(), vec![1]);
    assert!(!engine.get_metrics_snapshot().advisory_memory_mode);

    // And stops again when it is lost.
    monitor.available.store(false, Ordering::SeqCst);
    engine.register_resource(ResourceHandle::new(ResourceId(2), 400 * MB, || {}));
    engine.on_timer();
    assert_eq!(engine.memory_stats().evicted_total, 1);
    assert_eq!(engine.get_metrics_snapshot().memory_used_mb, None);
}

#[test]
fn test_applying_same_level_twice_notifies_once() {
    let scene = RecordingScene::default();
    let mut applier =
        ResourceBudgetApplier::new(CapabilityProfile::default(), Some(Box::new(scene.clone())));
    let first = applier.apply(QualityLevel::Medium, false);
    let second = applier.apply(QualityLevel::Medium, false);
    assert_eq!(first, second);
    assert_eq!(scene.pushed().len(), 1);
}

#[test]
fn test_user_override_pins_and_clamps_requests() {
    let mut h = Harness::new(desktop_high(), responsive_config());

    let transition = h.engine.request_level_index(-4).unwrap();
    assert_eq!(transition.to, QualityLevel::Low);
    assert_eq!(transition.cause, TransitionCause::UserOverride);

    let levels = h.frames(90.0, 100, 1_000.0);
    assert!(levels.iter().all(|&l| l == QualityLevel::Low));

    h.engine.request_level_index(7);
    assert_eq!(h.engine.get_current_level(), QualityLevel::High);
    assert_eq!(
        h.engine.get_metrics_snapshot().user_override,
        Some(QualityLevel::High)
    );

    h.engine.set_user_quality_override(None);
    let levels = h.frames(20.0, 10, 1_000.0);
    assert_eq!(levels.last(), Some(&QualityLevel::Medium));
}

#[test]
fn test_diagnostics_handle_tracks_engine() {
    let mut h = Harness::new(desktop_high(), responsive_config());
    let diagnostics = h.engine.diagnostics();
    assert_eq!(diagnostics.snapshot().current_level, QualityLevel::High);

    h.frames(20.0, 10, 50.0);
    let snapshot = diagnostics.snapshot();
    assert_eq!(snapshot.current_level, QualityLevel::Medium);
    assert_eq!(snapshot.last_frame_time_ms, Some(50.0));
    assert!(h
        .engine
        .get_recommendations()
        .iter()
        .any(|r| r.contains("below target")));
}

#[test]
fn test_full_event_channel_never_blocks() {
    let mut config = responsive_config();
    config.event_buffer_size = 1;
    config.controller.dwell_time_ms = 0.0;
    let mut h = Harness::new(desktop_high(), config);
    for _ in 0..5 {
        h.frames(20.0, 10, 10.0);
        h.frames(90.0, 20, 10.0);
    }
    assert_eq!(h.drain_events().len(), 1);
}

#[test]
fn test_shutdown_flushes_resources() {
    let mut h = Harness::new(desktop_high(), EngineConfig::default());
    let disposed = Arc::new(Mutex::new(Vec::new()));
    for (id, pinned) in [(1, false), (2, true)] {
        let disposed = disposed.clone();
        let dispose = move || disposed.lock().unwrap().push(id);
        let handle = if pinned {
            ResourceHandle::pinned(ResourceId(id), MB, dispose)
        } else {
            ResourceHandle::new(ResourceId(id), MB, dispose)
        };
        h.engine.register_resource(handle);
    }

    h.engine.shutdown();
    h.engine.shutdown();
    assert!(h.engine.is_shut_down());
    assert_eq!(*disposed.lock().unwrap(), vec![1]);
    assert!(h.engine.on_frame(16.0).is_none());
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = EngineConfig::default();
    config.controller.k_up = 3;
    assert!(QualityEngine::builder().config(config).build().is_err());
}
