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

//! The quality engine: owns every component and drives them from the host's
//! frame callback and low-frequency timer.
//!
//! Components are injected through [`QualityEngineBuilder`]; nothing is
//! discovered through global state.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use vigil_core::memory::{ResourceHandle, ResourceId, BYTES_PER_MB};
use vigil_core::platform::{BatteryNotifier, BatterySource, CapabilitySource};
use vigil_core::scene::SceneCollaborator;
use vigil_core::telemetry::ResourceMonitor;
use vigil_core::{
    CapabilityProfile, Clock, MonotonicClock, QualityLevel, QualityResult, ResourceBudget,
};
use vigil_telemetry::TelemetryService;

use crate::analysis::{HeuristicEngine, HistoryStats};
use crate::applier::ResourceBudgetApplier;
use crate::battery::BatteryMonitor;
use crate::config::EngineConfig;
use crate::controller::{ControllerState, QualityController, Transition, TransitionCause};
use crate::diagnostics::{DiagnosticsHandle, MetricsSnapshot};
use crate::memory_guard::{MemoryGuard, MemoryStats};
use crate::probe::CapabilityProbe;
use crate::sampler::MetricsSampler;

/// Notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum QualityEvent {
    /// The active level changed.
    LevelChanged {
        /// Previous level.
        from: QualityLevel,
        /// New level.
        to: QualityLevel,
        /// What triggered the change.
        cause: TransitionCause,
        /// When it happened.
        timestamp_ms: f64,
    },
    /// The low-battery clamp engaged or released.
    BatteryCapChanged {
        /// `true` when the clamp engaged.
        active: bool,
        /// When it happened.
        timestamp_ms: f64,
    },
    /// The memory guard disposed resources.
    ResourcesEvicted {
        /// Disposed resources, in eviction order.
        ids: Vec<ResourceId>,
        /// Estimated bytes released.
        freed_bytes: u64,
    },
    /// Usage is still over budget after eviction.
    BudgetViolation {
        /// Estimated bytes still registered.
        usage_bytes: u64,
        /// Active budget.
        budget_bytes: u64,
    },
}

impl From<Transition> for QualityEvent {
    fn from(t: Transition) -> Self {
        QualityEvent::LevelChanged {
            from: t.from,
            to: t.to,
            cause: t.cause,
            timestamp_ms: t.timestamp_ms,
        }
    }
}

/// Assembles a [`QualityEngine`] from its collaborators.
pub struct QualityEngineBuilder {
    config: EngineConfig,
    profile: Option<CapabilityProfile>,
    capability_source: Option<Box<dyn CapabilitySource>>,
    memory_monitors: Vec<Arc<dyn ResourceMonitor>>,
    battery_source: Option<Box<dyn BatterySource>>,
    scene: Option<Box<dyn SceneCollaborator>>,
    clock: Option<Arc<dyn Clock>>,
}

impl QualityEngineBuilder {
    /// Starts a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            profile: None,
            capability_source: None,
            memory_monitors: Vec::new(),
            battery_source: None,
            scene: None,
            clock: None,
        }
    }

    /// Replaces the configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses a known profile instead of probing.
    pub fn with_profile(mut self, profile: CapabilityProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Probes capabilities through `source` at build time.
    pub fn with_capability_source(mut self, source: impl CapabilitySource + 'static) -> Self {
        self.capability_source = Some(Box::new(source));
        self
    }

    /// Adds a resource monitor polled on the low-frequency timer.
    pub fn with_memory_monitor(mut self, monitor: Arc<dyn ResourceMonitor>) -> Self {
        self.memory_monitors.push(monitor);
        self
    }

    /// Subscribes to battery notifications from `source`.
    pub fn with_battery_source(mut self, source: impl BatterySource + 'static) -> Self {
        self.battery_source = Some(Box::new(source));
        self
    }

    /// Attaches the scene that receives budgets.
    pub fn with_scene(mut self, scene: impl SceneCollaborator + 'static) -> Self {
        self.scene = Some(Box::new(scene));
        self
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validates the configuration and builds the engine.
    ///
    /// Returns the engine and the receiving end of its event channel.
    pub fn build(self) -> QualityResult<(QualityEngine, Receiver<QualityEvent>)> {
        self.config.validate()?;

        let profile = match self.profile {
            Some(profile) => profile,
            None => CapabilityProbe::detect(self.capability_source.as_deref()),
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn Clock>);

        let telemetry = TelemetryService::new(self.config.memory_sample_interval_ms);
        for monitor in self.memory_monitors {
            telemetry.monitor_registry().register(monitor);
        }

        let controller = QualityController::new(self.config.controller.clone(), &profile);
        let target_fps = controller.target_fps();
        let sampler = MetricsSampler::new(
            self.config.controller.ema_alpha,
            target_fps,
            telemetry.monitor_registry().clone(),
        );

        let budget_bytes = self
            .config
            .memory
            .budget_override_mb
            .map(|mb| mb.saturating_mul(BYTES_PER_MB))
            .unwrap_or_else(|| profile.memory_budget_bytes(self.config.memory.budget_fraction));
        let memory_guard = MemoryGuard::new(budget_bytes, !sampler.memory_supported());

        let mut battery = BatteryMonitor::new();
        if let Some(source) = self.battery_source.as_deref() {
            battery.attach(source);
        }

        let (event_tx, event_rx) = crossbeam_channel::bounded(self.config.event_buffer_size);

        let mut applier = ResourceBudgetApplier::new(profile.clone(), self.scene);
        applier.apply(controller.current_level(), false);

        let diagnostics =
            DiagnosticsHandle::new(MetricsSnapshot::initial(controller.current_level(), target_fps));

        let engine = QualityEngine {
            config: self.config,
            clock,
            profile,
            sampler,
            controller,
            applier,
            memory_guard,
            battery,
            telemetry,
            heuristics: HeuristicEngine,
            diagnostics,
            event_tx,
            shut_down: false,
        };
        engine.publish_snapshot();

        log::info!(
            "QualityEngine: Ready at {} (target {:.0} FPS).",
            engine.get_current_level(),
            target_fps
        );

        Ok((engine, event_rx))
    }
}

impl Default for QualityEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The adaptive quality control engine.
pub struct QualityEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    profile: CapabilityProfile,
    sampler: MetricsSampler,
    controller: QualityController,
    applier: ResourceBudgetApplier,
    memory_guard: MemoryGuard,
    battery: BatteryMonitor,
    telemetry: TelemetryService,
    heuristics: HeuristicEngine,
    diagnostics: DiagnosticsHandle,
    event_tx: Sender<QualityEvent>,
    shut_down: bool,
}

impl QualityEngine {
    /// Starts a builder.
    pub fn builder() -> QualityEngineBuilder {
        QualityEngineBuilder::new()
    }

    /// Frame callback. Samples the frame, evaluates the controller and runs
    /// the low-frequency work if its interval has elapsed.
    ///
    /// Returns the transition made on this frame, if any.
    pub fn on_frame(&mut self, delta_time_ms: f64) -> Option<Transition> {
        if self.shut_down {
            return None;
        }
        let now = self.clock.now_ms();

        let ema = match self.sampler.on_frame(delta_time_ms, now) {
            Some(_) => self.sampler.ema_fps(),
            None => None,
        };

        let transition = self.evaluate(now, ema);
        self.poll_timers();
        transition
    }

    /// Runs the low-frequency work now: monitor refresh, memory sample and
    /// memory guard tick.
    pub fn on_timer(&mut self) {
        if self.shut_down {
            return;
        }
        let now = self.clock.now_ms();
        self.telemetry.force_update(now);
        self.run_memory_tick();
    }

    /// Runs the low-frequency work if its interval has elapsed.
    pub fn poll_timers(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        let now = self.clock.now_ms();
        if self.telemetry.tick(now) {
            self.run_memory_tick();
            true
        } else {
            false
        }
    }

    /// Re-evaluates without a frame sample, so battery changes take effect
    /// while the render loop is paused.
    pub fn on_battery_changed(&mut self) -> Option<Transition> {
        if self.shut_down {
            return None;
        }
        let now = self.clock.now_ms();
        self.evaluate(now, None)
    }

    fn evaluate(&mut self, now: f64, ema: Option<f64>) -> Option<Transition> {
        if ema.is_none() {
            log::trace!("QualityEngine: No frame metric this tick, skipping performance rules.");
        }

        let was_capped = self.controller.battery_cap_active();
        let transition = self.controller.evaluate(now, ema, self.battery.latest());
        let capped = self.controller.battery_cap_active();

        if capped != was_capped {
            self.emit(QualityEvent::BatteryCapChanged {
                active: capped,
                timestamp_ms: now,
            });
        }
        if let Some(t) = transition {
            self.emit(t.into());
        }
        if transition.is_some() || capped != was_capped {
            self.applier.apply(self.controller.current_level(), capped);
        }

        self.publish_snapshot();
        transition
    }

    fn run_memory_tick(&mut self) {
        // Eviction is only trusted against a real measurement.
        let measured = self.sampler.sample_memory().is_some();
        self.memory_guard.set_advisory(!measured);
        let report = self.memory_guard.tick();
        if !report.evicted.is_empty() {
            self.emit(QualityEvent::ResourcesEvicted {
                ids: report.evicted,
                freed_bytes: report.freed_bytes,
            });
        }
        if report.violation.is_some() {
            self.emit(QualityEvent::BudgetViolation {
                usage_bytes: self.memory_guard.current_usage_bytes(),
                budget_bytes: self.memory_guard.budget_bytes(),
            });
        }
        self.publish_snapshot();
    }

    fn emit(&self, event: QualityEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!("QualityEngine: Event channel full, dropping {:?}.", event);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::trace!("QualityEngine: No event receiver.");
            }
        }
    }

    fn publish_snapshot(&self) {
        self.diagnostics.publish(self.get_metrics_snapshot());
    }

    /// Pins the level, or resumes automatic control with `None`.
    pub fn set_user_quality_override(&mut self, level: Option<QualityLevel>) -> Option<Transition> {
        if self.shut_down {
            return None;
        }
        let now = self.clock.now_ms();
        let transition = self.controller.set_user_override(level, now);
        if let Some(t) = transition {
            self.emit(t.into());
            self.applier
                .apply(self.controller.current_level(), self.controller.battery_cap_active());
        }
        self.publish_snapshot();
        transition
    }

    /// Pins the level from a raw index (0 = Low, 2 = High).
    ///
    /// Out-of-range requests are clamped to the nearest valid level.
    pub fn request_level_index(&mut self, raw: i32) -> Option<Transition> {
        let level = QualityLevel::from_raw_clamped(raw);
        self.set_user_quality_override(Some(level))
    }

    /// Adds a resource to the memory guard ledger.
    pub fn register_resource(&mut self, handle: ResourceHandle) {
        self.memory_guard.register(handle);
    }

    /// Removes a resource the scene has freed itself.
    pub fn unregister_resource(&mut self, id: ResourceId) -> Option<ResourceHandle> {
        self.memory_guard.unregister(id)
    }

    /// Active level.
    pub fn get_current_level(&self) -> QualityLevel {
        self.controller.current_level()
    }

    /// Builds a snapshot of the current state.
    pub fn get_metrics_snapshot(&self) -> MetricsSnapshot {
        let mb = BYTES_PER_MB as f64;
        MetricsSnapshot {
            ema_fps: self
                .sampler
                .ema_fps()
                .unwrap_or_else(|| self.controller.target_fps()),
            target_fps: self.controller.target_fps(),
            last_frame_time_ms: self.sampler.last_sample().map(|s| s.frame_time_ms),
            memory_used_mb: self.sampler.last_memory_mb(),
            memory_estimate_mb: self.memory_guard.current_usage_bytes() as f64 / mb,
            memory_budget_mb: self.memory_guard.budget_bytes() as f64 / mb,
            current_level: self.controller.current_level(),
            battery_cap_active: self.controller.battery_cap_active(),
            budget_violation: self.memory_guard.has_violation(),
            advisory_memory_mode: self.memory_guard.is_advisory(),
            user_override: self.controller.user_override(),
        }
    }

    /// Advisory text for the presentation layer.
    pub fn get_recommendations(&self) -> Vec<String> {
        let history = HistoryStats {
            frame_times: self.sampler.frame_time_stats(),
            memory_used: self.sampler.memory_stats(),
        };
        self.heuristics
            .analyze(&self.get_metrics_snapshot(), &history)
    }

    /// A cloneable reader of the published snapshot.
    pub fn diagnostics(&self) -> DiagnosticsHandle {
        self.diagnostics.clone()
    }

    /// Write handle for delivering battery notifications by hand.
    pub fn battery_notifier(&self) -> BatteryNotifier {
        self.battery.notifier()
    }

    /// The detected device profile.
    pub fn capability_profile(&self) -> &CapabilityProfile {
        &self.profile
    }

    /// The budget most recently delivered to the scene.
    pub fn current_budget(&self) -> Option<&ResourceBudget> {
        self.applier.current_budget()
    }

    /// Number of budgets delivered to the scene.
    pub fn budget_push_count(&self) -> u64 {
        self.applier.push_count()
    }

    /// A read-only view of the controller state.
    pub fn controller_state(&self) -> &ControllerState {
        self.controller.state()
    }

    /// Memory guard statistics.
    pub fn memory_stats(&self) -> MemoryStats {
        self.memory_guard.stats()
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stops the engine: unsubscribes from battery notifications and releases
    /// every tracked resource. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.battery.detach();
        self.memory_guard.shutdown();
        self.publish_snapshot();
        log::info!("QualityEngine: Shut down.");
    }

    /// Returns `true` once [`QualityEngine::shutdown`] has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Drop for QualityEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
