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

//! Hysteretic quality state machine.
//!
//! Converts the smoothed frame rate (and the battery state) into a discrete
//! [`QualityLevel`]. Performance-driven transitions move one level at a time,
//! require a run of consecutive breaches (`k_down` / `k_up`, with
//! `k_up > k_down`), and are separated by at least `dwell_time_ms`.
//!
//! The low-battery clamp is a safety mechanism rather than a performance
//! decision: it forces `Low` immediately, ignoring the dwell timer, and blocks
//! upgrades until the battery recovers or is charging.

use crate::config::ControllerConfig;
use vigil_core::platform::BatteryStatus;
use vigil_core::{CapabilityProfile, QualityLevel};

/// Why the level changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionCause {
    /// Sustained frame rate below the downgrade threshold.
    PerformanceDowngrade,
    /// Sustained frame rate above the upgrade threshold.
    PerformanceUpgrade,
    /// Low battery while discharging.
    BatteryClamp,
    /// The presentation layer pinned a level (or one was restored).
    UserOverride,
}

/// A level change produced by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Level before the change.
    pub from: QualityLevel,
    /// Level after the change.
    pub to: QualityLevel,
    /// What triggered the change.
    pub cause: TransitionCause,
    /// When the change happened.
    pub timestamp_ms: f64,
}

/// The controller's mutable state. Only the controller's own evaluation writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    /// The active level.
    pub current_level: QualityLevel,
    /// Last smoothed FPS seen by the controller.
    pub ema_fps: f64,
    /// Consecutive samples below the downgrade threshold.
    pub consecutive_low_breaches: u32,
    /// Consecutive samples above the upgrade threshold.
    pub consecutive_high_breaches: u32,
    /// Time of the last transition, `None` before the first one.
    pub last_transition_ms: Option<f64>,
    /// `true` while the low-battery clamp is engaged.
    pub battery_cap_active: bool,
}

/// The quality state machine.
#[derive(Debug)]
pub struct QualityController {
    config: ControllerConfig,
    target_fps: f64,
    state: ControllerState,
    user_override: Option<QualityLevel>,
}

impl QualityController {
    /// Creates a controller starting at the level derived from `profile`.
    pub fn new(config: ControllerConfig, profile: &CapabilityProfile) -> Self {
        let target_fps = config
            .target_fps_override
            .unwrap_or_else(|| profile.target_fps());
        let initial = profile.initial_level();
        log::info!(
            "QualityController: Starting at {} (target {:.0} FPS).",
            initial,
            target_fps
        );
        Self::with_initial_level(config, target_fps, initial)
    }

    /// Creates a controller with an explicit starting level and target.
    pub fn with_initial_level(
        config: ControllerConfig,
        target_fps: f64,
        initial: QualityLevel,
    ) -> Self {
        Self {
            config,
            target_fps,
            state: ControllerState {
                current_level: initial,
                ema_fps: target_fps,
                consecutive_low_breaches: 0,
                consecutive_high_breaches: 0,
                last_transition_ms: None,
                battery_cap_active: false,
            },
            user_override: None,
        }
    }

    /// Runs one evaluation step.
    ///
    /// The battery status is applied first so the clamp takes effect within
    /// the tick it is observed, even when no frame sample is available. With
    /// `ema_fps == None` the performance rules are skipped for this tick.
    pub fn evaluate(
        &mut self,
        now_ms: f64,
        ema_fps: Option<f64>,
        battery: Option<BatteryStatus>,
    ) -> Option<Transition> {
        if let Some(status) = battery {
            if let Some(transition) = self.apply_battery(status, now_ms) {
                return Some(transition);
            }
        }

        let ema = ema_fps.filter(|fps| fps.is_finite())?;
        self.state.ema_fps = ema;

        if self.user_override.is_some() {
            self.reset_breaches();
            return None;
        }

        if ema < self.target_fps * self.config.downgrade_ratio {
            self.state.consecutive_low_breaches =
                self.state.consecutive_low_breaches.saturating_add(1);
        } else {
            self.state.consecutive_low_breaches = 0;
        }

        if ema > self.target_fps * self.config.upgrade_ratio {
            self.state.consecutive_high_breaches =
                self.state.consecutive_high_breaches.saturating_add(1);
        } else {
            self.state.consecutive_high_breaches = 0;
        }

        let dwell_satisfied = self.dwell_satisfied(now_ms);
        let current = self.state.current_level;

        if self.state.consecutive_low_breaches >= self.config.k_down && dwell_satisfied {
            if let Some(lower) = current.step_down() {
                return Some(self.transition(lower, TransitionCause::PerformanceDowngrade, now_ms));
            }
        }

        if self.state.consecutive_high_breaches >= self.config.k_up
            && dwell_satisfied
            && !self.state.battery_cap_active
        {
            if let Some(higher) = current.step_up() {
                return Some(self.transition(higher, TransitionCause::PerformanceUpgrade, now_ms));
            }
        }

        None
    }

    /// Pins the controller at `level`, or resumes automatic control with `None`.
    ///
    /// While the battery clamp is engaged the level stays `Low`; the pinned
    /// level is restored when the clamp releases.
    pub fn set_user_override(
        &mut self,
        level: Option<QualityLevel>,
        now_ms: f64,
    ) -> Option<Transition> {
        self.user_override = level;
        self.reset_breaches();

        match level {
            Some(pinned) => {
                log::info!("QualityController: User override pinned at {}.", pinned);
                if self.state.battery_cap_active || pinned == self.state.current_level {
                    None
                } else {
                    Some(self.transition(pinned, TransitionCause::UserOverride, now_ms))
                }
            }
            None => {
                log::info!("QualityController: User override cleared, automatic control resumed.");
                None
            }
        }
    }

    fn apply_battery(&mut self, status: BatteryStatus, now_ms: f64) -> Option<Transition> {
        let engage = status.level < self.config.battery_low_threshold && !status.charging;
        let release = status.level >= self.config.battery_recover_threshold || status.charging;

        if engage && !self.state.battery_cap_active {
            log::warn!(
                "QualityController: Battery at {:.0}% and discharging, clamping to Low.",
                status.level * 100.0
            );
            self.state.battery_cap_active = true;
            self.reset_breaches();
            if self.state.current_level != QualityLevel::Low {
                return Some(self.transition(QualityLevel::Low, TransitionCause::BatteryClamp, now_ms));
            }
        } else if release && self.state.battery_cap_active {
            log::info!(
                "QualityController: Battery recovered ({:.0}%, charging={}), releasing clamp.",
                status.level * 100.0,
                status.charging
            );
            self.state.battery_cap_active = false;
            // Higher levels are re-earned from a clean run after the clamp.
            self.reset_breaches();
            if let Some(pinned) = self.user_override {
                if pinned != self.state.current_level {
                    return Some(self.transition(pinned, TransitionCause::UserOverride, now_ms));
                }
            }
        }
        None
    }

    fn dwell_satisfied(&self, now_ms: f64) -> bool {
        self.state
            .last_transition_ms
            .map_or(true, |last| now_ms - last >= self.config.dwell_time_ms)
    }

    fn transition(&mut self, to: QualityLevel, cause: TransitionCause, now_ms: f64) -> Transition {
        let from = self.state.current_level;
        self.state.current_level = to;
        self.state.last_transition_ms = Some(now_ms);
        self.reset_breaches();
        log::info!(
            "QualityController: {} -> {} ({:?}, ema {:.1} FPS).",
            from,
            to,
            cause,
            self.state.ema_fps
        );
        Transition {
            from,
            to,
            cause,
            timestamp_ms: now_ms,
        }
    }

    fn reset_breaches(&mut self) {
        self.state.consecutive_low_breaches = 0;
        self.state.consecutive_high_breaches = 0;
    }

    /// The active level.
    pub fn current_level(&self) -> QualityLevel {
        self.state.current_level
    }

    /// A read-only view of the state.
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// The fixed target frame rate.
    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// `true` while the low-battery clamp is engaged.
    pub fn battery_cap_active(&self) -> bool {
        self.state.battery_cap_active
    }

    /// The pinned level, if any.
    pub fn user_override(&self) -> Option<QualityLevel> {
        self.user_override
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: f64 = 60.0;

    fn controller(initial: QualityLevel) -> QualityController {
        QualityController::with_initial_level(ControllerConfig::default(), TARGET, initial)
    }

    /// Feeds `count` samples at `fps`, `step_ms` apart, starting at `start_ms`.
    fn feed(
        c: &mut QualityController,
        fps: f64,
        count: usize,
        start_ms: f64,
        step_ms: f64,
    ) -> Vec<Transition> {
        (0..count)
            .filter_map(|i| c.evaluate(start_ms + i as f64 * step_ms, Some(fps), None))
            .collect()
    }

    #[test]
    fn test_initial_level_from_profile() {
        let profile = CapabilityProfile {
            cores: 2,
            memory_mb: 2048,
            mobile: true,
            ..Default::default()
        };
        let c = QualityController::new(ControllerConfig::default(), &profile);
        assert_eq!(c.current_level(), QualityLevel::Low);
        assert_eq!(c.target_fps(), 30.0);
    }

    #[test]
    fn test_downgrade_after_k_down_breaches() {
        let mut c = controller(QualityLevel::High);
        assert!(feed(&mut c, 20.0, 9, 0.0, 16.0).is_empty());
        assert_eq!(c.state().consecutive_low_breaches, 9);

        let transition = c.evaluate(200.0, Some(20.0), None).unwrap();
        assert_eq!(transition.from, QualityLevel::High);
        assert_eq!(transition.to, QualityLevel::Medium);
        assert_eq!(transition.cause, TransitionCause::PerformanceDowngrade);
        assert_eq!(c.state().consecutive_low_breaches, 0);
    }

    #[test]
    fn test_breach_counters_saturate_at_the_level_bounds() {
        let mut low = controller(QualityLevel::Low);
        low.state.consecutive_low_breaches = u32::MAX;
        assert!(low.evaluate(0.0, Some(20.0), None).is_none());
        assert_eq!(low.state().consecutive_low_breaches, u32::MAX);
        assert_eq!(low.current_level(), QualityLevel::Low);

        let mut high = controller(QualityLevel::High);
        high.state.consecutive_high_breaches = u32::MAX;
        assert!(high.evaluate(0.0, Some(90.0), None).is_none());
        assert_eq!(high.state().consecutive_high_breaches, u32::MAX);
        assert_eq!(high.current_level(), QualityLevel::High);
    }

    #[test]
    fn test_interrupted_breach_run_resets() {
        let mut c = controller(QualityLevel::High);
        feed(&mut c, 20.0, 9, 0.0, 16.0);
        c.evaluate(150.0, Some(60.0), None);
        assert_eq!(c.state().consecutive_low_breaches, 0);
        assert!(feed(&mut c, 20.0, 9, 200.0, 16.0).is_empty());
        assert_eq!(c.current_level(), QualityLevel::High);
    }

    #[test]
    fn test_no_downgrade_below_low() {
        let mut c = controller(QualityLevel::Low);
        assert!(feed(&mut c, 5.0, 100, 0.0, 200.0).is_empty());
        assert_eq!(c.current_level(), QualityLevel::Low);
    }

    #[test]
    fn test_upgrade_waits_for_dwell_time() {
        let mut c = controller(QualityLevel::High);
        let down = feed(&mut c, 20.0, 10, 0.0, 1.0);
        assert_eq!(down.len(), 1);
        let t0 = down[0].timestamp_ms;

        // 25 fast samples 1 ms apart: the counter passes k_up but dwell blocks.
        assert!(feed(&mut c, 70.0, 25, t0 + 1.0, 1.0).is_empty());
        assert!(c.state().consecutive_high_breaches >= 20);
        assert_eq!(c.current_level(), QualityLevel::Medium);

        // Still inside the dwell window.
        assert!(c.evaluate(t0 + 4_999.0, Some(70.0), None).is_none());

        let up = c.evaluate(t0 + 5_000.0, Some(70.0), None).unwrap();
        assert_eq!(up.to, QualityLevel::High);
        assert_eq!(up.cause, TransitionCause::PerformanceUpgrade);
    }

    #[test]
    fn test_upgrade_needs_k_up_breaches() {
        let mut c = controller(QualityLevel::Low);
        assert!(feed(&mut c, 70.0, 19, 0.0, 1_000.0).is_empty());
        let up = c.evaluate(19_000.0, Some(70.0), None).unwrap();
        assert_eq!(up.to, QualityLevel::Medium);
    }

    #[test]
    fn test_fps_inside_band_never_transitions() {
        let mut c = controller(QualityLevel::Medium);
        // 48 <= fps <= 66 is neither a low nor a high breach.
        assert!(feed(&mut c, 48.0, 200, 0.0, 100.0).is_empty());
        assert!(feed(&mut c, 66.0, 200, 20_000.0, 100.0).is_empty());
        assert_eq!(c.current_level(), QualityLevel::Medium);
    }

    #[test]
    fn test_battery_clamp_forces_low_immediately() {
        let mut c = controller(QualityLevel::High);
        // A transition just happened; the clamp must ignore dwell time.
        feed(&mut c, 20.0, 10, 0.0, 1.0);
        assert_eq!(c.current_level(), QualityLevel::Medium);

        let t = c
            .evaluate(12.0, Some(70.0), Some(BatteryStatus::new(0.15, false)))
            .unwrap();
        assert_eq!(t.to, QualityLevel::Low);
        assert_eq!(t.cause, TransitionCause::BatteryClamp);
        assert!(c.battery_cap_active());
    }

    #[test]
    fn test_battery_clamp_applies_without_frame_sample() {
        let mut c = controller(QualityLevel::High);
        let t = c.evaluate(0.0, None, Some(BatteryStatus::new(0.1, false)));
        assert_eq!(t.map(|t| t.to), Some(QualityLevel::Low));
    }

    #[test]
    fn test_no_upgrade_while_battery_capped() {
        let mut c = controller(QualityLevel::High);
        let low_battery = Some(BatteryStatus::new(0.15, false));
        c.evaluate(0.0, Some(60.0), low_battery);
        for i in 1..200 {
            assert!(c
                .evaluate(i as f64 * 1_000.0, Some(70.0), low_battery)
                .is_none());
        }
        assert_eq!(c.current_level(), QualityLevel::Low);
    }

    #[test]
    fn test_battery_release_requires_recovery_or_charging() {
        let mut c = controller(QualityLevel::High);
        c.evaluate(0.0, None, Some(BatteryStatus::new(0.15, false)));

        // Inside the hysteresis band: clamp stays.
        c.evaluate(10.0, None, Some(BatteryStatus::new(0.3, false)));
        assert!(c.battery_cap_active());

        c.evaluate(20.0, None, Some(BatteryStatus::new(0.3, true)));
        assert!(!c.battery_cap_active());
        // No automatic upgrade on release.
        assert_eq!(c.current_level(), QualityLevel::Low);
    }

    #[test]
    fn test_level_must_be_reearned_after_battery_release() {
        let mut c = controller(QualityLevel::High);
        c.evaluate(0.0, None, Some(BatteryStatus::new(0.1, false)));
        c.evaluate(1.0, None, Some(BatteryStatus::new(0.9, false)));
        let ups = feed(&mut c, 70.0, 20, 10_000.0, 100.0);
        assert_eq!(ups.len(), 1);
        assert_eq!(ups[0].to, QualityLevel::Medium);
    }

    #[test]
    fn test_user_override_pins_level() {
        let mut c = controller(QualityLevel::Medium);
        let t = c.set_user_override(Some(QualityLevel::High), 0.0).unwrap();
        assert_eq!(t.cause, TransitionCause::UserOverride);
        assert!(feed(&mut c, 10.0, 100, 10_000.0, 1_000.0).is_empty());
        assert_eq!(c.current_level(), QualityLevel::High);

        assert!(c.set_user_override(None, 200_000.0).is_none());
        let downs = feed(&mut c, 10.0, 10, 300_000.0, 100.0);
        assert_eq!(downs.len(), 1);
    }

    #[test]
    fn test_battery_clamp_overrides_user_pin_and_restores_it() {
        let mut c = controller(QualityLevel::Medium);
        c.set_user_override(Some(QualityLevel::High), 0.0);
        let clamp = c
            .evaluate(1.0, None, Some(BatteryStatus::new(0.05, false)))
            .unwrap();
        assert_eq!(clamp.to, QualityLevel::Low);

        let restore = c
            .evaluate(2.0, None, Some(BatteryStatus::new(0.05, true)))
            .unwrap();
        assert_eq!(restore.to, QualityLevel::High);
        assert_eq!(restore.cause, TransitionCause::UserOverride);
    }

    #[test]
    fn test_missing_metric_skips_evaluation() {
        let mut c = controller(QualityLevel::High);
        feed(&mut c, 20.0, 5, 0.0, 1.0);
        assert!(c.evaluate(10.0, None, None).is_none());
        assert!(c.evaluate(11.0, Some(f64::NAN), None).is_none());
        assert_eq!(c.state().consecutive_low_breaches, 5);
    }

    /// Small deterministic generator for property checks.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }
    }

    #[test]
    fn test_performance_transitions_step_once_and_respect_dwell() {
        for seed in 0..20u64 {
            let mut rng = Lcg(seed);
            let mut c = controller(QualityLevel::Medium);
            let mut now = 0.0;
            let mut last_perf: Option<f64> = None;

            for _ in 0..5_000 {
                now += (rng.next() % 400) as f64;
                let fps = (rng.next() % 120) as f64;
                if let Some(t) = c.evaluate(now, Some(fps), None) {
                    assert_eq!((t.to.index() - t.from.index()).abs(), 1);
                    if let Some(prev) = last_perf {
                        assert!(t.timestamp_ms - prev >= 5_000.0, "seed {seed}");
                    }
                    last_perf = Some(t.timestamp_ms);
                }
            }
        }
    }

    #[test]
    fn test_capped_controller_never_upgrades_under_random_input() {
        let mut rng = Lcg(7);
        let mut c = controller(QualityLevel::High);
        let battery = Some(BatteryStatus::new(0.1, false));
        let mut now = 0.0;
        for _ in 0..2_000 {
            now += 250.0;
            let fps = (rng.next() % 200) as f64;
            if let Some(t) = c.evaluate(now, Some(fps), battery) {
                assert!(t.to < t.from);
            }
        }
        assert_eq!(c.current_level(), QualityLevel::Low);
    }
}
