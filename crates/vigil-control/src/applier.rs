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

//! Turns a quality level into an enforced [`ResourceBudget`] and pushes it to
//! the scene.

use vigil_core::quality::select_lod_band;
use vigil_core::scene::{LodAssignment, SceneCollaborator};
use vigil_core::{CapabilityProfile, QualityLevel, ResourceBudget};

/// Derives budgets and delivers them to the [`SceneCollaborator`].
///
/// The scene is notified only when the budget actually differs from the one
/// last delivered, so repeated calls with an unchanged level are no-ops.
pub struct ResourceBudgetApplier {
    profile: CapabilityProfile,
    scene: Option<Box<dyn SceneCollaborator>>,
    last_pushed: Option<ResourceBudget>,
    push_count: u64,
}

impl ResourceBudgetApplier {
    /// Creates an applier for the given device.
    pub fn new(profile: CapabilityProfile, scene: Option<Box<dyn SceneCollaborator>>) -> Self {
        Self {
            profile,
            scene,
            last_pushed: None,
            push_count: 0,
        }
    }

    /// Derives the budget for `level` and pushes it if it changed.
    pub fn apply(&mut self, level: QualityLevel, battery_cap_active: bool) -> ResourceBudget {
        let budget = ResourceBudget::derive(level, &self.profile, battery_cap_active);

        if self.last_pushed.as_ref() == Some(&budget) {
            log::trace!("ResourceBudgetApplier: Budget for {} unchanged.", level);
            return budget;
        }

        if let Some(scene) = self.scene.as_mut() {
            log::debug!(
                "ResourceBudgetApplier: Pushing {} budget ({} particles, {:?} shadows, battery saver {}).",
                level,
                budget.max_particles,
                budget.shadow_quality,
                budget.battery_saver
            );
            scene.on_budget_changed(&budget);

            let assignments: Vec<LodAssignment> = scene
                .list_renderables()
                .iter()
                .filter_map(|renderable| {
                    select_lod_band(&budget.lod_bands, renderable.distance).map(
                        |(band_index, band)| LodAssignment {
                            id: renderable.id,
                            band_index,
                            scale: band.scale,
                        },
                    )
                })
                .collect();
            if !assignments.is_empty() {
                scene.on_lod_assigned(&assignments);
            }
        }

        self.push_count += 1;
        self.last_pushed = Some(budget.clone());
        budget
    }

    /// The budget most recently delivered.
    pub fn current_budget(&self) -> Option<&ResourceBudget> {
        self.last_pushed.as_ref()
    }

    /// Number of budgets actually delivered.
    pub fn push_count(&self) -> u64 {
        self.push_count
    }

    /// Returns `true` if a scene is attached.
    pub fn has_scene(&self) -> bool {
        self.scene.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use vigil_core::scene::{Renderable, RenderableKind};
    use vigil_core::ShadowQuality;

    #[derive(Default)]
    struct Log {
        budgets: Vec<ResourceBudget>,
        assignments: Vec<Vec<LodAssignment>>,
    }

    struct RecordingScene {
        log: Arc<Mutex<Log>>,
        renderables: Vec<Renderable>,
    }

    impl SceneCollaborator for RecordingScene {
        fn list_renderables(&self) -> Vec<Renderable> {
            self.renderables.clone()
        }

        fn on_budget_changed(&mut self, budget: &ResourceBudget) {
            self.log.lock().unwrap().budgets.push(budget.clone());
        }

        fn on_lod_assigned(&mut self, assignments: &[LodAssignment]) {
            self.log.lock().unwrap().assignments.push(assignments.to_vec());
        }
    }

    fn applier_with(renderables: Vec<Renderable>) -> (ResourceBudgetApplier, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let scene = RecordingScene {
            log: log.clone(),
            renderables,
        };
        (
            ResourceBudgetApplier::new(CapabilityProfile::default(), Some(Box::new(scene))),
            log,
        )
    }

    #[test]
    fn test_apply_twice_pushes_once() {
        let (mut applier, log) = applier_with(Vec::new());
        let first = applier.apply(QualityLevel::Medium, false);
        let second = applier.apply(QualityLevel::Medium, false);
        assert_eq!(first, second);
        assert_eq!(log.lock().unwrap().budgets.len(), 1);
        assert_eq!(applier.push_count(), 1);
    }

    #[test]
    fn test_level_change_pushes_again() {
        let (mut applier, log) = applier_with(Vec::new());
        applier.apply(QualityLevel::Medium, false);
        applier.apply(QualityLevel::Low, false);
        applier.apply(QualityLevel::Low, true);
        let budgets = &log.lock().unwrap().budgets;
        assert_eq!(budgets.len(), 3);
        assert_eq!(budgets[2].shadow_quality, ShadowQuality::None);
        assert!(budgets[2].battery_saver);
    }

    #[test]
    fn test_lod_assignments_follow_push() {
        let renderables = vec![
            Renderable {
                id: 1,
                distance: 5.0,
                kind: RenderableKind::Mesh,
            },
            Renderable {
                id: 2,
                distance: 60.0,
                kind: RenderableKind::Mesh,
            },
            Renderable {
                id: 3,
                distance: 500.0,
                kind: RenderableKind::ParticleSystem,
            },
        ];
        let (mut applier, log) = applier_with(renderables);
        // Medium: bands at 25, 50, 100.
        applier.apply(QualityLevel::Medium, false);
        applier.apply(QualityLevel::Medium, false);

        let log = log.lock().unwrap();
        assert_eq!(log.assignments.len(), 1);
        let bands: Vec<usize> = log.assignments[0].iter().map(|a| a.band_index).collect();
        assert_eq!(bands, vec![0, 1, 2]);
        assert_eq!(log.assignments[0][2].scale, 0.25);
    }

    #[test]
    fn test_apply_without_scene_still_derives() {
        let mut applier = ResourceBudgetApplier::new(CapabilityProfile::default(), None);
        let budget = applier.apply(QualityLevel::High, false);
        assert_eq!(budget.max_particles, 5000);
        assert_eq!(applier.current_budget(), Some(&budget));
        assert!(!applier.has_scene());
    }
}
