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

//! A synthetic scene whose frame cost follows the active budget.

use std::sync::{Arc, Mutex};

use vigil_core::scene::{LodAssignment, Renderable, RenderableKind, SceneCollaborator};
use vigil_core::{ResourceBudget, ShadowQuality};

/// Frame cost model of the synthetic scene.
#[derive(Debug, Clone, Copy)]
pub struct Workload {
    /// Fixed cost of a frame in milliseconds.
    pub base_ms: f64,
    /// Cost per live particle.
    pub per_particle_ms: f64,
    /// Cost per dynamic light.
    pub per_light_ms: f64,
    /// Cost of texture sampling at full resolution.
    pub texture_ms: f64,
    /// First and last frame of the heavy section.
    pub heavy_frames: (u64, u64),
    /// Cost multiplier inside the heavy section.
    pub heavy_factor: f64,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            base_ms: 2.0,
            per_particle_ms: 0.001,
            per_light_ms: 0.25,
            texture_ms: 2.0,
            heavy_frames: (600, 2_400),
            heavy_factor: 2.5,
        }
    }
}

impl Workload {
    /// Frame time for `frame` under `budget`.
    pub fn frame_time_ms(&self, budget: &ResourceBudget, frame: u64) -> f64 {
        let shadows = match budget.shadow_quality {
            ShadowQuality::None => 0.0,
            ShadowQuality::Low => 1.0,
            ShadowQuality::High => 3.0,
        };
        let cost = self.base_ms
            + budget.max_particles as f64 * self.per_particle_ms
            + budget.max_lights as f64 * self.per_light_ms
            + budget.texture_scale as f64 * self.texture_ms
            + shadows;

        let (start, end) = self.heavy_frames;
        let load = if (start..end).contains(&frame) {
            self.heavy_factor
        } else {
            1.0
        };
        // Deterministic jitter of a few percent.
        let jitter = 1.0 + 0.05 * ((frame as f64) * 0.37).sin();
        cost * load * jitter
    }
}

#[derive(Debug, Default)]
struct SceneState {
    budgets_received: u32,
    last_assignments: Vec<LodAssignment>,
}

/// Scene handed to the engine. Clones share state with the host.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    renderables: Arc<Vec<Renderable>>,
    state: Arc<Mutex<SceneState>>,
}

impl SyntheticScene {
    /// Builds a scene with `count` objects spread along the view axis.
    pub fn new(count: u64) -> Self {
        let renderables = (0..count)
            .map(|id| Renderable {
                id,
                distance: 5.0 + id as f32 * 12.5,
                kind: match id % 3 {
                    0 => RenderableKind::Mesh,
                    1 => RenderableKind::ParticleSystem,
                    _ => RenderableKind::Light,
                },
            })
            .collect();
        Self {
            renderables: Arc::new(renderables),
            state: Arc::new(Mutex::new(SceneState::default())),
        }
    }

    /// Number of budgets delivered so far.
    pub fn budgets_received(&self) -> u32 {
        self.state.lock().map(|s| s.budgets_received).unwrap_or(0)
    }

    /// Objects per LOD band index in the latest assignment.
    pub fn lod_histogram(&self) -> Vec<usize> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        let mut histogram = Vec::new();
        for assignment in &state.last_assignments {
            if histogram.len() <= assignment.band_index {
                histogram.resize(assignment.band_index + 1, 0);
            }
            histogram[assignment.band_index] += 1;
        }
        histogram
    }
}

impl SceneCollaborator for SyntheticScene {
    fn list_renderables(&self) -> Vec<Renderable> {
        self.renderables.as_ref().clone()
    }

    fn on_budget_changed(&mut self, budget: &ResourceBudget) {
        log::info!(
            "Scene: Budget {} -> {} particles, {:?} shadows, {} lights, textures {}px{}.",
            budget.level,
            budget.max_particles,
            budget.shadow_quality,
            budget.max_lights,
            budget.max_texture_size,
            budget
                .frame_rate_cap
                .map(|fps| format!(", capped at {fps} FPS"))
                .unwrap_or_default()
        );
        if let Ok(mut state) = self.state.lock() {
            state.budgets_received += 1;
        }
    }

    fn on_lod_assigned(&mut self, assignments: &[LodAssignment]) {
        if let Ok(mut state) = self.state.lock() {
            state.last_assignments = assignments.to_vec();
        }
    }
}
