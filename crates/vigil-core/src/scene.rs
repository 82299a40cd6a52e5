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

//! The contract between the engine and the scene it governs.

use crate::quality::ResourceBudget;

/// Broad category of a renderable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderableKind {
    /// A static or skinned mesh.
    Mesh,
    /// A particle emitter.
    ParticleSystem,
    /// A light with visible geometry.
    Light,
    /// Anything else.
    Other,
}

/// A renderable as seen by the LOD assignment pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Renderable {
    /// Scene-defined identifier.
    pub id: u64,
    /// Distance from the active viewpoint.
    pub distance: f32,
    /// Category of the object.
    pub kind: RenderableKind,
}

/// The LOD band chosen for one renderable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodAssignment {
    /// Identifier of the renderable.
    pub id: u64,
    /// Index into the budget's LOD band table.
    pub band_index: usize,
    /// Detail multiplier of the selected band.
    pub scale: f32,
}

/// The scene side of the engine: consumes budgets and reports renderables.
pub trait SceneCollaborator: Send {
    /// Lists the renderables currently in the scene.
    fn list_renderables(&self) -> Vec<Renderable>;

    /// Called once per actual budget change.
    ///
    /// The scene must stay within the budget until the next call.
    fn on_budget_changed(&mut self, budget: &ResourceBudget);

    /// Receives the LOD band chosen for each renderable after a budget push.
    fn on_lod_assigned(&mut self, assignments: &[LodAssignment]) {
        let _ = assignments;
    }
}
