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

//! Handles for GPU-visible resources tracked by the memory guard.
//!
//! The scene registers one [`ResourceHandle`] per allocation (particle system,
//! texture, mesh buffer). The handle carries a size estimate and the callback
//! the guard invokes if it decides to evict the resource.

use std::fmt;

/// Bytes per megabyte, as used throughout the memory accounting.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Unique identifier of a tracked resource, chosen by the registering scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// Eviction class of a tracked resource. Evictable resources go first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourcePriority {
    /// May be disposed automatically when memory is over budget.
    Evictable,
    /// Never disposed automatically; the registering caller owns its disposal.
    Pinned,
}

/// Callback that releases the underlying resource.
pub type DisposeFn = Box<dyn FnOnce() + Send + 'static>;

/// A registered, disposable resource.
pub struct ResourceHandle {
    /// Identifier of the resource.
    pub id: ResourceId,
    /// Estimated footprint in bytes.
    pub estimated_bytes: u64,
    /// Eviction class.
    pub priority: ResourcePriority,
    dispose: Option<DisposeFn>,
}

impl ResourceHandle {
    /// Creates an evictable handle.
    pub fn new(
        id: ResourceId,
        estimated_bytes: u64,
        dispose: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            estimated_bytes,
            priority: ResourcePriority::Evictable,
            dispose: Some(Box::new(dispose)),
        }
    }

    /// Creates a pinned handle, exempt from automatic eviction.
    pub fn pinned(
        id: ResourceId,
        estimated_bytes: u64,
        dispose: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            priority: ResourcePriority::Pinned,
            ..Self::new(id, estimated_bytes, dispose)
        }
    }

    /// Returns `true` if this handle may be evicted automatically.
    pub fn is_evictable(&self) -> bool {
        self.priority == ResourcePriority::Evictable
    }

    /// Invokes the dispose callback, consuming the handle.
    pub fn dispose(mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("estimated_bytes", &self.estimated_bytes)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
