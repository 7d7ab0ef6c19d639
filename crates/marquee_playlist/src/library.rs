// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object lookup used by dependency resolution.

use crate::clip::{Clip, ClipId};
use indexmap::IndexMap;
use parking_lot::RwLock;

/// Lookup of shared objects by library ID
pub trait Library: Send + Sync {
    /// Find the object stored under `id`
    fn find_object(&self, id: &ClipId) -> Option<Clip>;
}

/// Summary of a dependency resolution pass that left references dangling
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} unresolved reference(s): {}", .missing.len(), format_ids(.missing))]
pub struct ResolveError {
    /// IDs that were not found
    pub missing: Vec<ClipId>,
}

fn format_ids(ids: &[ClipId]) -> String {
    ids.iter()
        .map(ClipId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// In-memory library of clips and playlists, keyed by ID in insertion order
#[derive(Default)]
pub struct ObjectLibrary {
    objects: RwLock<IndexMap<ClipId, Clip>>,
}

impl ObjectLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, returning the one it replaced
    pub fn add(&self, clip: Clip) -> Option<Clip> {
        self.objects.write().insert(clip.id(), clip)
    }

    /// Remove an object; holders keep it alive until they release it
    pub fn remove(&self, id: &ClipId) -> Option<Clip> {
        self.objects.write().shift_remove(id)
    }

    /// Whether an object is stored under `id`
    pub fn contains(&self, id: &ClipId) -> bool {
        self.objects.read().contains_key(id)
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// IDs of all stored objects, in insertion order
    pub fn ids(&self) -> Vec<ClipId> {
        self.objects.read().keys().cloned().collect()
    }

    /// Re-resolve the references of every stored playlist.
    ///
    /// Meant for bulk reloads. The object map lock is released before any
    /// playlist is locked, and each playlist is resolved under its own write
    /// lock only. Returns the playlists that still have dangling references.
    pub fn resolve_all(&self) -> Vec<(ClipId, ResolveError)> {
        let playlists: Vec<_> = self
            .objects
            .read()
            .values()
            .filter_map(|clip| clip.as_playlist().cloned())
            .collect();

        let mut failures = Vec::new();
        for playlist in playlists {
            if let Err(err) = playlist.write().resolve_dependencies(self) {
                tracing::warn!("Playlist {} has unresolved dependencies: {err}", playlist.id());
                failures.push((playlist.id().clone(), err));
            }
        }
        failures
    }
}

impl Library for ObjectLibrary {
    fn find_object(&self, id: &ClipId) -> Option<Clip> {
        self.objects.read().get(id).cloned()
    }
}
