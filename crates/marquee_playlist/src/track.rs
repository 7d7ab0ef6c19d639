// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-track properties of a playlist.

use serde::{Deserialize, Serialize};

/// Index of a lane within a playlist
pub type TrackIndex = u32;

/// Properties attached to one track of a playlist.
///
/// Tracks exist implicitly: a track without stored properties behaves like
/// `TrackProperties::default()` (enabled, unlocked).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackProperties {
    /// Display name
    pub name: String,
    /// Whether the track's items are rendered
    pub enabled: bool,
    /// Whether the track refuses edits in an editor
    pub locked: bool,
    /// Colour override for editor display
    pub color: Option<[u8; 3]>,
}

impl TrackProperties {
    /// Create properties for a named, enabled track
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether these properties are indistinguishable from an untouched track
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for TrackProperties {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            locked: false,
            color: None,
        }
    }
}
