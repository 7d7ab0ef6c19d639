// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content that a playlist item can reference.
//!
//! A [`Clip`] is a cheap, reference-counted handle: cloning it acquires the
//! content, dropping it releases it, and the last release frees it. Playlists
//! are clips too, which lets one playlist be nested inside another.

use crate::frame::{Frame, DEFAULT_MAX_DURATION};
use crate::playlist::Playlist;
use kurbo::Rect;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Canvas used when content does not report its own size
pub const DEFAULT_BOUNDS: Rect = Rect::new(0.0, 0.0, 1920.0, 1080.0);

/// Library identifier of a clip
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId(pub String);

impl ClipId {
    /// Create a new random clip ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClipId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ClipId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Synchronization state of a library object relative to the server copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SyncStatus {
    /// Local copy matches the server
    #[default]
    Synced,
    /// Created locally, never uploaded
    New,
    /// Changed locally since the last sync
    Modified,
    /// Removed locally, removal not yet uploaded
    Deleted,
}

/// Attributes common to every library object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipMeta {
    /// Library ID (immutable once the object is shared)
    pub id: ClipId,
    /// Display name
    pub name: String,
    /// Revision counter
    pub version: u32,
    /// Sync state
    pub sync_status: SyncStatus,
    /// Whether every reference held by the object resolved on the last pass
    #[serde(skip)]
    pub dependencies_resolved: bool,
}

impl ClipMeta {
    /// Create metadata for a brand new local object
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(ClipId::new(), name)
    }

    /// Create metadata with a known ID
    pub fn with_id(id: impl Into<ClipId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: 0,
            sync_status: SyncStatus::New,
            dependencies_resolved: true,
        }
    }
}

/// Kind of leaf media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video with a natural length
    Video,
    /// Rendered text
    Text,
    /// Solid colour
    Color,
}

/// Leaf content rendered by an external backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaClip {
    /// Library attributes
    pub meta: ClipMeta,
    /// What kind of media this is
    pub kind: MediaKind,
    /// Length in frames (0 when the media has no intrinsic length)
    pub natural_duration: Frame,
    /// Content-space bounds
    pub bounds: Rect,
}

impl MediaClip {
    /// Create a still image clip
    pub fn image(name: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            meta: ClipMeta::new(name),
            kind: MediaKind::Image,
            natural_duration: 0,
            bounds: Rect::new(0.0, 0.0, width, height),
        }
    }

    /// Create a video clip of `frames` frames
    pub fn video(name: impl Into<String>, width: f64, height: f64, frames: Frame) -> Self {
        Self {
            meta: ClipMeta::new(name),
            kind: MediaKind::Video,
            natural_duration: frames.max(0),
            bounds: Rect::new(0.0, 0.0, width, height),
        }
    }

    /// Replace the generated ID with a known one
    pub fn with_id(mut self, id: impl Into<ClipId>) -> Self {
        self.meta.id = id.into();
        self
    }

    /// Longest span an item may show this media
    pub fn max_duration(&self) -> Frame {
        match self.kind {
            MediaKind::Video if self.natural_duration > 0 => self.natural_duration,
            _ => DEFAULT_MAX_DURATION,
        }
    }
}

/// Shared, lockable playlist handle.
///
/// The ID is cached outside the lock so that identity checks never need to
/// lock a playlist that may already be write-locked by the caller.
#[derive(Clone)]
pub struct SharedPlaylist {
    id: ClipId,
    inner: Arc<RwLock<Playlist>>,
}

impl SharedPlaylist {
    /// Wrap a playlist for sharing
    pub fn new(playlist: Playlist) -> Self {
        Self {
            id: playlist.id().clone(),
            inner: Arc::new(RwLock::new(playlist)),
        }
    }

    /// Library ID of the wrapped playlist
    pub fn id(&self) -> &ClipId {
        &self.id
    }

    /// Take the shared (reader) lock
    pub fn read(&self) -> RwLockReadGuard<'_, Playlist> {
        self.inner.read()
    }

    /// Take the exclusive (writer) lock
    pub fn write(&self) -> RwLockWriteGuard<'_, Playlist> {
        self.inner.write()
    }

    /// Whether both handles point at the same playlist
    pub fn ptr_eq(&self, other: &SharedPlaylist) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles (acquisitions) to this playlist
    pub fn holder_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for SharedPlaylist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPlaylist").field("id", &self.id).finish()
    }
}

/// Reference-counted content handle
#[derive(Clone, Debug)]
pub enum Clip {
    /// Leaf media
    Media(Arc<MediaClip>),
    /// A nested playlist
    Playlist(SharedPlaylist),
}

impl Clip {
    /// Wrap a media clip
    pub fn media(media: MediaClip) -> Self {
        Self::Media(Arc::new(media))
    }

    /// Wrap a playlist in a new shared handle
    pub fn playlist(playlist: Playlist) -> Self {
        Self::Playlist(SharedPlaylist::new(playlist))
    }

    /// Library ID
    pub fn id(&self) -> ClipId {
        match self {
            Clip::Media(media) => media.meta.id.clone(),
            Clip::Playlist(playlist) => playlist.id().clone(),
        }
    }

    /// Display name
    pub fn name(&self) -> String {
        match self {
            Clip::Media(media) => media.meta.name.clone(),
            Clip::Playlist(playlist) => playlist.read().meta().name.clone(),
        }
    }

    /// Revision counter
    pub fn version(&self) -> u32 {
        match self {
            Clip::Media(media) => media.meta.version,
            Clip::Playlist(playlist) => playlist.read().meta().version,
        }
    }

    /// Sync state
    pub fn sync_status(&self) -> SyncStatus {
        match self {
            Clip::Media(media) => media.meta.sync_status,
            Clip::Playlist(playlist) => playlist.read().meta().sync_status,
        }
    }

    /// Intrinsic duration in frames (0 when unknown or empty)
    pub fn duration(&self) -> Frame {
        match self {
            Clip::Media(media) => media.natural_duration,
            Clip::Playlist(playlist) => playlist.read().duration(),
        }
    }

    /// Duration an item adopts when this clip is dropped on it
    pub fn default_duration(&self) -> Frame {
        self.duration()
    }

    /// Longest span an item may show this clip
    pub fn max_duration(&self) -> Frame {
        match self {
            Clip::Media(media) => media.max_duration(),
            Clip::Playlist(playlist) => {
                let duration = playlist.read().duration();
                if duration > 0 {
                    duration
                } else {
                    DEFAULT_MAX_DURATION
                }
            }
        }
    }

    /// Content-space bounds
    pub fn bounds(&self) -> Rect {
        match self {
            Clip::Media(media) => media.bounds,
            Clip::Playlist(playlist) => playlist.read().bounds(),
        }
    }

    /// The playlist behind this clip, if it is one
    pub fn as_playlist(&self) -> Option<&SharedPlaylist> {
        match self {
            Clip::Playlist(playlist) => Some(playlist),
            Clip::Media(_) => None,
        }
    }

    /// The media behind this clip, if it is leaf media
    pub fn as_media(&self) -> Option<&MediaClip> {
        match self {
            Clip::Media(media) => Some(media.as_ref()),
            Clip::Playlist(_) => None,
        }
    }

    /// Whether both handles refer to the same object
    pub fn is_same(&self, other: &Clip) -> bool {
        match (self, other) {
            (Clip::Media(a), Clip::Media(b)) => Arc::ptr_eq(a, b),
            (Clip::Playlist(a), Clip::Playlist(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<MediaClip> for Clip {
    fn from(media: MediaClip) -> Self {
        Self::media(media)
    }
}

impl From<SharedPlaylist> for Clip {
    fn from(playlist: SharedPlaylist) -> Self {
        Self::Playlist(playlist)
    }
}
