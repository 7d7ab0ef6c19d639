// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playlist composition model for Marquee signage players.
//!
//! This crate provides the content side of a player:
//! - Clips (leaf media and nested playlists) behind shared handles
//! - Playlist items placed on tracks with a start frame and duration
//! - Playlists that derive their duration and notify listeners
//! - An object library for resolving stored references
//!
//! ## Architecture
//!
//! Everything is measured in frames at [`FRAMES_PER_SECOND`]. A playlist is
//! a clip, so compositions nest; the cycle guard keeps a playlist from ever
//! containing itself. Playlists are shared as [`SharedPlaylist`] handles and
//! mutated under their write lock.

pub mod clip;
pub mod frame;
pub mod keyframe;
pub mod library;
pub mod notify;
pub mod playlist;
pub mod playlist_item;
pub mod track;
pub mod transform;

pub use clip::{
    Clip, ClipId, ClipMeta, MediaClip, MediaKind, SharedPlaylist, SyncStatus, DEFAULT_BOUNDS,
};
pub use frame::{
    Frame, DEFAULT_ITEM_DURATION, DEFAULT_MAX_DURATION, FRAMES_PER_DAY, FRAMES_PER_SECOND,
};
pub use keyframe::{Interpolation, InterpolationMode, Keyframe, PropertyAnimation};
pub use library::{Library, ObjectLibrary, ResolveError};
pub use notify::{NotificationBlock, ObserverId, PlaylistEvent, PlaylistObserver};
pub use playlist::{Playlist, PlaylistError, ResolvedLayer, MAX_NESTING_DEPTH};
pub use playlist_item::{ItemId, NavigationInfo, PlaylistItem};
pub use track::{TrackIndex, TrackProperties};
pub use transform::ItemTransform;
