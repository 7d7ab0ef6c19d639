// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timed, positioned references to clips.
//!
//! An item is owned by exactly one playlist at a time. It remembers the ID of
//! its parent (never a reference to it), and all field changes after insertion
//! go through [`Playlist::modify_item`](crate::Playlist::modify_item) so the
//! parent can re-derive its duration and notify listeners.

use crate::clip::{Clip, ClipId};
use crate::frame::{self, Frame, DEFAULT_ITEM_DURATION, DEFAULT_MAX_DURATION};
use crate::keyframe::PropertyAnimation;
use crate::library::Library;
use crate::playlist::PlaylistError;
use crate::track::TrackIndex;
use crate::transform::ItemTransform;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a playlist item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Create a new random item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// Where an interactive item navigates to when triggered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavigationInfo {
    /// Library ID of the target playlist
    pub target_id: ClipId,
}

impl NavigationInfo {
    /// Navigate to the playlist with the given ID
    pub fn new(target_id: impl Into<ClipId>) -> Self {
        Self {
            target_id: target_id.into(),
        }
    }
}

/// A stored clip ID plus the live handle it resolved to (if any)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ClipLink {
    id: Option<ClipId>,
    #[serde(skip)]
    clip: Option<Clip>,
}

/// A positioned, timed reference to one clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    id: ItemId,
    start_frame: Frame,
    duration: Frame,
    track: TrackIndex,
    /// Content-local frame shown on `start_frame`
    #[serde(default)]
    clip_offset: Frame,
    #[serde(default)]
    transform: ItemTransform,
    #[serde(default)]
    opacity: PropertyAnimation,
    #[serde(default)]
    navigation: Option<NavigationInfo>,
    #[serde(default)]
    link: ClipLink,
    #[serde(skip)]
    parent: Option<ClipId>,
    #[serde(skip)]
    cursor: Option<Frame>,
}

impl PlaylistItem {
    /// Create an item without content
    pub fn new(start_frame: Frame, duration: Frame, track: TrackIndex) -> Self {
        Self {
            id: ItemId::new(),
            start_frame,
            duration: duration.max(0),
            track,
            clip_offset: 0,
            transform: ItemTransform::default(),
            opacity: PropertyAnimation::opacity(),
            navigation: None,
            link: ClipLink::default(),
            parent: None,
            cursor: None,
        }
    }

    /// Create an item that shows `clip`.
    ///
    /// A zero `duration` adopts the clip's default duration.
    pub fn with_clip(clip: Clip, start_frame: Frame, duration: Frame, track: TrackIndex) -> Self {
        let mut item = Self::new(start_frame, duration, track);
        item.set_clip(clip);
        item
    }

    /// Create an item that refers to a library ID not yet resolved
    pub fn with_clip_id(
        clip_id: impl Into<ClipId>,
        start_frame: Frame,
        duration: Frame,
        track: TrackIndex,
    ) -> Self {
        let mut item = Self::new(start_frame, duration, track);
        item.link.id = Some(clip_id.into());
        item
    }

    /// Item ID
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// First frame of the item in playlist time
    pub fn start_frame(&self) -> Frame {
        self.start_frame
    }

    /// Length in frames
    pub fn duration(&self) -> Frame {
        self.duration
    }

    /// Last frame of the item (inclusive)
    pub fn end_frame(&self) -> Frame {
        frame::end_frame(self.start_frame, self.duration)
    }

    /// Track the item lives on
    pub fn track(&self) -> TrackIndex {
        self.track
    }

    /// Content-local frame shown at `start_frame`
    pub fn clip_offset(&self) -> Frame {
        self.clip_offset
    }

    /// Placement on the canvas
    pub fn transform(&self) -> &ItemTransform {
        &self.transform
    }

    /// Opacity curve over item-local frames
    pub fn opacity(&self) -> &PropertyAnimation {
        &self.opacity
    }

    /// Navigation target, for interactive items
    pub fn navigation(&self) -> Option<&NavigationInfo> {
        self.navigation.as_ref()
    }

    /// ID of the playlist that currently owns the item
    pub fn parent(&self) -> Option<&ClipId> {
        self.parent.as_ref()
    }

    /// Item-local frame last pushed by the owning playlist, if the item is live
    pub fn cursor(&self) -> Option<Frame> {
        self.cursor
    }

    /// Whether the item covers `frame`
    pub fn contains(&self, frame: Frame) -> bool {
        self.duration > 0 && frame >= self.start_frame && frame <= self.end_frame()
    }

    /// Whether the item intersects `[from, to]`
    pub fn overlaps(&self, from: Frame, to: Frame) -> bool {
        self.duration > 0 && self.start_frame <= to && self.end_frame() >= from
    }

    /// Content-local frame shown at playlist frame `frame`
    pub fn local_frame(&self, frame: Frame) -> Frame {
        frame - self.start_frame + self.clip_offset
    }

    /// Opacity at playlist frame `frame`
    pub fn opacity_at(&self, frame: Frame) -> f32 {
        self.opacity.value_at(frame - self.start_frame).clamp(0.0, 1.0)
    }

    /// Move the item
    pub fn set_start_frame(&mut self, start_frame: Frame) {
        self.start_frame = start_frame;
    }

    /// Change the length (negative values become zero)
    pub fn set_duration(&mut self, duration: Frame) {
        self.duration = duration.max(0);
    }

    /// Move the item to another track
    pub fn set_track(&mut self, track: TrackIndex) {
        self.track = track;
    }

    /// Change which content frame the item starts on
    pub fn set_clip_offset(&mut self, clip_offset: Frame) {
        self.clip_offset = clip_offset.max(0);
    }

    /// Replace the placement
    pub fn set_transform(&mut self, transform: ItemTransform) {
        self.transform = transform;
    }

    /// Mutable access to the opacity curve
    pub fn opacity_mut(&mut self) -> &mut PropertyAnimation {
        &mut self.opacity
    }

    /// Set or clear the navigation target
    pub fn set_navigation(&mut self, navigation: Option<NavigationInfo>) {
        self.navigation = navigation;
    }

    /// The live clip, once resolved
    pub fn clip(&self) -> Option<&Clip> {
        self.link.clip.as_ref()
    }

    /// The stored clip ID, resolved or not
    pub fn clip_id(&self) -> Option<&ClipId> {
        self.link.id.as_ref()
    }

    /// Swap the referenced content.
    ///
    /// A zero duration adopts the clip's default duration (or
    /// [`DEFAULT_ITEM_DURATION`] when the clip has none), the duration is then
    /// clamped to the clip's maximum, and the pivot moves to the centre of the
    /// clip's bounds. Items already owned by a playlist should go through
    /// [`Playlist::set_item_clip`](crate::Playlist::set_item_clip), which also
    /// rejects self-referencing content.
    pub fn set_clip(&mut self, clip: Clip) {
        if self.duration == 0 {
            let default_duration = clip.default_duration();
            self.duration = if default_duration > 0 {
                default_duration
            } else {
                DEFAULT_ITEM_DURATION
            };
        }
        self.duration = self.duration.min(clip.max_duration());
        self.transform.pivot = clip.bounds().center();
        self.link = ClipLink {
            id: Some(clip.id()),
            clip: Some(clip),
        };
    }

    /// Drop the content reference entirely
    pub fn clear_clip(&mut self) {
        self.link = ClipLink::default();
    }

    /// Longest span this item may cover
    pub fn max_duration(&self) -> Frame {
        self.link
            .clip
            .as_ref()
            .map_or(DEFAULT_MAX_DURATION, Clip::max_duration)
    }

    /// Look the stored clip ID up in `library`.
    ///
    /// A missing ID (including one whose object was removed after it was
    /// resolved) releases any previously held clip and reports
    /// [`PlaylistError::NotFound`]; items without an ID trivially succeed.
    pub fn resolve_dependencies(&mut self, library: &dyn Library) -> Result<(), PlaylistError> {
        let Some(id) = self.link.id.clone() else {
            return Ok(());
        };
        match library.find_object(&id) {
            Some(clip) => {
                self.link.clip = Some(clip);
                Ok(())
            }
            None => {
                self.link.clip = None;
                Err(PlaylistError::NotFound(id))
            }
        }
    }

    /// Forget the live handle but keep the stored ID
    pub(crate) fn release_clip(&mut self) {
        self.link.clip = None;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ClipId>) {
        self.parent = parent;
    }

    pub(crate) fn set_cursor(&mut self, cursor: Option<Frame>) {
        self.cursor = cursor;
    }

    /// Move the item by `delta` frames
    pub(crate) fn shift(&mut self, delta: Frame) {
        self.start_frame += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::MediaClip;
    use crate::library::ObjectLibrary;

    #[test]
    fn test_span_arithmetic() {
        let item = PlaylistItem::new(10, 5, 0);
        assert_eq!(item.end_frame(), 14);
        assert!(!item.contains(9));
        assert!(item.contains(10));
        assert!(item.contains(14));
        assert!(!item.contains(15));
        assert!(item.overlaps(14, 20));
        assert!(!item.overlaps(15, 20));
    }

    #[test]
    fn test_set_clip_adopts_default_duration() {
        let mut item = PlaylistItem::new(0, 0, 1);
        item.set_clip(Clip::media(MediaClip::video("Clip", 100.0, 50.0, 250)));
        assert_eq!(item.duration(), 250);
        assert_eq!(item.transform().pivot, kurbo::Point::new(50.0, 25.0));

        let mut still = PlaylistItem::new(0, 0, 1);
        still.set_clip(Clip::media(MediaClip::image("Still", 10.0, 10.0)));
        assert_eq!(still.duration(), DEFAULT_ITEM_DURATION);
    }

    #[test]
    fn test_set_clip_clamps_to_max_duration() {
        let mut item = PlaylistItem::new(0, 1_000, 1);
        item.set_clip(Clip::media(MediaClip::video("Short", 10.0, 10.0, 40)));
        assert_eq!(item.duration(), 40);
        assert_eq!(item.max_duration(), 40);
    }

    #[test]
    fn test_resolve_missing_id_fails_quietly() {
        let library = ObjectLibrary::new();
        let mut item = PlaylistItem::with_clip_id("gone", 0, 10, 0);
        let err = item.resolve_dependencies(&library).unwrap_err();
        assert!(matches!(err, PlaylistError::NotFound(id) if id.as_str() == "gone"));
        assert!(item.clip().is_none());
        assert_eq!(item.clip_id().map(ClipId::as_str), Some("gone"));
    }

    #[test]
    fn test_stale_reference_is_released() {
        let library = ObjectLibrary::new();
        library.add(Clip::media(MediaClip::image("Logo", 1.0, 1.0).with_id("logo")));

        let mut item = PlaylistItem::with_clip_id("logo", 0, 10, 0);
        assert!(item.resolve_dependencies(&library).is_ok());
        assert!(item.clip().is_some());

        library.remove(&ClipId::from("logo"));
        assert!(item.resolve_dependencies(&library).is_err());
        assert!(item.clip().is_none());
    }

    #[test]
    fn test_opacity_is_item_local() {
        let mut item = PlaylistItem::new(100, 20, 0);
        item.opacity_mut().set_keyframe(crate::Keyframe::new(0, 0.0));
        item.opacity_mut().set_keyframe(crate::Keyframe::new(10, 1.0));
        assert_eq!(item.opacity_at(100), 0.0);
        assert!((item.opacity_at(105) - 0.5).abs() < 1e-6);
    }
}
